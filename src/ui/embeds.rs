use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{audio::player::PlaybackState, audio::queue::ResolvedItem, jukebox::QueueSnapshot};

/// Upcoming items listed in the queue embed before summarising the rest.
const QUEUE_PREVIEW: usize = 10;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Open Jukebox";

fn base(title: impl Into<String>) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(title: &str) -> CreateEmbed {
    base("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", title))
        .color(colors::MUSIC_PURPLE)
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(item: &ResolvedItem) -> CreateEmbed {
    base("✅ Canción Agregada")
        .description(format!(
            "**{}** se ha agregado a la cola de reproducción",
            item.title
        ))
        .color(colors::SUCCESS_GREEN)
}

pub fn create_unplayable_embed(title: &str) -> CreateEmbed {
    base("⚠️ No se pudo reproducir")
        .description(format!("**{}** se ha saltado", title))
        .color(colors::WARNING_ORANGE)
}

pub fn create_queue_finished_embed() -> CreateEmbed {
    base("📭 Cola terminada")
        .description("No quedan canciones en la cola.\n\n💡 Usa `/play <canción>` para agregar música")
        .color(colors::NEUTRAL_GRAY)
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(snapshot: &QueueSnapshot) -> CreateEmbed {
    let mut embed = base("📋 Cola de Reproducción").color(colors::INFO_BLUE);

    if snapshot.items.is_empty() {
        let mut description =
            "😴 **La cola está vacía**\n\n💡 Usa `/play <canción>` para agregar música".to_string();
        if snapshot.resolving > 0 {
            description.push_str(&format!("\n⏳ {} en descarga", snapshot.resolving));
        }
        return embed.description(description).color(colors::NEUTRAL_GRAY);
    }

    let mut upcoming = snapshot.items.iter();

    if let Some(current) = snapshot.now_playing() {
        upcoming.next();
        let status = match snapshot.state {
            PlaybackState::Paused => "⏸️",
            _ if snapshot.repeat_song => "🔂",
            _ => "▶️",
        };
        embed = embed.field(
            format!("{} Reproduciendo", status),
            format!("**{}**", current.title),
            false,
        );
    }

    let upcoming: Vec<&ResolvedItem> = upcoming.collect();
    if !upcoming.is_empty() {
        let mut description = String::new();
        for (i, item) in upcoming.iter().take(QUEUE_PREVIEW).enumerate() {
            description.push_str(&format!("**{}**. {}\n", i + 1, item.title));
        }
        if upcoming.len() > QUEUE_PREVIEW {
            description.push_str(&format!("… y {} más", upcoming.len() - QUEUE_PREVIEW));
        }
        embed = embed.field("Próximas canciones", description, false);
    }

    let mut info = format!("**Total:** {} canciones", snapshot.items.len());
    if snapshot.resolving > 0 {
        info.push_str(&format!(" • ⏳ **{}** en descarga", snapshot.resolving));
    }
    if snapshot.repeat_queue {
        info.push_str(" • 🔁 **Repetir cola**");
    }
    if snapshot.repeat_song {
        info.push_str(" • 🔂 **Repetir canción**");
    }

    embed.field("Información", info, false)
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    base(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    base(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    base(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
}
