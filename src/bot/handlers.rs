use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, InteractionId, UserId},
    },
    prelude::Context,
};
use std::str::FromStr;
use tracing::{info, warn};

use crate::{
    audio::{player::PlaybackState, queue::SkipDirection},
    bot::JukeboxBot,
    error::JukeboxError,
    jukebox::TenantId,
    ui::{buttons::PlayerButton, embeds},
};

/// Discord epoch (2015-01-01T00:00:00Z) in Unix milliseconds.
const DISCORD_EPOCH_MS: u64 = 1_420_070_400_000;

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;
    let tenant = TenantId::from(guild_id);

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    bot.notifier.bind_channel(tenant, command.channel_id);

    let outcome: Result<CreateEmbed> = match command.data.name.as_str() {
        "play" => return handle_play(ctx, &command, bot, guild_id).await,
        "join" => handle_join(ctx, &command, bot, guild_id).await,
        "leave" => handle_leave(bot, tenant).await,
        "pause" => match bot.jukebox.toggle_pause(tenant).await {
            Ok(PlaybackState::Paused) => Ok(embeds::create_info_embed(
                "Pausado",
                "⏸️ Reproducción pausada",
            )),
            Ok(_) => Ok(embeds::create_info_embed(
                "Reanudado",
                "▶️ Reproducción reanudada",
            )),
            Err(e) => Err(e.into()),
        },
        "resume" => bot
            .jukebox
            .resume(tenant)
            .await
            .map(|_| embeds::create_info_embed("Reanudado", "▶️ Reproducción reanudada"))
            .map_err(Into::into),
        "skip" => handle_skip(&command, bot, tenant).await,
        "queue" => handle_queue(bot, tenant).await,
        "shuffle" => bot
            .jukebox
            .shuffle(tenant)
            .await
            .map(|_| embeds::create_success_embed("Cola mezclada", "🔀 Las próximas canciones se mezclaron"))
            .map_err(Into::into),
        "clear" => bot
            .jukebox
            .clear(tenant)
            .await
            .map(|removed| {
                embeds::create_success_embed(
                    "Cola limpiada",
                    &format!("🗑️ Se quitaron {} canciones de la cola", removed),
                )
            })
            .map_err(Into::into),
        "repeatqueue" => bot
            .jukebox
            .toggle_repeat_queue(tenant)
            .await
            .map(|on| embeds::create_info_embed("Repetir cola", &toggle_text("🔁", on)))
            .map_err(Into::into),
        "repeatsong" => bot
            .jukebox
            .toggle_repeat_song(tenant)
            .await
            .map(|on| embeds::create_info_embed("Repetir canción", &toggle_text("🔂", on)))
            .map_err(Into::into),
        "ping" => Ok(embeds::create_info_embed(
            "Pong!",
            &format!("🏓 Latencia: {} ms", latency_ms(command.id, now_ms())),
        )),
        _ => Err(anyhow::anyhow!("Comando no reconocido")),
    };

    let message = match outcome {
        Ok(embed) => CreateInteractionResponseMessage::new().embed(embed),
        Err(e) => CreateInteractionResponseMessage::new()
            .embed(embeds::create_error_embed("No se pudo completar", &e.to_string()))
            .ephemeral(true),
    };

    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await?;

    Ok(())
}

/// Maneja los botones del mensaje "reproduciendo ahora"
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;
    let tenant = TenantId::from(guild_id);

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let content = if get_user_voice_channel(ctx, guild_id, component.user.id).is_err() {
        "❌ Debes estar en un canal de voz para usar los controles".to_string()
    } else {
        bot.notifier.bind_channel(tenant, component.channel_id);

        let outcome = match PlayerButton::from_custom_id(&component.data.custom_id) {
            Some(PlayerButton::Pause) => {
                bot.jukebox.toggle_pause(tenant).await.map(|state| match state {
                    PlaybackState::Paused => "⏸️ Pausado".to_string(),
                    _ => "▶️ Reanudado".to_string(),
                })
            }
            Some(PlayerButton::Skip) => bot
                .jukebox
                .skip(tenant, SkipDirection::Next)
                .await
                .map(|_| "⏩ Saltado".to_string()),
            Some(PlayerButton::RepeatQueue) => bot
                .jukebox
                .toggle_repeat_queue(tenant)
                .await
                .map(|on| toggle_text("🔁 Repetir cola", on)),
            Some(PlayerButton::RepeatSong) => bot
                .jukebox
                .toggle_repeat_song(tenant)
                .await
                .map(|on| toggle_text("🔂 Repetir canción", on)),
            None => Ok("❌ Acción no reconocida".to_string()),
        };

        outcome.unwrap_or_else(|e| format!("❌ {}", e))
    };

    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // La descarga puede tardar minutos
    command.defer(&ctx.http).await?;

    let embed = match play(ctx, command, bot, guild_id, &query).await {
        Ok(embed) => embed,
        Err(e) => {
            warn!("❌ /play '{}' falló en guild {}: {}", query, guild_id, e);
            embeds::create_error_embed("No se pudo reproducir", &e.to_string())
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
    query: &str,
) -> Result<CreateEmbed> {
    if !bot.is_connected(guild_id).await? {
        let channel_id = get_user_voice_channel(ctx, guild_id, command.user.id)?;
        bot.join_voice_channel(ctx, guild_id, channel_id).await?;
    }

    let item = bot.jukebox.enqueue(TenantId::from(guild_id), query).await?;

    if item.is_playable() {
        Ok(embeds::create_track_added_embed(&item))
    } else {
        Ok(embeds::create_error_embed(
            "No se pudo obtener el audio",
            &format!("{}\n\nPrueba con otra URL o búsqueda.", item.title),
        ))
    }
}

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JukeboxBot,
    guild_id: GuildId,
) -> Result<CreateEmbed> {
    let channel_id = get_user_voice_channel(ctx, guild_id, command.user.id)?;
    bot.join_voice_channel(ctx, guild_id, channel_id).await?;

    Ok(embeds::create_success_embed(
        "Conectado",
        &format!("🔊 Conectado a <#{}>", channel_id),
    ))
}

async fn handle_leave(bot: &JukeboxBot, tenant: TenantId) -> Result<CreateEmbed> {
    if bot.jukebox.destroy(tenant).await? {
        Ok(embeds::create_success_embed(
            "Desconectado",
            "👋 Desconectado del canal de voz",
        ))
    } else {
        Err(JukeboxError::TenantNotFound.into())
    }
}

async fn handle_skip(
    command: &CommandInteraction,
    bot: &JukeboxBot,
    tenant: TenantId,
) -> Result<CreateEmbed> {
    let raw = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "direction")
        .and_then(|opt| opt.value.as_str())
        .unwrap_or("next");

    let direction = SkipDirection::from_str(raw).map_err(anyhow::Error::msg)?;
    bot.jukebox.skip(tenant, direction).await?;

    let text = match direction {
        SkipDirection::Next => "⏩ Saltando a la siguiente canción",
        SkipDirection::Back => "⏪ Volviendo a la canción anterior",
    };
    Ok(embeds::create_info_embed("Saltado", text))
}

async fn handle_queue(bot: &JukeboxBot, tenant: TenantId) -> Result<CreateEmbed> {
    match bot.jukebox.queue(tenant).await? {
        Some(snapshot) => Ok(embeds::create_queue_embed(&snapshot)),
        None => Ok(embeds::create_info_embed(
            "Cola de Reproducción",
            "😴 La cola está vacía",
        )),
    }
}

// Funciones auxiliares

fn toggle_text(label: &str, enabled: bool) -> String {
    format!(
        "{} {}",
        label,
        if enabled { "activado" } else { "desactivado" }
    )
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Time elapsed since Discord minted `id`, in milliseconds.
fn latency_ms(id: InteractionId, now_ms: u64) -> u64 {
    let created = (id.get() >> 22) + DISCORD_EPOCH_MS;
    now_ms.saturating_sub(created)
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild no encontrada en caché"))?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("Debes estar en un canal de voz"))?;

    Ok(channel_id)
}
