use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Every slash command the bot answers to.
pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        pause_command(),
        resume_command(),
        skip_command(),
        queue_command(),
        shuffle_command(),
        clear_command(),
        repeat_queue_command(),
        repeat_song_command(),
        join_command(),
        leave_command(),
        ping_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción o la agrega a la cola")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL (YouTube, Spotify) o término de búsqueda",
            )
            .required(true),
        )
}

// Comandos de control

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa o reanuda la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip")
        .description("Salta a la siguiente canción o vuelve a la anterior")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "direction", "Dirección del salto")
                .add_string_choice("Siguiente", "next")
                .add_string_choice("Anterior", "back"),
        )
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola de reproducción")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Mezcla las próximas canciones")
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Limpia las próximas canciones de la cola")
}

fn repeat_queue_command() -> CreateCommand {
    CreateCommand::new("repeatqueue").description("Activa/desactiva repetir la cola")
}

fn repeat_song_command() -> CreateCommand {
    CreateCommand::new("repeatsong").description("Activa/desactiva repetir la canción actual")
}

// Comandos de conexión

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Conecta el bot a tu canal de voz")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Desconecta el bot y vacía la cola")
}

fn ping_command() -> CreateCommand {
    CreateCommand::new("ping").description("Muestra la latencia del bot")
}
