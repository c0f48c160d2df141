use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::SerenityInit;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod jukebox;
mod resolver;
mod sources;
mod ui;

#[cfg(test)]
mod testing;

use crate::bot::{DiscordNotifier, JukeboxBot};
use crate::config::Config;
use crate::jukebox::{Jukebox, JukeboxSettings};
use crate::resolver::ResolverPool;
use crate::sources::YtDlpFetcher;

/// Time given to in-flight downloads and voice disconnects on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Open Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let fetcher = YtDlpFetcher::from_config(&config);

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        fetcher.verify_dependencies().await?;
        println!("OK");
        return Ok(());
    }

    if let Err(e) = fetcher.verify_dependencies().await {
        warn!("⚠️ {:?} - las descargas fallarán", e);
    }
    fetcher.purge_downloads().await?;

    let resolver = ResolverPool::new(
        config.resolver_workers,
        Arc::new(fetcher),
        config.resolve_timeout,
    );

    let http = Arc::new(Http::new(&config.discord_token));
    let notifier = Arc::new(DiscordNotifier::new(http));

    let (jukebox, jukebox_task) = Jukebox::spawn(
        JukeboxSettings {
            max_queue_size: config.max_queue_size,
        },
        resolver,
        notifier.clone(),
    );

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = JukeboxBot::new(config.clone(), jukebox.clone(), notifier);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird()
        .await?;

    let shard_manager = client.shard_manager.clone();

    // Manejar shutdown graceful
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    // Al soltar los handles el jukebox destruye todos los tenants y
    // detiene el pool de resolución.
    drop(client);
    drop(jukebox);
    match tokio::time::timeout(SHUTDOWN_GRACE, jukebox_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("El jukebox terminó con error: {:?}", e),
        Err(_) => warn!("⏱️ El jukebox no terminó en {:?}, saliendo igualmente", SHUTDOWN_GRACE),
    }

    info!("👋 Open Jukebox detenido");
    Ok(())
}
