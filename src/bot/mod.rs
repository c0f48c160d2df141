//! # Bot Module
//!
//! Discord front-end of the jukebox.
//!
//! - Command registration and handling
//! - Voice connection management (joining, wrapping calls as outputs)
//! - Presence tracking: listeners leaving, the bot being disconnected
//!
//! ## Architecture
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`]. It holds no
//! playback state of its own; every action goes through a
//! [`JukeboxHandle`], and notifications come back through
//! [`DiscordNotifier`].

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, UserId, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notifier;

pub use notifier::DiscordNotifier;

use crate::{
    audio::voice::SongbirdOutput,
    config::Config,
    jukebox::{JukeboxHandle, TenantId},
};

/// Main Discord bot handler.
pub struct JukeboxBot {
    config: Arc<Config>,
    pub jukebox: JukeboxHandle,
    pub notifier: Arc<DiscordNotifier>,
}

impl JukeboxBot {
    pub fn new(config: Config, jukebox: JukeboxHandle, notifier: Arc<DiscordNotifier>) -> Self {
        Self {
            config: Arc::new(config),
            jukebox,
            notifier,
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Commands go to the configured development guild when there is one
    /// (instant propagation), globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Joins `channel_id` and hands the call to the jukebox as the guild's
    /// audio output.
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Error al obtener handler de voz: {:?}", e);
            anyhow::anyhow!("Error al conectar al canal de voz")
        })?;

        let output = SongbirdOutput::new(guild_id, manager, call);
        self.jukebox
            .join(TenantId::from(guild_id), Arc::new(output))
            .await?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(())
    }

    /// Whether the jukebox already has an output for `guild_id`.
    pub async fn is_connected(&self, guild_id: GuildId) -> Result<bool> {
        let snapshot = self.jukebox.queue(TenantId::from(guild_id)).await?;
        Ok(snapshot.is_some_and(|s| s.connected))
    }

    /// Voice channel the bot currently sits in for `guild_id`.
    async fn bot_channel(&self, ctx: &Context, guild_id: GuildId) -> Option<ChannelId> {
        let manager = songbird::get(ctx).await?;
        let call = manager.get(guild_id)?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::from(channel.0))
    }
}

/// Users other than bots in `channel_id`, according to the cache.
fn count_listeners(ctx: &Context, guild_id: GuildId, channel_id: ChannelId, bot_id: UserId) -> usize {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return 0;
    };

    guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id) && state.user_id != bot_id)
        .filter(|state| !state.member.as_ref().is_some_and(|m| m.user.bot))
        .count()
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await
                {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Feeds presence into the jukebox: the bot being disconnected destroys
    /// the guild's tenant, and every change in the bot's channel reports the
    /// number of listeners left.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id.or_else(|| old.as_ref().and_then(|o| o.guild_id))
        else {
            return;
        };
        let tenant = TenantId::from(guild_id);
        let bot_id = ctx.cache.current_user().id;

        if new.user_id == bot_id {
            if new.channel_id.is_none() {
                info!("🔌 Bot desconectado en guild {}", guild_id);
                self.jukebox.connection_lost(tenant);
            }
            return;
        }

        let Some(channel_id) = self.bot_channel(&ctx, guild_id).await else {
            return;
        };

        let before = old.as_ref().and_then(|o| o.channel_id);
        if new.channel_id != Some(channel_id) && before != Some(channel_id) {
            return;
        }

        let listeners = count_listeners(&ctx, guild_id, channel_id, bot_id);
        debug!("👥 {} oyentes en guild {}", listeners, guild_id);
        self.jukebox.participants_changed(tenant, listeners);
    }
}
