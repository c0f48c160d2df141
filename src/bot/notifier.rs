use dashmap::DashMap;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::ChannelId,
};
use std::sync::Arc;
use tracing::warn;

use crate::{
    jukebox::{LogNotifier, Notifier, TenantId},
    ui::{buttons, embeds},
};

/// Posts playback notifications to the text channel each guild last used.
pub struct DiscordNotifier {
    http: Arc<Http>,
    channels: DashMap<TenantId, ChannelId>,
    log: LogNotifier,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            channels: DashMap::new(),
            log: LogNotifier,
        }
    }

    /// Remembers where to post messages for `tenant`.
    pub fn bind_channel(&self, tenant: TenantId, channel: ChannelId) {
        self.channels.insert(tenant, channel);
    }

    pub fn channel(&self, tenant: TenantId) -> Option<ChannelId> {
        self.channels.get(&tenant).map(|c| *c)
    }

    fn post(&self, tenant: TenantId, message: CreateMessage) {
        let Some(channel) = self.channel(tenant) else {
            return;
        };

        let http = self.http.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.send_message(&http, message).await {
                warn!("No se pudo enviar mensaje al canal {}: {:?}", channel, e);
            }
        });
    }

    fn post_embed(&self, tenant: TenantId, embed: CreateEmbed) {
        self.post(tenant, CreateMessage::new().embed(embed));
    }
}

impl Notifier for DiscordNotifier {
    fn now_playing(&self, tenant: TenantId, title: &str) {
        self.log.now_playing(tenant, title);
        self.post(
            tenant,
            CreateMessage::new()
                .embed(embeds::create_now_playing_embed(title))
                .components(buttons::create_player_buttons()),
        );
    }

    fn queue_empty(&self, tenant: TenantId) {
        self.log.queue_empty(tenant);
        self.post_embed(tenant, embeds::create_queue_finished_embed());
    }

    fn item_unplayable(&self, tenant: TenantId, title: &str) {
        self.log.item_unplayable(tenant, title);
        self.post_embed(tenant, embeds::create_unplayable_embed(title));
    }
}
