use serenity::model::id::GuildId;
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{
    audio::{
        output::{AudioOutput, CompletionFn},
        player::{Deck, PlaybackDriver},
        queue::{MediaHandle, ResolvedItem, TenantQueue},
    },
    error::Result,
};

use super::Notifier;

/// Identifier of one isolated room (a Discord guild).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantId(u64);

impl TenantId {
    #[cfg(test)]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl From<GuildId> for TenantId {
    fn from(guild_id: GuildId) -> Self {
        Self(guild_id.get())
    }
}

impl From<TenantId> for GuildId {
    fn from(tenant: TenantId) -> Self {
        GuildId::new(tenant.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Distinguishes successive lifetimes of the same tenant id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Generation(pub(crate) u64);

pub(crate) type EnqueueReply = oneshot::Sender<Result<ResolvedItem>>;

/// All state of one tenant, owned by the jukebox task.
pub(crate) struct Tenant {
    pub id: TenantId,
    pub generation: Generation,
    pub queue: TenantQueue,
    pub driver: PlaybackDriver,
    pub output: Option<Arc<dyn AudioOutput>>,
    next_seq: u64,
    next_append: u64,
    arrived: BTreeMap<u64, ResolvedItem>,
    waiting: HashMap<u64, EnqueueReply>,
}

impl Tenant {
    pub fn new(id: TenantId, generation: Generation, max_queue_size: usize) -> Self {
        Self {
            id,
            generation,
            queue: TenantQueue::new(max_queue_size),
            driver: PlaybackDriver::new(),
            output: None,
            next_seq: 0,
            next_append: 0,
            arrived: BTreeMap::new(),
            waiting: HashMap::new(),
        }
    }

    /// Requests submitted to the resolver whose result is not yet queued.
    pub fn in_flight(&self) -> usize {
        (self.next_seq - self.next_append) as usize
    }

    /// Reserves the next sequence number for an enqueue request.
    pub fn reserve(&mut self, reply: EnqueueReply) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.waiting.insert(seq, reply);
        seq
    }

    /// Records a resolution result and appends every result that is now in
    /// submission order. Returns how many items reached the queue.
    pub fn accept(&mut self, seq: u64, item: ResolvedItem) -> usize {
        if seq < self.next_append || self.arrived.insert(seq, item).is_some() {
            warn!("Resultado duplicado para tenant {} (seq {})", self.id, seq);
            return 0;
        }

        let mut appended = 0;
        while let Some(item) = self.arrived.remove(&self.next_append) {
            let reply = self.waiting.remove(&self.next_append);
            self.next_append += 1;

            let outcome = if item.is_playable() {
                self.queue.enqueue(item.clone()).map(|()| {
                    appended += 1;
                    item
                })
            } else {
                warn!("⚠️ No se pudo resolver para tenant {}: {}", self.id, item.title);
                Ok(item)
            };

            if let Some(reply) = reply {
                if reply.send(outcome).is_err() {
                    debug!("El solicitante ya no espera el resultado (tenant {})", self.id);
                }
            }
        }

        appended
    }

    /// Media still held when the tenant is torn down: discarded queue items
    /// and results waiting for an earlier request.
    pub fn take_leftovers(&mut self) -> Vec<MediaHandle> {
        let mut media = self.queue.take_discarded();
        media.extend(
            std::mem::take(&mut self.arrived)
                .into_values()
                .filter_map(|item| item.media),
        );
        media
    }

    /// Starts playback if the tenant is idle, has an output and has items.
    pub async fn kick(&mut self, notifier: &dyn Notifier, deliver: &CompletionFn) {
        let Some(output) = self.output.clone() else {
            return;
        };
        if self.queue.is_empty() {
            return;
        }

        let deck = Deck {
            tenant: self.id,
            output: output.as_ref(),
            notifier,
            deliver,
        };
        self.driver.start(&mut self.queue, &deck).await;
    }
}
