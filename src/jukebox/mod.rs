//! # Jukebox
//!
//! Tenant registry and the single scheduling context of the bot.
//!
//! All tenant state (queue, playback driver, output connection) lives inside
//! one task. Commands, resolution results, end-of-track events and presence
//! changes all arrive at that task through one channel, so no two mutations
//! of the same tenant ever overlap and every transition is applied in the
//! order its event was produced.
//!
//! ```text
//! JukeboxHandle ──Command──▶ ┌──────────────┐ ──PlayRequest──▶ ResolverPool
//!                            │ Jukebox task │ ◀──Resolved──────┘
//! AudioOutput ──Completion─▶ └──────────────┘ ──play/stop──▶ AudioOutput
//! ```
//!
//! Results for a tenant are appended in submission order even though the
//! resolver pool finishes them in any order. Results and completion events
//! that belong to a tenant that has since been destroyed are dropped.

mod notifier;
mod tenant;

pub use notifier::{LogNotifier, Notifier};
pub use tenant::TenantId;

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    audio::{
        output::{AudioOutput, Completion, CompletionFn},
        player::{Deck, PlaybackState},
        queue::{ResolvedItem, SkipDirection},
    },
    error::{JukeboxError, Result},
    resolver::{PlayRequest, ResolverPool},
};

use tenant::{EnqueueReply, Generation, Tenant};

/// Read-only view of one tenant.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub tenant: TenantId,
    pub state: PlaybackState,
    pub items: Vec<ResolvedItem>,
    pub repeat_song: bool,
    pub repeat_queue: bool,
    pub resolving: usize,
    pub connected: bool,
    pub output_playing: bool,
    pub output_paused: bool,
}

impl QueueSnapshot {
    pub fn now_playing(&self) -> Option<&ResolvedItem> {
        match self.state {
            PlaybackState::Idle => None,
            _ => self.items.first(),
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.items.iter().map(|item| item.title.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct JukeboxSettings {
    pub max_queue_size: usize,
}

impl Default for JukeboxSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
        }
    }
}

enum Command {
    Join {
        tenant: TenantId,
        output: Arc<dyn AudioOutput>,
        reply: oneshot::Sender<()>,
    },
    Enqueue {
        tenant: TenantId,
        query: String,
        reply: EnqueueReply,
    },
    Pause {
        tenant: TenantId,
        reply: oneshot::Sender<Result<()>>,
    },
    Resume {
        tenant: TenantId,
        reply: oneshot::Sender<Result<()>>,
    },
    TogglePause {
        tenant: TenantId,
        reply: oneshot::Sender<Result<PlaybackState>>,
    },
    Skip {
        tenant: TenantId,
        direction: SkipDirection,
        reply: oneshot::Sender<Result<()>>,
    },
    Clear {
        tenant: TenantId,
        reply: oneshot::Sender<Result<usize>>,
    },
    Shuffle {
        tenant: TenantId,
        reply: oneshot::Sender<Result<()>>,
    },
    ToggleRepeatSong {
        tenant: TenantId,
        reply: oneshot::Sender<Result<bool>>,
    },
    ToggleRepeatQueue {
        tenant: TenantId,
        reply: oneshot::Sender<Result<bool>>,
    },
    Snapshot {
        tenant: TenantId,
        reply: oneshot::Sender<Option<QueueSnapshot>>,
    },
    Tenants {
        reply: oneshot::Sender<Vec<TenantId>>,
    },
    Destroy {
        tenant: TenantId,
        reply: Option<oneshot::Sender<bool>>,
    },
    Participants {
        tenant: TenantId,
        count: usize,
    },
}

enum Event {
    Command(Command),
    Resolved {
        tenant: TenantId,
        generation: Generation,
        seq: u64,
        item: ResolvedItem,
    },
    Completed(Completion),
}

/// Cheap, cloneable entry point to the jukebox task.
#[derive(Clone)]
pub struct JukeboxHandle {
    events: mpsc::UnboundedSender<Event>,
}

/// Future of an enqueue request, resolved once the item reached the queue
/// (or the request failed).
pub struct PendingEnqueue {
    rx: oneshot::Receiver<Result<ResolvedItem>>,
}

impl Future for PendingEnqueue {
    type Output = Result<ResolvedItem>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|reply| reply.unwrap_or(Err(JukeboxError::Cancelled)))
    }
}

impl JukeboxHandle {
    /// Submits an enqueue request without waiting for it.
    ///
    /// The request's position among this tenant's requests is fixed when
    /// this returns, so items reach the queue in call order.
    pub fn submit(&self, tenant: TenantId, query: impl Into<String>) -> Result<PendingEnqueue> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Enqueue {
            tenant,
            query: query.into(),
            reply,
        })?;
        Ok(PendingEnqueue { rx })
    }

    /// Resolves `query` and appends it to the tenant's queue.
    ///
    /// A failed resolution is not an error: the returned item has no media.
    pub async fn enqueue(&self, tenant: TenantId, query: impl Into<String>) -> Result<ResolvedItem> {
        self.submit(tenant, query)?.await
    }

    /// Attaches an output connection, creating the tenant if needed.
    pub async fn join(&self, tenant: TenantId, output: Arc<dyn AudioOutput>) -> Result<()> {
        self.request(|reply| Command::Join {
            tenant,
            output,
            reply,
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn pause(&self, tenant: TenantId) -> Result<()> {
        self.request(|reply| Command::Pause { tenant, reply }).await?
    }

    pub async fn resume(&self, tenant: TenantId) -> Result<()> {
        self.request(|reply| Command::Resume { tenant, reply }).await?
    }

    pub async fn toggle_pause(&self, tenant: TenantId) -> Result<PlaybackState> {
        self.request(|reply| Command::TogglePause { tenant, reply })
            .await?
    }

    pub async fn skip(&self, tenant: TenantId, direction: SkipDirection) -> Result<()> {
        self.request(|reply| Command::Skip {
            tenant,
            direction,
            reply,
        })
        .await?
    }

    /// Drops every upcoming item; the one playing keeps playing.
    pub async fn clear(&self, tenant: TenantId) -> Result<usize> {
        self.request(|reply| Command::Clear { tenant, reply }).await?
    }

    pub async fn shuffle(&self, tenant: TenantId) -> Result<()> {
        self.request(|reply| Command::Shuffle { tenant, reply }).await?
    }

    pub async fn toggle_repeat_song(&self, tenant: TenantId) -> Result<bool> {
        self.request(|reply| Command::ToggleRepeatSong { tenant, reply })
            .await?
    }

    pub async fn toggle_repeat_queue(&self, tenant: TenantId) -> Result<bool> {
        self.request(|reply| Command::ToggleRepeatQueue { tenant, reply })
            .await?
    }

    pub async fn queue(&self, tenant: TenantId) -> Result<Option<QueueSnapshot>> {
        self.request(|reply| Command::Snapshot { tenant, reply })
            .await
    }

    #[allow(dead_code)]
    pub async fn tenants(&self) -> Result<Vec<TenantId>> {
        self.request(|reply| Command::Tenants { reply }).await
    }

    /// Stops playback, clears the queue and releases the output.
    ///
    /// Returns whether the tenant existed. Safe to call repeatedly.
    pub async fn destroy(&self, tenant: TenantId) -> Result<bool> {
        self.request(|reply| Command::Destroy {
            tenant,
            reply: Some(reply),
        })
        .await
    }

    /// Presence update: number of listeners left with the bot.
    pub fn participants_changed(&self, tenant: TenantId, count: usize) {
        if self.send(Command::Participants { tenant, count }).is_err() {
            debug!("Jukebox detenido, evento de presencia descartado");
        }
    }

    /// The voice connection of `tenant` was torn down from outside.
    pub fn connection_lost(&self, tenant: TenantId) {
        if self.send(Command::Destroy { tenant, reply: None }).is_err() {
            debug!("Jukebox detenido, desconexión descartada");
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.events
            .send(Event::Command(command))
            .map_err(|_| JukeboxError::Closed)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply))?;
        rx.await.map_err(|_| JukeboxError::Closed)
    }
}

/// The registry itself; runs inside the task started by [`Jukebox::spawn`].
pub struct Jukebox {
    settings: JukeboxSettings,
    tenants: HashMap<TenantId, Tenant>,
    next_generation: u64,
    resolver: ResolverPool,
    notifier: Arc<dyn Notifier>,
    events: mpsc::WeakUnboundedSender<Event>,
    deliver: CompletionFn,
}

impl Jukebox {
    /// Starts the jukebox task. It runs until every handle is dropped.
    pub fn spawn(
        settings: JukeboxSettings,
        resolver: ResolverPool,
        notifier: Arc<dyn Notifier>,
    ) -> (JukeboxHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let weak = tx.downgrade();

        let completions = weak.clone();
        let deliver: CompletionFn = Arc::new(move |completion| {
            if let Some(tx) = completions.upgrade() {
                let _ = tx.send(Event::Completed(completion));
            }
        });

        let jukebox = Self {
            settings,
            tenants: HashMap::new(),
            next_generation: 0,
            resolver,
            notifier,
            events: weak,
            deliver,
        };

        let task = tokio::spawn(jukebox.run(rx));
        (JukeboxHandle { events: tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>) {
        info!("🎛️ Jukebox iniciado");

        while let Some(event) = rx.recv().await {
            match event {
                Event::Command(command) => self.handle_command(command).await,
                Event::Resolved {
                    tenant,
                    generation,
                    seq,
                    item,
                } => self.on_resolved(tenant, generation, seq, item).await,
                Event::Completed(completion) => self.on_completion(completion).await,
            }
            self.release_discarded();
        }

        let ids: Vec<_> = self.tenants.keys().copied().collect();
        for id in ids {
            self.destroy(id).await;
        }
        self.resolver.shutdown().await;
        info!("🎛️ Jukebox detenido");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Join {
                tenant,
                output,
                reply,
            } => {
                self.join(tenant, output).await;
                let _ = reply.send(());
            }
            Command::Enqueue {
                tenant,
                query,
                reply,
            } => self.enqueue(tenant, query, reply),
            Command::Pause { tenant, reply } => {
                let result = match self.active(tenant) {
                    Ok((state, output)) => state.driver.pause(output.as_ref()).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::Resume { tenant, reply } => {
                let result = match self.active(tenant) {
                    Ok((state, output)) => state.driver.resume(output.as_ref()).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::TogglePause { tenant, reply } => {
                let result = match self.active(tenant) {
                    Ok((state, output)) => state.driver.toggle_pause(output.as_ref()).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::Skip {
                tenant,
                direction,
                reply,
            } => {
                let result = match self.active(tenant) {
                    Ok((state, output)) => state.driver.skip(direction, output.as_ref()).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::Clear { tenant, reply } => {
                let result = self.with_tenant(tenant, |state| {
                    if state.driver.is_idle() {
                        let removed = state.queue.len();
                        state.queue.clear();
                        removed
                    } else {
                        state.queue.clear_upcoming()
                    }
                });
                let _ = reply.send(result);
            }
            Command::Shuffle { tenant, reply } => {
                let result = self.with_tenant(tenant, |state| state.queue.shuffle());
                let _ = reply.send(result);
            }
            Command::ToggleRepeatSong { tenant, reply } => {
                let result = self.with_tenant(tenant, |state| state.queue.toggle_repeat_song());
                let _ = reply.send(result);
            }
            Command::ToggleRepeatQueue { tenant, reply } => {
                let result = self.with_tenant(tenant, |state| state.queue.toggle_repeat_queue());
                let _ = reply.send(result);
            }
            Command::Snapshot { tenant, reply } => {
                let snapshot = self.snapshot(tenant).await;
                let _ = reply.send(snapshot);
            }
            Command::Tenants { reply } => {
                let mut ids: Vec<_> = self.tenants.keys().copied().collect();
                ids.sort();
                let _ = reply.send(ids);
            }
            Command::Destroy { tenant, reply } => {
                let existed = self.destroy(tenant).await;
                if let Some(reply) = reply {
                    let _ = reply.send(existed);
                }
            }
            Command::Participants { tenant, count } => {
                if count == 0 && self.tenants.contains_key(&tenant) {
                    info!("🚪 Nadie escuchando en tenant {}, desconectando", tenant);
                    self.destroy(tenant).await;
                } else {
                    debug!("👥 Tenant {} tiene {} oyentes", tenant, count);
                }
            }
        }
    }

    fn get_or_create(&mut self, id: TenantId) -> &mut Tenant {
        let max_queue_size = self.settings.max_queue_size;
        let next_generation = &mut self.next_generation;
        self.tenants.entry(id).or_insert_with(|| {
            *next_generation += 1;
            info!("🆕 Estado creado para tenant {}", id);
            Tenant::new(id, Generation(*next_generation), max_queue_size)
        })
    }

    async fn join(&mut self, id: TenantId, output: Arc<dyn AudioOutput>) {
        let tenant = self.get_or_create(id);
        match &tenant.output {
            Some(_) if !tenant.driver.is_idle() => {
                debug!("Tenant {} ya reproduce con otra salida, se conserva", id);
            }
            _ => {
                tenant.output = Some(output);
                info!("🔊 Salida de audio conectada para tenant {}", id);
            }
        }

        let Self {
            tenants,
            notifier,
            deliver,
            ..
        } = self;
        if let Some(tenant) = tenants.get_mut(&id) {
            tenant.kick(notifier.as_ref(), deliver).await;
        }
    }

    fn enqueue(&mut self, id: TenantId, query: String, reply: EnqueueReply) {
        let events = self.events.clone();
        let tenant = self.get_or_create(id);

        let pending = tenant.queue.len() + tenant.in_flight();
        if pending >= tenant.queue.max_size() {
            let _ = reply.send(Err(JukeboxError::QueueFull(tenant.queue.max_size())));
            return;
        }

        let generation = tenant.generation;
        let seq = tenant.reserve(reply);
        debug!(
            "📥 Solicitud {} para tenant {}: {} ({} en espera)",
            seq,
            id,
            query,
            self.resolver.backlog()
        );

        self.resolver.submit_with(
            PlayRequest { tenant: id, query },
            move |item| {
                if let Some(tx) = events.upgrade() {
                    let _ = tx.send(Event::Resolved {
                        tenant: id,
                        generation,
                        seq,
                        item,
                    });
                }
            },
        );
    }

    async fn on_resolved(
        &mut self,
        id: TenantId,
        generation: Generation,
        seq: u64,
        item: ResolvedItem,
    ) {
        let Self {
            tenants,
            notifier,
            deliver,
            resolver,
            ..
        } = self;

        let Some(tenant) = tenants.get_mut(&id).filter(|t| t.generation == generation) else {
            debug!(
                "Resultado '{}' descartado: el tenant {} ya no existe",
                item.title, id
            );
            if let Some(media) = &item.media {
                resolver.discard(media);
            }
            return;
        };

        if tenant.accept(seq, item) > 0 {
            tenant.kick(notifier.as_ref(), deliver).await;
        }
    }

    async fn on_completion(&mut self, completion: Completion) {
        let Self {
            tenants,
            notifier,
            deliver,
            ..
        } = self;

        let Some(tenant) = tenants.get_mut(&completion.tenant) else {
            debug!("Fin de pista descartado: el tenant {} ya no existe", completion.tenant);
            return;
        };
        let Some(output) = tenant.output.clone() else {
            return;
        };

        let deck = Deck {
            tenant: tenant.id,
            output: output.as_ref(),
            notifier: notifier.as_ref(),
            deliver,
        };
        tenant
            .driver
            .on_completion(completion.play, completion.error, &mut tenant.queue, &deck)
            .await;
    }

    /// Returns files of items that left their queue to the fetch backend.
    fn release_discarded(&mut self) {
        let Self {
            tenants, resolver, ..
        } = self;
        for tenant in tenants.values_mut() {
            for media in tenant.queue.take_discarded() {
                resolver.discard(&media);
            }
        }
    }

    /// Tenant with a connected output, for playback controls.
    fn active(&mut self, id: TenantId) -> Result<(&mut Tenant, Arc<dyn AudioOutput>)> {
        let tenant = self.tenants.get_mut(&id).ok_or(JukeboxError::TenantNotFound)?;
        let output = tenant.output.clone().ok_or(JukeboxError::NothingPlaying)?;
        Ok((tenant, output))
    }

    fn with_tenant<T>(&mut self, id: TenantId, f: impl FnOnce(&mut Tenant) -> T) -> Result<T> {
        self.tenants
            .get_mut(&id)
            .map(f)
            .ok_or(JukeboxError::TenantNotFound)
    }

    async fn snapshot(&self, id: TenantId) -> Option<QueueSnapshot> {
        let tenant = self.tenants.get(&id)?;
        let (output_playing, output_paused) = match &tenant.output {
            Some(output) => (output.is_playing().await, output.is_paused().await),
            None => (false, false),
        };

        Some(QueueSnapshot {
            tenant: id,
            state: tenant.driver.state(),
            items: tenant.queue.items().cloned().collect(),
            repeat_song: tenant.queue.repeat_song(),
            repeat_queue: tenant.queue.repeat_queue(),
            resolving: tenant.in_flight(),
            connected: tenant.output.is_some(),
            output_playing,
            output_paused,
        })
    }

    async fn destroy(&mut self, id: TenantId) -> bool {
        let Some(mut tenant) = self.tenants.remove(&id) else {
            return false;
        };

        let output = tenant.output.take();
        tenant
            .driver
            .destroy(&mut tenant.queue, output.as_deref())
            .await;
        if let Some(output) = output {
            output.disconnect().await;
        }
        for media in tenant.take_leftovers() {
            self.resolver.discard(&media);
        }

        info!("🧹 Estado eliminado para tenant {}", id);
        true
    }
}

#[cfg(test)]
mod tests;
