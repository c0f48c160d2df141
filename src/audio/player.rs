use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        output::{AudioOutput, CompletionFn, CompletionSink, PlayId},
        queue::{SkipDirection, TenantQueue},
    },
    error::{JukeboxError, Result},
    jukebox::{Notifier, TenantId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Collaborators the driver talks to while it works on one tenant.
pub struct Deck<'a> {
    pub tenant: TenantId,
    pub output: &'a dyn AudioOutput,
    pub notifier: &'a dyn Notifier,
    pub deliver: &'a CompletionFn,
}

/// Per-tenant playback state machine.
///
/// Only completion events move the queue forward: a skip stores its
/// direction and stops the output, and the resulting completion runs the
/// same transition as a natural end of track. Until that completion arrives
/// further skips are rejected.
#[derive(Debug)]
pub struct PlaybackDriver {
    state: PlaybackState,
    skip_direction: SkipDirection,
    current: Option<PlayId>,
    /// Play a skip has stopped and whose completion is still in flight.
    stopping: Option<PlayId>,
}

impl Default for PlaybackDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackDriver {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            skip_direction: SkipDirection::Next,
            current: None,
            stopping: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == PlaybackState::Idle
    }

    #[cfg(test)]
    pub fn skip_direction(&self) -> SkipDirection {
        self.skip_direction
    }

    /// Starts the head of the queue if nothing is playing.
    pub async fn start(&mut self, queue: &mut TenantQueue, deck: &Deck<'_>) {
        if !self.is_idle() {
            return;
        }

        let dropped = self.play_head(queue, deck).await;
        if dropped && self.is_idle() {
            deck.notifier.queue_empty(deck.tenant);
        }
    }

    /// Handles the end of a play. Returns `false` for stale events.
    pub async fn on_completion(
        &mut self,
        play: PlayId,
        error: Option<String>,
        queue: &mut TenantQueue,
        deck: &Deck<'_>,
    ) -> bool {
        if self.current != Some(play) {
            debug!(
                "Evento de fin obsoleto ignorado en tenant {} ({:?})",
                deck.tenant, play
            );
            return false;
        }

        self.current = None;
        self.stopping = None;
        self.state = PlaybackState::Idle;
        let direction = std::mem::take(&mut self.skip_direction);

        match error {
            Some(error) => {
                error!("❌ Error de reproducción en tenant {}: {}", deck.tenant, error);
                if let Some(item) = queue.remove_head() {
                    deck.notifier.item_unplayable(deck.tenant, &item.title);
                }
            }
            None => queue.advance(direction),
        }

        self.play_head(queue, deck).await;
        if self.is_idle() {
            info!("📭 Cola vacía en tenant {}", deck.tenant);
            deck.notifier.queue_empty(deck.tenant);
        }

        true
    }

    pub async fn pause(&mut self, output: &dyn AudioOutput) -> Result<()> {
        match self.state {
            PlaybackState::Idle => Err(JukeboxError::NothingPlaying),
            PlaybackState::Paused => Err(JukeboxError::AlreadyPaused),
            PlaybackState::Playing => {
                output
                    .pause()
                    .await
                    .map_err(|e| JukeboxError::Output(e.to_string()))?;
                self.state = PlaybackState::Paused;
                info!("⏸️ Reproducción pausada");
                Ok(())
            }
        }
    }

    pub async fn resume(&mut self, output: &dyn AudioOutput) -> Result<()> {
        match self.state {
            PlaybackState::Idle => Err(JukeboxError::NothingPlaying),
            PlaybackState::Playing => Err(JukeboxError::NotPaused),
            PlaybackState::Paused => {
                output
                    .resume()
                    .await
                    .map_err(|e| JukeboxError::Output(e.to_string()))?;
                self.state = PlaybackState::Playing;
                info!("▶️ Reproducción reanudada");
                Ok(())
            }
        }
    }

    /// Pauses when playing and resumes when paused.
    pub async fn toggle_pause(&mut self, output: &dyn AudioOutput) -> Result<PlaybackState> {
        match self.state {
            PlaybackState::Playing => self.pause(output).await?,
            PlaybackState::Paused => self.resume(output).await?,
            PlaybackState::Idle => return Err(JukeboxError::NothingPlaying),
        }
        Ok(self.state)
    }

    pub async fn skip(&mut self, direction: SkipDirection, output: &dyn AudioOutput) -> Result<()> {
        if self.is_idle() {
            return Err(JukeboxError::NothingPlaying);
        }
        if self.stopping.is_some() {
            return Err(JukeboxError::SkipPending);
        }

        self.skip_direction = direction;
        self.stopping = self.current;
        if let Err(e) = output.stop().await {
            self.skip_direction = SkipDirection::Next;
            self.stopping = None;
            return Err(JukeboxError::Output(e.to_string()));
        }

        info!("⏭️ Salto solicitado ({:?})", direction);
        Ok(())
    }

    /// Stops the output if needed and returns to `Idle` with an empty queue.
    pub async fn destroy(&mut self, queue: &mut TenantQueue, output: Option<&dyn AudioOutput>) {
        if !self.is_idle() {
            if let Some(output) = output {
                if let Err(e) = output.stop().await {
                    warn!("Error al detener la salida: {}", e);
                }
            }
        }

        self.current = None;
        self.stopping = None;
        self.state = PlaybackState::Idle;
        self.skip_direction = SkipDirection::Next;
        queue.clear();
    }

    /// Plays the head, dropping unplayable items on the way.
    ///
    /// Returns whether any item was dropped.
    async fn play_head(&mut self, queue: &mut TenantQueue, deck: &Deck<'_>) -> bool {
        let mut dropped = false;

        while let Some(item) = queue.peek_head().cloned() {
            let Some(media) = item.media.as_ref() else {
                warn!("⚠️ '{}' no tiene archivo reproducible, saltando", item.title);
                deck.notifier.item_unplayable(deck.tenant, &item.title);
                queue.remove_head();
                dropped = true;
                continue;
            };

            let play = PlayId::next();
            let sink = CompletionSink::new(deck.tenant, play, deck.deliver.clone());
            match deck.output.play(media, sink).await {
                Ok(()) => {
                    self.current = Some(play);
                    self.state = PlaybackState::Playing;
                    info!("🎵 Reproduciendo: {}", item.title);
                    deck.notifier.now_playing(deck.tenant, &item.title);
                    return dropped;
                }
                Err(e) => {
                    warn!("⚠️ No se pudo reproducir '{}': {}", item.title, e);
                    deck.notifier.item_unplayable(deck.tenant, &item.title);
                    queue.remove_head();
                    dropped = true;
                }
            }
        }

        self.state = PlaybackState::Idle;
        dropped
    }
}
