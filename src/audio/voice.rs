use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::GuildId;
use songbird::{
    input::{File, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::audio::{
    output::{AudioOutput, CompletionSink, OutputError},
    queue::MediaHandle,
};

/// [`AudioOutput`] backed by a songbird voice call.
pub struct SongbirdOutput {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    current: SyncMutex<Option<TrackHandle>>,
}

impl SongbirdOutput {
    pub fn new(guild_id: GuildId, manager: Arc<Songbird>, call: Arc<Mutex<Call>>) -> Self {
        Self {
            guild_id,
            manager,
            call,
            current: SyncMutex::new(None),
        }
    }

    fn track(&self) -> Result<TrackHandle, OutputError> {
        self.current
            .lock()
            .clone()
            .ok_or_else(|| OutputError::Transport("no hay pista activa".to_string()))
    }

    async fn play_mode(&self) -> Option<PlayMode> {
        let track = self.current.lock().clone()?;
        track.get_info().await.ok().map(|state| state.playing)
    }
}

#[async_trait]
impl AudioOutput for SongbirdOutput {
    async fn play(&self, media: &MediaHandle, on_complete: CompletionSink) -> Result<(), OutputError> {
        if tokio::fs::metadata(media.path()).await.is_err() {
            return Err(OutputError::MissingMedia(media.path().to_path_buf()));
        }

        let input: Input = File::new(media.path().to_path_buf()).into();
        let track = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };

        track
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndNotifier {
                    sink: on_complete.clone(),
                },
            )
            .map_err(|e| OutputError::Transport(e.to_string()))?;
        track
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorNotifier {
                    sink: on_complete.clone(),
                },
            )
            .map_err(|e| OutputError::Transport(e.to_string()))?;

        debug!(
            "🔊 Pista {:?} iniciada en guild {}: {}",
            on_complete.play(),
            self.guild_id,
            media
        );
        *self.current.lock() = Some(track);
        Ok(())
    }

    async fn pause(&self) -> Result<(), OutputError> {
        self.track()?
            .pause()
            .map_err(|e| OutputError::Transport(e.to_string()))
    }

    async fn resume(&self) -> Result<(), OutputError> {
        self.track()?
            .play()
            .map_err(|e| OutputError::Transport(e.to_string()))
    }

    async fn stop(&self) -> Result<(), OutputError> {
        let track = self.track()?;
        if let Err(e) = track.stop() {
            // Ya terminó: su evento de fin está en camino.
            debug!("La pista ya había terminado en guild {}: {}", self.guild_id, e);
        }
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Play))
    }

    async fn is_paused(&self) -> bool {
        matches!(self.play_mode().await, Some(PlayMode::Pause))
    }

    async fn disconnect(&self) {
        self.current.lock().take();
        match self.manager.remove(self.guild_id).await {
            Ok(()) => info!("👋 Desconectado del canal de voz en guild {}", self.guild_id),
            Err(e) => debug!("Sin conexión de voz que cerrar en guild {}: {:?}", self.guild_id, e),
        }
    }
}

/// Forwards the natural or forced end of a track.
struct TrackEndNotifier {
    sink: CompletionSink,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.sink.complete(None);
        None
    }
}

/// Forwards playback errors reported by the driver.
struct TrackErrorNotifier {
    sink: CompletionSink,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let reason = match ctx {
            EventContext::Track(tracks) => tracks
                .first()
                .map(|(state, _)| format!("{:?}", state.playing))
                .unwrap_or_else(|| "error desconocido".to_string()),
            _ => "error desconocido".to_string(),
        };

        warn!("❌ Error en pista: {}", reason);
        self.sink.complete(Some(reason));
        None
    }
}
