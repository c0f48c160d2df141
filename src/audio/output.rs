use async_trait::async_trait;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};
use thiserror::Error;

use crate::{audio::queue::MediaHandle, jukebox::TenantId};

/// Identifies one `play` invocation on an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayId(u64);

impl PlayId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("El archivo de audio no existe: {}", .0.display())]
    MissingMedia(PathBuf),

    #[error("Error del transporte de voz: {0}")]
    Transport(String),
}

/// Report that one playback finished, naturally or because it was stopped.
#[derive(Debug, Clone)]
pub struct Completion {
    pub tenant: TenantId,
    pub play: PlayId,
    pub error: Option<String>,
}

pub type CompletionFn = Arc<dyn Fn(Completion) + Send + Sync>;

/// Callback handed to [`AudioOutput::play`].
///
/// Fires at most once per play; later calls are ignored so outputs may wire
/// it to several end-of-track signals.
#[derive(Clone)]
pub struct CompletionSink {
    tenant: TenantId,
    play: PlayId,
    fired: Arc<AtomicBool>,
    deliver: CompletionFn,
}

impl CompletionSink {
    pub fn new(tenant: TenantId, play: PlayId, deliver: CompletionFn) -> Self {
        Self {
            tenant,
            play,
            fired: Arc::new(AtomicBool::new(false)),
            deliver,
        }
    }

    pub fn play(&self) -> PlayId {
        self.play
    }

    pub fn complete(&self, error: Option<String>) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }

        (self.deliver)(Completion {
            tenant: self.tenant,
            play: self.play,
            error,
        });
    }
}

impl std::fmt::Debug for CompletionSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSink")
            .field("tenant", &self.tenant)
            .field("play", &self.play)
            .finish()
    }
}

/// Audio output connection of one tenant (a voice call).
///
/// `stop` must make the sink of the current play fire without error; the
/// jukebox relies on it to advance the queue after a skip.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    async fn play(&self, media: &MediaHandle, on_complete: CompletionSink)
        -> Result<(), OutputError>;

    async fn pause(&self) -> Result<(), OutputError>;

    async fn resume(&self) -> Result<(), OutputError>;

    async fn stop(&self) -> Result<(), OutputError>;

    async fn is_playing(&self) -> bool;

    async fn is_paused(&self) -> bool;

    /// Releases the underlying connection.
    async fn disconnect(&self);
}
