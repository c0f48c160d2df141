//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::{collections::HashMap, time::Duration};

use crate::{
    audio::{
        output::{AudioOutput, CompletionSink, OutputError, PlayId},
        queue::MediaHandle,
    },
    jukebox::{Notifier, TenantId},
    resolver::{FetchError, FetchedMedia, Fetcher},
};

#[derive(Default)]
struct OutputState {
    played: Vec<String>,
    sink: Option<CompletionSink>,
    playing: bool,
    paused: bool,
    stops: usize,
    disconnects: usize,
    deferred_stop: bool,
}

/// Output that records calls. Media paths starting with `missing` fail to
/// play; `stop` fires the sink like a real voice connection would.
#[derive(Default)]
pub struct FakeOutput {
    state: Mutex<OutputState>,
}

impl FakeOutput {
    /// Output whose `stop` leaves the end of track pending until
    /// [`FakeOutput::finish`] is called.
    pub fn with_deferred_stop() -> Self {
        Self {
            state: Mutex::new(OutputState {
                deferred_stop: true,
                ..OutputState::default()
            }),
        }
    }

    pub fn played(&self) -> Vec<String> {
        self.state.lock().played.clone()
    }

    pub fn stops(&self) -> usize {
        self.state.lock().stops
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().disconnects
    }

    pub fn current_play(&self) -> Option<PlayId> {
        self.state.lock().sink.as_ref().map(CompletionSink::play)
    }

    /// Ends the current track as if it reached its end.
    pub fn finish(&self) {
        let sink = {
            let mut state = self.state.lock();
            state.playing = false;
            state.paused = false;
            state.sink.take()
        };
        if let Some(sink) = sink {
            sink.complete(None);
        }
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    async fn play(&self, media: &MediaHandle, on_complete: CompletionSink) -> Result<(), OutputError> {
        if media.path().starts_with("missing") {
            return Err(OutputError::MissingMedia(media.path().to_path_buf()));
        }

        let mut state = self.state.lock();
        state.played.push(media.path().to_string_lossy().into_owned());
        state.sink = Some(on_complete);
        state.playing = true;
        state.paused = false;
        Ok(())
    }

    async fn pause(&self) -> Result<(), OutputError> {
        let mut state = self.state.lock();
        state.playing = false;
        state.paused = true;
        Ok(())
    }

    async fn resume(&self) -> Result<(), OutputError> {
        let mut state = self.state.lock();
        state.playing = true;
        state.paused = false;
        Ok(())
    }

    async fn stop(&self) -> Result<(), OutputError> {
        let deferred = {
            let mut state = self.state.lock();
            state.stops += 1;
            state.deferred_stop
        };
        if !deferred {
            self.finish();
        }
        Ok(())
    }

    async fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    async fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    async fn disconnect(&self) {
        self.state.lock().disconnects += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NowPlaying(String),
    QueueEmpty,
    Unplayable(String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(TenantId, Notice)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().iter().map(|(_, n)| n.clone()).collect()
    }

    pub fn notices_for(&self, tenant: TenantId) -> Vec<Notice> {
        self.notices
            .lock()
            .iter()
            .filter(|(t, _)| *t == tenant)
            .map(|(_, n)| n.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn now_playing(&self, tenant: TenantId, title: &str) {
        self.notices
            .lock()
            .push((tenant, Notice::NowPlaying(title.to_string())));
    }

    fn queue_empty(&self, tenant: TenantId) {
        self.notices.lock().push((tenant, Notice::QueueEmpty));
    }

    fn item_unplayable(&self, tenant: TenantId, title: &str) {
        self.notices
            .lock()
            .push((tenant, Notice::Unplayable(title.to_string())));
    }
}

/// Fetcher answering from a script. Unknown queries are unresolvable;
/// known ones resolve to `<query>.mp3` (or `missing/<query>.mp3`) after
/// their delay.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: HashMap<String, (Duration, String)>,
    discarded: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    /// Paths handed back through [`Fetcher::discard`], in order.
    pub fn discarded(&self) -> Vec<String> {
        self.discarded.lock().clone()
    }

    pub fn ok(self, query: &str) -> Self {
        self.ok_after(query, Duration::ZERO)
    }

    pub fn ok_after(mut self, query: &str, delay: Duration) -> Self {
        self.script
            .insert(query.to_string(), (delay, format!("{}.mp3", query)));
        self
    }

    /// Resolves, but to a file the output cannot play.
    pub fn broken(mut self, query: &str) -> Self {
        self.script
            .insert(query.to_string(), (Duration::ZERO, format!("missing/{}.mp3", query)));
        self
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn resolve(&self, query: &str) -> Result<FetchedMedia, FetchError> {
        let Some((delay, path)) = self.script.get(query) else {
            return Err(FetchError::Unresolvable(query.to_string()));
        };

        if !delay.is_zero() {
            tokio::time::sleep(*delay).await;
        }

        Ok(FetchedMedia {
            title: query.to_string(),
            media: MediaHandle::new(path.clone()),
        })
    }

    fn discard(&self, media: &MediaHandle) {
        self.discarded
            .lock()
            .push(media.path().to_string_lossy().into_owned());
    }
}
