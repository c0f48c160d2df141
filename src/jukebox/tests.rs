use super::*;
use crate::testing::{FakeOutput, Notice, RecordingNotifier, ScriptedFetcher};
use pretty_assertions::assert_eq;
use std::time::Duration;

const ROOM: TenantId = TenantId::new(1);
const OTHER_ROOM: TenantId = TenantId::new(2);

struct Rig {
    jukebox: JukeboxHandle,
    notifier: Arc<RecordingNotifier>,
    fetcher: Arc<ScriptedFetcher>,
}

impl Rig {
    fn start(fetcher: ScriptedFetcher, workers: usize) -> Self {
        let notifier = Arc::new(RecordingNotifier::default());
        let fetcher = Arc::new(fetcher);
        let pool = ResolverPool::new(workers, fetcher.clone(), Duration::from_secs(30));
        let (jukebox, _task) = Jukebox::spawn(
            JukeboxSettings { max_queue_size: 10 },
            pool,
            notifier.clone(),
        );
        Self {
            jukebox,
            notifier,
            fetcher,
        }
    }

    async fn connect(&self, tenant: TenantId) -> Arc<FakeOutput> {
        self.connect_with(tenant, FakeOutput::default()).await
    }

    async fn connect_with(&self, tenant: TenantId, output: FakeOutput) -> Arc<FakeOutput> {
        let output = Arc::new(output);
        self.jukebox.join(tenant, output.clone()).await.unwrap();
        output
    }

    async fn titles(&self, tenant: TenantId) -> Vec<String> {
        self.snapshot(tenant).await.titles()
    }

    async fn snapshot(&self, tenant: TenantId) -> QueueSnapshot {
        self.jukebox.queue(tenant).await.unwrap().expect("tenant exists")
    }

    /// Ends the current track and waits until the jukebox processed it.
    async fn finish_track(&self, output: &FakeOutput, tenant: TenantId) {
        output.finish();
        self.jukebox.queue(tenant).await.unwrap();
    }
}

fn abc() -> ScriptedFetcher {
    ScriptedFetcher::default().ok("A").ok("B").ok("C")
}

async fn enqueue_all(rig: &Rig, tenant: TenantId, queries: &[&str]) {
    for query in queries {
        let item = rig.jukebox.enqueue(tenant, *query).await.unwrap();
        assert!(item.is_playable(), "{} should resolve", query);
    }
}

#[tokio::test]
async fn first_resolved_item_plays_automatically_once() {
    let rig = Rig::start(abc(), 2);
    let output = rig.connect(ROOM).await;

    enqueue_all(&rig, ROOM, &["A", "B", "C"]).await;

    assert_eq!(output.played(), vec!["A.mp3"]);
    assert_eq!(rig.notifier.notices(), vec![Notice::NowPlaying("A".into())]);

    let snapshot = rig.snapshot(ROOM).await;
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.now_playing().map(|i| i.title.as_str()), Some("A"));
    assert!(snapshot.output_playing);
}

#[tokio::test]
async fn items_wait_for_an_output_before_playing() {
    let rig = Rig::start(abc(), 1);

    enqueue_all(&rig, ROOM, &["A", "B"]).await;
    assert_eq!(rig.snapshot(ROOM).await.state, PlaybackState::Idle);

    let output = rig.connect(ROOM).await;
    assert_eq!(output.played(), vec!["A.mp3"]);
}

#[tokio::test]
async fn natural_end_removes_head_and_plays_next() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B", "C"]).await;

    rig.finish_track(&output, ROOM).await;

    assert_eq!(rig.titles(ROOM).await, vec!["B", "C"]);
    assert_eq!(output.played(), vec!["A.mp3", "B.mp3"]);
}

#[tokio::test]
async fn repeat_queue_rotates_finished_item_to_tail() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B", "C"]).await;
    assert!(rig.jukebox.toggle_repeat_queue(ROOM).await.unwrap());

    rig.finish_track(&output, ROOM).await;

    assert_eq!(rig.titles(ROOM).await, vec!["B", "C", "A"]);
    assert_eq!(output.played(), vec!["A.mp3", "B.mp3"]);
}

#[tokio::test]
async fn repeat_song_replays_the_same_item() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B"]).await;
    assert!(rig.jukebox.toggle_repeat_song(ROOM).await.unwrap());
    rig.jukebox.toggle_repeat_queue(ROOM).await.unwrap();

    for _ in 0..3 {
        rig.finish_track(&output, ROOM).await;
        assert_eq!(rig.titles(ROOM).await, vec!["A", "B"]);
    }
    rig.jukebox.skip(ROOM, SkipDirection::Back).await.unwrap();
    assert_eq!(rig.titles(ROOM).await, vec!["A", "B"]);

    assert_eq!(output.played(), vec!["A.mp3"; 5]);
}

#[tokio::test]
async fn skip_next_advances_through_completion() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B", "C"]).await;

    rig.jukebox.skip(ROOM, SkipDirection::Next).await.unwrap();

    assert_eq!(rig.titles(ROOM).await, vec!["B", "C"]);
    assert_eq!(output.stops(), 1);
    assert_eq!(output.played(), vec!["A.mp3", "B.mp3"]);
}

#[tokio::test]
async fn skip_from_paused_moves_on_and_plays() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B"]).await;
    assert_eq!(rig.jukebox.toggle_pause(ROOM).await, Ok(PlaybackState::Paused));

    rig.jukebox.skip(ROOM, SkipDirection::Next).await.unwrap();

    let snapshot = rig.snapshot(ROOM).await;
    assert_eq!(snapshot.titles(), vec!["B"]);
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(output.played(), vec!["A.mp3", "B.mp3"]);
}

#[tokio::test]
async fn second_skip_is_rejected_until_the_first_completes() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect_with(ROOM, FakeOutput::with_deferred_stop()).await;
    enqueue_all(&rig, ROOM, &["A", "B", "C"]).await;

    rig.jukebox.skip(ROOM, SkipDirection::Next).await.unwrap();
    assert_eq!(
        rig.jukebox.skip(ROOM, SkipDirection::Back).await,
        Err(JukeboxError::SkipPending)
    );
    assert_eq!(rig.titles(ROOM).await, vec!["A", "B", "C"]);

    // Only the first direction is applied when the stop lands.
    rig.finish_track(&output, ROOM).await;
    assert_eq!(rig.titles(ROOM).await, vec!["B", "C"]);
    assert_eq!(output.played(), vec!["A.mp3", "B.mp3"]);

    rig.jukebox.skip(ROOM, SkipDirection::Next).await.unwrap();
    assert_eq!(output.stops(), 2);
}

#[tokio::test]
async fn skip_back_follows_the_transition_table() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B", "C"]).await;

    rig.jukebox.skip(ROOM, SkipDirection::Back).await.unwrap();
    assert_eq!(rig.titles(ROOM).await, vec!["C", "B"]);
    assert_eq!(output.played(), vec!["A.mp3", "C.mp3"]);

    // The direction was consumed: a natural end goes forward again.
    rig.finish_track(&output, ROOM).await;
    assert_eq!(rig.titles(ROOM).await, vec!["B"]);
}

#[tokio::test]
async fn skip_back_with_repeat_queue_restores_previous_item() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B", "C"]).await;
    rig.jukebox.toggle_repeat_queue(ROOM).await.unwrap();

    rig.jukebox.skip(ROOM, SkipDirection::Back).await.unwrap();

    assert_eq!(rig.titles(ROOM).await, vec!["C", "A", "B"]);
    assert_eq!(output.played(), vec!["A.mp3", "C.mp3"]);
}

#[tokio::test]
async fn last_item_ending_notifies_queue_empty() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A"]).await;

    rig.finish_track(&output, ROOM).await;

    let snapshot = rig.snapshot(ROOM).await;
    assert_eq!(snapshot.state, PlaybackState::Idle);
    assert!(snapshot.items.is_empty());
    assert_eq!(
        rig.notifier.notices(),
        vec![Notice::NowPlaying("A".into()), Notice::QueueEmpty]
    );
}

#[tokio::test]
async fn controls_without_playback_are_rejected() {
    let rig = Rig::start(abc(), 1);

    assert_eq!(
        rig.jukebox.skip(ROOM, SkipDirection::Next).await,
        Err(JukeboxError::TenantNotFound)
    );
    assert_eq!(rig.jukebox.shuffle(ROOM).await, Err(JukeboxError::TenantNotFound));
    assert!(rig.jukebox.queue(ROOM).await.unwrap().is_none());

    let _output = rig.connect(ROOM).await;
    assert_eq!(rig.jukebox.pause(ROOM).await, Err(JukeboxError::NothingPlaying));
    assert_eq!(
        rig.jukebox.skip(ROOM, SkipDirection::Next).await,
        Err(JukeboxError::NothingPlaying)
    );
    assert_eq!(rig.jukebox.resume(ROOM).await, Err(JukeboxError::NothingPlaying));
}

#[tokio::test]
async fn pause_and_resume_drive_the_output() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A"]).await;

    assert_eq!(rig.jukebox.toggle_pause(ROOM).await, Ok(PlaybackState::Paused));
    let snapshot = rig.snapshot(ROOM).await;
    assert_eq!(snapshot.state, PlaybackState::Paused);
    assert!(snapshot.output_paused);

    assert_eq!(rig.jukebox.pause(ROOM).await, Err(JukeboxError::AlreadyPaused));
    rig.jukebox.resume(ROOM).await.unwrap();
    assert!(output.is_playing().await);
}

#[tokio::test]
async fn resolution_failure_is_skipped_and_next_item_plays() {
    let rig = Rig::start(ScriptedFetcher::default().ok("B"), 1);
    let output = rig.connect(ROOM).await;

    let failed = rig.jukebox.enqueue(ROOM, "inexistente").await.unwrap();
    assert!(failed.media.is_none());
    let valid = rig.jukebox.enqueue(ROOM, "B").await.unwrap();
    assert!(valid.is_playable());

    assert_eq!(rig.titles(ROOM).await, vec!["B"]);
    assert_eq!(output.played(), vec!["B.mp3"]);
}

#[tokio::test]
async fn unplayable_media_advances_automatically() {
    let rig = Rig::start(ScriptedFetcher::default().broken("roto").ok("B"), 1);
    let output = rig.connect(ROOM).await;

    enqueue_all(&rig, ROOM, &["roto", "B"]).await;

    assert_eq!(rig.titles(ROOM).await, vec!["B"]);
    assert_eq!(output.played(), vec!["B.mp3"]);
    assert_eq!(
        rig.notifier.notices(),
        vec![
            Notice::Unplayable("roto".into()),
            Notice::QueueEmpty,
            Notice::NowPlaying("B".into()),
        ]
    );
}

#[tokio::test]
async fn per_tenant_order_survives_out_of_order_resolution() {
    let fetcher = ScriptedFetcher::default()
        .ok_after("lento", Duration::from_millis(200))
        .ok_after("medio", Duration::from_millis(100))
        .ok_after("rápido", Duration::from_millis(5));
    let rig = Rig::start(fetcher, 3);
    let output = rig.connect(ROOM).await;

    let pending: Vec<_> = ["lento", "medio", "rápido"]
        .into_iter()
        .map(|query| rig.jukebox.submit(ROOM, query).unwrap())
        .collect();
    for item in futures::future::join_all(pending).await {
        assert!(item.unwrap().is_playable());
    }

    assert_eq!(rig.titles(ROOM).await, vec!["lento", "medio", "rápido"]);
    assert_eq!(output.played(), vec!["lento.mp3"]);
}

#[tokio::test]
async fn destroy_mid_playback_stops_exactly_once() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B"]).await;

    assert!(rig.jukebox.destroy(ROOM).await.unwrap());
    assert!(!rig.jukebox.destroy(ROOM).await.unwrap());

    assert_eq!(output.stops(), 1);
    assert_eq!(output.disconnects(), 1);
    assert!(rig.jukebox.queue(ROOM).await.unwrap().is_none());

    // The stop's completion event was dropped and nothing else played.
    assert_eq!(output.played(), vec!["A.mp3"]);
    assert!(rig.jukebox.tenants().await.unwrap().is_empty());
}

#[tokio::test]
async fn late_results_for_destroyed_tenant_are_discarded() {
    let fetcher = ScriptedFetcher::default()
        .ok("A")
        .ok_after("tarde", Duration::from_millis(100));
    let rig = Rig::start(fetcher, 1);
    let _output = rig.connect(ROOM).await;

    let late = rig.jukebox.submit(ROOM, "tarde").unwrap();
    rig.jukebox.destroy(ROOM).await.unwrap();
    assert_eq!(late.await.unwrap_err(), JukeboxError::Cancelled);

    // A fresh tenant with the same id does not receive the old result.
    let output = rig.connect(ROOM).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(rig.titles(ROOM).await.is_empty());

    enqueue_all(&rig, ROOM, &["A"]).await;
    assert_eq!(output.played(), vec!["A.mp3"]);
}

#[tokio::test]
async fn late_completion_for_recreated_tenant_is_ignored() {
    let rig = Rig::start(abc(), 1);
    let old = rig.connect_with(ROOM, FakeOutput::with_deferred_stop()).await;
    enqueue_all(&rig, ROOM, &["A"]).await;
    rig.jukebox.destroy(ROOM).await.unwrap();
    assert_eq!(old.stops(), 1);

    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["B", "C"]).await;

    // The old track only now reports its end.
    old.finish();
    let snapshot = rig.snapshot(ROOM).await;
    assert_eq!(snapshot.titles(), vec!["B", "C"]);
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(output.played(), vec!["B.mp3"]);
    assert!(!rig.notifier.notices().contains(&Notice::QueueEmpty));
}

#[tokio::test]
async fn join_while_playing_keeps_the_current_output() {
    let rig = Rig::start(abc(), 1);
    let first = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B"]).await;

    let second = rig.connect(ROOM).await;
    rig.finish_track(&first, ROOM).await;

    assert_eq!(first.played(), vec!["A.mp3", "B.mp3"]);
    assert!(second.played().is_empty());
    assert_eq!(rig.titles(ROOM).await, vec!["B"]);
}

#[tokio::test]
async fn files_are_discarded_once_items_leave_for_good() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B", "C"]).await;

    rig.finish_track(&output, ROOM).await;
    assert_eq!(rig.fetcher.discarded(), vec!["A.mp3"]);

    rig.jukebox.toggle_repeat_queue(ROOM).await.unwrap();
    rig.finish_track(&output, ROOM).await;
    assert_eq!(rig.titles(ROOM).await, vec!["C", "B"]);
    assert_eq!(rig.fetcher.discarded(), vec!["A.mp3"]);

    rig.jukebox.destroy(ROOM).await.unwrap();
    let mut discarded = rig.fetcher.discarded();
    discarded.sort();
    assert_eq!(discarded, vec!["A.mp3", "B.mp3", "C.mp3"]);
}

#[tokio::test]
async fn unplayable_and_late_files_are_discarded() {
    let fetcher = ScriptedFetcher::default()
        .broken("roto")
        .ok_after("tarde", Duration::from_millis(50));
    let rig = Rig::start(fetcher, 1);
    let _output = rig.connect(ROOM).await;

    enqueue_all(&rig, ROOM, &["roto"]).await;
    assert!(rig.titles(ROOM).await.is_empty());
    assert_eq!(rig.fetcher.discarded(), vec!["missing/roto.mp3"]);

    let late = rig.jukebox.submit(ROOM, "tarde").unwrap();
    rig.jukebox.destroy(ROOM).await.unwrap();
    assert!(late.await.is_err());
    tokio::time::sleep(Duration::from_millis(100)).await;
    rig.jukebox.tenants().await.unwrap();

    assert_eq!(rig.fetcher.discarded(), vec!["missing/roto.mp3", "tarde.mp3"]);
}

#[tokio::test]
async fn zero_participants_destroys_the_tenant() {
    let rig = Rig::start(abc(), 1);
    let output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A"]).await;

    rig.jukebox.participants_changed(ROOM, 2);
    assert!(rig.jukebox.queue(ROOM).await.unwrap().is_some());

    rig.jukebox.participants_changed(ROOM, 0);
    assert!(rig.jukebox.queue(ROOM).await.unwrap().is_none());
    assert_eq!(output.stops(), 1);

    rig.jukebox.connection_lost(ROOM);
    assert!(rig.jukebox.tenants().await.unwrap().is_empty());
}

#[tokio::test]
async fn tenants_are_isolated() {
    let rig = Rig::start(abc(), 2);
    let first = rig.connect(ROOM).await;
    let second = rig.connect(OTHER_ROOM).await;

    enqueue_all(&rig, ROOM, &["A", "B"]).await;
    enqueue_all(&rig, OTHER_ROOM, &["C"]).await;

    rig.jukebox.destroy(ROOM).await.unwrap();

    assert_eq!(rig.titles(OTHER_ROOM).await, vec!["C"]);
    assert_eq!(second.played(), vec!["C.mp3"]);
    assert_eq!(second.stops(), 0);
    assert_eq!(first.stops(), 1);
    assert_eq!(rig.notifier.notices_for(OTHER_ROOM), vec![Notice::NowPlaying("C".into())]);
}

#[tokio::test]
async fn clear_keeps_the_playing_item() {
    let rig = Rig::start(abc(), 1);
    let _output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B", "C"]).await;

    assert_eq!(rig.jukebox.clear(ROOM).await, Ok(2));
    assert_eq!(rig.titles(ROOM).await, vec!["A"]);
}

#[tokio::test]
async fn shuffle_never_moves_the_playing_item() {
    let fetcher = ScriptedFetcher::default()
        .ok("A")
        .ok("B")
        .ok("C")
        .ok("D")
        .ok("E");
    let rig = Rig::start(fetcher, 1);
    let _output = rig.connect(ROOM).await;
    enqueue_all(&rig, ROOM, &["A", "B", "C", "D", "E"]).await;

    for _ in 0..10 {
        rig.jukebox.shuffle(ROOM).await.unwrap();
        let titles = rig.titles(ROOM).await;
        assert_eq!(titles[0], "A");
        let mut rest = titles[1..].to_vec();
        rest.sort();
        assert_eq!(rest, vec!["B", "C", "D", "E"]);
    }
}

#[tokio::test]
async fn queue_capacity_counts_requests_in_flight() {
    let mut fetcher = ScriptedFetcher::default();
    for i in 0..11 {
        fetcher = fetcher.ok(&format!("t{}", i));
    }
    let rig = Rig::start(fetcher, 1);

    let pending: Vec<_> = (0..10)
        .map(|i| rig.jukebox.submit(ROOM, format!("t{}", i)).unwrap())
        .collect();
    let overflow = rig.jukebox.enqueue(ROOM, "t10").await;
    assert_eq!(overflow.unwrap_err(), JukeboxError::QueueFull(10));

    for item in futures::future::join_all(pending).await {
        assert!(item.is_ok());
    }
}
