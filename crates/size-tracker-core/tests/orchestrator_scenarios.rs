//! End-to-end runs of the orchestrator against the in-memory store and fake
//! build/commit collaborators.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use size_tracker_core::{
    cancellation, ArtifactBuilder, Cancellation, CommitClock, LogGroups, MemoryRecordStore,
    Orchestrator, Outcome, RecordStore, SizeRecord, StoreError, TrackerConfig, TrackerError, TriggerEvent,
};

// ── Fakes ──────────────────────────────────────────────────────────────────

struct FixedBuild {
    size: u64,
    calls: AtomicU32,
}

impl FixedBuild {
    fn new(size: u64) -> Arc<Self> {
        Arc::new(Self {
            size,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactBuilder for FixedBuild {
    async fn build_and_measure(&self) -> size_tracker_core::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.size)
    }
}

/// A build that never finishes.
struct HangingBuild;

#[async_trait]
impl ArtifactBuilder for HangingBuild {
    async fn build_and_measure(&self) -> size_tracker_core::Result<u64> {
        std::future::pending::<()>().await;
        Ok(0)
    }
}

struct FixedClock(&'static str);

#[async_trait]
impl CommitClock for FixedClock {
    async fn commit_time(&self, _commit: &str) -> size_tracker_core::Result<String> {
        Ok(self.0.to_string())
    }
}

/// Captures log group markers.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

const EARLIER: &str = "1690000000";
const LATER: &str = "1700000000";

fn config(dir: &Path) -> TrackerConfig {
    TrackerConfig {
        repo_dir: dir.to_path_buf(),
        ..TrackerConfig::default()
    }
}

fn orchestrator(
    dir: &Path,
    store: &Arc<MemoryRecordStore>,
    build: Arc<dyn ArtifactBuilder>,
    commit_time: &'static str,
) -> Orchestrator {
    Orchestrator::new(
        config(dir),
        store.clone(),
        build,
        Arc::new(FixedClock(commit_time)),
    )
}

fn push_to(branch: &str) -> TriggerEvent {
    TriggerEvent::new("push", "branch", format!("refs/heads/{branch}")).with_default_branch("main")
}

fn pull_request() -> TriggerEvent {
    TriggerEvent::new("pull_request", "branch", "refs/pull/12/merge").with_default_branch("main")
}

fn remote_record(store: &MemoryRecordStore, commit: &str) -> SizeRecord {
    let remote = store.remote_snapshot().expect("remote has records");
    SizeRecord::decode(remote.get(commit).expect("record for commit")).expect("decodable")
}

fn seed_baseline(store: &MemoryRecordStore, commit: &str, size: u64, time: &str) {
    let record = size_tracker_core::build_record(commit, size, time).unwrap();
    store.seed_remote(commit, &record.encode().unwrap());
}

// ── Record path ────────────────────────────────────────────────────────────

#[tokio::test]
async fn push_to_default_branch_records_first_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    let build = FixedBuild::new(1_048_576);

    let outcome = orchestrator(dir.path(), &store, build.clone(), EARLIER)
        .run(&push_to("main"), "abc123")
        .await
        .expect("run");

    match outcome {
        Outcome::Recorded {
            record,
            first_baseline,
        } => {
            assert!(first_baseline);
            assert_eq!(record.commit, "abc123");
            assert_eq!(record.size, 1_048_576);
        }
        other => panic!("expected a recorded outcome, got {other:?}"),
    }
    assert_eq!(remote_record(&store, "abc123").size, 1_048_576);
    assert_eq!(store.publish_count(), 1);
    assert!(!dir.path().join("graph.svg").exists(), "no comparison on record path");
}

#[tokio::test]
async fn push_to_default_branch_appends_to_existing_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    seed_baseline(&store, "old111", 1_000, EARLIER);

    let outcome = orchestrator(dir.path(), &store, FixedBuild::new(2_000), LATER)
        .run(&push_to("main"), "new222")
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        Outcome::Recorded {
            first_baseline: false,
            ..
        }
    ));
    let remote = store.remote_snapshot().unwrap();
    assert_eq!(remote.len(), 2);
    assert_eq!(remote_record(&store, "old111").size, 1_000);
    assert_eq!(remote_record(&store, "new222").size, 2_000);
}

#[tokio::test]
async fn recording_same_commit_twice_keeps_last_write() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    for size in [100, 200] {
        orchestrator(dir.path(), &store, FixedBuild::new(size), EARLIER)
            .run(&push_to("main"), "abc123")
            .await
            .unwrap();
    }

    let remote = store.remote_snapshot().unwrap();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote_record(&store, "abc123").size, 200);
}

#[tokio::test]
async fn oversized_artifact_is_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    let err = orchestrator(
        dir.path(),
        &store,
        FixedBuild::new(u64::from(u32::MAX) + 1),
        EARLIER,
    )
    .run(&push_to("main"), "abc123")
    .await
    .unwrap_err();

    assert!(matches!(err, TrackerError::Record(_)));
    assert!(store.remote_snapshot().is_none());
    assert_eq!(store.publish_count(), 0);
}

#[tokio::test]
async fn rejected_publish_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    store.reject_next_publishes(1);

    let err = orchestrator(dir.path(), &store, FixedBuild::new(10), EARLIER)
        .run(&push_to("main"), "abc123")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TrackerError::Store(StoreError::PushRejected { .. })
    ));
    assert!(store.remote_snapshot().is_none());
}

// ── Compare path ───────────────────────────────────────────────────────────

#[tokio::test]
async fn pull_request_compares_against_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    seed_baseline(&store, "abc123", 1_048_576, EARLIER);

    let outcome = orchestrator(dir.path(), &store, FixedBuild::new(2_097_152), LATER)
        .run(&pull_request(), "def456")
        .await
        .unwrap();

    let Outcome::Compared { report, chart } = outcome else {
        panic!("expected a comparison");
    };
    assert!(report.has_baseline());
    assert_eq!(report.series.len(), 2);
    assert_eq!(report.previous.as_ref().unwrap().commit, "abc123");
    assert_eq!(report.delta_bytes(), Some(1_048_576));

    let headline = report.headline();
    assert_eq!(headline[0], "Binary size: 2 MiB (2097152 bytes)");
    assert_eq!(headline[1], "Previous binary size: 1 MiB (1048576 bytes)");

    assert_eq!(chart, dir.path().join("graph.svg"));
    assert!(chart.exists());

    // Compare runs never write.
    assert_eq!(store.publish_count(), 0);
    assert_eq!(store.remote_snapshot().unwrap().len(), 1);
}

#[tokio::test]
async fn push_to_other_branch_compares() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    seed_baseline(&store, "abc123", 500, EARLIER);

    let outcome = orchestrator(dir.path(), &store, FixedBuild::new(600), LATER)
        .run(&push_to("feature"), "def456")
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Compared { .. }));
    assert_eq!(store.publish_count(), 0);
}

#[tokio::test]
async fn compare_without_remote_history_skips_build() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    let build = FixedBuild::new(10);

    let outcome = orchestrator(dir.path(), &store, build.clone(), LATER)
        .run(&pull_request(), "def456")
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::NoBaseline);
    assert_eq!(build.calls(), 0);
    assert!(!dir.path().join("graph.svg").exists());
}

#[tokio::test]
async fn compare_sorts_history_by_timestamp_not_store_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    // Store order is by commit id: "aaa" lists first but is the newest.
    seed_baseline(&store, "aaa", 3_000, "1695000000");
    seed_baseline(&store, "bbb", 1_000, "1680000000");
    seed_baseline(&store, "ccc", 2_000, "1685000000");

    let outcome = orchestrator(dir.path(), &store, FixedBuild::new(4_000), LATER)
        .run(&pull_request(), "ddd")
        .await
        .unwrap();

    let Outcome::Compared { report, .. } = outcome else {
        panic!("expected a comparison");
    };
    assert_eq!(report.previous.unwrap().commit, "aaa");
    let sizes: Vec<u64> = report.series.iter().map(|p| p.size).collect();
    assert_eq!(sizes, vec![1_000, 2_000, 3_000, 4_000]);
    assert!(report
        .series
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
    assert_eq!(report.sma.len(), 4);
}

#[tokio::test]
async fn corrupt_entries_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    seed_baseline(&store, "good", 1_024, EARLIER);
    store.seed_remote("bad", b"{\"Commit\":\"bad\",\"Size\":");

    let outcome = orchestrator(dir.path(), &store, FixedBuild::new(2_048), LATER)
        .run(&pull_request(), "def456")
        .await
        .unwrap();

    let Outcome::Compared { report, .. } = outcome else {
        panic!("expected a comparison");
    };
    assert_eq!(report.series.len(), 2);
    assert_eq!(report.previous.unwrap().commit, "good");
}

#[tokio::test]
async fn only_corrupt_entries_means_no_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    store.seed_remote("bad", b"garbage");

    let outcome = orchestrator(dir.path(), &store, FixedBuild::new(2_048), LATER)
        .run(&pull_request(), "def456")
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::NoBaseline);
    assert!(!dir.path().join("graph.svg").exists());
}

#[tokio::test]
async fn render_failure_is_fatal_and_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    seed_baseline(&store, "abc123", 1_000, EARLIER);

    let config = TrackerConfig {
        repo_dir: dir.path().to_path_buf(),
        chart_path: dir.path().join("no-such-dir").join("graph.svg"),
        ..TrackerConfig::default()
    };
    let err = Orchestrator::new(
        config,
        store.clone(),
        FixedBuild::new(2_000),
        Arc::new(FixedClock(LATER)),
    )
    .run(&pull_request(), "def456")
    .await
    .unwrap_err();

    assert!(matches!(err, TrackerError::Render(_)));
    assert_eq!(store.remote_snapshot().unwrap().len(), 1);
}

// ── Record then compare ────────────────────────────────────────────────────

#[tokio::test]
async fn compare_sees_record_published_by_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let baseline_run = Arc::new(MemoryRecordStore::new());
    orchestrator(dir.path(), &baseline_run, FixedBuild::new(1_048_576), EARLIER)
        .run(&push_to("main"), "abc123")
        .await
        .unwrap();

    // A separate run with its own local cache, sharing the remote.
    let compare_run = Arc::new(baseline_run.fork());
    let outcome = orchestrator(dir.path(), &compare_run, FixedBuild::new(2_097_152), LATER)
        .run(&pull_request(), "def456")
        .await
        .unwrap();

    let Outcome::Compared { report, .. } = outcome else {
        panic!("expected a comparison");
    };
    let previous = report.previous.unwrap();
    assert_eq!(previous.commit, "abc123");
    assert_eq!(previous.size, 1_048_576);
}

// ── Skips and cancellation ─────────────────────────────────────────────────

#[tokio::test]
async fn tag_push_skips_without_store_access() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    let build = FixedBuild::new(10);
    let event = TriggerEvent::new("push", "tag", "refs/tags/v1.0.0").with_default_branch("main");

    let outcome = orchestrator(dir.path(), &store, build.clone(), LATER)
        .run(&event, "abc123")
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Skipped);
    assert_eq!(store.sync_count(), 0);
    assert_eq!(build.calls(), 0);
}

#[tokio::test]
async fn unsupported_event_skips() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    let event = TriggerEvent::new("schedule", "branch", "refs/heads/main");

    let outcome = orchestrator(dir.path(), &store, FixedBuild::new(10), LATER)
        .run(&event, "abc123")
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Skipped);
    assert_eq!(store.sync_count(), 0);
}

#[tokio::test]
async fn cancelled_before_start_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    let (handle, cancel) = cancellation();
    handle.cancel();

    let err = orchestrator(dir.path(), &store, FixedBuild::new(10), LATER)
        .with_cancellation(cancel)
        .run(&push_to("main"), "abc123")
        .await
        .unwrap_err();

    assert!(matches!(err, TrackerError::Cancelled));
    assert_eq!(store.sync_count(), 0);
    assert_eq!(store.publish_count(), 0);
}

#[tokio::test]
async fn cancel_during_build_aborts_without_publishing() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    let (handle, cancel) = cancellation();

    let run = orchestrator(dir.path(), &store, Arc::new(HangingBuild), LATER)
        .with_cancellation(cancel);
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    };
    let event = push_to("main");
    let (result, ()) = tokio::join!(run.run(&event, "abc123"), canceller);

    assert!(matches!(result, Err(TrackerError::Cancelled)));
    assert_eq!(store.sync_count(), 1);
    assert_eq!(store.publish_count(), 0);
    assert!(store.remote_snapshot().is_none());
}

#[tokio::test]
async fn never_cancelled_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());

    let outcome = orchestrator(dir.path(), &store, FixedBuild::new(10), LATER)
        .with_cancellation(Cancellation::never())
        .run(&push_to("main"), "abc123")
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::Recorded { .. }));
    let entries = store.list_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
}

// ── Log groups ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_run_wraps_phases_in_log_groups() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    let captured = Captured::default();

    orchestrator(dir.path(), &store, FixedBuild::new(10), LATER)
        .with_log_groups(LogGroups::to_writer(captured.clone()))
        .run(&push_to("main"), "abc123")
        .await
        .unwrap();

    assert_eq!(
        captured.lines(),
        vec![
            "::group::Building binary",
            "::endgroup::",
            "::group::Creating size record",
            "::endgroup::",
            "::group::Adding size record",
            "::endgroup::",
        ]
    );
}

#[tokio::test]
async fn compare_run_groups_build_and_record_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    seed_baseline(&store, "abc123", 1_000, EARLIER);
    let captured = Captured::default();

    orchestrator(dir.path(), &store, FixedBuild::new(2_000), LATER)
        .with_log_groups(LogGroups::to_writer(captured.clone()))
        .run(&pull_request(), "def456")
        .await
        .unwrap();

    assert_eq!(
        captured.lines(),
        vec![
            "::group::Building binary",
            "::endgroup::",
            "::group::Creating size record",
            "::endgroup::",
        ]
    );
}

#[tokio::test]
async fn cancelled_build_still_closes_its_group() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryRecordStore::new());
    let captured = Captured::default();
    let (handle, cancel) = cancellation();

    let run = orchestrator(dir.path(), &store, Arc::new(HangingBuild), LATER)
        .with_cancellation(cancel)
        .with_log_groups(LogGroups::to_writer(captured.clone()));
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    };
    let event = push_to("main");
    let (result, ()) = tokio::join!(run.run(&event, "abc123"), canceller);

    assert!(matches!(result, Err(TrackerError::Cancelled)));
    assert_eq!(
        captured.lines(),
        vec!["::group::Building binary", "::endgroup::"]
    );
}
