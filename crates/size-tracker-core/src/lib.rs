//! Size Tracker Core
//!
//! Tracks the size of a built artifact across repository history. Size
//! records are stored as git notes keyed by commit; pushes to the default
//! branch record a baseline, other events compare against the recorded
//! history and render a trend chart.

pub mod build;
pub mod cancel;
pub mod compare;
pub mod config;
pub mod error;
pub mod git;
pub mod obs;
pub mod orchestrator;
pub mod process;
pub mod record;
pub mod render;
pub mod store;
pub mod telemetry;
pub mod trigger;
pub mod units;

pub use build::{measure_artifact, ArtifactBuilder, CommitClock, ShellBuild};
pub use cancel::{cancellation, CancelHandle, Cancellation};
pub use compare::{compare, simple_moving_average, Report, TrendPoint, DEFAULT_SMA_WINDOW};
pub use config::TrackerConfig;
pub use error::{GitError, RecordError, RenderError, Result, StoreError, StoreResult, TrackerError};
pub use git::Git;
pub use obs::{LogGroup, LogGroups};
pub use orchestrator::{Orchestrator, Outcome};
pub use process::{CommandOutput, CommandRunner};
pub use record::{build_record, parse_commit_time, SizeRecord, MAX_RECORD_SIZE};
pub use render::render_chart;
pub use store::{
    load_history, History, MemoryRecordStore, NoteEntry, NotesBackend, NotesStore, RecordStore,
};
pub use telemetry::init_tracing;
pub use trigger::{classify, Trigger, TriggerEvent};
pub use units::format_bytes;
