//! Structured events for the tracking run lifecycle.
//!
//! Every event carries an `event` field so log pipelines can filter on it.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::compare::Report;
use crate::record::SizeRecord;
use crate::trigger::Trigger;

/// Span covering one phase of a run.
pub fn phase_span(phase: &'static str) -> tracing::Span {
    tracing::info_span!("size_tracker.phase", phase)
}

/// Collapsible log sections for GitHub Actions (`::group::` / `::endgroup::`).
///
/// Disabled groups write nothing. Actions does not nest groups, so callers
/// keep at most one open at a time.
#[derive(Clone, Default)]
pub struct LogGroups {
    sink: Option<Arc<Mutex<dyn Write + Send>>>,
}

impl LogGroups {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Markers on stdout, where the runner picks up workflow commands.
    pub fn stdout() -> Self {
        Self::to_writer(std::io::stdout())
    }

    pub fn to_writer<W: Write + Send + 'static>(writer: W) -> Self {
        let sink: Arc<Mutex<dyn Write + Send>> = Arc::new(Mutex::new(writer));
        Self { sink: Some(sink) }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Open a group that ends when the returned guard is dropped.
    pub fn open(&self, title: &str) -> LogGroup<'_> {
        self.write_line(&format!("::group::{title}"));
        LogGroup { groups: self }
    }

    fn write_line(&self, line: &str) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Ok(mut out) = sink.lock() {
            // Best effort.
            let _ = writeln!(out, "{line}").and_then(|()| out.flush());
        }
    }
}

impl fmt::Debug for LogGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogGroups")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// An open log group.
#[must_use = "the group closes when this guard is dropped"]
pub struct LogGroup<'a> {
    groups: &'a LogGroups,
}

impl Drop for LogGroup<'_> {
    fn drop(&mut self) {
        self.groups.write_line("::endgroup::");
    }
}

pub fn emit_trigger_classified(event_name: &str, git_ref: &str, trigger: Trigger) {
    info!(
        event = "trigger.classified",
        event_name = %event_name,
        git_ref = %git_ref,
        trigger = %trigger,
    );
}

pub fn emit_store_synced(has_history: bool) {
    info!(event = "store.synced", has_history = has_history);
}

pub fn emit_record_built(record: &SizeRecord) {
    info!(
        event = "record.built",
        commit = %record.commit,
        timestamp = %record.timestamp.to_rfc3339(),
        size = record.size,
    );
}

pub fn emit_record_written(record: &SizeRecord, first_baseline: bool) {
    info!(
        event = "record.written",
        commit = %record.commit,
        size = record.size,
        first_baseline = first_baseline,
    );
}

pub fn emit_publish_attempt(notes_ref: &str, attempt: u32, max_attempts: u32) {
    info!(
        event = "store.publish_attempt",
        notes_ref = %notes_ref,
        attempt = attempt,
        max_attempts = max_attempts,
    );
}

pub fn emit_comparison(report: &Report, history_len: usize) {
    info!(
        event = "comparison.produced",
        commit = %report.current.commit,
        current_size = report.current.size,
        previous_size = report.previous.as_ref().map(|p| p.size),
        delta_bytes = report.delta_bytes(),
        history_len = history_len,
    );
}

pub fn emit_corrupt_entry_skipped(commit: &str, error: &dyn std::fmt::Display) {
    warn!(event = "store.corrupt_entry_skipped", commit = %commit, error = %error);
}
