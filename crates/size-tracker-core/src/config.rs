//! Run configuration for the orchestrator.

use std::path::PathBuf;

use crate::compare::DEFAULT_SMA_WINDOW;
use crate::render::DEFAULT_CHART_PATH;
use crate::store::notes::{DEFAULT_NOTES_REF, DEFAULT_PUSH_ATTEMPTS};

/// Default artifact file produced by the build command.
pub const DEFAULT_ARTIFACT_PATH: &str = "out";

/// Settings for one tracking run. Built by the binary from flags and the
/// environment; the library never reads the environment itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Repository working directory.
    pub repo_dir: PathBuf,
    /// Remote that holds the published records.
    pub remote: String,
    /// Notes ref the records live under.
    pub notes_ref: String,
    /// Artifact measured after the build, relative to `repo_dir`.
    pub artifact_path: PathBuf,
    /// Chart output, relative to `repo_dir`.
    pub chart_path: PathBuf,
    /// Window of the moving average on the chart.
    pub sma_window: usize,
    /// Push attempts before a publish is abandoned.
    pub push_attempts: u32,
    /// Wrap run phases in collapsible GitHub Actions log groups on stdout.
    pub log_groups: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            repo_dir: PathBuf::from("."),
            remote: "origin".to_string(),
            notes_ref: DEFAULT_NOTES_REF.to_string(),
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            chart_path: PathBuf::from(DEFAULT_CHART_PATH),
            sma_window: DEFAULT_SMA_WINDOW,
            push_attempts: DEFAULT_PUSH_ATTEMPTS,
            log_groups: false,
        }
    }
}

impl TrackerConfig {
    /// The chart path resolved against the repository directory.
    pub fn resolved_chart_path(&self) -> PathBuf {
        if self.chart_path.is_absolute() {
            self.chart_path.clone()
        } else {
            self.repo_dir.join(&self.chart_path)
        }
    }
}
