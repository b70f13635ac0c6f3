//! Sequencing of one tracking run.
//!
//! classify → sync store → build and measure → build record → either
//! write and publish a baseline, or load history, compare and render.
//!
//! The store is synced before building so a compare run with nothing to
//! compare against exits without paying for a build. Rendering only happens
//! on the compare path, which never writes, so a render failure cannot lose
//! a record.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, Instrument};

use crate::build::{ArtifactBuilder, CommitClock};
use crate::cancel::Cancellation;
use crate::compare::{compare, Report};
use crate::config::TrackerConfig;
use crate::error::{Result, StoreError, TrackerError};
use crate::obs::{self, LogGroups};
use crate::record::{build_record, SizeRecord};
use crate::render::render_chart;
use crate::store::{load_history, RecordStore};
use crate::trigger::{classify, Trigger, TriggerEvent};

/// What a run did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The event is not tracked.
    Skipped,
    /// A record was written and published.
    Recorded {
        record: SizeRecord,
        first_baseline: bool,
    },
    /// A compare run found nothing to compare against.
    NoBaseline,
    /// A comparison was made and the chart written.
    Compared { report: Report, chart: PathBuf },
}

/// Runs the tracking pipeline against its collaborators.
pub struct Orchestrator {
    config: TrackerConfig,
    store: Arc<dyn RecordStore>,
    builder: Arc<dyn ArtifactBuilder>,
    clock: Arc<dyn CommitClock>,
    cancel: Cancellation,
    groups: LogGroups,
}

impl Orchestrator {
    pub fn new(
        config: TrackerConfig,
        store: Arc<dyn RecordStore>,
        builder: Arc<dyn ArtifactBuilder>,
        clock: Arc<dyn CommitClock>,
    ) -> Self {
        let groups = if config.log_groups {
            LogGroups::stdout()
        } else {
            LogGroups::disabled()
        };
        Self {
            config,
            store,
            builder,
            clock,
            cancel: Cancellation::never(),
            groups,
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send log group markers somewhere other than what the config selects.
    pub fn with_log_groups(mut self, groups: LogGroups) -> Self {
        self.groups = groups;
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Run the pipeline for `event` at `commit`.
    pub async fn run(&self, event: &TriggerEvent, commit: &str) -> Result<Outcome> {
        let trigger = classify(event);
        obs::emit_trigger_classified(&event.event_name, &event.git_ref, trigger);
        let record_path = match trigger {
            Trigger::Skip => {
                info!(
                    "Triggered by {} event on {:?}, nothing to do",
                    event.event_name, event.git_ref
                );
                return Ok(Outcome::Skipped);
            }
            Trigger::Record => {
                info!("Adding size record for commit {commit}");
                true
            }
            Trigger::Compare => {
                info!("Will not add a size record for this event, comparing instead");
                false
            }
        };

        self.checkpoint()?;
        let has_history = self.sync().instrument(obs::phase_span("sync")).await?;
        if !record_path && !has_history {
            info!("No size records to compare against");
            return Ok(Outcome::NoBaseline);
        }

        self.checkpoint()?;
        let size = {
            let _group = self.groups.open("Building binary");
            let build = self
                .builder
                .build_and_measure()
                .instrument(obs::phase_span("build"));
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(TrackerError::Cancelled),
                size = build => size?,
            }
        };

        self.checkpoint()?;
        let record = {
            let _group = self.groups.open("Creating size record");
            let raw_time = self.clock.commit_time(commit).await?;
            build_record(commit, size, &raw_time)?
        };
        obs::emit_record_built(&record);

        if record_path {
            let _group = self.groups.open("Adding size record");
            self.persist(record, !has_history)
                .instrument(obs::phase_span("persist"))
                .await
        } else {
            self.compare(record)
                .instrument(obs::phase_span("compare"))
                .await
        }
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(TrackerError::Cancelled);
        }
        Ok(())
    }

    async fn sync(&self) -> Result<bool> {
        let has_history = match self.store.sync_remote().await {
            Ok(()) => true,
            Err(StoreError::NoRemoteHistory) => {
                info!("No size records have been published yet");
                false
            }
            Err(e) => return Err(e.into()),
        };
        obs::emit_store_synced(has_history);
        Ok(has_history)
    }

    async fn persist(&self, record: SizeRecord, first_baseline: bool) -> Result<Outcome> {
        let encoded = record.encode()?;
        self.store.write_entry(&record.commit, &encoded).await?;

        // Nothing is visible remotely until publish; stop here if asked to.
        self.checkpoint()?;
        self.store.publish().await?;

        obs::emit_record_written(&record, first_baseline);
        Ok(Outcome::Recorded {
            record,
            first_baseline,
        })
    }

    async fn compare(&self, record: SizeRecord) -> Result<Outcome> {
        let history = load_history(self.store.as_ref()).await?;
        if history.records.is_empty() {
            info!("No size records to compare against");
            return Ok(Outcome::NoBaseline);
        }

        let report = compare(&record, &history.records, self.config.sma_window);
        for line in report.headline() {
            info!("{line}");
        }
        obs::emit_comparison(&report, history.records.len());

        let chart = self.config.resolved_chart_path();
        render_chart(&report, &chart)?;
        info!(chart = %chart.display(), "wrote size chart");

        Ok(Outcome::Compared { report, chart })
    }
}
