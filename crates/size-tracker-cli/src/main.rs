//! Size Tracker CLI
//!
//! The `size-tracker` command runs one tracking step in CI: it builds the
//! artifact, then either records its size as a git note on the default branch
//! or compares it against the recorded history and writes a trend chart.

mod github;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use size_tracker_core::config::DEFAULT_ARTIFACT_PATH;
use size_tracker_core::render::DEFAULT_CHART_PATH;
use size_tracker_core::store::notes::{DEFAULT_NOTES_REF, DEFAULT_PUSH_ATTEMPTS};
use size_tracker_core::{
    cancellation, classify, format_bytes, CancelHandle, CommandRunner, Git, LogGroups,
    NotesStore, Orchestrator, Outcome, ShellBuild, TrackerConfig, TrackerError, Trigger,
    TriggerEvent, DEFAULT_SMA_WINDOW,
};
use tracing::{error, info, warn, Level};

use crate::github::{in_actions, resolve_default_branch, ActionsContext, DEFAULT_API_URL};

#[derive(Parser, Debug)]
#[command(name = "size-tracker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track the size of a build artifact across commits", long_about = None)]
struct Cli {
    /// Command that builds the artifact
    #[arg(long, env = "INPUT_BUILD-COMMAND")]
    build_command: Option<String>,

    /// Token used to look up the repository's default branch
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Default branch, skipping the lookup
    #[arg(long, env = "SIZE_TRACKER_DEFAULT_BRANCH")]
    default_branch: Option<String>,

    /// Notes ref holding the size records
    #[arg(long, default_value = DEFAULT_NOTES_REF)]
    notes_ref: String,

    /// Remote the notes are synced with
    #[arg(long, default_value = "origin")]
    remote: String,

    /// Artifact produced by the build command
    #[arg(long, default_value = DEFAULT_ARTIFACT_PATH)]
    artifact: PathBuf,

    /// Chart output path
    #[arg(long, default_value = DEFAULT_CHART_PATH)]
    chart: PathBuf,

    /// Window of the moving average on the chart
    #[arg(long, default_value_t = DEFAULT_SMA_WINDOW)]
    sma_window: usize,

    /// Push attempts before publishing gives up
    #[arg(long, default_value_t = DEFAULT_PUSH_ATTEMPTS)]
    push_attempts: u32,

    /// Repository working directory
    #[arg(long, default_value = ".")]
    repo_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    #[arg(long, env = "GITHUB_EVENT_NAME", default_value = "", hide = true)]
    event_name: String,

    #[arg(long = "ref", env = "GITHUB_REF", default_value = "", hide = true)]
    git_ref: String,

    #[arg(long, env = "GITHUB_REF_TYPE", default_value = "", hide = true)]
    ref_type: String,

    #[arg(long, env = "GITHUB_SHA", hide = true)]
    sha: Option<String>,

    #[arg(long, env = "GITHUB_REPOSITORY", hide = true)]
    repository: Option<String>,

    #[arg(long, env = "GITHUB_EVENT_PATH", hide = true)]
    event_path: Option<PathBuf>,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL, hide = true)]
    api_url: String,
}

impl Cli {
    fn actions_context(&self) -> ActionsContext {
        ActionsContext {
            event_name: self.event_name.clone(),
            git_ref: self.git_ref.clone(),
            ref_type: self.ref_type.clone(),
            sha: self.sha.clone().filter(|s| !s.is_empty()),
            repository: self.repository.clone().filter(|r| !r.is_empty()),
            event_path: self.event_path.clone(),
            api_url: self.api_url.clone(),
        }
    }

    fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            repo_dir: self.repo_dir.clone(),
            remote: self.remote.clone(),
            notes_ref: self.notes_ref.clone(),
            artifact_path: self.artifact.clone(),
            chart_path: self.chart.clone(),
            sma_window: self.sma_window,
            push_attempts: self.push_attempts,
            log_groups: in_actions(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    size_tracker_core::init_tracing(cli.json, level);

    let (handle, cancel) = cancellation();
    spawn_signal_handler(handle);

    let result = async {
        let run = match prepare(&cli).await? {
            Prepared::Skip => return Ok(Outcome::Skipped),
            Prepared::Run(run) => run,
        };
        let outcome = run
            .orchestrator
            .with_cancellation(cancel)
            .run(&run.event, &run.commit)
            .await?;
        Ok::<_, anyhow::Error>(outcome)
    }
    .await;

    match result {
        Ok(outcome) => {
            report(&outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            if in_actions() {
                println!("::error::{}", workflow_escape(&format!("{e:#}")));
            }
            ExitCode::FAILURE
        }
    }
}

struct PreparedRun {
    orchestrator: Orchestrator,
    event: TriggerEvent,
    commit: String,
}

enum Prepared {
    Skip,
    Run(PreparedRun),
}

/// Load the CI context and wire up the collaborators. Events that are never
/// tracked return before any git or network access.
async fn prepare(cli: &Cli) -> Result<Prepared> {
    let ctx = cli.actions_context();
    let mut event = ctx.trigger_event();
    if !event.needs_default_branch() && classify(&event) == Trigger::Skip {
        info!(
            "Triggered by {:?} event on {:?}, nothing to do",
            event.event_name, event.git_ref
        );
        return Ok(Prepared::Skip);
    }

    let config = cli.tracker_config();
    let runner = CommandRunner::new(&config.repo_dir);
    let git = Git::new(&config.repo_dir, &config.remote);
    if !git.is_work_tree().await {
        anyhow::bail!("{} is not a git work tree", config.repo_dir.display());
    }
    if in_actions() {
        let groups = LogGroups::stdout();
        let _group = groups.open("Setting up git");
        let workspace = std::env::var_os("GITHUB_WORKSPACE").map(PathBuf::from);
        let extra: Vec<&std::path::Path> = workspace.as_deref().into_iter().collect();
        git.configure_for_ci(&extra)
            .await
            .context("failed to configure git for CI")?;
    }

    if event.needs_default_branch() {
        let branch = resolve_default_branch(
            &ctx,
            cli.default_branch.as_deref(),
            cli.github_token.as_deref(),
        )
        .await?;
        event = event.with_default_branch(branch);
    }

    let command_line = cli
        .build_command
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| TrackerError::MissingInput("build-command".to_string()))?;
    let builder = ShellBuild::from_command_line(runner, command_line, &config.artifact_path)?;

    let commit = match ctx.sha {
        Some(sha) => sha,
        None => git.head_sha().await.context("failed to resolve HEAD")?,
    };

    let store = NotesStore::new(git.clone(), &config.notes_ref)
        .with_push_attempts(config.push_attempts);
    let orchestrator = Orchestrator::new(
        config,
        Arc::new(store),
        Arc::new(builder),
        Arc::new(git),
    );

    Ok(Prepared::Run(PreparedRun {
        orchestrator,
        event,
        commit,
    }))
}

fn report(outcome: &Outcome) {
    match outcome {
        Outcome::Skipped | Outcome::NoBaseline => {}
        Outcome::Recorded {
            record,
            first_baseline,
        } => {
            let kind = if *first_baseline {
                "first baseline"
            } else {
                "baseline"
            };
            info!(
                "Recorded {kind} for {}: {}",
                record.commit,
                format_bytes(record.size_bytes())
            );
        }
        Outcome::Compared { chart, .. } => {
            info!("Size chart written to {}", chart.display());
        }
    }
}

fn spawn_signal_handler(handle: CancelHandle) {
    tokio::spawn(async move {
        wait_for_signal().await;
        warn!("Received termination signal, cancelling run");
        handle.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if res.is_err() {
                        term.recv().await;
                    }
                }
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("SIGTERM handler unavailable: {e}");
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Escape a message for an Actions workflow command.
fn workflow_escape(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
