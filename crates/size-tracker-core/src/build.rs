//! Building the tracked artifact and reading commit metadata.
//!
//! Both are collaborators of the orchestrator, so they sit behind traits and
//! tests substitute fakes.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::{Result, TrackerError};
use crate::process::CommandRunner;

/// Produces the artifact and reports its size in bytes.
#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    async fn build_and_measure(&self) -> Result<u64>;
}

/// Reports the raw commit time of a commit.
#[async_trait]
pub trait CommitClock: Send + Sync {
    async fn commit_time(&self, commit: &str) -> Result<String>;
}

/// Runs a user-supplied build command, then measures a fixed output file.
#[derive(Debug, Clone)]
pub struct ShellBuild {
    runner: CommandRunner,
    argv: Vec<String>,
    artifact: PathBuf,
}

impl ShellBuild {
    /// Split `command_line` with POSIX shell quoting rules.
    pub fn from_command_line(
        runner: CommandRunner,
        command_line: &str,
        artifact: impl Into<PathBuf>,
    ) -> Result<Self> {
        let argv = shlex::split(command_line)
            .ok_or_else(|| TrackerError::InvalidBuildCommand(command_line.to_string()))?;
        if argv.is_empty() {
            return Err(TrackerError::EmptyBuildCommand);
        }
        Ok(Self {
            runner,
            argv,
            artifact: artifact.into(),
        })
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    fn artifact_path(&self) -> PathBuf {
        if self.artifact.is_absolute() {
            self.artifact.clone()
        } else {
            self.runner.cwd().join(&self.artifact)
        }
    }
}

#[async_trait]
impl ArtifactBuilder for ShellBuild {
    async fn build_and_measure(&self) -> Result<u64> {
        self.runner.run(&self.argv[0], &self.argv[1..]).await?;
        let size = measure_artifact(&self.artifact_path())?;
        info!(artifact = %self.artifact.display(), size, "measured artifact");
        Ok(size)
    }
}

/// Size of the regular file at `path`.
pub fn measure_artifact(path: &Path) -> Result<u64> {
    let meta = fs::metadata(path).map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            TrackerError::MissingArtifact(path.display().to_string())
        } else {
            TrackerError::Io(e)
        }
    })?;

    if !meta.is_file() {
        let kind = if meta.is_dir() { "directory" } else { "special file" };
        return Err(TrackerError::ArtifactNotRegular {
            path: path.display().to_string(),
            kind: kind.to_string(),
        });
    }
    Ok(meta.len())
}
