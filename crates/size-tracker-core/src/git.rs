//! Git process collaborator: commit metadata and the notes plumbing used by
//! [`crate::store::NotesStore`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::build::CommitClock;
use crate::error::{GitError, Result};
use crate::process::{CommandOutput, CommandRunner};
use crate::store::notes::{FetchStatus, NotesBackend, PushStatus};
use crate::store::NoteEntry;

const BOT_NAME: &str = "github-actions[bot]";
const BOT_EMAIL: &str = "41898282+github-actions[bot]@users.noreply.github.com";

/// Runs `git` in one repository against one remote.
#[derive(Debug, Clone)]
pub struct Git {
    runner: CommandRunner,
    remote: String,
}

impl Git {
    pub fn new(repo_dir: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            runner: CommandRunner::new(repo_dir),
            remote: remote.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        self.runner.cwd()
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Run git and capture output; only a failure to spawn is an error.
    async fn raw(&self, args: &[&str]) -> std::result::Result<CommandOutput, GitError> {
        self.runner
            .output("git", args)
            .await
            .map_err(|e| GitError::new(args.join(" "), format!("failed to run git: {e}")))
    }

    /// Run git and fail on a non-zero exit.
    async fn git(&self, args: &[&str]) -> std::result::Result<CommandOutput, GitError> {
        let output = self.raw(args).await?;
        if !output.success {
            return Err(GitError::new(args.join(" "), output.combined().trim()));
        }
        Ok(output)
    }

    /// The commit SHA at `HEAD`.
    pub async fn head_sha(&self) -> std::result::Result<String, GitError> {
        let output = self.git(&["rev-parse", "HEAD"]).await?;
        let sha = output.stdout.trim().to_string();
        if sha.is_empty() {
            return Err(GitError::new(
                "rev-parse HEAD",
                "returned empty output",
            ));
        }
        Ok(sha)
    }

    /// Whether the repository directory is inside a git work tree.
    pub async fn is_work_tree(&self) -> bool {
        self.raw(&["rev-parse", "--is-inside-work-tree"])
            .await
            .map(|o| o.success)
            .unwrap_or(false)
    }

    /// Prepare a CI checkout: trust the working directories and make sure a
    /// committer identity exists so notes can be written.
    pub async fn configure_for_ci(&self, extra_safe_dirs: &[&Path]) -> Result<()> {
        let mut safe_dirs = vec![self.repo_dir().to_path_buf()];
        safe_dirs.extend(extra_safe_dirs.iter().map(|p| p.to_path_buf()));
        for dir in &safe_dirs {
            let dir = dir.to_string_lossy();
            self.git(&["config", "--global", "--add", "safe.directory", &dir])
                .await?;
        }

        let has_identity = self
            .raw(&["config", "user.email"])
            .await
            .map(|o| o.success && !o.stdout.trim().is_empty())
            .unwrap_or(false);
        if !has_identity {
            self.git(&["config", "--global", "user.name", BOT_NAME])
                .await?;
            self.git(&["config", "--global", "user.email", BOT_EMAIL])
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CommitClock for Git {
    async fn commit_time(&self, commit: &str) -> Result<String> {
        let output = self
            .git(&["log", "-1", "--pretty=format:%ct", commit])
            .await?;
        Ok(output.stdout.trim().to_string())
    }
}

#[async_trait]
impl NotesBackend for Git {
    async fn fetch_ref(
        &self,
        remote_ref: &str,
        local_ref: &str,
    ) -> std::result::Result<FetchStatus, GitError> {
        let refspec = format!("+{remote_ref}:{local_ref}");
        let output = self.raw(&["fetch", &self.remote, &refspec]).await?;
        if output.success {
            return Ok(FetchStatus::Fetched);
        }
        let combined = output.combined();
        if combined.contains("couldn't find remote ref") {
            debug!(remote_ref, "remote ref does not exist");
            return Ok(FetchStatus::MissingRemoteRef);
        }
        Err(GitError::new(format!("fetch {refspec}"), combined.trim()))
    }

    async fn list_notes(&self, notes_ref: &str) -> std::result::Result<Vec<NoteEntry>, GitError> {
        let ref_arg = format!("--ref={notes_ref}");
        let output = self.git(&["notes", &ref_arg, "list"]).await?;
        parse_notes_list(&output.stdout)
    }

    async fn read_blob(&self, blob: &str) -> std::result::Result<Vec<u8>, GitError> {
        let output = self.git(&["cat-file", "blob", blob]).await?;
        Ok(output.stdout.into_bytes())
    }

    async fn add_note(
        &self,
        notes_ref: &str,
        commit: &str,
        message: &str,
    ) -> std::result::Result<(), GitError> {
        let ref_arg = format!("--ref={notes_ref}");
        self.git(&["notes", &ref_arg, "add", "-f", "-m", message, commit])
            .await?;
        Ok(())
    }

    async fn merge_notes(
        &self,
        notes_ref: &str,
        other_ref: &str,
    ) -> std::result::Result<(), GitError> {
        let ref_arg = format!("--ref={notes_ref}");
        self.git(&["notes", &ref_arg, "merge", "--quiet", "-s", "ours", other_ref])
            .await?;
        Ok(())
    }

    async fn push_ref(&self, git_ref: &str) -> std::result::Result<PushStatus, GitError> {
        let output = self.raw(&["push", &self.remote, git_ref]).await?;
        if output.success {
            return Ok(PushStatus::Pushed);
        }
        let combined = output.combined();
        if is_push_race(&combined) {
            return Ok(PushStatus::Rejected);
        }
        Err(GitError::new(format!("push {git_ref}"), combined.trim()))
    }
}

/// Parse `git notes list` output: one `<note blob> <annotated object>` pair
/// per line.
pub fn parse_notes_list(stdout: &str) -> std::result::Result<Vec<NoteEntry>, GitError> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (blob, commit) = line.trim().split_once(' ').ok_or_else(|| {
                GitError::new("notes list", format!("malformed output line: {line:?}"))
            })?;
            Ok(NoteEntry {
                commit: commit.trim().to_string(),
                blob: blob.to_string(),
            })
        })
        .collect()
}

fn is_push_race(output: &str) -> bool {
    ["[rejected]", "non-fast-forward", "fetch first", "cannot lock ref"]
        .iter()
        .any(|marker| output.contains(marker))
}
