//! Git notes backed [`RecordStore`].
//!
//! Each record is the note attached to its commit under a dedicated notes
//! ref. Writes only touch the local ref; `publish` pushes it and, when the
//! push loses a race with another run, fetches the remote ref, merges it into
//! the local one and tries again.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{NoteEntry, RecordStore};
use crate::error::{GitError, StoreError, StoreResult};
use crate::obs;

/// Default notes namespace for size records. Repositories tracked by earlier
/// releases already hold their history under this ref.
pub const DEFAULT_NOTES_REF: &str = "refs/notes/go-size-tracker";

/// Default number of push attempts before giving up.
pub const DEFAULT_PUSH_ATTEMPTS: u32 = 3;

/// Outcome of fetching a ref from the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Fetched,
    MissingRemoteRef,
}

/// Outcome of pushing a ref to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    Pushed,
    /// The remote ref moved since our last fetch.
    Rejected,
}

/// The git operations a [`NotesStore`] needs.
#[async_trait]
pub trait NotesBackend: Send + Sync {
    /// Force-update `local_ref` from `remote_ref` on the remote.
    async fn fetch_ref(&self, remote_ref: &str, local_ref: &str)
        -> Result<FetchStatus, GitError>;

    async fn list_notes(&self, notes_ref: &str) -> Result<Vec<NoteEntry>, GitError>;

    async fn read_blob(&self, blob: &str) -> Result<Vec<u8>, GitError>;

    /// Attach `message` to `commit`, replacing any existing note.
    async fn add_note(&self, notes_ref: &str, commit: &str, message: &str)
        -> Result<(), GitError>;

    /// Merge `other_ref` into `notes_ref`, keeping local notes on conflict.
    async fn merge_notes(&self, notes_ref: &str, other_ref: &str) -> Result<(), GitError>;

    async fn push_ref(&self, git_ref: &str) -> Result<PushStatus, GitError>;
}

/// Size records stored as git notes.
#[derive(Debug, Clone)]
pub struct NotesStore<B> {
    backend: B,
    notes_ref: String,
    push_attempts: u32,
}

impl<B: NotesBackend> NotesStore<B> {
    pub fn new(backend: B, notes_ref: impl Into<String>) -> Self {
        Self {
            backend,
            notes_ref: notes_ref.into(),
            push_attempts: DEFAULT_PUSH_ATTEMPTS,
        }
    }

    /// Bound the publish retry loop. At least one attempt is always made.
    pub fn with_push_attempts(mut self, attempts: u32) -> Self {
        self.push_attempts = attempts.max(1);
        self
    }

    pub fn notes_ref(&self) -> &str {
        &self.notes_ref
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Local ref the remote notes are fetched into before a merge.
    pub fn remote_tracking_ref(&self) -> String {
        format!("{}-remote", self.notes_ref)
    }

    async fn merge_remote(&self) -> StoreResult<()> {
        let tracking = self.remote_tracking_ref();
        match self.backend.fetch_ref(&self.notes_ref, &tracking).await? {
            FetchStatus::Fetched => {
                self.backend.merge_notes(&self.notes_ref, &tracking).await?;
                debug!(notes_ref = %self.notes_ref, "merged remote notes");
            }
            FetchStatus::MissingRemoteRef => {
                debug!(notes_ref = %self.notes_ref, "remote notes ref vanished before merge");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<B: NotesBackend> RecordStore for NotesStore<B> {
    async fn sync_remote(&self) -> StoreResult<()> {
        match self
            .backend
            .fetch_ref(&self.notes_ref, &self.notes_ref)
            .await?
        {
            FetchStatus::Fetched => Ok(()),
            FetchStatus::MissingRemoteRef => Err(StoreError::NoRemoteHistory),
        }
    }

    async fn list_entries(&self) -> StoreResult<Vec<NoteEntry>> {
        Ok(self.backend.list_notes(&self.notes_ref).await?)
    }

    async fn read_entry(&self, entry: &NoteEntry) -> StoreResult<Vec<u8>> {
        Ok(self.backend.read_blob(&entry.blob).await?)
    }

    async fn write_entry(&self, commit: &str, encoded: &[u8]) -> StoreResult<()> {
        let message = String::from_utf8_lossy(encoded);
        self.backend
            .add_note(&self.notes_ref, commit, &message)
            .await?;
        Ok(())
    }

    async fn publish(&self) -> StoreResult<()> {
        for attempt in 1..=self.push_attempts {
            obs::emit_publish_attempt(&self.notes_ref, attempt, self.push_attempts);
            match self.backend.push_ref(&self.notes_ref).await? {
                PushStatus::Pushed => {
                    info!(notes_ref = %self.notes_ref, attempt, "published size records");
                    return Ok(());
                }
                PushStatus::Rejected => {
                    warn!(
                        notes_ref = %self.notes_ref,
                        attempt,
                        "push rejected by remote, merging remote notes"
                    );
                    if attempt < self.push_attempts {
                        self.merge_remote().await?;
                    }
                }
            }
        }
        Err(StoreError::PushRejected {
            attempts: self.push_attempts,
        })
    }
}
