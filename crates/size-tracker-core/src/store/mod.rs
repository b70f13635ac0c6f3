//! Record store abstraction.
//!
//! A [`RecordStore`] is a commit-keyed map of encoded size records with an
//! explicit synchronization step in each direction:
//! - `sync_remote` pulls the remote namespace into a local cache
//! - `write_entry` stages a record locally (last write per commit wins)
//! - `publish` makes staged records visible to later runs
//!
//! Implementations:
//! - [`NotesStore`]: git notes under a dedicated ref, pushed to a remote
//! - [`MemoryRecordStore`]: in-memory fake for tests
//!
//! Listing order is whatever the backend produces. Callers sort by the
//! record timestamp before doing anything temporal.

pub mod memory;
pub mod notes;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::obs;
use crate::record::SizeRecord;

pub use memory::MemoryRecordStore;
pub use notes::{FetchStatus, NotesBackend, NotesStore, PushStatus};

/// One stored entry: the annotated commit and a backend handle to its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoteEntry {
    pub commit: String,
    pub blob: String,
}

/// Commit-keyed persistence for encoded size records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Replace the local cache with the remote namespace.
    ///
    /// Returns [`StoreError::NoRemoteHistory`] when the remote has never had
    /// a record published. Callers treat that as an expected condition.
    async fn sync_remote(&self) -> StoreResult<()>;

    /// Entries currently known locally, in backend order.
    async fn list_entries(&self) -> StoreResult<Vec<NoteEntry>>;

    /// Raw content of one entry.
    async fn read_entry(&self, entry: &NoteEntry) -> StoreResult<Vec<u8>>;

    /// Create or overwrite the local entry for `commit`.
    async fn write_entry(&self, commit: &str, encoded: &[u8]) -> StoreResult<()>;

    /// Push local entries to the remote.
    async fn publish(&self) -> StoreResult<()>;

    /// Read and decode one entry.
    async fn read_record(&self, entry: &NoteEntry) -> StoreResult<SizeRecord> {
        let raw = self.read_entry(entry).await?;
        SizeRecord::decode(&raw).map_err(|source| StoreError::CorruptEntry {
            commit: entry.commit.clone(),
            source,
        })
    }
}

/// Every decodable record in the local cache.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// Decoded records, in store order.
    pub records: Vec<SizeRecord>,
    /// Entries whose content could not be decoded.
    pub skipped: Vec<NoteEntry>,
}

/// Load every record from the local cache.
///
/// Corrupt entries are skipped with a warning so one bad note cannot hide the
/// rest of the trend. Any other store failure is returned.
pub async fn load_history(store: &dyn RecordStore) -> StoreResult<History> {
    let mut history = History::default();
    for entry in store.list_entries().await? {
        match store.read_record(&entry).await {
            Ok(record) => {
                if record.commit != entry.commit {
                    warn!(
                        note_commit = %entry.commit,
                        record_commit = %record.commit,
                        "size record is attached to a different commit than it names"
                    );
                }
                history.records.push(record);
            }
            Err(StoreError::CorruptEntry { commit, source }) => {
                obs::emit_corrupt_entry_skipped(&commit, &source);
                history.skipped.push(entry);
            }
            Err(other) => return Err(other),
        }
    }
    Ok(history)
}
