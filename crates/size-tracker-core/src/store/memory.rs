//! In-memory [`RecordStore`] (testing only).
//!
//! Models the remote/local split of the notes store: clones created with
//! [`MemoryRecordStore::fork`] share one remote but keep separate local
//! caches, like two CI runs against the same repository.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{NoteEntry, RecordStore};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Remote {
    /// `None` until something is published.
    entries: Option<BTreeMap<String, Vec<u8>>>,
    rejections_left: u32,
}

/// Commit-keyed store with a shared in-memory remote.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    remote: Arc<Mutex<Remote>>,
    local: Mutex<BTreeMap<String, Vec<u8>>>,
    syncs: Mutex<u32>,
    publishes: Mutex<u32>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store sharing this store's remote with an empty local cache.
    pub fn fork(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            ..Self::default()
        }
    }

    /// Place raw content directly on the remote.
    pub fn seed_remote(&self, commit: &str, content: &[u8]) {
        let mut remote = self.remote.lock().unwrap();
        remote
            .entries
            .get_or_insert_with(BTreeMap::new)
            .insert(commit.to_string(), content.to_vec());
    }

    /// Reject the next `count` publishes.
    pub fn reject_next_publishes(&self, count: u32) {
        self.remote.lock().unwrap().rejections_left = count;
    }

    /// Copy of the remote contents, `None` if nothing was ever published.
    pub fn remote_snapshot(&self) -> Option<BTreeMap<String, Vec<u8>>> {
        self.remote.lock().unwrap().entries.clone()
    }

    pub fn sync_count(&self) -> u32 {
        *self.syncs.lock().unwrap()
    }

    pub fn publish_count(&self) -> u32 {
        *self.publishes.lock().unwrap()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn sync_remote(&self) -> StoreResult<()> {
        *self.syncs.lock().unwrap() += 1;
        let remote = self.remote.lock().unwrap();
        let entries = remote.entries.as_ref().ok_or(StoreError::NoRemoteHistory)?;
        *self.local.lock().unwrap() = entries.clone();
        Ok(())
    }

    async fn list_entries(&self) -> StoreResult<Vec<NoteEntry>> {
        let local = self.local.lock().unwrap();
        Ok(local
            .keys()
            .map(|commit| NoteEntry {
                commit: commit.clone(),
                blob: commit.clone(),
            })
            .collect())
    }

    async fn read_entry(&self, entry: &NoteEntry) -> StoreResult<Vec<u8>> {
        let local = self.local.lock().unwrap();
        local
            .get(&entry.blob)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(entry.commit.clone()))
    }

    async fn write_entry(&self, commit: &str, encoded: &[u8]) -> StoreResult<()> {
        let mut local = self.local.lock().unwrap();
        local.insert(commit.to_string(), encoded.to_vec());
        Ok(())
    }

    async fn publish(&self) -> StoreResult<()> {
        *self.publishes.lock().unwrap() += 1;
        let mut remote = self.remote.lock().unwrap();
        if remote.rejections_left > 0 {
            remote.rejections_left -= 1;
            return Err(StoreError::PushRejected { attempts: 1 });
        }
        let local = self.local.lock().unwrap();
        let entries = remote.entries.get_or_insert_with(BTreeMap::new);
        for (commit, content) in local.iter() {
            entries.insert(commit.clone(), content.clone());
        }
        Ok(())
    }
}
