//! Journal
//!
//! Maps request names to backend object identities and drives their
//! lifecycle state. All reads and transitions of one request name run inside
//! that name's exclusive section; the section is held only for the journal
//! I/O, never across a backend command.

use crate::error::{Error, Result};
use crate::journal::entry::{EntryState, JournalEntry, ObjectKind, ParentRef};
use crate::journal::locks::KeyedLocks;
use crate::journal::store::{FileJournalStore, JournalStoreRef, MemoryJournalStore};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

// =============================================================================
// Reservation
// =============================================================================

/// Outcome of reserving an identity for a request name
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// This caller minted a new provisional entry and owns backend creation
    Minted(JournalEntry),
    /// An entry already existed and is returned unchanged
    Existing(JournalEntry),
}

impl Reservation {
    pub fn entry(&self) -> &JournalEntry {
        match self {
            Reservation::Minted(entry) | Reservation::Existing(entry) => entry,
        }
    }

    pub fn into_entry(self) -> JournalEntry {
        match self {
            Reservation::Minted(entry) | Reservation::Existing(entry) => entry,
        }
    }

    pub fn is_minted(&self) -> bool {
        matches!(self, Reservation::Minted(_))
    }
}

// =============================================================================
// Journal
// =============================================================================

/// Durable registry of object identities
pub struct Journal {
    store: JournalStoreRef,
    locks: KeyedLocks,
}

impl Journal {
    pub fn new(store: JournalStoreRef) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Journal kept in process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryJournalStore::new()))
    }

    /// Journal persisted under `root_path`
    pub async fn open(root_path: impl Into<PathBuf>) -> Result<Self> {
        let store = FileJournalStore::with_path(root_path).await?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Reserve an identity for `request_name`
    ///
    /// An existing entry in any state is returned as found. Otherwise a new
    /// UUID is minted and written as a provisional entry.
    pub async fn reserve(
        &self,
        request_name: &str,
        kind: ObjectKind,
        parent: Option<ParentRef>,
    ) -> Result<Reservation> {
        let _section = self.locks.lock(request_name).await;

        if let Some(existing) = self.store.get(request_name).await? {
            debug!(
                "Request {} already journalled as {} ({})",
                request_name, existing.backend_id, existing.state
            );
            return Ok(Reservation::Existing(existing));
        }

        let entry = JournalEntry::provisional(request_name, kind, parent);
        if !self.store.create(&entry).await? {
            // another process wrote the name between our read and write
            let existing = self.store.get(request_name).await?.ok_or_else(|| Error::Journal {
                request_name: request_name.to_string(),
                reason: "entry vanished after a conflicting create".into(),
            })?;
            return Ok(Reservation::Existing(existing));
        }

        info!(
            "Reserved {} {} for request {}",
            kind, entry.backend_id, request_name
        );
        Ok(Reservation::Minted(entry))
    }

    /// Identity of `request_name`, minting one when absent
    pub async fn allocate_identity(
        &self,
        request_name: &str,
        kind: ObjectKind,
        parent: Option<ParentRef>,
    ) -> Result<JournalEntry> {
        self.reserve(request_name, kind, parent)
            .await
            .map(Reservation::into_entry)
    }

    /// Current entry of `request_name`
    pub async fn lookup(&self, request_name: &str) -> Result<Option<JournalEntry>> {
        self.store.get(request_name).await
    }

    /// Entry holding `object_uuid`
    pub async fn lookup_by_uuid(&self, object_uuid: Uuid) -> Result<Option<JournalEntry>> {
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .find(|entry| entry.object_uuid == object_uuid))
    }

    /// Provisional -> Ready once the backend object exists
    pub async fn mark_ready(&self, entry: &JournalEntry) -> Result<JournalEntry> {
        let _section = self.locks.lock(&entry.request_name).await;
        let mut current = self.current(entry, "mark ready").await?;

        match current.state {
            EntryState::Ready => Ok(current),
            EntryState::Provisional => {
                current.state = EntryState::Ready;
                self.store.update(&current).await?;
                info!("Request {} is ready as {}", current.request_name, current.backend_id);
                Ok(current)
            }
            EntryState::Deleting => Err(invalid_state(&current, "mark ready")),
        }
    }

    /// Erase a provisional entry whose backend creation did not complete
    pub async fn rollback(&self, entry: &JournalEntry) -> Result<()> {
        let _section = self.locks.lock(&entry.request_name).await;

        let current = match self.store.get(&entry.request_name).await? {
            Some(current) => current,
            None => return Ok(()),
        };
        if !current.same_identity(entry) {
            warn!(
                "Not rolling back {}: journal now holds {}",
                entry.request_name, current.object_uuid
            );
            return Ok(());
        }
        if current.state != EntryState::Provisional {
            return Err(invalid_state(&current, "roll back"));
        }

        self.store.remove(&entry.request_name).await?;
        info!("Rolled back {} for request {}", entry.backend_id, entry.request_name);
        Ok(())
    }

    /// Ready -> Deleting before backend deletion starts
    ///
    /// An entry already deleting is returned as is so a retried delete can
    /// run backend deletion again.
    pub async fn begin_delete(&self, entry: &JournalEntry) -> Result<JournalEntry> {
        let _section = self.locks.lock(&entry.request_name).await;
        let mut current = self.current(entry, "delete").await?;

        match current.state {
            EntryState::Deleting => Ok(current),
            EntryState::Ready => {
                current.state = EntryState::Deleting;
                self.store.update(&current).await?;
                debug!("Request {} is deleting", current.request_name);
                Ok(current)
            }
            EntryState::Provisional => Err(invalid_state(&current, "delete")),
        }
    }

    /// Erase a deleting entry once its backend object is gone
    pub async fn release(&self, entry: &JournalEntry) -> Result<()> {
        let _section = self.locks.lock(&entry.request_name).await;

        let current = match self.store.get(&entry.request_name).await? {
            Some(current) => current,
            None => return Ok(()),
        };
        if !current.same_identity(entry) {
            return Err(invalid_state(&current, "release"));
        }
        if current.state != EntryState::Deleting {
            return Err(invalid_state(&current, "release"));
        }

        self.store.remove(&entry.request_name).await?;
        info!("Released {} for request {}", entry.backend_id, entry.request_name);
        Ok(())
    }

    /// Record volume group membership of a ready entry
    pub async fn set_group(
        &self,
        entry: &JournalEntry,
        group_id: Option<&str>,
    ) -> Result<JournalEntry> {
        let _section = self.locks.lock(&entry.request_name).await;
        let mut current = self.current(entry, "set volume group").await?;

        if current.state != EntryState::Ready {
            return Err(invalid_state(&current, "set volume group"));
        }

        current.group_id = group_id.map(str::to_string);
        self.store.update(&current).await?;
        Ok(current)
    }

    /// Provisional entries written more than `age` ago
    ///
    /// These are left behind when a process dies between reserving an
    /// identity and rolling it back.
    pub async fn provisional_older_than(&self, age: Duration) -> Result<Vec<JournalEntry>> {
        // nothing can be older than the representable range
        let cutoff = match chrono::Duration::from_std(age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        {
            Some(cutoff) => cutoff,
            None => return Ok(Vec::new()),
        };

        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|entry| entry.state == EntryState::Provisional && entry.created_at < cutoff)
            .collect())
    }

    /// Every journalled entry
    pub async fn entries(&self) -> Result<Vec<JournalEntry>> {
        self.store.list().await
    }

    /// Re-read `entry` and ensure it still holds the same identity
    async fn current(&self, entry: &JournalEntry, operation: &str) -> Result<JournalEntry> {
        let current = self
            .store
            .get(&entry.request_name)
            .await?
            .ok_or_else(|| Error::EntryNotFound {
                request_name: entry.request_name.clone(),
            })?;

        if !current.same_identity(entry) {
            return Err(invalid_state(&current, operation));
        }
        Ok(current)
    }
}

pub(crate) fn invalid_state(entry: &JournalEntry, operation: &str) -> Error {
    Error::InvalidState {
        request_name: entry.request_name.clone(),
        state: entry.state.to_string(),
        operation: operation.to_string(),
    }
}
