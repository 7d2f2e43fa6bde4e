//! In-Memory Journal Store
//!
//! Process-local store for tests and single-process deployments.

use crate::error::{Error, Result};
use crate::journal::entry::JournalEntry;
use crate::journal::store::JournalStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Journal store backed by an ordered map
#[derive(Debug, Default)]
pub struct MemoryJournalStore {
    entries: RwLock<BTreeMap<String, JournalEntry>>,
}

impl MemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl JournalStore for MemoryJournalStore {
    async fn get(&self, request_name: &str) -> Result<Option<JournalEntry>> {
        Ok(self.entries.read().get(request_name).cloned())
    }

    async fn create(&self, entry: &JournalEntry) -> Result<bool> {
        match self.entries.write().entry(entry.request_name.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                Ok(true)
            }
        }
    }

    async fn update(&self, entry: &JournalEntry) -> Result<()> {
        match self.entries.write().get_mut(&entry.request_name) {
            Some(current) => {
                *current = entry.clone();
                Ok(())
            }
            None => Err(Error::EntryNotFound {
                request_name: entry.request_name.clone(),
            }),
        }
    }

    async fn remove(&self, request_name: &str) -> Result<bool> {
        Ok(self.entries.write().remove(request_name).is_some())
    }

    async fn list(&self) -> Result<Vec<JournalEntry>> {
        Ok(self.entries.read().values().cloned().collect())
    }
}
