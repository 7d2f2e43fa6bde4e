//! Journal Storage Backends
//!
//! Durable homes for journal entries, keyed by request name.

mod file;
mod memory;

pub use file::{FileJournalStore, FileJournalStoreConfig};
pub use memory::MemoryJournalStore;

use crate::error::Result;
use crate::journal::entry::JournalEntry;
use async_trait::async_trait;
use std::sync::Arc;

// =============================================================================
// JournalStore Trait
// =============================================================================

/// Persistence port of the journal
///
/// Implementations only need per-name atomicity of `create` and `remove`.
/// Serialization of concurrent callers for one name is the journal's job.
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Get the entry of a request name
    async fn get(&self, request_name: &str) -> Result<Option<JournalEntry>>;

    /// Store a new entry unless one already exists for its request name
    ///
    /// Returns `false` without writing when the name is taken.
    async fn create(&self, entry: &JournalEntry) -> Result<bool>;

    /// Replace an existing entry
    async fn update(&self, entry: &JournalEntry) -> Result<()>;

    /// Erase the entry of a request name
    ///
    /// Returns whether an entry existed.
    async fn remove(&self, request_name: &str) -> Result<bool>;

    /// All entries, ordered by request name
    async fn list(&self) -> Result<Vec<JournalEntry>>;
}

/// Type alias for shared journal stores
pub type JournalStoreRef = Arc<dyn JournalStore>;
