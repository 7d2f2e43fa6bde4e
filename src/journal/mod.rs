//! Object identity journal
//!
//! Durable mapping from protocol request names to backend object identities,
//! plus the CSI identifiers handed out for them.

pub mod entry;
pub mod identifier;
pub mod locks;
pub mod registry;
pub mod store;

pub use entry::{EntryState, JournalEntry, ObjectKind, ParentRef};
pub use identifier::CsiIdentifier;
pub use locks::KeyedLocks;
pub use registry::{Journal, Reservation};
pub use store::{FileJournalStore, JournalStore, JournalStoreRef, MemoryJournalStore};
