//! Journal Entries
//!
//! Durable record binding a request name to a backend object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Object Kind
// =============================================================================

/// Kind of storage object an entry identifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Volume,
    Snapshot,
}

impl ObjectKind {
    /// Prefix of backend object names of this kind
    pub fn name_prefix(&self) -> &'static str {
        match self {
            ObjectKind::Volume => "csi-vol-",
            ObjectKind::Snapshot => "csi-snap-",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Volume => write!(f, "volume"),
            ObjectKind::Snapshot => write!(f, "snapshot"),
        }
    }
}

// =============================================================================
// Entry State
// =============================================================================

/// Lifecycle state of a journal entry
///
/// `Provisional -> Ready -> Deleting -> (erased)`, or
/// `Provisional -> (erased)` on rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    Provisional,
    Ready,
    Deleting,
}

impl EntryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Provisional => "provisional",
            EntryState::Ready => "ready",
            EntryState::Deleting => "deleting",
        }
    }
}

impl std::fmt::Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Journal Entry
// =============================================================================

/// Object an entry was created from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub uuid: Uuid,
    pub kind: ObjectKind,
}

/// Durable name-to-identity binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    /// Caller supplied name, stable across retries
    pub request_name: String,
    /// Backend object name
    #[serde(rename = "backendID")]
    pub backend_id: String,
    #[serde(rename = "objectUUID")]
    pub object_uuid: Uuid,
    pub kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    pub state: EntryState,
    #[serde(default, rename = "groupID", skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// New provisional entry with a freshly minted UUID
    pub fn provisional(
        request_name: impl Into<String>,
        kind: ObjectKind,
        parent: Option<ParentRef>,
    ) -> Self {
        let object_uuid = Uuid::new_v4();
        Self {
            request_name: request_name.into(),
            backend_id: format!("{}{}", kind.name_prefix(), object_uuid),
            object_uuid,
            kind,
            parent,
            state: EntryState::Provisional,
            group_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn parent_uuid(&self) -> Option<Uuid> {
        self.parent.map(|p| p.uuid)
    }

    pub fn is_ready(&self) -> bool {
        self.state == EntryState::Ready
    }

    /// Whether `other` refers to the same minted identity
    pub fn same_identity(&self, other: &JournalEntry) -> bool {
        self.request_name == other.request_name && self.object_uuid == other.object_uuid
    }

    /// Reference usable as the parent of a derived object
    pub fn as_parent(&self) -> ParentRef {
        ParentRef {
            uuid: self.object_uuid,
            kind: self.kind,
        }
    }
}
