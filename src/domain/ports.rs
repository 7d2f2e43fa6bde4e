//! Domain Ports - Backend command templates
//!
//! The concrete tooling invocations that create, inspect and delete images,
//! subvolumes and exports live outside this crate. Adapters implement
//! [`BackendCommands`] to supply them; the object lifecycle runs whatever
//! they return through the bounded executor.

use crate::config::ClusterContext;
use crate::error::{Error, Result};
use crate::exec::CommandSpec;
use crate::journal::JournalEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Create Request
// =============================================================================

/// Parameters of a backend object creation
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    /// Requested size, `None` to inherit from the source
    pub size_bytes: Option<u64>,
    /// Object the new one is cloned or snapshotted from
    pub source: Option<JournalEntry>,
}

// =============================================================================
// Object Info
// =============================================================================

/// Live metadata of a backend object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    #[serde(rename = "size")]
    pub size_bytes: u64,
    #[serde(default, rename = "create_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "group")]
    pub group_id: Option<String>,
}

// =============================================================================
// Backend Commands Port
// =============================================================================

/// Port supplying backend tool invocations for journalled objects
pub trait BackendCommands: Send + Sync {
    /// Create the backend object named by `entry`
    fn create(
        &self,
        cluster: &ClusterContext,
        entry: &JournalEntry,
        request: &CreateRequest,
    ) -> CommandSpec;

    /// Delete the backend object named by `entry`
    fn delete(&self, cluster: &ClusterContext, entry: &JournalEntry) -> CommandSpec;

    /// Print metadata of the backend object named by `entry`
    fn info(&self, cluster: &ClusterContext, entry: &JournalEntry) -> CommandSpec;

    /// Add the backend object to a volume group
    fn set_group(
        &self,
        cluster: &ClusterContext,
        entry: &JournalEntry,
        group_id: &str,
    ) -> CommandSpec;

    /// Parse the output of [`BackendCommands::info`]
    fn parse_info(&self, entry: &JournalEntry, output: &str) -> Result<ObjectInfo> {
        serde_json::from_str(output).map_err(|e| {
            Error::Internal(format!(
                "unparsable info output for {}: {}",
                entry.backend_id, e
            ))
        })
    }
}

pub type BackendCommandsRef = Arc<dyn BackendCommands>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::ObjectKind;

    struct NoCommands;

    impl BackendCommands for NoCommands {
        fn create(&self, _: &ClusterContext, _: &JournalEntry, _: &CreateRequest) -> CommandSpec {
            CommandSpec::new("true")
        }
        fn delete(&self, _: &ClusterContext, _: &JournalEntry) -> CommandSpec {
            CommandSpec::new("true")
        }
        fn info(&self, _: &ClusterContext, _: &JournalEntry) -> CommandSpec {
            CommandSpec::new("true")
        }
        fn set_group(&self, _: &ClusterContext, _: &JournalEntry, _: &str) -> CommandSpec {
            CommandSpec::new("true")
        }
    }

    #[test]
    fn test_default_info_parsing() {
        let entry = JournalEntry::provisional("pvc-1", ObjectKind::Volume, None);
        let output = r#"{"size": 1073741824, "create_timestamp": "2024-03-01T10:00:00Z",
            "features": ["layering"]}"#;
        let info = NoCommands.parse_info(&entry, output).unwrap();
        assert_eq!(info.size_bytes, 1 << 30);
        assert_eq!(info.created_at.unwrap().to_rfc3339(), "2024-03-01T10:00:00+00:00");
        assert!(info.group_id.is_none());

        assert!(NoCommands.parse_info(&entry, "not json").is_err());
    }
}
