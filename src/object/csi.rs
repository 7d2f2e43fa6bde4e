//! CSI descriptors of journalled objects

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// What a volume was provisioned from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentSource {
    Volume {
        #[serde(rename = "volumeId")]
        volume_id: String,
    },
    Snapshot {
        #[serde(rename = "snapshotId")]
        snapshot_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsiVolume {
    pub volume_id: String,
    pub capacity_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_source: Option<ContentSource>,
    pub volume_context: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsiSnapshot {
    pub snapshot_id: String,
    pub source_volume_id: String,
    pub creation_time: Option<DateTime<Utc>>,
    pub size_bytes: u64,
    pub ready_to_use: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_snapshot_id: Option<String>,
}
