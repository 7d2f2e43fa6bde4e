//! Cluster Configuration Store
//!
//! Reads the cluster configuration document from disk. Nothing is cached:
//! every lookup re-reads and re-parses the file so edits made by the
//! orchestrator are picked up on the next request.

use crate::config::record::ClusterRecord;
use crate::error::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Default location of the cluster configuration document
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ceph-csi-config/config.json";

/// Raw access to the cluster configuration document
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the document into its ordered raw records
    ///
    /// A zero-byte file is invalid JSON and fails here, while a valid empty
    /// array parses to no records.
    pub async fn load(&self) -> Result<Vec<Value>> {
        let content = fs::read(&self.path).await.map_err(|e| Error::ConfigUnreadable {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let records: Vec<Value> =
            serde_json::from_slice(&content).map_err(|e| Error::ConfigUnreadable {
                path: self.path.clone(),
                reason: format!("invalid cluster configuration: {}", e),
            })?;

        debug!("Loaded {} cluster records from {}", records.len(), self.path.display());
        Ok(records)
    }

    /// Find the first record whose `clusterID` matches
    ///
    /// Records without a string `clusterID` never match. The matched record
    /// is decoded strictly; any field of the wrong type is a
    /// [`Error::MalformedRecord`].
    pub async fn find(&self, cluster_id: &str) -> Result<ClusterRecord> {
        let records = self.load().await?;

        let raw = records
            .into_iter()
            .find(|record| record_cluster_id(record) == Some(cluster_id))
            .ok_or_else(|| Error::ClusterNotFound {
                cluster_id: cluster_id.to_string(),
                path: self.path.clone(),
            })?;

        serde_json::from_value(raw).map_err(|e| Error::MalformedRecord {
            cluster_id: cluster_id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Find the first record listing any of the given monitors
    pub async fn find_by_monitor(&self, monitors: &[&str]) -> Result<String> {
        let records = self.load().await?;

        records
            .iter()
            .find(|record| {
                record
                    .get("monitors")
                    .and_then(Value::as_array)
                    .map(|listed| {
                        listed
                            .iter()
                            .filter_map(Value::as_str)
                            .any(|mon| monitors.contains(&mon))
                    })
                    .unwrap_or(false)
            })
            .and_then(record_cluster_id)
            .map(str::to_string)
            .ok_or_else(|| Error::ClusterNotFound {
                cluster_id: format!("monitors={}", monitors.join(",")),
                path: self.path.clone(),
            })
    }
}

fn record_cluster_id(record: &Value) -> Option<&str> {
    record.get("clusterID").and_then(Value::as_str)
}
