//! Cluster Records
//!
//! Typed view of one entry in the cluster configuration document.

use serde::{Deserialize, Serialize};

/// Default CephFS subvolume group when a record does not name one
pub const DEFAULT_SUBVOLUME_GROUP: &str = "csi";

/// Default number of rbd-mirror daemons per cluster
pub const DEFAULT_MIRROR_DAEMON_COUNT: u32 = 1;

// =============================================================================
// Backend Kind
// =============================================================================

/// Backend a request is served by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Rbd,
    CephFs,
    Nfs,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Rbd => "rbd",
            BackendKind::CephFs => "cephfs",
            BackendKind::Nfs => "nfs",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rbd" => Ok(BackendKind::Rbd),
            "cephfs" => Ok(BackendKind::CephFs),
            "nfs" => Ok(BackendKind::Nfs),
            other => Err(format!("unknown backend kind: {}", other)),
        }
    }
}

// =============================================================================
// Record Sections
// =============================================================================

/// RBD specific settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RbdSection {
    #[serde(default)]
    pub net_namespace_file_path: String,
    #[serde(default)]
    pub rados_namespace: String,
    /// Absent when the document omits the field
    #[serde(default)]
    pub mirror_daemon_count: Option<u32>,
}

/// CephFS specific settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CephFsSection {
    #[serde(default)]
    pub net_namespace_file_path: String,
    #[serde(default)]
    pub subvolume_group: String,
    #[serde(default)]
    pub rados_namespace: String,
    #[serde(default)]
    pub kernel_mount_options: String,
    #[serde(default)]
    pub fuse_mount_options: String,
}

/// NFS specific settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfsSection {
    #[serde(default)]
    pub net_namespace_file_path: String,
}

/// Topology hints for replica reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadAffinity {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub crush_location_labels: Vec<String>,
}

// =============================================================================
// Cluster Record
// =============================================================================

/// One cluster entry of the configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    #[serde(rename = "clusterID")]
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitors: Option<Vec<String>>,
    #[serde(default)]
    pub rbd: RbdSection,
    #[serde(default, rename = "cephFS", alias = "cephfs")]
    pub cephfs: CephFsSection,
    #[serde(default)]
    pub nfs: NfsSection,
    #[serde(default, rename = "readAffinity")]
    pub read_affinity: ReadAffinity,
}

impl ClusterRecord {
    pub fn new(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            monitors: None,
            rbd: RbdSection::default(),
            cephfs: CephFsSection::default(),
            nfs: NfsSection::default(),
            read_affinity: ReadAffinity::default(),
        }
    }

    pub fn with_monitors<I, S>(mut self, monitors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.monitors = Some(monitors.into_iter().map(Into::into).collect());
        self
    }

    /// Net-namespace path configured for a backend, empty when unset
    pub fn net_namespace_file_path(&self, kind: BackendKind) -> &str {
        match kind {
            BackendKind::Rbd => &self.rbd.net_namespace_file_path,
            BackendKind::CephFs => &self.cephfs.net_namespace_file_path,
            BackendKind::Nfs => &self.nfs.net_namespace_file_path,
        }
    }

    /// Rados namespace configured for a backend, NFS has none
    pub fn rados_namespace(&self, kind: BackendKind) -> &str {
        match kind {
            BackendKind::Rbd => &self.rbd.rados_namespace,
            BackendKind::CephFs => &self.cephfs.rados_namespace,
            BackendKind::Nfs => "",
        }
    }
}
