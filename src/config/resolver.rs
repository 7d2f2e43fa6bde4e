//! Cluster Configuration Resolver
//!
//! Typed accessors over the configuration document. Every accessor shares the
//! same rules:
//!
//! - the document is re-read on each call
//! - the first record whose `clusterID` matches is used
//! - documented defaults apply only to absent fields, a field of the wrong
//!   type is an error

use crate::config::record::{
    BackendKind, ClusterRecord, DEFAULT_MIRROR_DAEMON_COUNT, DEFAULT_SUBVOLUME_GROUP,
};
use crate::config::store::ConfigStore;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

// =============================================================================
// Cluster Context
// =============================================================================

/// Resolved connection and policy profile for one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterContext {
    pub cluster_id: String,
    pub backend: BackendKind,
    pub monitors: Vec<String>,
    /// Network namespace commands for this cluster must run in
    pub net_namespace: Option<PathBuf>,
    pub rados_namespace: Option<String>,
}

impl ClusterContext {
    /// Monitors in the comma-joined form the ceph tools accept
    pub fn monitors_arg(&self) -> String {
        self.monitors.join(",")
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Per-call resolver bound to one configuration document
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    store: ConfigStore,
}

impl ConfigResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: ConfigStore::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    /// Comma-joined monitor list of a cluster
    pub async fn monitors(&self, cluster_id: &str) -> Result<String> {
        let record = self.store.find(cluster_id).await?;
        Ok(validated_monitors(&record)?.join(","))
    }

    /// Net-namespace path for a backend, empty when not configured
    pub async fn net_namespace_file_path(
        &self,
        cluster_id: &str,
        kind: BackendKind,
    ) -> Result<String> {
        let record = self.store.find(cluster_id).await?;
        Ok(record.net_namespace_file_path(kind).to_string())
    }

    /// CephFS (kernel, fuse) mount options
    pub async fn cephfs_mount_options(&self, cluster_id: &str) -> Result<(String, String)> {
        let record = self.store.find(cluster_id).await?;
        Ok((
            record.cephfs.kernel_mount_options,
            record.cephfs.fuse_mount_options,
        ))
    }

    /// Number of rbd-mirror daemons, 1 when not configured
    pub async fn mirror_daemon_count(&self, cluster_id: &str) -> Result<u32> {
        let record = self.store.find(cluster_id).await?;
        Ok(match record.rbd.mirror_daemon_count {
            Some(count) if count > 0 => count,
            _ => DEFAULT_MIRROR_DAEMON_COUNT,
        })
    }

    /// Read affinity state and comma-joined crush location labels
    ///
    /// Labels are only reported while read affinity is enabled.
    pub async fn crush_location_labels(&self, cluster_id: &str) -> Result<(bool, String)> {
        let record = self.store.find(cluster_id).await?;
        if !record.read_affinity.enabled {
            return Ok((false, String::new()));
        }

        Ok((true, record.read_affinity.crush_location_labels.join(",")))
    }

    /// Rados namespace for a backend, empty when not configured
    pub async fn rados_namespace(&self, cluster_id: &str, kind: BackendKind) -> Result<String> {
        let record = self.store.find(cluster_id).await?;
        Ok(record.rados_namespace(kind).to_string())
    }

    /// CephFS subvolume group, `csi` when not configured
    pub async fn cephfs_subvolume_group(&self, cluster_id: &str) -> Result<String> {
        let record = self.store.find(cluster_id).await?;
        if record.cephfs.subvolume_group.is_empty() {
            return Ok(DEFAULT_SUBVOLUME_GROUP.to_string());
        }
        Ok(record.cephfs.subvolume_group)
    }

    /// Cluster ID of the first record sharing a monitor with `monitors`
    pub async fn cluster_id_for_monitors(&self, monitors: &str) -> Result<String> {
        let wanted: Vec<&str> = monitors
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .collect();
        self.store.find_by_monitor(&wanted).await
    }

    /// Resolve everything an operation on `kind` needs in one read
    pub async fn cluster_context(
        &self,
        cluster_id: &str,
        kind: BackendKind,
    ) -> Result<ClusterContext> {
        let record = self.store.find(cluster_id).await?;
        let monitors = validated_monitors(&record)?.to_vec();

        let net_namespace = match record.net_namespace_file_path(kind) {
            "" => None,
            path => Some(PathBuf::from(path)),
        };
        let rados_namespace = match record.rados_namespace(kind) {
            "" => None,
            ns => Some(ns.to_string()),
        };

        debug!(
            "Resolved cluster {} for {} ({} monitors, netns: {:?})",
            cluster_id,
            kind,
            monitors.len(),
            net_namespace
        );

        Ok(ClusterContext {
            cluster_id: record.cluster_id,
            backend: kind,
            monitors,
            net_namespace,
            rados_namespace,
        })
    }
}

fn validated_monitors(record: &ClusterRecord) -> Result<&[String]> {
    match record.monitors.as_deref() {
        None => Err(Error::MalformedRecord {
            cluster_id: record.cluster_id.clone(),
            reason: "missing monitors".into(),
        }),
        Some([]) => Err(Error::MalformedRecord {
            cluster_id: record.cluster_id.clone(),
            reason: "empty monitors list".into(),
        }),
        Some(monitors) => Ok(monitors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::record::{CephFsSection, NfsSection, RbdSection, ReadAffinity};
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    async fn resolver_for(tmp: &TempDir, data: &str) -> ConfigResolver {
        let path = tmp.path().join("config.json");
        tokio::fs::write(&path, data).await.unwrap();
        ConfigResolver::new(path)
    }

    async fn resolver_for_records(tmp: &TempDir, records: &[ClusterRecord]) -> ConfigResolver {
        resolver_for(tmp, &serde_json::to_string(records).unwrap()).await
    }

    #[tokio::test]
    async fn test_monitors() {
        let tmp = TempDir::new().unwrap();

        let resolver = ConfigResolver::new(tmp.path().join("config.json"));
        assert_matches!(resolver.monitors("test1").await, Err(Error::ConfigUnreadable { .. }));

        let resolver = resolver_for(&tmp, "").await;
        assert_matches!(resolver.monitors("test1").await, Err(Error::ConfigUnreadable { .. }));

        let resolver =
            resolver_for(&tmp, r#"[{"clusterID":"test2","monitorsBad":["mon1","mon2"]}]"#).await;
        assert_matches!(resolver.monitors("test2").await, Err(Error::MalformedRecord { .. }));

        let resolver =
            resolver_for(&tmp, r#"[{"clusterID":"test2","monitors":["mon1",2,"mon3"]}]"#).await;
        assert_matches!(resolver.monitors("test2").await, Err(Error::MalformedRecord { .. }));

        let resolver = resolver_for(&tmp, r#"[{"clusterID":"test2","monitors":[]}]"#).await;
        assert_matches!(resolver.monitors("test2").await, Err(Error::MalformedRecord { .. }));

        let resolver = resolver_for(
            &tmp,
            r#"[{"clusterID":"test2","monitors":["mon1","mon2","mon3"]},
                {"clusterID":"test1","monitors":["mon4","mon5","mon6"]}]"#,
        )
        .await;
        assert_eq!(resolver.monitors("test2").await.unwrap(), "mon1,mon2,mon3");
        assert_eq!(resolver.monitors("test1").await.unwrap(), "mon4,mon5,mon6");
        assert_matches!(resolver.monitors("test3").await, Err(Error::ClusterNotFound { .. }));
    }

    #[tokio::test]
    async fn test_monitors_single_cluster() {
        let tmp = TempDir::new().unwrap();
        let data = r#"[{"clusterID":"c1","monitors":["m1","m2","m3"]}]"#;
        let resolver = resolver_for(&tmp, data).await;

        let first = resolver.monitors("c1").await.unwrap();
        let second = resolver.monitors("c1").await.unwrap();
        assert_eq!(first, "m1,m2,m3");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_net_namespace_file_path() {
        let tmp = TempDir::new().unwrap();
        let records = vec![
            ClusterRecord {
                rbd: RbdSection {
                    net_namespace_file_path: "/var/lib/kubelet/plugins/rbd.ceph.csi.com/cluster1-net"
                        .into(),
                    ..Default::default()
                },
                cephfs: CephFsSection {
                    net_namespace_file_path:
                        "/var/lib/kubelet/plugins/cephfs.ceph.csi.com/cluster1-net".into(),
                    ..Default::default()
                },
                nfs: NfsSection {
                    net_namespace_file_path: "/var/lib/kubelet/plugins/nfs.ceph.csi.com/cluster1-net"
                        .into(),
                },
                ..ClusterRecord::new("cluster-1").with_monitors(["ip-1", "ip-2"])
            },
            ClusterRecord::new("cluster-3").with_monitors(["ip-5", "ip-6"]),
        ];
        let resolver = resolver_for_records(&tmp, &records).await;

        assert_eq!(
            resolver.net_namespace_file_path("cluster-1", BackendKind::Rbd).await.unwrap(),
            "/var/lib/kubelet/plugins/rbd.ceph.csi.com/cluster1-net"
        );
        assert_eq!(
            resolver.net_namespace_file_path("cluster-1", BackendKind::CephFs).await.unwrap(),
            "/var/lib/kubelet/plugins/cephfs.ceph.csi.com/cluster1-net"
        );
        assert_eq!(
            resolver.net_namespace_file_path("cluster-1", BackendKind::Nfs).await.unwrap(),
            "/var/lib/kubelet/plugins/nfs.ceph.csi.com/cluster1-net"
        );
        for kind in [BackendKind::Rbd, BackendKind::CephFs, BackendKind::Nfs] {
            assert_eq!(resolver.net_namespace_file_path("cluster-3", kind).await.unwrap(), "");
        }
        assert_matches!(
            resolver.net_namespace_file_path("cluster-9", BackendKind::Rbd).await,
            Err(Error::ClusterNotFound { .. })
        );
    }

    #[tokio::test]
    async fn test_cephfs_mount_options() {
        let tmp = TempDir::new().unwrap();
        let records = vec![
            ClusterRecord {
                cephfs: CephFsSection {
                    kernel_mount_options: "crc".into(),
                    fuse_mount_options: "ro".into(),
                    ..Default::default()
                },
                ..ClusterRecord::new("cluster-1")
            },
            ClusterRecord::new("cluster-3"),
        ];
        let resolver = resolver_for_records(&tmp, &records).await;

        assert_eq!(
            resolver.cephfs_mount_options("cluster-1").await.unwrap(),
            ("crc".to_string(), "ro".to_string())
        );
        assert_eq!(
            resolver.cephfs_mount_options("cluster-3").await.unwrap(),
            (String::new(), String::new())
        );
    }

    #[tokio::test]
    async fn test_mirror_daemon_count() {
        let tmp = TempDir::new().unwrap();
        let data = r#"[
            {"clusterID":"cluster-1","rbd":{"mirrorDaemonCount":2}},
            {"clusterID":"cluster-2","rbd":{"mirrorDaemonCount":4}},
            {"clusterID":"c3","monitors":["ip-5"]}
        ]"#;
        let resolver = resolver_for(&tmp, data).await;

        assert_eq!(resolver.mirror_daemon_count("cluster-1").await.unwrap(), 2);
        assert_eq!(resolver.mirror_daemon_count("cluster-2").await.unwrap(), 4);
        assert_eq!(resolver.mirror_daemon_count("c3").await.unwrap(), 1);

        // no coercion from a string encoded count
        let data = data.replace(r#""mirrorDaemonCount":2"#, r#""mirrorDaemonCount":"2""#);
        let resolver = resolver_for(&tmp, &data).await;
        assert_matches!(
            resolver.mirror_daemon_count("cluster-1").await,
            Err(Error::MalformedRecord { .. })
        );
        assert_matches!(
            resolver.mirror_daemon_count("test").await,
            Err(Error::ClusterNotFound { .. })
        );
    }

    #[tokio::test]
    async fn test_crush_location_labels() {
        let tmp = TempDir::new().unwrap();
        let records = vec![
            ClusterRecord {
                read_affinity: ReadAffinity {
                    enabled: true,
                    crush_location_labels: vec![
                        "topology.kubernetes.io/region".into(),
                        "topology.kubernetes.io/zone".into(),
                        "topology.io/rack".into(),
                    ],
                },
                ..ClusterRecord::new("cluster-1")
            },
            ClusterRecord {
                read_affinity: ReadAffinity {
                    enabled: false,
                    crush_location_labels: vec!["topology.io/rack".into()],
                },
                ..ClusterRecord::new("cluster-3")
            },
            ClusterRecord::new("cluster-4"),
        ];
        let resolver = resolver_for_records(&tmp, &records).await;

        assert_eq!(
            resolver.crush_location_labels("cluster-1").await.unwrap(),
            (
                true,
                "topology.kubernetes.io/region,topology.kubernetes.io/zone,topology.io/rack".to_string()
            )
        );
        assert_eq!(
            resolver.crush_location_labels("cluster-3").await.unwrap(),
            (false, String::new())
        );
        assert_eq!(
            resolver.crush_location_labels("cluster-4").await.unwrap(),
            (false, String::new())
        );
    }

    #[tokio::test]
    async fn test_subvolume_group_and_rados_namespace() {
        let tmp = TempDir::new().unwrap();
        let data = r#"[
            {"clusterID":"a","cephFS":{"subvolumeGroup":"tenants","radosNamespace":"fsns"},
             "rbd":{"radosNamespace":"blockns"}},
            {"clusterID":"b"}
        ]"#;
        let resolver = resolver_for(&tmp, data).await;

        assert_eq!(resolver.cephfs_subvolume_group("a").await.unwrap(), "tenants");
        assert_eq!(resolver.cephfs_subvolume_group("b").await.unwrap(), "csi");
        assert_eq!(resolver.rados_namespace("a", BackendKind::Rbd).await.unwrap(), "blockns");
        assert_eq!(resolver.rados_namespace("a", BackendKind::CephFs).await.unwrap(), "fsns");
        assert_eq!(resolver.rados_namespace("b", BackendKind::Rbd).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_cluster_context() {
        let tmp = TempDir::new().unwrap();
        let data = r#"[{"clusterID":"c1","monitors":["m1","m2"],
            "rbd":{"netNamespaceFilePath":"/run/netns/c1","radosNamespace":"ns1"}}]"#;
        let resolver = resolver_for(&tmp, data).await;

        let rbd = resolver.cluster_context("c1", BackendKind::Rbd).await.unwrap();
        assert_eq!(rbd.monitors_arg(), "m1,m2");
        assert_eq!(rbd.net_namespace, Some(PathBuf::from("/run/netns/c1")));
        assert_eq!(rbd.rados_namespace.as_deref(), Some("ns1"));

        let nfs = resolver.cluster_context("c1", BackendKind::Nfs).await.unwrap();
        assert_eq!(nfs.net_namespace, None);
        assert_eq!(nfs.rados_namespace, None);
    }

    #[tokio::test]
    async fn test_cluster_id_for_monitors() {
        let tmp = TempDir::new().unwrap();
        let resolver = resolver_for(
            &tmp,
            r#"[{"clusterID":"c1","monitors":["m1"]},{"clusterID":"c2","monitors":["m2","m3"]}]"#,
        )
        .await;
        assert_eq!(resolver.cluster_id_for_monitors("m3, m4").await.unwrap(), "c2");
    }
}
