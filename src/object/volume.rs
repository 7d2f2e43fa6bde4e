//! Volumes
//!
//! Block images and subvolumes provisioned for a CreateVolume request.

use crate::domain::CreateRequest;
use crate::error::Result;
use crate::exec::OperationContext;
use crate::journal::ObjectKind;
use crate::object::{ContentSource, CsiVolume, JournalledObject, ObjectContext, ObjectCore};
use std::collections::BTreeMap;

#[derive(Debug)]
pub struct Volume {
    core: ObjectCore,
}

impl Volume {
    /// Provision an empty volume for `request_name`, idempotently
    pub async fn create(
        op: &OperationContext,
        objects: &ObjectContext,
        request_name: &str,
        size_bytes: u64,
    ) -> Result<Self> {
        let request = CreateRequest {
            size_bytes: Some(size_bytes),
            source: None,
        };
        ObjectCore::provision(op, objects, request_name, ObjectKind::Volume, request)
            .await
            .map(|core| Self { core })
    }

    /// Provision a volume cloned from a volume or restored from a snapshot
    pub async fn create_from<S: JournalledObject>(
        op: &OperationContext,
        objects: &ObjectContext,
        request_name: &str,
        size_bytes: Option<u64>,
        source: &S,
    ) -> Result<Self> {
        let request = CreateRequest {
            size_bytes,
            source: Some(source.entry().clone()),
        };
        ObjectCore::provision(op, objects, request_name, ObjectKind::Volume, request)
            .await
            .map(|core| Self { core })
    }

    pub async fn open(
        op: &OperationContext,
        objects: &ObjectContext,
        request_name: &str,
    ) -> Result<Self> {
        ObjectCore::open(op, objects, request_name, ObjectKind::Volume)
            .await
            .map(|core| Self { core })
    }

    pub async fn open_by_id(
        op: &OperationContext,
        objects: &ObjectContext,
        volume_id: &str,
    ) -> Result<Self> {
        ObjectCore::open_by_id(op, objects, volume_id, ObjectKind::Volume)
            .await
            .map(|core| Self { core })
    }

    pub fn size_bytes(&self) -> u64 {
        self.core.size_bytes().unwrap_or_default()
    }
}

impl JournalledObject for Volume {
    type Descriptor = CsiVolume;

    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn to_csi(&self) -> Result<CsiVolume> {
        let content_source = match (self.entry().parent, self.core.parent_csi_id()?) {
            (Some(parent), Some(id)) => Some(match parent.kind {
                ObjectKind::Volume => ContentSource::Volume { volume_id: id },
                ObjectKind::Snapshot => ContentSource::Snapshot { snapshot_id: id },
            }),
            _ => None,
        };

        let cluster = &self.core.objects().cluster;
        let mut volume_context = BTreeMap::new();
        volume_context.insert("clusterID".to_string(), cluster.cluster_id.clone());
        volume_context.insert("imageName".to_string(), self.name().to_string());
        if let Some(namespace) = &cluster.rados_namespace {
            volume_context.insert("radosNamespace".to_string(), namespace.clone());
        }

        Ok(CsiVolume {
            volume_id: self.id()?,
            capacity_bytes: self.size_bytes(),
            content_source,
            volume_context,
        })
    }
}
