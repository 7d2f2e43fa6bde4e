//! Snapshots of journalled volumes

use crate::domain::CreateRequest;
use crate::error::{Error, Result};
use crate::exec::OperationContext;
use crate::journal::ObjectKind;
use crate::object::{CsiSnapshot, JournalledObject, ObjectContext, ObjectCore, Volume};

#[derive(Debug)]
pub struct Snapshot {
    core: ObjectCore,
}

impl Snapshot {
    /// Snapshot `source` for `request_name`, idempotently
    pub async fn create(
        op: &OperationContext,
        objects: &ObjectContext,
        request_name: &str,
        source: &Volume,
    ) -> Result<Self> {
        let request = CreateRequest {
            size_bytes: None,
            source: Some(source.entry().clone()),
        };
        ObjectCore::provision(op, objects, request_name, ObjectKind::Snapshot, request)
            .await
            .map(|core| Self { core })
    }

    pub async fn open(
        op: &OperationContext,
        objects: &ObjectContext,
        request_name: &str,
    ) -> Result<Self> {
        ObjectCore::open(op, objects, request_name, ObjectKind::Snapshot)
            .await
            .map(|core| Self { core })
    }

    pub async fn open_by_id(
        op: &OperationContext,
        objects: &ObjectContext,
        snapshot_id: &str,
    ) -> Result<Self> {
        ObjectCore::open_by_id(op, objects, snapshot_id, ObjectKind::Snapshot)
            .await
            .map(|core| Self { core })
    }

    /// CSI identifier of the volume this snapshot was taken from
    pub fn source_volume_id(&self) -> Result<String> {
        self.core.parent_csi_id()?.ok_or_else(|| {
            Error::Internal(format!("snapshot {} has no source volume", self.name()))
        })
    }
}

impl JournalledObject for Snapshot {
    type Descriptor = CsiSnapshot;

    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObjectCore {
        &mut self.core
    }

    fn to_csi(&self) -> Result<CsiSnapshot> {
        Ok(CsiSnapshot {
            snapshot_id: self.id()?,
            source_volume_id: self.source_volume_id()?,
            creation_time: self.creation_time(),
            size_bytes: self.core.size_bytes().unwrap_or_default(),
            ready_to_use: self.entry().is_ready(),
            group_snapshot_id: self.entry().group_id.clone(),
        })
    }
}
