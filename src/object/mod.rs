//! Journalled storage objects
//!
//! Volumes and snapshots whose identity lives in the journal and whose
//! backend state is driven through bounded external commands.

pub mod csi;
pub mod lifecycle;
pub mod snapshot;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

pub use csi::{ContentSource, CsiSnapshot, CsiVolume};
pub use lifecycle::ObjectCore;
pub use snapshot::Snapshot;
pub use volume::Volume;

use crate::config::ClusterContext;
use crate::domain::BackendCommandsRef;
use crate::error::Result;
use crate::exec::{CommandExecutor, CommandSpec, OperationContext};
use crate::journal::{Journal, JournalEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Object lifecycle tuning
#[derive(Debug, Clone)]
pub struct ObjectConfig {
    /// Bound on every backend command
    pub command_timeout: Duration,
    /// Location (pool ID) encoded into CSI identifiers
    pub location_id: i64,
    /// Longest wait on a provisional entry owned by another request
    pub provisional_wait: Duration,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(120),
            location_id: 0,
            provisional_wait: Duration::from_secs(30),
        }
    }
}

/// Everything an object needs to reach its cluster and journal
#[derive(Clone)]
pub struct ObjectContext {
    pub cluster: ClusterContext,
    pub journal: Arc<Journal>,
    pub executor: Arc<CommandExecutor>,
    pub commands: BackendCommandsRef,
    pub config: ObjectConfig,
}

impl ObjectContext {
    pub fn new(
        cluster: ClusterContext,
        journal: Arc<Journal>,
        executor: Arc<CommandExecutor>,
        commands: BackendCommandsRef,
    ) -> Self {
        Self {
            cluster,
            journal,
            executor,
            commands,
            config: ObjectConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ObjectConfig) -> Self {
        self.config = config;
        self
    }

    fn prepare(&self, spec: CommandSpec) -> CommandSpec {
        self.executor.prepare(spec, &self.cluster)
    }
}

/// Behaviour shared by every journalled object
#[async_trait]
pub trait JournalledObject: Send + Sync {
    /// Protocol-facing projection of the object
    type Descriptor;

    fn core(&self) -> &ObjectCore;

    fn core_mut(&mut self) -> &mut ObjectCore;

    /// Protocol-facing description, without any backend round trip
    fn to_csi(&self) -> Result<Self::Descriptor>;

    fn entry(&self) -> &JournalEntry {
        self.core().entry()
    }

    /// CSI identifier handed to the orchestrator
    fn id(&self) -> Result<String> {
        self.core().csi_id()
    }

    /// Backend object name
    fn name(&self) -> &str {
        &self.entry().backend_id
    }

    fn cluster_id(&self) -> &str {
        &self.core().objects().cluster.cluster_id
    }

    fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.core().creation_time()
    }

    async fn refresh(&mut self, op: &OperationContext) -> Result<()> {
        self.core_mut().refresh(op).await
    }

    /// Remove the backend object and its journal entry
    async fn delete(&mut self, op: &OperationContext) -> Result<()> {
        self.core_mut().delete(op).await
    }

    async fn set_volume_group(&mut self, op: &OperationContext, group_id: &str) -> Result<()> {
        self.core_mut().set_group(op, group_id).await
    }

    /// Drop the handle; the backend object is left untouched
    fn destroy(self)
    where
        Self: Sized,
    {
        debug!("Released handle of {}", self.name());
    }
}
