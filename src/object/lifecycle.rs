//! Journalled object lifecycle
//!
//! Lifecycle shared by every object kind: reserve an identity, create the
//! backend object, roll back on failure, delete, and track group membership.

use crate::domain::{CreateRequest, ObjectInfo};
use crate::error::{Error, Result};
use crate::exec::OperationContext;
use crate::journal::registry::invalid_state;
use crate::journal::{
    CsiIdentifier, EntryState, JournalEntry, ObjectKind, ParentRef, Reservation,
};
use crate::object::ObjectContext;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

/// First poll interval while waiting on another request's provisional entry
const PROVISIONAL_POLL_INITIAL: Duration = Duration::from_millis(50);

/// Longest poll interval while waiting on another request's provisional entry
const PROVISIONAL_POLL_MAX: Duration = Duration::from_secs(2);

/// Journal entry plus cached backend metadata of one object
pub struct ObjectCore {
    objects: ObjectContext,
    entry: JournalEntry,
    info: Option<ObjectInfo>,
}

impl std::fmt::Debug for ObjectCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectCore")
            .field("cluster_id", &self.objects.cluster.cluster_id)
            .field("entry", &self.entry)
            .field("info", &self.info)
            .finish()
    }
}

impl ObjectCore {
    /// Create the object for `request_name`, or adopt it if a previous
    /// attempt of the same request already did
    pub(crate) async fn provision(
        op: &OperationContext,
        objects: &ObjectContext,
        request_name: &str,
        kind: ObjectKind,
        request: CreateRequest,
    ) -> Result<Self> {
        let parent = request.source.as_ref().map(JournalEntry::as_parent);

        loop {
            let entry = match objects.journal.reserve(request_name, kind, parent).await? {
                Reservation::Minted(entry) => {
                    return Self::create_backend(op, objects, entry, &request).await
                }
                Reservation::Existing(entry) => entry,
            };
            ensure_matches(&entry, kind, parent)?;

            match entry.state {
                EntryState::Ready => return Self::opened(op, objects, entry).await,
                EntryState::Deleting => return Err(invalid_state(&entry, "create")),
                EntryState::Provisional => {
                    if let Some(ready) = Self::await_settled(op, objects, &entry).await? {
                        return Self::opened(op, objects, ready).await;
                    }
                    debug!("Provisional entry of {} went away, reserving again", request_name);
                }
            }
        }
    }

    /// Fetch the existing object of `request_name`
    pub(crate) async fn open(
        op: &OperationContext,
        objects: &ObjectContext,
        request_name: &str,
        kind: ObjectKind,
    ) -> Result<Self> {
        let entry = objects
            .journal
            .lookup(request_name)
            .await?
            .ok_or_else(|| Error::EntryNotFound {
                request_name: request_name.to_string(),
            })?;
        Self::from_entry(op, objects, entry, kind).await
    }

    /// Fetch the existing object behind a CSI identifier
    pub(crate) async fn open_by_id(
        op: &OperationContext,
        objects: &ObjectContext,
        csi_id: &str,
        kind: ObjectKind,
    ) -> Result<Self> {
        let id = CsiIdentifier::decompose(csi_id)?;
        if id.cluster_id != objects.cluster.cluster_id {
            return Err(Error::InvalidIdentifier {
                id: csi_id.to_string(),
                reason: format!(
                    "belongs to cluster {}, not {}",
                    id.cluster_id, objects.cluster.cluster_id
                ),
            });
        }

        let entry = objects
            .journal
            .lookup_by_uuid(id.object_uuid)
            .await?
            .ok_or_else(|| Error::EntryNotFound {
                request_name: csi_id.to_string(),
            })?;
        Self::from_entry(op, objects, entry, kind).await
    }

    async fn from_entry(
        op: &OperationContext,
        objects: &ObjectContext,
        entry: JournalEntry,
        kind: ObjectKind,
    ) -> Result<Self> {
        if entry.kind != kind {
            return Err(invalid_state(&entry, &format!("open as {}", kind)));
        }

        match entry.state {
            EntryState::Provisional => Err(invalid_state(&entry, "open")),
            EntryState::Ready => Self::opened(op, objects, entry).await,
            // backend object may be half gone, keep the handle so delete can be retried
            EntryState::Deleting => Ok(Self {
                objects: objects.clone(),
                entry,
                info: None,
            }),
        }
    }

    async fn opened(
        op: &OperationContext,
        objects: &ObjectContext,
        entry: JournalEntry,
    ) -> Result<Self> {
        let mut core = Self {
            objects: objects.clone(),
            entry,
            info: None,
        };
        core.refresh(op).await?;
        Ok(core)
    }

    async fn create_backend(
        op: &OperationContext,
        objects: &ObjectContext,
        entry: JournalEntry,
        request: &CreateRequest,
    ) -> Result<Self> {
        let spec = objects.prepare(objects.commands.create(&objects.cluster, &entry, request));

        if let Err(e) = objects
            .executor
            .run_spec(op, objects.config.command_timeout, &spec)
            .await
        {
            warn!(
                "Creating {} for request {} failed: {}",
                entry.backend_id, entry.request_name, e
            );
            if let Err(rollback) = objects.journal.rollback(&entry).await {
                warn!(
                    "Rollback of request {} failed, entry left provisional: {}",
                    entry.request_name, rollback
                );
            }
            return Err(e);
        }

        let entry = objects.journal.mark_ready(&entry).await?;
        info!(
            "Created {} {} on cluster {}",
            entry.kind, entry.backend_id, objects.cluster.cluster_id
        );
        Self::opened(op, objects, entry).await
    }

    /// Poll a provisional entry owned by another request until it settles
    ///
    /// Returns the ready entry, or `None` when it was rolled back.
    async fn await_settled(
        op: &OperationContext,
        objects: &ObjectContext,
        entry: &JournalEntry,
    ) -> Result<Option<JournalEntry>> {
        let wait = match op.remaining() {
            Some(left) => left.min(objects.config.provisional_wait),
            None => objects.config.provisional_wait,
        };
        let policy = ExponentialBackoff {
            current_interval: PROVISIONAL_POLL_INITIAL,
            initial_interval: PROVISIONAL_POLL_INITIAL,
            max_interval: PROVISIONAL_POLL_MAX,
            max_elapsed_time: Some(wait),
            ..Default::default()
        };

        debug!(
            "Request {} is provisional elsewhere, waiting up to {:?}",
            entry.request_name, wait
        );

        let journal = objects.journal.as_ref();
        let request_name = entry.request_name.as_str();
        let object_uuid = entry.object_uuid;

        let settled = backoff::future::retry(policy, move || async move {
            let current = journal
                .lookup(request_name)
                .await
                .map_err(backoff::Error::permanent)?;

            match current {
                Some(current) if current.object_uuid == object_uuid => match current.state {
                    EntryState::Ready => Ok(Some(current)),
                    EntryState::Provisional => {
                        Err(backoff::Error::transient(invalid_state(&current, "create")))
                    }
                    EntryState::Deleting => {
                        Err(backoff::Error::permanent(invalid_state(&current, "create")))
                    }
                },
                _ => Ok(None),
            }
        });

        tokio::select! {
            result = settled => result,
            _ = op.cancelled() => Err(Error::Cancelled {
                program: format!("wait for request {}", entry.request_name),
            }),
        }
    }

    /// Re-read backend metadata
    pub async fn refresh(&mut self, op: &OperationContext) -> Result<()> {
        let spec = self
            .objects
            .prepare(self.objects.commands.info(&self.objects.cluster, &self.entry));
        let output = self
            .objects
            .executor
            .run_spec(op, self.objects.config.command_timeout, &spec)
            .await?;

        self.info = Some(self.objects.commands.parse_info(&self.entry, &output.stdout)?);
        Ok(())
    }

    /// Delete the backend object and erase its journal entry
    ///
    /// A failed backend deletion leaves the entry deleting; calling again
    /// re-runs the backend deletion.
    pub async fn delete(&mut self, op: &OperationContext) -> Result<()> {
        self.entry = self.objects.journal.begin_delete(&self.entry).await?;

        let spec = self
            .objects
            .prepare(self.objects.commands.delete(&self.objects.cluster, &self.entry));
        self.objects
            .executor
            .run_spec(op, self.objects.config.command_timeout, &spec)
            .await?;

        self.objects.journal.release(&self.entry).await?;
        self.info = None;
        info!(
            "Deleted {} {} for request {}",
            self.entry.kind, self.entry.backend_id, self.entry.request_name
        );
        Ok(())
    }

    /// Add the object to a volume group
    pub async fn set_group(&mut self, op: &OperationContext, group_id: &str) -> Result<()> {
        // another handle may have started deleting since this one was opened
        let current = self
            .objects
            .journal
            .lookup(&self.entry.request_name)
            .await?
            .ok_or_else(|| Error::EntryNotFound {
                request_name: self.entry.request_name.clone(),
            })?;
        if !current.same_identity(&self.entry) || current.state != EntryState::Ready {
            return Err(invalid_state(&current, "set volume group"));
        }
        self.entry = current;

        let spec = self.objects.prepare(self.objects.commands.set_group(
            &self.objects.cluster,
            &self.entry,
            group_id,
        ));
        self.objects
            .executor
            .run_spec(op, self.objects.config.command_timeout, &spec)
            .await?;

        self.entry = self.objects.journal.set_group(&self.entry, Some(group_id)).await?;
        if let Some(info) = self.info.as_mut() {
            info.group_id = Some(group_id.to_string());
        }
        Ok(())
    }

    pub fn entry(&self) -> &JournalEntry {
        &self.entry
    }

    pub fn info(&self) -> Option<&ObjectInfo> {
        self.info.as_ref()
    }

    pub fn objects(&self) -> &ObjectContext {
        &self.objects
    }

    pub fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.info.as_ref().and_then(|info| info.created_at)
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.info.as_ref().map(|info| info.size_bytes)
    }

    /// CSI identifier of this object
    pub fn csi_id(&self) -> Result<String> {
        self.identifier_for(self.entry.object_uuid)
    }

    /// CSI identifier of the object this one was created from
    pub fn parent_csi_id(&self) -> Result<Option<String>> {
        self.entry
            .parent
            .map(|parent| self.identifier_for(parent.uuid))
            .transpose()
    }

    fn identifier_for(&self, object_uuid: uuid::Uuid) -> Result<String> {
        CsiIdentifier::new(
            self.objects.cluster.cluster_id.clone(),
            self.objects.config.location_id,
            object_uuid,
        )
        .compose()
    }
}

fn ensure_matches(
    entry: &JournalEntry,
    kind: ObjectKind,
    parent: Option<ParentRef>,
) -> Result<()> {
    if entry.kind != kind {
        return Err(invalid_state(entry, &format!("create as {}", kind)));
    }
    if entry.parent_uuid() != parent.map(|p| p.uuid) {
        return Err(invalid_state(entry, "create from a different source"));
    }
    Ok(())
}
