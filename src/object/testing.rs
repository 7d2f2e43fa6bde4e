//! Scripted backend commands for lifecycle tests

use crate::config::{BackendKind, ClusterContext};
use crate::domain::{BackendCommands, CreateRequest};
use crate::exec::{CommandExecutor, CommandSpec};
use crate::journal::{Journal, JournalEntry};
use crate::object::{ObjectConfig, ObjectContext};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const TEST_CLUSTER: &str = "cluster-1";
pub(crate) const TEST_LOCATION: i64 = 7;
pub(crate) const TEST_SIZE: u64 = 1 << 30;

/// Backend stub built from coreutils: `true`, `false`, `sleep` and `echo`
#[derive(Default)]
pub(crate) struct ScriptedCommands {
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub create_delay: Mutex<Option<String>>,
    pub creates: AtomicUsize,
    pub deletes: AtomicUsize,
    pub group_sets: AtomicUsize,
}

impl ScriptedCommands {
    fn counted(counter: &AtomicUsize, fail: &AtomicBool) -> CommandSpec {
        counter.fetch_add(1, Ordering::SeqCst);
        if fail.load(Ordering::SeqCst) {
            CommandSpec::new("false")
        } else {
            CommandSpec::new("true")
        }
    }
}

impl BackendCommands for ScriptedCommands {
    fn create(&self, _: &ClusterContext, _: &JournalEntry, _: &CreateRequest) -> CommandSpec {
        if let Some(delay) = self.create_delay.lock().clone() {
            self.creates.fetch_add(1, Ordering::SeqCst);
            return CommandSpec::new("sleep").arg(delay);
        }
        Self::counted(&self.creates, &self.fail_create)
    }

    fn delete(&self, _: &ClusterContext, _: &JournalEntry) -> CommandSpec {
        Self::counted(&self.deletes, &self.fail_delete)
    }

    fn info(&self, _: &ClusterContext, _: &JournalEntry) -> CommandSpec {
        CommandSpec::new("echo").arg(format!(
            r#"{{"size":{},"create_timestamp":"2024-01-01T00:00:00Z"}}"#,
            TEST_SIZE
        ))
    }

    fn set_group(&self, _: &ClusterContext, _: &JournalEntry, _: &str) -> CommandSpec {
        self.group_sets.fetch_add(1, Ordering::SeqCst);
        CommandSpec::new("true")
    }
}

pub(crate) fn test_objects(commands: Arc<ScriptedCommands>) -> ObjectContext {
    let cluster = ClusterContext {
        cluster_id: TEST_CLUSTER.to_string(),
        backend: BackendKind::Rbd,
        monitors: vec!["10.0.0.1:6789".to_string()],
        net_namespace: None,
        rados_namespace: Some("tenant-a".to_string()),
    };

    ObjectContext::new(
        cluster,
        Arc::new(Journal::in_memory()),
        Arc::new(CommandExecutor::new()),
        commands,
    )
    .with_config(ObjectConfig {
        command_timeout: Duration::from_secs(10),
        location_id: TEST_LOCATION,
        provisional_wait: Duration::from_secs(5),
    })
}
