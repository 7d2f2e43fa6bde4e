//! Ceph CSI Core - Multi-cluster control path
//!
//! Shared plumbing of a CSI driver serving several Ceph clusters: cluster
//! configuration lookup, journal-backed object identities, and bounded
//! execution of the backend tools.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                        Journalled Objects                                    │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │     Volume      │  │    Snapshot     │  │      CSI Descriptors        │  │
//! │  └────────┬────────┘  └────────┬────────┘  └─────────────────────────────┘  │
//! │           └────────────────────┼                                            │
//! ├────────────────────────────────┼────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌────────┴────────┐  ┌─────────────────────────────┐  │
//! │  │  Config         │  │    Journal      │  │      Command Executor       │  │
//! │  │  Resolver       │  │  (keyed locks)  │  │   (deadline + kill/reap)    │  │
//! │  └────────┬────────┘  └────────┬────────┘  └─────────────┬───────────────┘  │
//! ├───────────┼────────────────────┼─────────────────────────┼──────────────────┤
//! │    config.json          journal store             ceph tools / nsenter      │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Cluster configuration document and per-cluster resolution
//! - [`exec`]: Bounded, cancellable external command execution
//! - [`journal`]: Request name to object identity journal
//! - [`object`]: Volume and snapshot lifecycle on top of the journal
//! - [`domain`]: Ports implemented by backend adapters
//! - [`error`]: Error types and handling

pub mod config;
pub mod domain;
pub mod error;
pub mod exec;
pub mod journal;
pub mod object;

// Re-export commonly used types
pub use config::{
    BackendKind, ClusterContext, ClusterRecord, ConfigResolver, ConfigStore, DEFAULT_CONFIG_PATH,
};

pub use domain::ports::{BackendCommands, BackendCommandsRef, CreateRequest, ObjectInfo};

pub use error::{Error, ErrorAction, ProtocolStatus, Result};

pub use exec::{CommandExecutor, CommandSpec, ExecOutput, ExecutorConfig, OperationContext};

pub use journal::{
    CsiIdentifier, EntryState, FileJournalStore, Journal, JournalEntry, JournalStore,
    MemoryJournalStore, ObjectKind, Reservation,
};

pub use object::{
    ContentSource, CsiSnapshot, CsiVolume, JournalledObject, ObjectConfig, ObjectContext,
    Snapshot, Volume,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
