//! Bounded external command execution
//!
//! Every backend mutation goes through [`CommandExecutor`], bounded by the
//! deadline of the owning [`OperationContext`].

pub mod command;
pub mod context;
pub mod executor;

pub use command::CommandSpec;
pub use context::OperationContext;
pub use executor::{CommandExecutor, ExecOutput, ExecutorConfig};
