//! Command Specifications
//!
//! A program plus its discrete argument list. Arguments are never joined into
//! a shell string.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Program and arguments of one backend invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run this command inside the network namespace at `netns`
    pub fn in_net_namespace(self, nsenter: &Path, netns: &Path) -> Self {
        let mut args = vec![format!("--net={}", netns.display()), "--".to_string(), self.program];
        args.extend(self.args);
        Self {
            program: nsenter.display().to_string(),
            args,
        }
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
