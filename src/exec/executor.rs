//! Bounded Command Executor
//!
//! Runs backend tooling as a child process under a wall-clock deadline and
//! classifies the outcome:
//!
//! - exit status zero: captured stdout/stderr
//! - non-zero exit: [`Error::CommandFailed`] with status and stderr
//! - deadline reached: [`Error::Timeout`], child killed and reaped
//! - context cancelled: [`Error::Cancelled`], child killed and reaped
//! - spawn failure: [`Error::SpawnFailed`]
//!
//! The child is owned by the call. It is killed explicitly on the timeout and
//! cancellation paths and is spawned with `kill_on_drop` so a dropped call
//! future cannot leave it running either.

use crate::config::ClusterContext;
use crate::error::{Error, Result};
use crate::exec::command::CommandSpec;
use crate::exec::context::OperationContext;
use std::ffi::OsStr;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the command executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Binary used to enter a cluster's network namespace
    pub nsenter_path: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            nsenter_path: PathBuf::from("nsenter"),
        }
    }
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

enum Outcome {
    Exited(io::Result<ExitStatus>, io::Result<Vec<u8>>, io::Result<Vec<u8>>),
    TimedOut,
    Cancelled,
}

// =============================================================================
// Executor
// =============================================================================

/// Runs external programs with deadline enforcement
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    config: ExecutorConfig,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// Run `program` with `args`, bounded by `timeout` and by the context
    pub async fn run_bounded<I, S>(
        &self,
        ctx: &OperationContext,
        timeout: Duration,
        program: &str,
        args: I,
    ) -> Result<ExecOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let deadline = ctx.effective_deadline(timeout);
        self.execute(ctx, deadline, program, args).await
    }

    /// Run `program` bounded only by the context's own deadline
    pub async fn run<I, S>(
        &self,
        ctx: &OperationContext,
        program: &str,
        args: I,
    ) -> Result<ExecOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.execute(ctx, ctx.deadline(), program, args).await
    }

    /// Run a prepared command spec under `timeout`
    pub async fn run_spec(
        &self,
        ctx: &OperationContext,
        timeout: Duration,
        spec: &CommandSpec,
    ) -> Result<ExecOutput> {
        self.run_bounded(ctx, timeout, &spec.program, &spec.args).await
    }

    /// Adapt a command to the cluster it targets
    ///
    /// Clusters with a configured net-namespace get their commands routed
    /// through `nsenter`.
    pub fn prepare(&self, spec: CommandSpec, cluster: &ClusterContext) -> CommandSpec {
        match &cluster.net_namespace {
            Some(netns) => spec.in_net_namespace(&self.config.nsenter_path, netns),
            None => spec,
        }
    }

    async fn execute<I, S>(
        &self,
        ctx: &OperationContext,
        deadline: Option<Instant>,
        program: &str,
        args: I,
    ) -> Result<ExecOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let started = Instant::now();

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::SpawnFailed {
                program: program.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            "Spawned {} (pid {:?}, deadline in {:?})",
            program,
            child.id(),
            deadline.map(|d| d.saturating_duration_since(started))
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let outcome = {
            let collect = async {
                tokio::join!(child.wait(), read_pipe(stdout), read_pipe(stderr))
            };
            let expiry = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => futures::future::pending::<()>().await,
                }
            };

            tokio::select! {
                (status, out, err) = collect => Outcome::Exited(status, out, err),
                _ = expiry => Outcome::TimedOut,
                _ = ctx.cancelled() => Outcome::Cancelled,
            }
        };

        let elapsed = started.elapsed();
        match outcome {
            Outcome::TimedOut => {
                terminate(&mut child, program).await;
                warn!("{} timed out after {:?}", program, elapsed);
                Err(Error::Timeout {
                    program: program.to_string(),
                    elapsed,
                })
            }
            Outcome::Cancelled => {
                terminate(&mut child, program).await;
                warn!("{} cancelled after {:?}", program, elapsed);
                Err(Error::Cancelled {
                    program: program.to_string(),
                })
            }
            Outcome::Exited(status, out, err) => {
                let status = status.map_err(|e| {
                    Error::Internal(format!("failed to wait for {}: {}", program, e))
                })?;
                let stdout = String::from_utf8_lossy(&out?).into_owned();
                let stderr = String::from_utf8_lossy(&err?).into_owned();

                if !status.success() {
                    warn!(
                        "{} failed with {} after {:?}: {}",
                        program,
                        status,
                        elapsed,
                        stderr.trim()
                    );
                    return Err(Error::CommandFailed {
                        program: program.to_string(),
                        status: status.to_string(),
                        stdout,
                        stderr,
                    });
                }

                debug!("{} completed in {:?}", program, elapsed);
                Ok(ExecOutput { stdout, stderr })
            }
        }
    }
}

/// Kill the child and wait for it so no process outlives the call
async fn terminate(child: &mut Child, program: &str) {
    if let Err(e) = child.kill().await {
        // already exited between expiry and kill
        debug!("kill of {} returned: {}", program, e);
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_echo_hello() {
        let executor = CommandExecutor::new();
        let ctx = OperationContext::background();

        let output = executor
            .run_bounded(&ctx, Duration::from_secs(1), "echo", ["hello"])
            .await
            .unwrap();
        assert_eq!(output.stdout, "hello\n");
        assert_eq!(output.stderr, "");
    }

    #[tokio::test]
    async fn test_sleep_with_timeout() {
        let executor = CommandExecutor::new();
        let ctx = OperationContext::background();
        let started = std::time::Instant::now();

        let result = executor
            .run_bounded(&ctx, Duration::from_secs(1), "sleep", ["3"])
            .await;

        assert_matches!(result, Err(Error::Timeout { .. }));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(900), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(2500), "elapsed {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_context_deadline_is_tighter() {
        let executor = CommandExecutor::new();
        let ctx = OperationContext::with_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();

        let result = executor
            .run_bounded(&ctx, Duration::from_secs(30), "sleep", ["5"])
            .await;

        assert_matches!(result, Err(Error::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let executor = CommandExecutor::new();
        let ctx = OperationContext::background();

        let result = executor
            .run_bounded(&ctx, Duration::from_secs(5), "sh", ["-c", "echo boom >&2; exit 3"])
            .await;

        match result {
            Err(Error::CommandFailed { status, stderr, .. }) => {
                assert!(status.contains('3'), "status {}", status);
                assert_eq!(stderr, "boom\n");
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let executor = CommandExecutor::new();
        let ctx = OperationContext::background();

        let result = executor
            .run_bounded(&ctx, Duration::from_secs(1), "/nonexistent/ceph-tool", ["-v"])
            .await;
        assert_matches!(result, Err(Error::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_arguments_are_not_shell_interpreted() {
        let executor = CommandExecutor::new();
        let ctx = OperationContext::background();

        let output = executor
            .run_bounded(&ctx, Duration::from_secs(1), "echo", ["$HOME; rm -rf /"])
            .await
            .unwrap();
        assert_eq!(output.stdout, "$HOME; rm -rf /\n");
    }

    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let executor = CommandExecutor::new();
        let ctx = OperationContext::background();

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result = executor.run(&ctx, "sleep", ["10"]).await;
        assert_matches!(result, Err(Error::Cancelled { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_runs_unbounded() {
        let executor = CommandExecutor::new();
        let ctx = OperationContext::background();

        let output = executor
            .run_bounded(&ctx, Duration::MAX, "echo", ["hi"])
            .await
            .unwrap();
        assert_eq!(output.stdout, "hi\n");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_cancelled_child_does_not_survive() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pid_file = tmp.path().join("pid");
        let script = format!("echo $$ > {}; exec sleep 30", pid_file.display());

        let executor = CommandExecutor::new();
        let ctx = OperationContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            canceller.cancel();
        });

        let result = executor.run(&ctx, "sh", ["-c", script.as_str()]).await;
        assert_matches!(result, Err(Error::Cancelled { .. }));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let proc_path = format!("/proc/{}", pid.trim());
        assert!(!std::path::Path::new(&proc_path).exists(), "{} still running", proc_path);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timed_out_child_does_not_survive() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pid_file = tmp.path().join("pid");
        let script = format!("echo $$ > {}; exec sleep 30", pid_file.display());

        let executor = CommandExecutor::new();
        let ctx = OperationContext::background();
        let result = executor
            .run_bounded(&ctx, Duration::from_millis(300), "sh", ["-c", script.as_str()])
            .await;
        assert_matches!(result, Err(Error::Timeout { .. }));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let proc_path = format!("/proc/{}", pid.trim());
        assert!(!std::path::Path::new(&proc_path).exists(), "{} still running", proc_path);
    }

    #[test]
    fn test_prepare_wraps_net_namespace() {
        let executor = CommandExecutor::with_config(ExecutorConfig {
            nsenter_path: PathBuf::from("/usr/bin/nsenter"),
        });
        let mut cluster = ClusterContext {
            cluster_id: "c1".into(),
            backend: BackendKind::Rbd,
            monitors: vec!["m1".into()],
            net_namespace: None,
            rados_namespace: None,
        };

        let spec = CommandSpec::new("rbd").arg("ls");
        assert_eq!(executor.prepare(spec.clone(), &cluster), spec);

        cluster.net_namespace = Some(PathBuf::from("/run/netns/c1"));
        let wrapped = executor.prepare(spec, &cluster);
        assert_eq!(wrapped.program, "/usr/bin/nsenter");
        assert_eq!(wrapped.args[0], "--net=/run/netns/c1");
    }
}
