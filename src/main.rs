//! Ceph CSI Core diagnostics
//!
//! Thin command line over the library: resolve cluster profiles, run a
//! bounded backend command, and inspect the identity journal.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ceph_csi_core::{
    BackendKind, CommandExecutor, CommandSpec, ConfigResolver, ExecutorConfig, Journal,
    OperationContext, Result, DEFAULT_CONFIG_PATH,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Ceph CSI Core - multi-cluster configuration, journal and command diagnostics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cluster configuration document
    #[arg(long, env = "CSI_CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Identity journal directory
    #[arg(long, env = "JOURNAL_PATH", default_value = "/var/lib/ceph-csi/journal")]
    journal_path: PathBuf,

    /// nsenter binary used for clusters behind a network namespace
    #[arg(long, env = "NSENTER_PATH", default_value = "nsenter")]
    nsenter_path: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the monitors of a cluster
    Monitors {
        cluster_id: String,
    },

    /// Print the resolved profile of a cluster
    Profile {
        cluster_id: String,

        /// Backend the profile is resolved for (rbd, cephfs, nfs)
        #[arg(long, default_value = "rbd")]
        backend: BackendKind,
    },

    /// Run a command under a deadline, inside the cluster's network namespace if any
    Exec {
        /// Hard limit in seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,

        /// Cluster whose network namespace the command joins
        #[arg(long)]
        cluster_id: Option<String>,

        #[arg(long, default_value = "rbd")]
        backend: BackendKind,

        program: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Inspect the identity journal
    #[command(subcommand)]
    Journal(JournalCommand),
}

#[derive(Subcommand, Debug)]
enum JournalCommand {
    /// List every entry
    List,

    /// List provisional entries older than a threshold
    Orphans {
        #[arg(long, default_value = "300")]
        older_than_secs: u64,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Ceph CSI Core {}", ceph_csi_core::VERSION);
    info!("  Config: {}", args.config.display());

    let resolver = ConfigResolver::new(&args.config);

    match args.command {
        Command::Monitors { cluster_id } => {
            println!("{}", resolver.monitors(&cluster_id).await?);
        }
        Command::Profile { cluster_id, backend } => {
            let profile = resolver.cluster_context(&cluster_id, backend).await?;
            let (enabled, labels) = resolver.crush_location_labels(&cluster_id).await?;
            let report = serde_json::json!({
                "cluster": profile,
                "mirrorDaemonCount": resolver.mirror_daemon_count(&cluster_id).await?,
                "cephFSSubvolumeGroup": resolver.cephfs_subvolume_group(&cluster_id).await?,
                "readAffinity": { "enabled": enabled, "crushLocationLabels": labels },
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Exec {
            timeout_secs,
            cluster_id,
            backend,
            program,
            args: program_args,
        } => {
            let executor = CommandExecutor::with_config(ExecutorConfig {
                nsenter_path: args.nsenter_path.clone(),
            });

            let mut spec = CommandSpec::new(program).args(program_args);
            if let Some(cluster_id) = cluster_id {
                let cluster = resolver.cluster_context(&cluster_id, backend).await?;
                spec = executor.prepare(spec, &cluster);
            }

            let ctx = OperationContext::background();
            let interrupt = ctx.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling command");
                    interrupt.cancel();
                }
            });

            let output = executor
                .run_spec(&ctx, Duration::from_secs(timeout_secs), &spec)
                .await?;
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
        }
        Command::Journal(command) => {
            let journal = Journal::open(&args.journal_path).await?;
            let entries = match command {
                JournalCommand::List => journal.entries().await?,
                JournalCommand::Orphans { older_than_secs } => {
                    journal
                        .provisional_older_than(Duration::from_secs(older_than_secs))
                        .await?
                }
            };
            for entry in entries {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
    }

    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // diagnostics go to stderr, stdout carries command results
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
