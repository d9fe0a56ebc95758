//! CLI interface for brickops

use crate::config::{BrickOpsConfig, ExecutorKind};
use crate::executors::{build_executor, Executor};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::metrics::ExecutorMetrics;
use crate::models::VolumeSnapshotRequest;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// brickops - drive GlusterFS storage nodes: devices, bricks, volumes and snapshots
#[derive(Parser, Debug)]
#[command(name = "brickops")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Provision GlusterFS devices, bricks, volumes and snapshots", long_about = None)]
pub struct Cli {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace); overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json or pretty); overrides the config file
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Executor backend; overrides the config file
    #[arg(short, long, value_enum, global = true)]
    pub executor: Option<ExecutorKind>,

    /// Print Prometheus metrics to stderr when the command finishes
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that glusterd runs on each host
    Check {
        /// Hosts to check
        #[arg(required = true)]
        hosts: Vec<String>,
    },

    /// Trusted pool membership
    Peer {
        #[command(subcommand)]
        command: PeerCommands,
    },

    /// Device (volume group) management
    Device {
        #[command(subcommand)]
        command: DeviceCommands,
    },

    /// Volume inspection and removal
    Volume {
        #[command(subcommand)]
        command: VolumeCommands,
    },

    /// Volume snapshots
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },

    /// Print the effective configuration as YAML
    Config,
}

#[derive(Subcommand, Debug)]
pub enum PeerCommands {
    /// Add a node to the trusted pool
    Probe {
        /// Pool member that runs the probe
        host: String,
        /// Node to add
        node: String,
    },

    /// Remove a node from the trusted pool
    Detach {
        /// Pool member that runs the detach
        host: String,
        /// Node to remove
        node: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommands {
    /// Create a volume group on a raw device
    Setup {
        host: String,
        /// Block device path, e.g. /dev/sdb
        device: String,
        /// Volume group id (the group is named vg_<id>)
        vg_id: String,
        /// Wipe existing signatures first
        #[arg(long)]
        destroy: bool,
    },

    /// Show free space of a device's volume group
    Info {
        host: String,
        device: String,
        vg_id: String,
    },

    /// Remove a device's volume group
    Teardown {
        host: String,
        device: String,
        vg_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum VolumeCommands {
    /// Show volume information
    Info { host: String, name: String },

    /// Show pending self-heal entries
    HealInfo { host: String, name: String },

    /// Stop and delete a volume
    Destroy {
        host: String,
        name: String,
        /// Skip the snapshot check
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommands {
    /// Snapshot a volume
    Create {
        host: String,
        volume: String,
        snapshot: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Delete a snapshot
    Destroy { host: String, snapshot: String },
}

/// glusterd state of one host
#[derive(Debug, Serialize)]
struct HostStatus {
    host: String,
    running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl Cli {
    /// Load the configuration file and apply command line overrides
    pub fn load_config(&self) -> anyhow::Result<BrickOpsConfig> {
        let mut config = BrickOpsConfig::load(self.config.as_deref())?;

        if let Some(executor) = self.executor {
            config.executor = executor;
        }
        if let Some(level) = &self.log_level {
            config.log.level = LogLevel::from(level.as_str());
        }
        if let Some(format) = &self.log_format {
            config.log.format = LogFormat::from(format.as_str());
        }

        Ok(config)
    }

    /// Initialize logging from the effective configuration
    pub fn init_logging(&self, config: &BrickOpsConfig) -> anyhow::Result<()> {
        init_logging(&config.log)
    }

    /// Execute the CLI command and print its result
    pub async fn execute(&self, config: &BrickOpsConfig) -> anyhow::Result<()> {
        if let Commands::Config = self.command {
            print!("{}", serde_yaml::to_string(config)?);
            return Ok(());
        }

        let metrics = if self.metrics {
            Some(Arc::new(ExecutorMetrics::new()?))
        } else {
            None
        };
        let executor = build_executor(config, metrics.clone())?;
        info!("Using {:?} executor", config.executor);

        let result = self.run_with(executor, config).await;

        if let Some(metrics) = metrics {
            eprint!("{}", metrics.render()?);
        }

        print_json(&result?)
    }

    /// Run the command against `executor` and return its JSON result
    pub async fn run_with(
        &self,
        executor: Arc<dyn Executor>,
        config: &BrickOpsConfig,
    ) -> anyhow::Result<Value> {
        match &self.command {
            Commands::Check { hosts } => check_hosts(executor.as_ref(), hosts).await,
            Commands::Peer { command } => handle_peer(executor.as_ref(), command).await,
            Commands::Device { command } => handle_device(executor.as_ref(), command).await,
            Commands::Volume { command } => handle_volume(executor.as_ref(), command).await,
            Commands::Snapshot { command } => handle_snapshot(executor.as_ref(), command).await,
            Commands::Config => Ok(serde_json::to_value(config)?),
        }
    }
}

/// Check every host concurrently
async fn check_hosts(executor: &dyn Executor, hosts: &[String]) -> anyhow::Result<Value> {
    let checks = hosts.iter().map(|host| async move {
        match executor.glusterd_check(host).await {
            Ok(()) => HostStatus {
                host: host.clone(),
                running: true,
                error: None,
            },
            Err(e) => {
                warn!("glusterd check failed on {}: {}", host, e);
                HostStatus {
                    host: host.clone(),
                    running: false,
                    error: Some(e.to_string()),
                }
            }
        }
    });
    let statuses = join_all(checks).await;

    let down = statuses.iter().filter(|status| !status.running).count();
    if down > 0 {
        print_json(&statuses)?;
        error!("glusterd is not running on {} of {} host(s)", down, hosts.len());
        anyhow::bail!("glusterd is not running on {} host(s)", down);
    }

    Ok(serde_json::to_value(statuses)?)
}

async fn handle_peer(executor: &dyn Executor, command: &PeerCommands) -> anyhow::Result<Value> {
    match command {
        PeerCommands::Probe { host, node } => {
            executor.peer_probe(host, node).await?;
            Ok(json!({ "peer": node, "probed": true }))
        }
        PeerCommands::Detach { host, node } => {
            executor.peer_detach(host, node).await?;
            Ok(json!({ "peer": node, "detached": true }))
        }
    }
}

async fn handle_device(executor: &dyn Executor, command: &DeviceCommands) -> anyhow::Result<Value> {
    match command {
        DeviceCommands::Setup {
            host,
            device,
            vg_id,
            destroy,
        } => {
            let info = executor.device_setup(host, device, vg_id, *destroy).await?;
            Ok(serde_json::to_value(info)?)
        }
        DeviceCommands::Info {
            host,
            device,
            vg_id,
        } => {
            let info = executor.get_device_info(host, device, vg_id).await?;
            Ok(serde_json::to_value(info)?)
        }
        DeviceCommands::Teardown {
            host,
            device,
            vg_id,
        } => {
            executor.device_teardown(host, device, vg_id).await?;
            Ok(json!({ "device": device, "removed": true }))
        }
    }
}

async fn handle_volume(executor: &dyn Executor, command: &VolumeCommands) -> anyhow::Result<Value> {
    match command {
        VolumeCommands::Info { host, name } => {
            let volume = executor.volume_info(host, name).await?;
            Ok(serde_json::to_value(volume)?)
        }
        VolumeCommands::HealInfo { host, name } => {
            let heal = executor.heal_info(host, name).await?;
            Ok(json!({
                "volume": name,
                "pending_entries": heal.pending_entries(),
                "bricks": heal.bricks.brick_list,
            }))
        }
        VolumeCommands::Destroy { host, name, force } => {
            if !*force {
                executor.volume_destroy_check(host, name).await?;
            }
            executor.volume_destroy(host, name).await?;
            Ok(json!({ "volume": name, "destroyed": true }))
        }
    }
}

async fn handle_snapshot(
    executor: &dyn Executor,
    command: &SnapshotCommands,
) -> anyhow::Result<Value> {
    match command {
        SnapshotCommands::Create {
            host,
            volume,
            snapshot,
            description,
        } => {
            let request = VolumeSnapshotRequest {
                volume: volume.clone(),
                snapshot: snapshot.clone(),
                description: description.clone(),
            };
            let created = executor.volume_snapshot(host, &request).await?;
            Ok(serde_json::to_value(created)?)
        }
        SnapshotCommands::Destroy { host, snapshot } => {
            executor.snapshot_destroy(host, snapshot).await?;
            Ok(json!({ "snapshot": snapshot, "destroyed": true }))
        }
    }
}
