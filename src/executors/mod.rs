//! Storage node executors
//!
//! [`Executor`] is the capability set the control plane drives: every
//! operation names the host it runs against and returns a typed result or a
//! [`BrickOpsError`](crate::error::BrickOpsError).
//!
//! Implementations:
//! - [`cmdexec::CmdExecutor`] builds LVM, filesystem and gluster command
//!   lines and runs them through a [`RemoteTransport`]
//!   ([`local::LocalTransport`] or [`ssh::SshTransport`])
//! - [`mock::MockExecutor`] keeps the cluster in memory for tests

pub mod cmdexec;
pub mod local;
pub mod mock;
pub mod ssh;

use crate::config::{BrickOpsConfig, ExecutorKind};
use crate::error::Result;
use crate::metrics::ExecutorMetrics;
use crate::models::{
    BlockVolumeInfo, BlockVolumeRequest, BrickInfo, BrickRequest, DeviceInfo,
    SnapshotCloneRequest, VolumeCloneRequest, VolumeRequest, VolumeSnapshotRequest,
    MAX_OUTPUT_SIZE,
};
use crate::xml::{HealInfo, Snapshot, Volume};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Operations an executor performs against storage nodes
#[async_trait]
pub trait Executor: Send + Sync {
    /// Verify glusterd is running on the host
    async fn glusterd_check(&self, host: &str) -> Result<()>;

    /// Add `new_node` to the trusted pool, from `exec_host`
    async fn peer_probe(&self, exec_host: &str, new_node: &str) -> Result<()>;

    /// Remove `detach_node` from the trusted pool, from `exec_host`
    async fn peer_detach(&self, exec_host: &str, detach_node: &str) -> Result<()>;

    /// Turn a raw device into a volume group; `destroy` wipes existing signatures first
    async fn device_setup(
        &self,
        host: &str,
        device: &str,
        vg_id: &str,
        destroy: bool,
    ) -> Result<DeviceInfo>;

    async fn get_device_info(&self, host: &str, device: &str, vg_id: &str) -> Result<DeviceInfo>;

    async fn device_teardown(&self, host: &str, device: &str, vg_id: &str) -> Result<()>;

    async fn brick_create(&self, host: &str, brick: &BrickRequest) -> Result<BrickInfo>;

    /// Returns true when the brick's thin pool was removed and its space reclaimed
    async fn brick_destroy(&self, host: &str, brick: &BrickRequest) -> Result<bool>;

    async fn volume_create(&self, host: &str, volume: &VolumeRequest) -> Result<Volume>;

    async fn volume_destroy(&self, host: &str, volume: &str) -> Result<()>;

    /// Fail if the volume cannot be destroyed (it still has snapshots)
    async fn volume_destroy_check(&self, host: &str, volume: &str) -> Result<()>;

    async fn volume_expand(&self, host: &str, volume: &VolumeRequest) -> Result<Volume>;

    async fn volume_replace_brick(
        &self,
        host: &str,
        volume: &str,
        old_brick: &BrickInfo,
        new_brick: &BrickInfo,
    ) -> Result<()>;

    async fn volume_info(&self, host: &str, volume: &str) -> Result<Volume>;

    async fn volume_clone(&self, host: &str, request: &VolumeCloneRequest) -> Result<Volume>;

    async fn volume_snapshot(
        &self,
        host: &str,
        request: &VolumeSnapshotRequest,
    ) -> Result<Snapshot>;

    async fn snapshot_clone_volume(
        &self,
        host: &str,
        request: &SnapshotCloneRequest,
    ) -> Result<Volume>;

    async fn snapshot_clone_block_volume(
        &self,
        host: &str,
        request: &SnapshotCloneRequest,
    ) -> Result<BlockVolumeInfo>;

    async fn snapshot_destroy(&self, host: &str, snapshot: &str) -> Result<()>;

    async fn heal_info(&self, host: &str, volume: &str) -> Result<HealInfo>;

    /// Change the executor's log verbosity
    fn set_log_level(&self, level: &str);

    async fn block_volume_create(
        &self,
        host: &str,
        block_volume: &BlockVolumeRequest,
    ) -> Result<BlockVolumeInfo>;

    async fn block_volume_destroy(
        &self,
        host: &str,
        block_hosting_volume_name: &str,
        block_volume_name: &str,
    ) -> Result<()>;
}

/// Runs command lines on a host
///
/// Commands run in order and stop at the first failure. The returned vector
/// holds one stdout per command.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn exec_commands(
        &self,
        host: &str,
        commands: &[String],
        timeout: Duration,
    ) -> Result<Vec<String>>;
}

/// Build the executor selected by the configuration
///
/// Command-building executors report to `metrics` when given; the mock
/// executor ignores it.
pub fn build_executor(
    config: &BrickOpsConfig,
    metrics: Option<Arc<ExecutorMetrics>>,
) -> Result<Arc<dyn Executor>> {
    let executor: Arc<dyn Executor> = match config.executor {
        ExecutorKind::Ssh => {
            let transport = ssh::SshTransport::new(config.ssh.clone(), config.commands.sudo)?;
            Arc::new(command_executor(transport, config, metrics))
        }
        ExecutorKind::Local => {
            let transport = local::LocalTransport::new(config.commands.sudo);
            Arc::new(command_executor(transport, config, metrics))
        }
        ExecutorKind::Mock => Arc::new(mock::MockExecutor::new()),
    };

    Ok(executor)
}

fn command_executor<T: RemoteTransport>(
    transport: T,
    config: &BrickOpsConfig,
    metrics: Option<Arc<ExecutorMetrics>>,
) -> cmdexec::CmdExecutor<T> {
    let executor =
        cmdexec::CmdExecutor::new(transport, config.commands.clone(), config.retry.clone());
    match metrics {
        Some(metrics) => executor.with_metrics(metrics),
        None => executor,
    }
}

/// Truncate string output to MAX_OUTPUT_SIZE
///
/// Returns (truncated_string, was_truncated)
pub(crate) fn truncate_output_str(data: &str) -> (String, bool) {
    truncate_output_bytes(data.as_bytes())
}

/// Truncate byte output to MAX_OUTPUT_SIZE
///
/// Returns (truncated_string, was_truncated)
pub(crate) fn truncate_output_bytes(data: &[u8]) -> (String, bool) {
    let truncated = data.len() > MAX_OUTPUT_SIZE;
    let bytes = if truncated {
        &data[..MAX_OUTPUT_SIZE]
    } else {
        data
    };

    let output = String::from_utf8_lossy(bytes).to_string();
    (output, truncated)
}

/// Prefix a command with sudo when configured
pub(crate) fn wrap_command(command: &str, sudo: bool) -> String {
    if sudo {
        format!("sudo {}", command)
    } else {
        command.to_string()
    }
}
