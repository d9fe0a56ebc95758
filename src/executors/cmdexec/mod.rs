//! Command-building executor
//!
//! [`CmdExecutor`] implements [`Executor`] by translating each operation into
//! LVM, filesystem, gluster and gluster-block command lines, running them on
//! the target host through a [`RemoteTransport`], and parsing the answers.
//!
//! Naming on the node:
//! - volume group: `vg_<vg_id>`
//! - thin pool: `tp_<brick name>`
//! - brick logical volume: `brick_<brick name>`, mounted at the request path
//!   with the brick directory at `<path>/brick`

mod block_volume;
mod brick;
mod device;
mod peer;
mod snapshot;
mod volume;

use crate::config::CmdConfig;
use crate::error::{BrickOpsError, Result};
use crate::executors::{Executor, RemoteTransport};
use crate::logging::{self, LogLevel};
use crate::metrics::ExecutorMetrics;
use crate::models::{
    BlockVolumeInfo, BlockVolumeRequest, BrickInfo, BrickRequest, DeviceInfo,
    SnapshotCloneRequest, VolumeCloneRequest, VolumeRequest, VolumeSnapshotRequest,
};
use crate::retry::{retry_async, RetryConfig};
use crate::xml::{parse_cli_output, CliOutput, HealInfo, Snapshot, Volume};
use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub fn vg_name(vg_id: &str) -> String {
    format!("vg_{}", vg_id)
}

pub fn thin_pool_name(brick_name: &str) -> String {
    format!("tp_{}", brick_name)
}

pub fn brick_lv_name(brick_name: &str) -> String {
    format!("brick_{}", brick_name)
}

/// Executor that drives nodes through command lines
pub struct CmdExecutor<T: RemoteTransport> {
    transport: T,
    config: CmdConfig,
    retry: RetryConfig,
    metrics: Option<Arc<ExecutorMetrics>>,
    log_level: AtomicU8,
}

impl<T: RemoteTransport> CmdExecutor<T> {
    pub fn new(transport: T, config: CmdConfig, retry: RetryConfig) -> Self {
        Self {
            transport,
            config,
            retry,
            metrics: None,
            log_level: AtomicU8::new(LogLevel::Info.as_u8()),
        }
    }

    /// Record operation counts and durations
    pub fn with_metrics(mut self, metrics: Arc<ExecutorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &CmdConfig {
        &self.config
    }

    /// Level last set through `set_log_level`
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_u8(self.log_level.load(Ordering::Relaxed))
    }

    /// Run a batch once
    async fn exec(&self, host: &str, commands: Vec<String>) -> Result<Vec<String>> {
        let result = self
            .transport
            .exec_commands(host, &commands, self.config.command_timeout())
            .await;
        if let Some(metrics) = &self.metrics {
            metrics.record_command(host, result.is_ok());
        }
        result
    }

    /// Run a batch, retrying transient failures
    async fn exec_retry(&self, host: &str, commands: Vec<String>) -> Result<Vec<String>> {
        let what = commands.first().cloned().unwrap_or_default();
        retry_async(&self.retry, &what, || self.exec(host, commands.clone())).await
    }

    /// Run a single command and return its stdout
    async fn exec_one(&self, host: &str, command: String) -> Result<String> {
        single_output(self.exec(host, vec![command]).await?)
    }

    /// Full gluster command line
    fn gluster(&self, args: &str) -> String {
        format!(
            "gluster --mode=script --timeout={} {}",
            self.config.gluster_cli_timeout, args
        )
    }

    /// Run one gluster command (retrying lock contention) and ignore its output
    async fn gluster_exec(&self, host: &str, args: &str) -> Result<()> {
        self.exec_retry(host, vec![self.gluster(args)])
            .await
            .map(|_| ())
            .map_err(from_xml_failure)
    }

    /// Run one gluster command with `--xml` and parse the `cliOutput` envelope
    async fn gluster_xml(&self, host: &str, args: &str) -> Result<CliOutput> {
        let command = format!("{} --xml", self.gluster(args));
        let outputs = self
            .exec_retry(host, vec![command])
            .await
            .map_err(from_xml_failure)?;
        parse_cli_output(&single_output(outputs)?)
    }

    /// Time an operation and report it to metrics and logs
    async fn observe<R, F>(&self, operation: &'static str, host: &str, future: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        debug!(operation, host, "Starting operation");
        if let Some(metrics) = &self.metrics {
            metrics.inc_active_operations();
        }
        let start = Instant::now();
        let result = future.await;
        let elapsed = start.elapsed();

        if let Some(metrics) = &self.metrics {
            metrics.dec_active_operations();
            metrics.record_operation(operation, result.is_ok(), elapsed);
        }

        match &result {
            Ok(_) => info!(operation, host, "Operation completed in {:?}", elapsed),
            Err(e) => error!(operation, host, "Operation failed: {}", e),
        }

        result
    }
}

fn single_output(mut outputs: Vec<String>) -> Result<String> {
    outputs.pop().ok_or_else(|| {
        BrickOpsError::UnexpectedOutput("command produced no output record".to_string())
    })
}

/// gluster writes its XML error envelope to stdout and exits non-zero; recover the
/// structured error from the failure message when present
fn from_xml_failure(err: BrickOpsError) -> BrickOpsError {
    match &err {
        BrickOpsError::CommandFailed { stderr, .. } if stderr.contains("<cliOutput") => {
            match parse_cli_output(stderr) {
                Err(gluster @ BrickOpsError::Gluster { .. }) => gluster,
                _ => err,
            }
        }
        _ => err,
    }
}

/// Text of the error as reported by the node
fn error_message(err: &BrickOpsError) -> &str {
    match err {
        BrickOpsError::CommandFailed { stderr, .. } => stderr,
        BrickOpsError::Gluster { message, .. } => message,
        _ => "",
    }
}

/// Map "does not exist" style failures to NotFound
fn not_found_as(err: BrickOpsError, what: String) -> BrickOpsError {
    let message = error_message(&err);
    if message.contains("does not exist") || message.contains("not found") {
        BrickOpsError::NotFound(what)
    } else {
        err
    }
}

#[async_trait]
impl<T: RemoteTransport> Executor for CmdExecutor<T> {
    async fn glusterd_check(&self, host: &str) -> Result<()> {
        self.observe("glusterd_check", host, self.exec_glusterd_check(host))
            .await
    }

    async fn peer_probe(&self, exec_host: &str, new_node: &str) -> Result<()> {
        self.observe("peer_probe", exec_host, self.exec_peer_probe(exec_host, new_node))
            .await
    }

    async fn peer_detach(&self, exec_host: &str, detach_node: &str) -> Result<()> {
        self.observe(
            "peer_detach",
            exec_host,
            self.exec_peer_detach(exec_host, detach_node),
        )
        .await
    }

    async fn device_setup(
        &self,
        host: &str,
        device: &str,
        vg_id: &str,
        destroy: bool,
    ) -> Result<DeviceInfo> {
        self.observe(
            "device_setup",
            host,
            self.exec_device_setup(host, device, vg_id, destroy),
        )
        .await
    }

    async fn get_device_info(&self, host: &str, device: &str, vg_id: &str) -> Result<DeviceInfo> {
        self.observe(
            "get_device_info",
            host,
            self.exec_get_device_info(host, device, vg_id),
        )
        .await
    }

    async fn device_teardown(&self, host: &str, device: &str, vg_id: &str) -> Result<()> {
        self.observe(
            "device_teardown",
            host,
            self.exec_device_teardown(host, device, vg_id),
        )
        .await
    }

    async fn brick_create(&self, host: &str, brick: &BrickRequest) -> Result<BrickInfo> {
        self.observe("brick_create", host, self.exec_brick_create(host, brick))
            .await
    }

    async fn brick_destroy(&self, host: &str, brick: &BrickRequest) -> Result<bool> {
        self.observe("brick_destroy", host, self.exec_brick_destroy(host, brick))
            .await
    }

    async fn volume_create(&self, host: &str, volume: &VolumeRequest) -> Result<Volume> {
        self.observe("volume_create", host, self.exec_volume_create(host, volume))
            .await
    }

    async fn volume_destroy(&self, host: &str, volume: &str) -> Result<()> {
        self.observe("volume_destroy", host, self.exec_volume_destroy(host, volume))
            .await
    }

    async fn volume_destroy_check(&self, host: &str, volume: &str) -> Result<()> {
        self.observe(
            "volume_destroy_check",
            host,
            self.exec_volume_destroy_check(host, volume),
        )
        .await
    }

    async fn volume_expand(&self, host: &str, volume: &VolumeRequest) -> Result<Volume> {
        self.observe("volume_expand", host, self.exec_volume_expand(host, volume))
            .await
    }

    async fn volume_replace_brick(
        &self,
        host: &str,
        volume: &str,
        old_brick: &BrickInfo,
        new_brick: &BrickInfo,
    ) -> Result<()> {
        self.observe(
            "volume_replace_brick",
            host,
            self.exec_volume_replace_brick(host, volume, old_brick, new_brick),
        )
        .await
    }

    async fn volume_info(&self, host: &str, volume: &str) -> Result<Volume> {
        self.observe("volume_info", host, self.exec_volume_info(host, volume))
            .await
    }

    async fn volume_clone(&self, host: &str, request: &VolumeCloneRequest) -> Result<Volume> {
        self.observe("volume_clone", host, self.exec_volume_clone(host, request))
            .await
    }

    async fn volume_snapshot(
        &self,
        host: &str,
        request: &VolumeSnapshotRequest,
    ) -> Result<Snapshot> {
        self.observe("volume_snapshot", host, self.exec_volume_snapshot(host, request))
            .await
    }

    async fn snapshot_clone_volume(
        &self,
        host: &str,
        request: &SnapshotCloneRequest,
    ) -> Result<Volume> {
        self.observe(
            "snapshot_clone_volume",
            host,
            self.exec_snapshot_clone_volume(host, request),
        )
        .await
    }

    async fn snapshot_clone_block_volume(
        &self,
        host: &str,
        request: &SnapshotCloneRequest,
    ) -> Result<BlockVolumeInfo> {
        warn!(
            "Refusing to clone block volume from snapshot {} of {} on {}",
            request.snapshot, request.volume, host
        );
        Err(BrickOpsError::NotSupported(
            "cloning block volumes from snapshots".to_string(),
        ))
    }

    async fn snapshot_destroy(&self, host: &str, snapshot: &str) -> Result<()> {
        self.observe(
            "snapshot_destroy",
            host,
            self.exec_snapshot_destroy(host, snapshot),
        )
        .await
    }

    async fn heal_info(&self, host: &str, volume: &str) -> Result<HealInfo> {
        self.observe("heal_info", host, self.exec_heal_info(host, volume))
            .await
    }

    fn set_log_level(&self, level: &str) {
        let level = LogLevel::from(level);
        self.log_level.store(level.as_u8(), Ordering::Relaxed);

        match logging::set_global_level(level) {
            Ok(true) => info!("Log level set to {:?}", level),
            Ok(false) => debug!("Log level recorded as {:?}; no global subscriber", level),
            Err(e) => warn!("Unable to change log level to {:?}: {}", level, e),
        }
    }

    async fn block_volume_create(
        &self,
        host: &str,
        block_volume: &BlockVolumeRequest,
    ) -> Result<BlockVolumeInfo> {
        self.observe(
            "block_volume_create",
            host,
            self.exec_block_volume_create(host, block_volume),
        )
        .await
    }

    async fn block_volume_destroy(
        &self,
        host: &str,
        block_hosting_volume_name: &str,
        block_volume_name: &str,
    ) -> Result<()> {
        self.observe(
            "block_volume_destroy",
            host,
            self.exec_block_volume_destroy(host, block_hosting_volume_name, block_volume_name),
        )
        .await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::executors::MockRemoteTransport;
    use std::sync::Mutex;

    /// (host, command) pairs in execution order
    pub type Calls = Arc<Mutex<Vec<(String, String)>>>;

    pub const OK_XML: &str =
        "<cliOutput><opRet>0</opRet><opErrno>0</opErrno><opErrstr/></cliOutput>";

    /// Transport that answers each command through `responder` and records it
    pub fn scripted<F>(responder: F) -> (MockRemoteTransport, Calls)
    where
        F: Fn(&str) -> Result<String> + Send + Sync + 'static,
    {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();

        let mut transport = MockRemoteTransport::new();
        transport
            .expect_exec_commands()
            .returning(move |host, commands, _timeout| {
                let mut outputs = Vec::new();
                for command in commands.iter() {
                    recorded
                        .lock()
                        .unwrap()
                        .push((host.to_string(), command.to_string()));
                    outputs.push(responder(command)?);
                }
                Ok(outputs)
            });

        (transport, calls)
    }

    pub fn executor(transport: MockRemoteTransport) -> CmdExecutor<MockRemoteTransport> {
        executor_with_config(transport, CmdConfig::default())
    }

    pub fn executor_with_config(
        transport: MockRemoteTransport,
        config: CmdConfig,
    ) -> CmdExecutor<MockRemoteTransport> {
        CmdExecutor::new(transport, config, RetryConfig::none())
    }

    pub fn commands(calls: &Calls) -> Vec<String> {
        calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }

    pub fn failed(command: &str, stderr: &str) -> BrickOpsError {
        BrickOpsError::CommandFailed {
            host: "node1".to_string(),
            command: command.to_string(),
            exit_code: Some(1),
            stderr: stderr.to_string(),
        }
    }

    /// `volume info` answer for a started replica-3 volume
    pub fn volume_info_xml(name: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cliOutput><opRet>0</opRet><opErrno>0</opErrno><opErrstr/>
<volInfo><volumes><volume>
<name>{name}</name><id>6b1a4c5e-0000-4000-8000-000000000001</id>
<status>1</status><statusStr>Started</statusStr>
<brickCount>3</brickCount><distCount>3</distCount><stripeCount>1</stripeCount>
<replicaCount>3</replicaCount><arbiterCount>0</arbiterCount>
<disperseCount>0</disperseCount><redundancyCount>0</redundancyCount>
<type>2</type><typeStr>Replicate</typeStr><transport>0</transport>
<bricks>
<brick uuid="u1"><name>node1:/b1/brick</name><hostUuid>u1</hostUuid><isArbiter>0</isArbiter></brick>
<brick uuid="u2"><name>node2:/b2/brick</name><hostUuid>u2</hostUuid><isArbiter>0</isArbiter></brick>
<brick uuid="u3"><name>node3:/b3/brick</name><hostUuid>u3</hostUuid><isArbiter>0</isArbiter></brick>
</bricks>
<optCount>1</optCount>
<options><option><name>performance.client-io-threads</name><value>off</value></option></options>
</volume><count>1</count></volumes></volInfo></cliOutput>"#,
            name = name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::xml::to_xml;
    use std::time::Duration;

    #[test]
    fn test_names() {
        assert_eq!(vg_name("a1b2"), "vg_a1b2");
        assert_eq!(thin_pool_name("c3"), "tp_c3");
        assert_eq!(brick_lv_name("c3"), "brick_c3");
    }

    #[test]
    fn test_from_xml_failure_recovers_gluster_error() {
        let envelope = to_xml(&CliOutput {
            op_ret: -1,
            op_errno: 2,
            op_errstr: Some("Volume vol1 does not exist".to_string()),
            ..Default::default()
        })
        .unwrap();

        let err = from_xml_failure(failed("gluster volume info vol1 --xml", &envelope));
        match err {
            BrickOpsError::Gluster { op_errno, message, .. } => {
                assert_eq!(op_errno, 2);
                assert_eq!(message, "Volume vol1 does not exist");
            }
            other => panic!("expected gluster error, got {:?}", other),
        }

        let err = from_xml_failure(failed("vgremove", "Volume group not found"));
        assert!(matches!(err, BrickOpsError::CommandFailed { .. }));
    }

    #[test]
    fn test_not_found_mapping() {
        let err = not_found_as(
            failed("gluster volume delete vol1", "volume delete: vol1: failed: Volume vol1 does not exist"),
            "volume vol1".to_string(),
        );
        assert!(matches!(err, BrickOpsError::NotFound(_)));

        let err = not_found_as(failed("gluster", "permission denied"), "x".to_string());
        assert!(matches!(err, BrickOpsError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_gluster_commands_carry_cli_timeout() {
        let (transport, calls) = scripted(|_| Ok(String::new()));
        let config = CmdConfig {
            gluster_cli_timeout: 42,
            ..Default::default()
        };
        let executor = executor_with_config(transport, config);

        executor.gluster_exec("node1", "peer status").await.unwrap();
        assert_eq!(
            commands(&calls),
            vec!["gluster --mode=script --timeout=42 peer status".to_string()]
        );
    }

    #[tokio::test]
    async fn test_transient_gluster_errors_are_retried() {
        let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = attempts.clone();
        let (transport, calls) = scripted(move |command| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(failed(
                    command,
                    "volume stop: vol1: failed: Another transaction is in progress for vol1. Please try again after some time.",
                ))
            } else {
                Ok(String::new())
            }
        });
        let executor = CmdExecutor::new(
            transport,
            CmdConfig::default(),
            RetryConfig::new(2, Duration::from_millis(1), Duration::from_millis(2)),
        );

        executor
            .gluster_exec("node1", "volume stop vol1 force")
            .await
            .unwrap();
        assert_eq!(commands(&calls).len(), 2);
    }

    #[tokio::test]
    async fn test_metrics_record_operations() {
        let (transport, _calls) = scripted(|_| Ok("active (running)".to_string()));
        let metrics = Arc::new(ExecutorMetrics::new().unwrap());
        let executor = executor(transport).with_metrics(metrics.clone());

        executor.glusterd_check("node1").await.unwrap();

        let text = metrics.render().unwrap();
        assert!(text.contains("brickops_operations_total"));
        assert!(text.contains("operation=\"glusterd_check\""));
        assert!(text.contains("status=\"success\""));
    }

    #[tokio::test]
    async fn test_set_log_level_records_level() {
        let (transport, _calls) = scripted(|_| Ok(String::new()));
        let executor = executor(transport);
        assert_eq!(executor.log_level(), LogLevel::Info);

        executor.set_log_level("debug");
        assert_eq!(executor.log_level(), LogLevel::Debug);

        executor.set_log_level("warning");
        assert_eq!(executor.log_level(), LogLevel::Warn);
    }

    #[tokio::test]
    async fn test_snapshot_clone_block_volume_not_supported() {
        let (transport, calls) = scripted(|_| Ok(String::new()));
        let executor = executor(transport);

        let result = executor
            .snapshot_clone_block_volume(
                "node1",
                &SnapshotCloneRequest {
                    volume: "blk".to_string(),
                    snapshot: "snap1".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(BrickOpsError::NotSupported(_))));
        assert!(commands(&calls).is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_node_attempts_bounded_by_retry_config() {
        let (transport, calls) = scripted(|_| {
            Err(BrickOpsError::Ssh {
                host: "node1".to_string(),
                message: "Connection refused".to_string(),
            })
        });
        let executor = CmdExecutor::new(
            transport,
            CmdConfig::default(),
            RetryConfig::new(2, Duration::from_millis(1), Duration::from_millis(2)),
        );

        let result = executor.volume_info("node1", "vol1").await;
        assert!(matches!(result, Err(BrickOpsError::Ssh { .. })));
        assert_eq!(commands(&calls).len(), 3);
    }
}
