//! In-memory executor
//!
//! [`MockExecutor`] keeps a whole cluster (peers, devices, bricks, volumes,
//! snapshots, block volumes) in memory and applies the same request
//! validation as the command-building executor. Tests can inject failures
//! per operation and inspect the calls made.

use crate::error::{BrickOpsError, Result};
use crate::executors::Executor;
use crate::logging::LogLevel;
use crate::models::{
    validate_name, BlockVolumeInfo, BlockVolumeRequest, BrickInfo, BrickRequest, DeviceInfo,
    DurabilityType, SnapshotCloneRequest, VolumeCloneRequest, VolumeRequest,
    VolumeSnapshotRequest,
};
use crate::xml::{
    Brick, BrickHealStatus, Bricks, HealInfo, HealInfoBricks, Snapshot, Volume, VolumeOption,
    VolumeOptions,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// 500 GiB in KiB
const DEFAULT_DEVICE_SIZE: u64 = 500 * 1024 * 1024;
/// 4 MiB in KiB
const DEFAULT_EXTENT_SIZE: u64 = 4096;

/// One executor call as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub operation: &'static str,
    pub host: String,
}

#[derive(Debug, Clone)]
struct MockDevice {
    device: String,
    size: u64,
    used: u64,
}

#[derive(Debug, Clone)]
struct MockSnapshot {
    uuid: String,
    /// Volume as it was when the snapshot was taken
    image: Volume,
}

#[derive(Debug, Default)]
struct ClusterState {
    peers: BTreeSet<String>,
    /// Keyed by (host, vg_id)
    devices: HashMap<(String, String), MockDevice>,
    /// Keyed by (host, brick name)
    bricks: HashMap<(String, String), BrickRequest>,
    volumes: BTreeMap<String, Volume>,
    snapshots: BTreeMap<String, MockSnapshot>,
    /// Keyed by (hosting volume, block volume)
    block_volumes: BTreeMap<(String, String), BlockVolumeInfo>,
    failures: HashMap<String, String>,
    calls: Vec<MockCall>,
}

/// Stateful in-memory executor
pub struct MockExecutor {
    state: Mutex<ClusterState>,
    device_size: u64,
    log_level: AtomicU8,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::with_device_size(DEFAULT_DEVICE_SIZE)
    }

    /// Every device set up reports `size` KiB of space
    pub fn with_device_size(size: u64) -> Self {
        Self {
            state: Mutex::new(ClusterState::default()),
            device_size: size,
            log_level: AtomicU8::new(LogLevel::Info.as_u8()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every later call of `operation` fail with `message`
    pub fn fail_operation(&self, operation: &str, message: &str) {
        self.lock()
            .failures
            .insert(operation.to_string(), message.to_string());
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn peers(&self) -> Vec<String> {
        self.lock().peers.iter().cloned().collect()
    }

    pub fn volume_names(&self) -> Vec<String> {
        self.lock().volumes.keys().cloned().collect()
    }

    pub fn snapshot_names(&self) -> Vec<String> {
        self.lock().snapshots.keys().cloned().collect()
    }

    pub fn brick_count(&self) -> usize {
        self.lock().bricks.len()
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_u8(self.log_level.load(Ordering::Relaxed))
    }

    /// Record the call and apply any injected failure
    fn begin(&self, operation: &'static str, host: &str) -> Result<MutexGuard<'_, ClusterState>> {
        let mut state = self.lock();
        state.calls.push(MockCall {
            operation,
            host: host.to_string(),
        });
        debug!(operation, host, "Mock executor call");

        if host.is_empty() {
            return Err(BrickOpsError::Validation("host cannot be empty".to_string()));
        }
        if let Some(message) = state.failures.get(operation) {
            return Err(BrickOpsError::Execution(message.clone()));
        }
        Ok(state)
    }
}

fn brick_dir(brick: &BrickRequest) -> String {
    format!("{}/brick", brick.path.trim_end_matches('/'))
}

fn new_bricks(bricks: &[BrickInfo], arbiter: bool, offset: usize) -> Vec<Brick> {
    bricks
        .iter()
        .enumerate()
        .map(|(index, brick)| Brick {
            uuid: Uuid::new_v4().to_string(),
            name: brick.address(),
            host_uuid: Uuid::new_v4().to_string(),
            is_arbiter: i32::from(arbiter && (offset + index) % 3 == 2),
        })
        .collect()
}

/// Recompute counts, type and type string from the brick list and layout
fn set_layout(volume: &mut Volume, request: &VolumeRequest) {
    let bricks = volume.bricks.brick_list.len() as i32;
    let set_size = request.set_size().max(1) as i32;

    volume.brick_count = bricks;
    volume.dist_count = bricks / set_size;
    volume.stripe_count = 1;
    volume.replica_count = 1;
    volume.arbiter_count = 0;
    volume.disperse_count = 0;
    volume.redundancy_count = 0;

    let base = match request.durability {
        DurabilityType::None => {
            volume.volume_type = 0;
            "Distribute"
        }
        DurabilityType::Replica => {
            volume.volume_type = 2;
            volume.replica_count = request.replica as i32;
            volume.arbiter_count = i32::from(request.arbiter);
            "Replicate"
        }
        DurabilityType::Dispersion => {
            volume.volume_type = 4;
            volume.disperse_count = set_size;
            volume.redundancy_count = request.redundancy as i32;
            "Disperse"
        }
    };

    volume.type_str = if request.durability != DurabilityType::None && volume.dist_count > 1 {
        format!("Distributed-{}", base)
    } else {
        base.to_string()
    };
}

fn build_volume(request: &VolumeRequest) -> Volume {
    let options: Vec<VolumeOption> = request
        .gluster_volume_options
        .iter()
        .filter_map(|option| option.split_once(char::is_whitespace))
        .map(|(name, value)| VolumeOption {
            name: name.to_string(),
            value: value.trim().to_string(),
        })
        .collect();

    let mut volume = Volume {
        volume_name: request.name.clone(),
        id: Uuid::new_v4().to_string(),
        status: 1,
        status_str: "Started".to_string(),
        bricks: Bricks {
            brick_list: new_bricks(&request.bricks, request.arbiter, 0),
        },
        opt_count: options.len() as i32,
        options: VolumeOptions {
            option_list: options,
        },
        ..Default::default()
    };
    set_layout(&mut volume, request);
    volume
}

/// Started copy of `source` whose bricks live under the snapshot mount area
fn clone_volume(source: &Volume, name: &str) -> Volume {
    let id = Uuid::new_v4().to_string();
    let mut clone = source.clone();
    clone.volume_name = name.to_string();
    clone.id = id.clone();
    clone.status = 1;
    clone.status_str = "Started".to_string();

    for (index, brick) in clone.bricks.brick_list.iter_mut().enumerate() {
        let host = brick
            .name
            .split_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_default();
        brick.uuid = Uuid::new_v4().to_string();
        brick.name = format!("{}:/run/gluster/snaps/{}/brick{}/brick", host, id, index + 1);
    }
    clone
}

/// Layout of an existing volume, for recomputing counts after expansion
fn layout_of(volume: &Volume) -> VolumeRequest {
    VolumeRequest {
        name: volume.volume_name.clone(),
        durability: volume.durability(),
        replica: volume.replica_count.max(0) as u32,
        arbiter: volume.arbiter_count > 0,
        data: (volume.disperse_count - volume.redundancy_count).max(0) as u32,
        redundancy: volume.redundancy_count.max(0) as u32,
        ..Default::default()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn glusterd_check(&self, host: &str) -> Result<()> {
        let _state = self.begin("glusterd_check", host)?;
        Ok(())
    }

    async fn peer_probe(&self, exec_host: &str, new_node: &str) -> Result<()> {
        let mut state = self.begin("peer_probe", exec_host)?;
        if new_node.is_empty() {
            return Err(BrickOpsError::Validation("peer cannot be empty".to_string()));
        }
        state.peers.insert(exec_host.to_string());
        state.peers.insert(new_node.to_string());
        Ok(())
    }

    async fn peer_detach(&self, exec_host: &str, detach_node: &str) -> Result<()> {
        let mut state = self.begin("peer_detach", exec_host)?;
        if !state.peers.remove(detach_node) {
            return Err(BrickOpsError::NotFound(format!("peer {}", detach_node)));
        }
        Ok(())
    }

    async fn device_setup(
        &self,
        host: &str,
        device: &str,
        vg_id: &str,
        destroy: bool,
    ) -> Result<DeviceInfo> {
        let mut state = self.begin("device_setup", host)?;
        validate_name("volume group id", vg_id)?;
        if !device.starts_with('/') {
            return Err(BrickOpsError::Validation(format!(
                "device '{}' must be an absolute path",
                device
            )));
        }

        let key = (host.to_string(), vg_id.to_string());
        if state.devices.contains_key(&key) {
            return Err(BrickOpsError::Conflict(format!(
                "volume group vg_{} already exists on {}",
                vg_id, host
            )));
        }
        let in_use = state
            .devices
            .iter()
            .any(|((h, _), d)| h == host && d.device == device);
        if in_use && !destroy {
            return Err(BrickOpsError::Conflict(format!(
                "device {} on {} already holds a volume group",
                device, host
            )));
        }

        state.devices.insert(
            key,
            MockDevice {
                device: device.to_string(),
                size: self.device_size,
                used: 0,
            },
        );

        Ok(DeviceInfo {
            size: self.device_size,
            extent_size: DEFAULT_EXTENT_SIZE,
        })
    }

    async fn get_device_info(&self, host: &str, device: &str, vg_id: &str) -> Result<DeviceInfo> {
        let state = self.begin("get_device_info", host)?;
        let entry = state
            .devices
            .get(&(host.to_string(), vg_id.to_string()))
            .filter(|d| d.device == device)
            .ok_or_else(|| BrickOpsError::NotFound(format!("volume group vg_{}", vg_id)))?;

        Ok(DeviceInfo {
            size: entry.size - entry.used,
            extent_size: DEFAULT_EXTENT_SIZE,
        })
    }

    async fn device_teardown(&self, host: &str, device: &str, vg_id: &str) -> Result<()> {
        let mut state = self.begin("device_teardown", host)?;
        let key = (host.to_string(), vg_id.to_string());

        match state.devices.get(&key) {
            Some(entry) if entry.device == device => {}
            _ => return Err(BrickOpsError::NotFound(format!("volume group vg_{}", vg_id))),
        }
        let bricks = state
            .bricks
            .iter()
            .filter(|((h, _), brick)| h == host && brick.vg_id == vg_id)
            .count();
        if bricks > 0 {
            return Err(BrickOpsError::Conflict(format!(
                "volume group vg_{} still holds {} brick(s)",
                vg_id, bricks
            )));
        }

        state.devices.remove(&key);
        Ok(())
    }

    async fn brick_create(&self, host: &str, brick: &BrickRequest) -> Result<BrickInfo> {
        let mut state = self.begin("brick_create", host)?;
        brick.validate()?;

        let key = (host.to_string(), brick.name.clone());
        if state.bricks.contains_key(&key) {
            return Err(BrickOpsError::Conflict(format!(
                "brick {} already exists on {}",
                brick.name, host
            )));
        }

        let needed = brick.tp_size + brick.pool_metadata_size;
        let device = state
            .devices
            .get_mut(&(host.to_string(), brick.vg_id.clone()))
            .ok_or_else(|| BrickOpsError::NotFound(format!("volume group vg_{}", brick.vg_id)))?;
        let free = device.size - device.used;
        if needed > free {
            return Err(BrickOpsError::Execution(format!(
                "volume group vg_{} has {} KiB free, brick {} needs {} KiB",
                brick.vg_id, free, brick.name, needed
            )));
        }
        device.used += needed;

        state.bricks.insert(key, brick.clone());
        Ok(BrickInfo::new(host, brick_dir(brick)))
    }

    async fn brick_destroy(&self, host: &str, brick: &BrickRequest) -> Result<bool> {
        let mut state = self.begin("brick_destroy", host)?;
        brick.validate()?;

        let stored = state
            .bricks
            .remove(&(host.to_string(), brick.name.clone()))
            .ok_or_else(|| BrickOpsError::NotFound(format!("brick {} on {}", brick.name, host)))?;

        if let Some(device) = state
            .devices
            .get_mut(&(host.to_string(), stored.vg_id.clone()))
        {
            device.used = device
                .used
                .saturating_sub(stored.tp_size + stored.pool_metadata_size);
        }
        Ok(true)
    }

    async fn volume_create(&self, host: &str, volume: &VolumeRequest) -> Result<Volume> {
        let mut state = self.begin("volume_create", host)?;
        volume.validate()?;

        if state.volumes.contains_key(&volume.name) {
            return Err(BrickOpsError::Conflict(format!(
                "volume {} already exists",
                volume.name
            )));
        }

        let created = build_volume(volume);
        state.volumes.insert(volume.name.clone(), created.clone());
        Ok(created)
    }

    async fn volume_destroy(&self, host: &str, volume: &str) -> Result<()> {
        let mut state = self.begin("volume_destroy", host)?;
        if !state.volumes.contains_key(volume) {
            return Err(BrickOpsError::NotFound(format!("volume {}", volume)));
        }
        if state
            .snapshots
            .values()
            .any(|snapshot| snapshot.image.volume_name == volume)
        {
            return Err(BrickOpsError::Conflict(format!(
                "volume {} has snapshots",
                volume
            )));
        }

        state.volumes.remove(volume);
        Ok(())
    }

    async fn volume_destroy_check(&self, host: &str, volume: &str) -> Result<()> {
        let state = self.begin("volume_destroy_check", host)?;
        if !state.volumes.contains_key(volume) {
            return Err(BrickOpsError::NotFound(format!("volume {}", volume)));
        }

        let snapshots: Vec<&str> = state
            .snapshots
            .iter()
            .filter(|(_, snapshot)| snapshot.image.volume_name == volume)
            .map(|(name, _)| name.as_str())
            .collect();
        if !snapshots.is_empty() {
            return Err(BrickOpsError::Conflict(format!(
                "volume {} has {} snapshot(s): {}",
                volume,
                snapshots.len(),
                snapshots.join(", ")
            )));
        }
        Ok(())
    }

    async fn volume_expand(&self, host: &str, volume: &VolumeRequest) -> Result<Volume> {
        let mut state = self.begin("volume_expand", host)?;
        volume.validate()?;

        let existing = state
            .volumes
            .get_mut(&volume.name)
            .ok_or_else(|| BrickOpsError::NotFound(format!("volume {}", volume.name)))?;

        let layout = layout_of(existing);
        if layout.durability != volume.durability || layout.set_size() != volume.set_size() {
            return Err(BrickOpsError::Validation(format!(
                "expansion of {} must keep its {} layout with set size {}",
                volume.name,
                layout.durability,
                layout.set_size()
            )));
        }

        let offset = existing.bricks.brick_list.len();
        existing
            .bricks
            .brick_list
            .extend(new_bricks(&volume.bricks, volume.arbiter, offset));
        set_layout(existing, &layout);
        Ok(existing.clone())
    }

    async fn volume_replace_brick(
        &self,
        host: &str,
        volume: &str,
        old_brick: &BrickInfo,
        new_brick: &BrickInfo,
    ) -> Result<()> {
        let mut state = self.begin("volume_replace_brick", host)?;
        let existing = state
            .volumes
            .get_mut(volume)
            .ok_or_else(|| BrickOpsError::NotFound(format!("volume {}", volume)))?;

        let (old_name, new_name) = (old_brick.address(), new_brick.address());
        if existing
            .bricks
            .brick_list
            .iter()
            .any(|brick| brick.name == new_name)
        {
            return Err(BrickOpsError::Conflict(format!(
                "brick {} is already part of volume {}",
                new_name, volume
            )));
        }

        let brick = existing
            .bricks
            .brick_list
            .iter_mut()
            .find(|brick| brick.name == old_name)
            .ok_or_else(|| {
                BrickOpsError::NotFound(format!("brick {} in volume {}", old_name, volume))
            })?;
        brick.name = new_name;
        brick.uuid = Uuid::new_v4().to_string();
        Ok(())
    }

    async fn volume_info(&self, host: &str, volume: &str) -> Result<Volume> {
        let state = self.begin("volume_info", host)?;
        state
            .volumes
            .get(volume)
            .cloned()
            .ok_or_else(|| BrickOpsError::NotFound(format!("volume {}", volume)))
    }

    async fn volume_clone(&self, host: &str, request: &VolumeCloneRequest) -> Result<Volume> {
        let mut state = self.begin("volume_clone", host)?;
        validate_name("clone name", &request.clone)?;

        let source = state
            .volumes
            .get(&request.volume)
            .ok_or_else(|| BrickOpsError::NotFound(format!("volume {}", request.volume)))?;
        if state.volumes.contains_key(&request.clone) {
            return Err(BrickOpsError::Conflict(format!(
                "volume {} already exists",
                request.clone
            )));
        }

        let clone = clone_volume(source, &request.clone);
        state.volumes.insert(request.clone.clone(), clone.clone());
        Ok(clone)
    }

    async fn volume_snapshot(
        &self,
        host: &str,
        request: &VolumeSnapshotRequest,
    ) -> Result<Snapshot> {
        let mut state = self.begin("volume_snapshot", host)?;
        validate_name("snapshot name", &request.snapshot)?;

        let image = state
            .volumes
            .get(&request.volume)
            .cloned()
            .ok_or_else(|| BrickOpsError::NotFound(format!("volume {}", request.volume)))?;
        if state.snapshots.contains_key(&request.snapshot) {
            return Err(BrickOpsError::Conflict(format!(
                "snapshot {} already exists",
                request.snapshot
            )));
        }

        let uuid = Uuid::new_v4().to_string();
        state.snapshots.insert(
            request.snapshot.clone(),
            MockSnapshot {
                uuid: uuid.clone(),
                image,
            },
        );

        Ok(Snapshot {
            name: request.snapshot.clone(),
            uuid,
        })
    }

    async fn snapshot_clone_volume(
        &self,
        host: &str,
        request: &SnapshotCloneRequest,
    ) -> Result<Volume> {
        let mut state = self.begin("snapshot_clone_volume", host)?;
        validate_name("volume name", &request.volume)?;

        let snapshot = state
            .snapshots
            .get(&request.snapshot)
            .ok_or_else(|| BrickOpsError::NotFound(format!("snapshot {}", request.snapshot)))?;
        if state.volumes.contains_key(&request.volume) {
            return Err(BrickOpsError::Conflict(format!(
                "volume {} already exists",
                request.volume
            )));
        }

        let clone = clone_volume(&snapshot.image, &request.volume);
        debug!(
            "Cloned snapshot {} ({}) into {}",
            request.snapshot, snapshot.uuid, request.volume
        );
        state.volumes.insert(request.volume.clone(), clone.clone());
        Ok(clone)
    }

    async fn snapshot_clone_block_volume(
        &self,
        host: &str,
        _request: &SnapshotCloneRequest,
    ) -> Result<BlockVolumeInfo> {
        let _state = self.begin("snapshot_clone_block_volume", host)?;
        Err(BrickOpsError::NotSupported(
            "cloning block volumes from snapshots".to_string(),
        ))
    }

    async fn snapshot_destroy(&self, host: &str, snapshot: &str) -> Result<()> {
        let mut state = self.begin("snapshot_destroy", host)?;
        state
            .snapshots
            .remove(snapshot)
            .map(|_| ())
            .ok_or_else(|| BrickOpsError::NotFound(format!("snapshot {}", snapshot)))
    }

    async fn heal_info(&self, host: &str, volume: &str) -> Result<HealInfo> {
        let state = self.begin("heal_info", host)?;
        let existing = state
            .volumes
            .get(volume)
            .ok_or_else(|| BrickOpsError::NotFound(format!("volume {}", volume)))?;

        Ok(HealInfo {
            bricks: HealInfoBricks {
                brick_list: existing
                    .bricks
                    .brick_list
                    .iter()
                    .map(|brick| BrickHealStatus {
                        host_uuid: brick.host_uuid.clone(),
                        name: brick.name.clone(),
                        status: "Connected".to_string(),
                        number_of_entries: "0".to_string(),
                    })
                    .collect(),
            },
        })
    }

    fn set_log_level(&self, level: &str) {
        let level = LogLevel::from(level);
        self.log_level.store(level.as_u8(), Ordering::Relaxed);
        debug!("Mock executor log level set to {:?}", level);
    }

    async fn block_volume_create(
        &self,
        host: &str,
        block_volume: &BlockVolumeRequest,
    ) -> Result<BlockVolumeInfo> {
        let mut state = self.begin("block_volume_create", host)?;
        block_volume.validate()?;

        if !state
            .volumes
            .contains_key(&block_volume.gluster_volume_name)
        {
            return Err(BrickOpsError::NotFound(format!(
                "block hosting volume {}",
                block_volume.gluster_volume_name
            )));
        }
        let key = (
            block_volume.gluster_volume_name.clone(),
            block_volume.name.clone(),
        );
        if state.block_volumes.contains_key(&key) {
            return Err(BrickOpsError::Conflict(format!(
                "block volume {}/{} already exists",
                key.0, key.1
            )));
        }

        let id = Uuid::new_v4();
        let (username, password) = if block_volume.auth {
            (id.to_string(), Uuid::new_v4().simple().to_string())
        } else {
            (String::new(), String::new())
        };

        let info = BlockVolumeInfo {
            name: block_volume.name.clone(),
            size: block_volume.size,
            gluster_volume_name: block_volume.gluster_volume_name.clone(),
            gluster_node: block_volume.gluster_node.clone(),
            ha_count: block_volume.ha_count,
            block_hosts: block_volume.block_hosts.clone(),
            iqn: format!("iqn.2016-12.org.gluster-block:{}", id),
            username,
            password,
        };
        state.block_volumes.insert(key, info.clone());
        Ok(info)
    }

    async fn block_volume_destroy(
        &self,
        host: &str,
        block_hosting_volume_name: &str,
        block_volume_name: &str,
    ) -> Result<()> {
        let mut state = self.begin("block_volume_destroy", host)?;
        let removed = state.block_volumes.remove(&(
            block_hosting_volume_name.to_string(),
            block_volume_name.to_string(),
        ));
        if removed.is_none() {
            debug!(
                "Block volume {}/{} already gone",
                block_hosting_volume_name, block_volume_name
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replica_request(name: &str) -> VolumeRequest {
        VolumeRequest {
            bricks: vec![
                BrickInfo::new("node1", "/b1/brick"),
                BrickInfo::new("node2", "/b2/brick"),
                BrickInfo::new("node3", "/b3/brick"),
            ],
            name: name.to_string(),
            durability: DurabilityType::Replica,
            gluster_volume_options: vec!["performance.client-io-threads off".to_string()],
            replica: 3,
            ..Default::default()
        }
    }

    fn brick_request(name: &str, tp_size: u64) -> BrickRequest {
        BrickRequest {
            vg_id: "d1".to_string(),
            name: name.to_string(),
            tp_size,
            size: tp_size,
            pool_metadata_size: 16,
            gid: 0,
            path: format!("/var/lib/brickops/mounts/vg_d1/brick_{}", name),
        }
    }

    #[tokio::test]
    async fn test_device_and_brick_lifecycle() {
        let executor = MockExecutor::with_device_size(10_000);

        let info = executor
            .device_setup("node1", "/dev/sdb", "d1", false)
            .await
            .unwrap();
        assert_eq!(info.size, 10_000);

        let brick = executor
            .brick_create("node1", &brick_request("b1", 4_000))
            .await
            .unwrap();
        assert_eq!(brick.path, "/var/lib/brickops/mounts/vg_d1/brick_b1/brick");

        let info = executor
            .get_device_info("node1", "/dev/sdb", "d1")
            .await
            .unwrap();
        assert_eq!(info.size, 10_000 - 4_016);

        let result = executor
            .brick_create("node1", &brick_request("b2", 8_000))
            .await;
        assert!(matches!(result, Err(BrickOpsError::Execution(_))));

        let result = executor.device_teardown("node1", "/dev/sdb", "d1").await;
        assert!(matches!(result, Err(BrickOpsError::Conflict(_))));

        assert!(executor
            .brick_destroy("node1", &brick_request("b1", 4_000))
            .await
            .unwrap());
        executor
            .device_teardown("node1", "/dev/sdb", "d1")
            .await
            .unwrap();
        assert!(executor
            .get_device_info("node1", "/dev/sdb", "d1")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_volume_lifecycle() {
        let executor = MockExecutor::new();

        let volume = executor
            .volume_create("node1", &replica_request("vol1"))
            .await
            .unwrap();
        assert_eq!(volume.durability(), DurabilityType::Replica);
        assert_eq!(volume.replica_count, 3);
        assert_eq!(volume.type_str, "Replicate");
        assert_eq!(volume.option("performance.client-io-threads"), Some("off"));

        let result = executor
            .volume_create("node1", &replica_request("vol1"))
            .await;
        assert!(matches!(result, Err(BrickOpsError::Conflict(_))));

        let mut expansion = replica_request("vol1");
        expansion.bricks = vec![
            BrickInfo::new("node1", "/b4/brick"),
            BrickInfo::new("node2", "/b5/brick"),
            BrickInfo::new("node3", "/b6/brick"),
        ];
        let volume = executor.volume_expand("node1", &expansion).await.unwrap();
        assert_eq!(volume.brick_count, 6);
        assert_eq!(volume.dist_count, 2);
        assert_eq!(volume.type_str, "Distributed-Replicate");

        executor
            .volume_replace_brick(
                "node1",
                "vol1",
                &BrickInfo::new("node2", "/b2/brick"),
                &BrickInfo::new("node4", "/b7/brick"),
            )
            .await
            .unwrap();
        let volume = executor.volume_info("node1", "vol1").await.unwrap();
        assert!(volume.brick_names().contains(&"node4:/b7/brick"));
        assert!(!volume.brick_names().contains(&"node2:/b2/brick"));

        let heal = executor.heal_info("node1", "vol1").await.unwrap();
        assert_eq!(heal.bricks.brick_list.len(), 6);
        assert_eq!(heal.pending_entries(), 0);

        executor.volume_destroy_check("node1", "vol1").await.unwrap();
        executor.volume_destroy("node1", "vol1").await.unwrap();
        assert!(matches!(
            executor.volume_info("node1", "vol1").await,
            Err(BrickOpsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_volume_rejected() {
        let executor = MockExecutor::new();
        let mut request = replica_request("vol1");
        request.bricks.pop();

        let result = executor.volume_create("node1", &request).await;
        assert!(matches!(result, Err(BrickOpsError::Validation(_))));
        assert!(executor.volume_names().is_empty());
    }

    #[tokio::test]
    async fn test_arbiter_bricks_marked() {
        let executor = MockExecutor::new();
        let mut request = replica_request("arb");
        request.arbiter = true;

        let volume = executor.volume_create("node1", &request).await.unwrap();
        let arbiters: Vec<i32> = volume
            .bricks
            .brick_list
            .iter()
            .map(|brick| brick.is_arbiter)
            .collect();
        assert_eq!(arbiters, vec![0, 0, 1]);
        assert_eq!(volume.arbiter_count, 1);
    }

    #[tokio::test]
    async fn test_snapshot_lifecycle() {
        let executor = MockExecutor::new();
        executor
            .volume_create("node1", &replica_request("vol1"))
            .await
            .unwrap();

        let request = VolumeSnapshotRequest {
            volume: "vol1".to_string(),
            snapshot: "snap1".to_string(),
            description: String::new(),
        };
        let snapshot = executor.volume_snapshot("node1", &request).await.unwrap();
        assert_eq!(snapshot.name, "snap1");
        assert!(!snapshot.uuid.is_empty());

        let result = executor.volume_snapshot("node1", &request).await;
        assert!(matches!(result, Err(BrickOpsError::Conflict(_))));

        assert!(matches!(
            executor.volume_destroy_check("node1", "vol1").await,
            Err(BrickOpsError::Conflict(_))
        ));

        let clone = executor
            .snapshot_clone_volume(
                "node1",
                &SnapshotCloneRequest {
                    volume: "vol1_restored".to_string(),
                    snapshot: "snap1".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(clone.volume_name, "vol1_restored");
        assert!(clone.is_started());
        assert!(clone.brick_names()[0].starts_with("node1:/run/gluster/snaps/"));

        executor.snapshot_destroy("node1", "snap1").await.unwrap();
        executor.volume_destroy_check("node1", "vol1").await.unwrap();
        assert!(matches!(
            executor.snapshot_destroy("node1", "snap1").await,
            Err(BrickOpsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_volume_clone() {
        let executor = MockExecutor::new();
        executor
            .volume_create("node1", &replica_request("vol1"))
            .await
            .unwrap();

        let request = VolumeCloneRequest {
            volume: "vol1".to_string(),
            clone: "vol2".to_string(),
        };
        let clone = executor.volume_clone("node1", &request).await.unwrap();
        assert_eq!(clone.volume_name, "vol2");
        assert_eq!(clone.brick_count, 3);
        assert_eq!(executor.volume_names(), vec!["vol1", "vol2"]);
        assert!(executor.snapshot_names().is_empty());

        let result = executor.volume_clone("node1", &request).await;
        assert!(matches!(result, Err(BrickOpsError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_block_volumes() {
        let executor = MockExecutor::new();
        executor
            .volume_create("node1", &replica_request("bhv"))
            .await
            .unwrap();

        let request = BlockVolumeRequest {
            name: "blk1".to_string(),
            size: 5,
            gluster_volume_name: "bhv".to_string(),
            gluster_node: "node1".to_string(),
            ha_count: 2,
            block_hosts: vec!["node1".to_string(), "node2".to_string()],
            auth: true,
        };
        let info = executor
            .block_volume_create("node1", &request)
            .await
            .unwrap();
        assert!(info.iqn.starts_with("iqn.2016-12.org.gluster-block:"));
        assert!(!info.username.is_empty());
        assert!(!info.password.is_empty());

        let mut orphan = request.clone();
        orphan.gluster_volume_name = "missing".to_string();
        assert!(matches!(
            executor.block_volume_create("node1", &orphan).await,
            Err(BrickOpsError::NotFound(_))
        ));

        executor
            .block_volume_destroy("node1", "bhv", "blk1")
            .await
            .unwrap();
        executor
            .block_volume_destroy("node1", "bhv", "blk1")
            .await
            .unwrap();

        assert!(matches!(
            executor
                .snapshot_clone_block_volume(
                    "node1",
                    &SnapshotCloneRequest {
                        volume: "bhv".to_string(),
                        snapshot: "s".to_string(),
                    },
                )
                .await,
            Err(BrickOpsError::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn test_peers() {
        let executor = MockExecutor::new();
        executor.peer_probe("node1", "node2").await.unwrap();
        assert_eq!(executor.peers(), vec!["node1", "node2"]);

        executor.peer_detach("node1", "node2").await.unwrap();
        assert!(matches!(
            executor.peer_detach("node1", "node2").await,
            Err(BrickOpsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_injection_and_calls() {
        let executor = MockExecutor::new();
        executor.fail_operation("glusterd_check", "glusterd is not running");

        match executor.glusterd_check("node1").await {
            Err(BrickOpsError::Execution(message)) => {
                assert_eq!(message, "glusterd is not running")
            }
            other => panic!("expected injected failure, got {:?}", other),
        }

        executor.clear_failures();
        executor.glusterd_check("node2").await.unwrap();

        assert_eq!(executor.call_count("glusterd_check"), 2);
        assert_eq!(
            executor.calls()[1],
            MockCall {
                operation: "glusterd_check",
                host: "node2".to_string(),
            }
        );
    }

    #[test]
    fn test_set_log_level() {
        let executor = MockExecutor::new();
        executor.set_log_level("trace");
        assert_eq!(executor.log_level(), LogLevel::Trace);
    }
}
