use super::{error_message, not_found_as, CmdExecutor};
use crate::error::{BrickOpsError, Result};
use crate::executors::RemoteTransport;
use crate::models::{validate_name, BrickInfo, DurabilityType, VolumeCloneRequest, VolumeRequest};
use crate::xml::{HealInfo, Volume};
use tracing::{debug, info, warn};

/// Durability arguments shared by `volume create` and `volume add-brick`
fn durability_args(volume: &VolumeRequest) -> String {
    match volume.durability {
        DurabilityType::None => String::new(),
        DurabilityType::Replica if volume.arbiter => {
            format!("replica {} arbiter 1 ", volume.replica)
        }
        DurabilityType::Replica => format!("replica {} ", volume.replica),
        DurabilityType::Dispersion => format!(
            "disperse-data {} redundancy {} ",
            volume.data, volume.redundancy
        ),
    }
}

fn brick_list(bricks: &[BrickInfo]) -> String {
    bricks
        .iter()
        .map(BrickInfo::address)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Snapshot used as the source of a full volume clone
pub(crate) fn clone_snapshot_name(clone: &str) -> String {
    format!("{}_clone_snap", clone)
}

impl<T: RemoteTransport> CmdExecutor<T> {
    pub(super) async fn exec_volume_create(
        &self,
        host: &str,
        volume: &VolumeRequest,
    ) -> Result<Volume> {
        volume.validate()?;

        self.gluster_exec(
            host,
            &format!(
                "volume create {} {}{} force",
                volume.name,
                durability_args(volume),
                brick_list(&volume.bricks)
            ),
        )
        .await?;

        let mut commands: Vec<String> = volume
            .gluster_volume_options
            .iter()
            .map(|option| self.gluster(&format!("volume set {} {}", volume.name, option)))
            .collect();
        commands.push(self.gluster(&format!("volume start {}", volume.name)));

        if let Err(e) = self.exec_retry(host, commands).await {
            warn!(
                "Volume {} failed to configure or start on {}, removing it",
                volume.name, host
            );
            if let Err(cleanup) = self.exec_volume_destroy(host, &volume.name).await {
                warn!("Unable to remove volume {}: {}", volume.name, cleanup);
            }
            return Err(e);
        }

        info!(
            "Created {} volume {} with {} bricks",
            volume.durability,
            volume.name,
            volume.bricks.len()
        );
        self.exec_volume_info(host, &volume.name).await
    }

    pub(super) async fn exec_volume_expand(
        &self,
        host: &str,
        volume: &VolumeRequest,
    ) -> Result<Volume> {
        volume.validate()?;

        self.gluster_exec(
            host,
            &format!(
                "volume add-brick {} {}{} force",
                volume.name,
                durability_args(volume),
                brick_list(&volume.bricks)
            ),
        )
        .await
        .map_err(|e| not_found_as(e, format!("volume {}", volume.name)))?;

        if self.config.rebalance_on_expansion {
            if let Err(e) = self
                .gluster_exec(host, &format!("volume rebalance {} start", volume.name))
                .await
            {
                warn!("Rebalance of volume {} did not start: {}", volume.name, e);
            }
        }

        self.exec_volume_info(host, &volume.name).await
    }

    pub(super) async fn exec_volume_destroy(&self, host: &str, volume: &str) -> Result<()> {
        validate_name("volume name", volume)?;

        // A volume that never started cannot be stopped
        if let Err(e) = self
            .gluster_exec(host, &format!("volume stop {} force", volume))
            .await
        {
            warn!("Unable to stop volume {}: {}", volume, e);
        }

        self.gluster_exec(host, &format!("volume delete {}", volume))
            .await
            .map_err(|e| not_found_as(e, format!("volume {}", volume)))?;

        info!("Deleted volume {}", volume);
        Ok(())
    }

    pub(super) async fn exec_volume_destroy_check(&self, host: &str, volume: &str) -> Result<()> {
        validate_name("volume name", volume)?;

        let snapshots = self
            .gluster_xml(host, &format!("snapshot list {}", volume))
            .await
            .map_err(|e| not_found_as(e, format!("volume {}", volume)))?
            .into_snapshot_names();

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

    pub(super) async fn exec_volume_replace_brick(
        &self,
        host: &str,
        volume: &str,
        old_brick: &BrickInfo,
        new_brick: &BrickInfo,
    ) -> Result<()> {
        validate_name("volume name", volume)?;
        old_brick.validate()?;
        new_brick.validate()?;
        if old_brick == new_brick {
            return Err(BrickOpsError::Validation(format!(
                "cannot replace brick {} with itself",
                old_brick.address()
            )));
        }

        self.gluster_exec(
            host,
            &format!(
                "volume replace-brick {} {} {} commit force",
                volume,
                old_brick.address(),
                new_brick.address()
            ),
        )
        .await?;

        info!(
            "Replaced brick {} with {} in volume {}",
            old_brick.address(),
            new_brick.address(),
            volume
        );
        Ok(())
    }

    pub(super) async fn exec_volume_info(&self, host: &str, volume: &str) -> Result<Volume> {
        validate_name("volume name", volume)?;

        self.gluster_xml(host, &format!("volume info {}", volume))
            .await
            .map_err(|e| not_found_as(e, format!("volume {}", volume)))?
            .into_volume()
    }

    pub(super) async fn exec_volume_clone(
        &self,
        host: &str,
        request: &VolumeCloneRequest,
    ) -> Result<Volume> {
        validate_name("volume name", &request.volume)?;
        validate_name("clone name", &request.clone)?;
        let snapshot = clone_snapshot_name(&request.clone);

        self.gluster_xml(
            host,
            &format!("snapshot create {} {} no-timestamp", snapshot, request.volume),
        )
        .await
        .map_err(|e| not_found_as(e, format!("volume {}", request.volume)))?;

        let cloned = self.clone_from_snapshot(host, &snapshot, &request.clone).await;

        // The intermediate snapshot goes away whether or not the clone worked
        if let Err(e) = self
            .gluster_exec(host, &format!("snapshot deactivate {}", snapshot))
            .await
        {
            warn!("Unable to deactivate snapshot {}: {}", snapshot, e);
        }
        if let Err(e) = self
            .gluster_exec(host, &format!("snapshot delete {}", snapshot))
            .await
        {
            warn!("Unable to delete snapshot {}: {}", snapshot, e);
        }

        cloned?;
        info!("Cloned volume {} into {}", request.volume, request.clone);
        self.exec_volume_info(host, &request.clone).await
    }

    async fn clone_from_snapshot(&self, host: &str, snapshot: &str, clone: &str) -> Result<()> {
        // activate-on-create clusters hand back an active snapshot
        if let Err(e) = self
            .gluster_xml(host, &format!("snapshot activate {}", snapshot))
            .await
        {
            if !error_message(&e).contains("already activated") {
                return Err(e);
            }
            debug!("Snapshot {} already active", snapshot);
        }
        self.gluster_xml(host, &format!("snapshot clone {} {}", clone, snapshot))
            .await?
            .into_clone()?;
        self.gluster_exec(host, &format!("volume start {}", clone))
            .await
    }

    pub(super) async fn exec_heal_info(&self, host: &str, volume: &str) -> Result<HealInfo> {
        validate_name("volume name", volume)?;

        self.gluster_xml(host, &format!("volume heal {} info", volume))
            .await
            .map_err(|e| not_found_as(e, format!("volume {}", volume)))?
            .into_heal_info()
    }
}
