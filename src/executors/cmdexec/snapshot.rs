use super::{error_message, not_found_as, CmdExecutor};
use crate::error::{BrickOpsError, Result};
use crate::executors::RemoteTransport;
use crate::models::{validate_name, SnapshotCloneRequest, VolumeSnapshotRequest};
use crate::xml::{Snapshot, Volume};
use tracing::{debug, info, warn};

impl<T: RemoteTransport> CmdExecutor<T> {
    pub(super) async fn exec_volume_snapshot(
        &self,
        host: &str,
        request: &VolumeSnapshotRequest,
    ) -> Result<Snapshot> {
        validate_name("volume name", &request.volume)?;
        validate_name("snapshot name", &request.snapshot)?;
        if request.description.contains(['"', '`', '$', '\\']) {
            return Err(BrickOpsError::Validation(format!(
                "snapshot description '{}' contains forbidden characters",
                request.description
            )));
        }

        let mut args = format!(
            "snapshot create {} {} no-timestamp",
            request.snapshot, request.volume
        );
        if !request.description.is_empty() {
            args.push_str(&format!(" description \"{}\"", request.description));
        }

        let snapshot = self
            .gluster_xml(host, &args)
            .await
            .map_err(|e| not_found_as(e, format!("volume {}", request.volume)))?
            .into_snapshot()?;

        info!("Created snapshot {} of volume {}", snapshot.name, request.volume);
        Ok(snapshot)
    }

    pub(super) async fn exec_snapshot_clone_volume(
        &self,
        host: &str,
        request: &SnapshotCloneRequest,
    ) -> Result<Volume> {
        validate_name("volume name", &request.volume)?;
        validate_name("snapshot name", &request.snapshot)?;

        if let Err(e) = self
            .gluster_xml(host, &format!("snapshot activate {}", request.snapshot))
            .await
        {
            if error_message(&e).contains("already activated") {
                debug!("Snapshot {} already active", request.snapshot);
            } else {
                return Err(not_found_as(e, format!("snapshot {}", request.snapshot)));
            }
        }

        let clone = self
            .gluster_xml(
                host,
                &format!("snapshot clone {} {}", request.volume, request.snapshot),
            )
            .await?
            .into_clone()?;
        debug!("Clone {} created with id {}", clone.name, clone.uuid);

        self.gluster_exec(host, &format!("volume start {}", request.volume))
            .await?;

        info!(
            "Cloned snapshot {} into volume {}",
            request.snapshot, request.volume
        );
        self.exec_volume_info(host, &request.volume).await
    }

    pub(super) async fn exec_snapshot_destroy(&self, host: &str, snapshot: &str) -> Result<()> {
        validate_name("snapshot name", snapshot)?;

        // Deleting requires the snapshot to be inactive; it may already be
        if let Err(e) = self
            .gluster_xml(host, &format!("snapshot deactivate {}", snapshot))
            .await
        {
            warn!("Unable to deactivate snapshot {}: {}", snapshot, e);
        }

        let deleted = self
            .gluster_xml(host, &format!("snapshot delete {}", snapshot))
            .await
            .map_err(|e| not_found_as(e, format!("snapshot {}", snapshot)))?
            .into_snap_delete()?;

        let mut statuses = deleted.statuses().peekable();
        if statuses.peek().is_none() {
            return Err(BrickOpsError::UnexpectedOutput(format!(
                "snapshot {} delete reported no status",
                snapshot
            )));
        }
        if let Some(status) = statuses.find(|status| !status.succeeded()) {
            return Err(BrickOpsError::UnexpectedOutput(format!(
                "snapshot {} delete reported status '{}'",
                snapshot, status.status
            )));
        }

        info!("Deleted snapshot {}", snapshot);
        Ok(())
    }
}
