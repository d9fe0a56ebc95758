use super::{brick_lv_name, error_message, thin_pool_name, vg_name, CmdExecutor};
use crate::error::{BrickOpsError, Result};
use crate::executors::RemoteTransport;
use crate::models::{validate_device_path, BrickInfo, BrickRequest};
use tracing::{debug, info, warn};

const MOUNT_OPTIONS: &str = "rw,inode64,noatime,nouuid";

/// Paths and LVM names derived from a brick request
struct BrickLayout {
    vg: String,
    thin_pool: String,
    lv: String,
    device: String,
    mount: String,
    brick_dir: String,
}

impl BrickLayout {
    fn new(brick: &BrickRequest) -> Self {
        let vg = vg_name(&brick.vg_id);
        let lv = brick_lv_name(&brick.name);
        let mount = brick.path.trim_end_matches('/').to_string();
        Self {
            device: format!("/dev/{}/{}", vg, lv),
            thin_pool: thin_pool_name(&brick.name),
            brick_dir: format!("{}/brick", mount),
            vg,
            lv,
            mount,
        }
    }
}

/// Parse `lvs --noheadings --options=thin_count`
fn parse_thin_count(output: &str) -> Result<u64> {
    let value = output.trim();
    value.parse::<u64>().map_err(|e| {
        BrickOpsError::UnexpectedOutput(format!("thin_count '{}' is not a number: {}", value, e))
    })
}

impl<T: RemoteTransport> CmdExecutor<T> {
    fn mkfs_command(&self, device: &str) -> String {
        let mut command = String::from("mkfs.xfs -i size=512 -n size=8192");
        if self.config.xfs_sw > 0 && self.config.xfs_su > 0 {
            command.push_str(&format!(
                " -d su={}k,sw={}",
                self.config.xfs_su, self.config.xfs_sw
            ));
        }
        command.push(' ');
        command.push_str(device);
        command
    }

    /// Append through awk so the redirection also runs under sudo
    fn fstab_append_command(&self, layout: &BrickLayout) -> String {
        format!(
            r#"awk "BEGIN {{print \"{} {} xfs {} 1 2\" >> \"{}\"}}""#,
            layout.device, layout.mount, MOUNT_OPTIONS, self.config.fstab
        )
    }

    /// Drop only the line whose first field is this brick's device
    fn fstab_remove_command(&self, layout: &BrickLayout) -> String {
        format!(
            "sed -i.save \"\\#^{} #d\" {}",
            layout.device, self.config.fstab
        )
    }

    pub(super) async fn exec_brick_create(
        &self,
        host: &str,
        brick: &BrickRequest,
    ) -> Result<BrickInfo> {
        brick.validate()?;
        validate_device_path("brick path", &brick.path)?;
        let layout = BrickLayout::new(brick);

        let lvcreate = format!(
            "lvcreate -qq --autobackup={} --poolmetadatasize {}K --chunksize {} --size {}K --thin {}/{} --virtualsize {}K --name {}",
            self.autobackup(),
            brick.pool_metadata_size,
            self.config.lv_chunk_size,
            brick.tp_size,
            layout.vg,
            layout.thin_pool,
            brick.size,
            layout.lv
        );
        // Rollback covers only what exists once lvcreate has succeeded
        self.exec(host, vec![format!("mkdir -p {}", layout.mount), lvcreate])
            .await
            .map_err(|e| {
                if error_message(&e).contains("already exists") {
                    BrickOpsError::Conflict(format!(
                        "brick {} already exists in {} on {}",
                        brick.name, layout.vg, host
                    ))
                } else {
                    e
                }
            })?;

        let mut commands = vec![
            self.mkfs_command(&layout.device),
            self.fstab_append_command(&layout),
            format!("mount -o {} {} {}", MOUNT_OPTIONS, layout.device, layout.mount),
            format!("mkdir {}", layout.brick_dir),
        ];
        if brick.gid != 0 {
            commands.push(format!("chown :{} {}", brick.gid, layout.brick_dir));
        }
        commands.push(format!("chmod 2775 {}", layout.brick_dir));

        if let Err(e) = self.exec(host, commands).await {
            warn!("Brick {} creation failed on {}, cleaning up", brick.name, host);
            if let Err(cleanup) = self.exec_brick_destroy(host, brick).await {
                warn!("Cleanup of brick {} on {} failed: {}", brick.name, host, cleanup);
            }
            return Err(e);
        }

        info!("Created brick {} on {}", layout.brick_dir, host);
        Ok(BrickInfo::new(host, layout.brick_dir))
    }

    pub(super) async fn exec_brick_destroy(&self, host: &str, brick: &BrickRequest) -> Result<bool> {
        brick.validate()?;
        validate_device_path("brick path", &brick.path)?;
        let layout = BrickLayout::new(brick);

        if let Err(e) = self.exec(host, vec![format!("umount {}", layout.mount)]).await {
            if self.config.debug_umount_failures {
                return Err(e);
            }
            warn!("Unable to unmount {} on {}: {}", layout.mount, host, e);
        }

        self.exec(host, vec![self.fstab_remove_command(&layout)])
            .await?;

        let lvremove = format!(
            "lvremove --autobackup={} -f {}/{}",
            self.autobackup(),
            layout.vg,
            layout.lv
        );
        if let Err(e) = self.exec(host, vec![lvremove]).await {
            if error_message(&e).contains("Failed to find logical volume") {
                warn!("Brick volume {}/{} already removed", layout.vg, layout.lv);
            } else {
                return Err(e);
            }
        }

        let reclaimed = self.remove_thin_pool_if_unused(host, &layout).await?;

        if let Err(e) = self.exec(host, vec![format!("rmdir {}", layout.mount)]).await {
            debug!("Unable to remove mount point {}: {}", layout.mount, e);
        }

        Ok(reclaimed)
    }

    /// Remove the brick's thin pool once no thin volume uses it
    async fn remove_thin_pool_if_unused(&self, host: &str, layout: &BrickLayout) -> Result<bool> {
        let pool = format!("{}/{}", layout.vg, layout.thin_pool);

        let output = match self
            .exec_one(host, format!("lvs --noheadings --options=thin_count {}", pool))
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!("Unable to query thin pool {} on {}: {}", pool, host, e);
                return Ok(false);
            }
        };

        let users = parse_thin_count(&output)?;
        if users > 0 {
            info!("Thin pool {} still has {} volume(s)", pool, users);
            return Ok(false);
        }

        self.exec(
            host,
            vec![format!(
                "lvremove --autobackup={} -f {}",
                self.autobackup(),
                pool
            )],
        )
        .await?;

        info!("Removed thin pool {} on {}", pool, host);
        Ok(true)
    }
}
