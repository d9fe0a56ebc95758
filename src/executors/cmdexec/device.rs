use super::{vg_name, CmdExecutor};
use crate::error::{BrickOpsError, Result};
use crate::executors::RemoteTransport;
use crate::models::{validate_device_path, validate_name, DeviceInfo};
use tracing::{info, warn};

/// Fields in one line of `vgdisplay -c`
const VGDISPLAY_MIN_FIELDS: usize = 16;
const VGDISPLAY_EXTENT_SIZE: usize = 12;
const VGDISPLAY_FREE_EXTENTS: usize = 15;

/// Parse the colon separated answer of `vgdisplay -c <vg>`
pub(crate) fn parse_vgdisplay(output: &str) -> Result<DeviceInfo> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| BrickOpsError::UnexpectedOutput("vgdisplay returned nothing".to_string()))?;

    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() < VGDISPLAY_MIN_FIELDS {
        return Err(BrickOpsError::UnexpectedOutput(format!(
            "vgdisplay returned {} fields, expected at least {}: {}",
            fields.len(),
            VGDISPLAY_MIN_FIELDS,
            line
        )));
    }

    let number = |index: usize, what: &str| -> Result<u64> {
        fields[index].trim().parse::<u64>().map_err(|e| {
            BrickOpsError::UnexpectedOutput(format!(
                "vgdisplay {} '{}' is not a number: {}",
                what, fields[index], e
            ))
        })
    };

    let extent_size = number(VGDISPLAY_EXTENT_SIZE, "extent size")?;
    let free_extents = number(VGDISPLAY_FREE_EXTENTS, "free extent count")?;

    Ok(DeviceInfo {
        size: free_extents.saturating_mul(extent_size),
        extent_size,
    })
}

impl<T: RemoteTransport> CmdExecutor<T> {
    pub(super) fn autobackup(&self) -> &'static str {
        if self.config.backup_lvm_metadata {
            "y"
        } else {
            "n"
        }
    }

    pub(super) async fn exec_device_setup(
        &self,
        host: &str,
        device: &str,
        vg_id: &str,
        destroy: bool,
    ) -> Result<DeviceInfo> {
        validate_device_path("device", device)?;
        validate_name("volume group id", vg_id)?;
        let vg = vg_name(vg_id);

        let mut commands = Vec::new();
        if destroy {
            warn!("Wiping existing signatures on {} at {}", device, host);
            commands.push(format!("wipefs --all '{}'", device));
        }
        commands.push(format!(
            "pvcreate -qq --metadatasize=128M --dataalignment={} '{}'",
            self.config.pv_data_alignment, device
        ));
        self.exec(host, commands).await?;

        let vgcreate = format!(
            "vgcreate -qq --physicalextentsize={} --autobackup={} {} '{}'",
            self.config.vg_physical_extent_size,
            self.autobackup(),
            vg,
            device
        );
        if let Err(e) = self.exec(host, vec![vgcreate]).await {
            // Leave the device as we found it
            if let Err(cleanup) = self
                .exec(host, vec![format!("pvremove -qq '{}'", device)])
                .await
            {
                warn!("Unable to remove physical volume {}: {}", device, cleanup);
            }
            return Err(e);
        }

        info!("Created volume group {} on {}:{}", vg, host, device);
        self.exec_get_device_info(host, device, vg_id).await
    }

    pub(super) async fn exec_get_device_info(
        &self,
        host: &str,
        device: &str,
        vg_id: &str,
    ) -> Result<DeviceInfo> {
        validate_device_path("device", device)?;
        validate_name("volume group id", vg_id)?;

        let output = self
            .exec_one(host, format!("vgdisplay -c {}", vg_name(vg_id)))
            .await?;
        parse_vgdisplay(&output)
    }

    pub(super) async fn exec_device_teardown(
        &self,
        host: &str,
        device: &str,
        vg_id: &str,
    ) -> Result<()> {
        validate_device_path("device", device)?;
        validate_name("volume group id", vg_id)?;

        self.exec(
            host,
            vec![
                format!("vgremove -qq {}", vg_name(vg_id)),
                format!("pvremove -qq '{}'", device),
            ],
        )
        .await?;

        info!("Removed volume group {} from {}:{}", vg_name(vg_id), host, device);
        Ok(())
    }
}
