//! XML records produced by the gluster CLI (`--xml`)
//!
//! Every gluster command answers inside a `cliOutput` envelope carrying
//! `opRet`, `opErrno` and `opErrstr` next to the operation specific record.
//! Element and attribute names below match the daemon's output exactly, so
//! the records serialize back into the same shape they were parsed from.
//!
//! # Example
//!
//! ```
//! use brickops::xml::parse_cli_output;
//!
//! let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
//! <cliOutput>
//!   <opRet>0</opRet>
//!   <opErrno>0</opErrno>
//!   <opErrstr/>
//!   <snapCreate>
//!     <snapshot>
//!       <name>snap1</name>
//!       <uuid>4c8a1e8e-0a6c-4f8c-9f38-5a7c3a0e2d11</uuid>
//!     </snapshot>
//!   </snapCreate>
//! </cliOutput>"#;
//!
//! let snapshot = parse_cli_output(xml)?.into_snapshot()?;
//! assert_eq!(snapshot.name, "snap1");
//! # Ok::<(), brickops::error::BrickOpsError>(())
//! ```

use crate::error::{BrickOpsError, Result};
use crate::models::DurabilityType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "snapshot")]
pub struct Snapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "snapCreate")]
pub struct SnapCreate {
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "CloneCreate")]
pub struct SnapClone {
    pub volume: VolumeClone,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "volume")]
pub struct VolumeClone {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "snapDelete")]
pub struct SnapDelete {
    #[serde(default)]
    pub snapshots: SnapshotStatusList,
    /// Some gluster releases list statuses without the `snapshots` wrapper
    #[serde(rename = "snapshot", default, skip_serializing_if = "Vec::is_empty")]
    pub snapshot_list: Vec<SnapshotStatus>,
}

impl SnapDelete {
    /// Statuses from either layout
    pub fn statuses(&self) -> impl Iterator<Item = &SnapshotStatus> {
        self.snapshots
            .snapshot_list
            .iter()
            .chain(self.snapshot_list.iter())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "snapshots")]
pub struct SnapshotStatusList {
    #[serde(rename = "snapshot", default)]
    pub snapshot_list: Vec<SnapshotStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "snapshot")]
pub struct SnapshotStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
}

impl SnapshotStatus {
    pub fn succeeded(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "snapActivate")]
pub struct SnapActivate {
    pub snapshot: Snapshot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "snapDeactivate")]
pub struct SnapDeactivate {
    pub snapshot: Snapshot,
}

/// `gluster snapshot list <volume> --xml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "snapList")]
pub struct SnapList {
    #[serde(default)]
    pub count: u32,
    #[serde(rename = "snapshot", default)]
    pub snapshot_names: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "brick")]
pub struct Brick {
    #[serde(rename = "@uuid", default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "hostUuid", default)]
    pub host_uuid: String,
    #[serde(rename = "isArbiter", default)]
    pub is_arbiter: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "bricks")]
pub struct Bricks {
    #[serde(rename = "brick", default)]
    pub brick_list: Vec<Brick>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "brick")]
pub struct BrickHealStatus {
    #[serde(rename = "@hostUuid", default)]
    pub host_uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "numberOfEntries", default)]
    pub number_of_entries: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "option")]
pub struct VolumeOption {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "options")]
pub struct VolumeOptions {
    #[serde(rename = "option", default)]
    pub option_list: Vec<VolumeOption>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "volume", default)]
pub struct Volume {
    #[serde(rename = "name")]
    pub volume_name: String,
    pub id: String,
    pub status: i32,
    #[serde(rename = "statusStr")]
    pub status_str: String,
    #[serde(rename = "brickCount")]
    pub brick_count: i32,
    #[serde(rename = "distCount")]
    pub dist_count: i32,
    #[serde(rename = "stripeCount")]
    pub stripe_count: i32,
    #[serde(rename = "replicaCount")]
    pub replica_count: i32,
    #[serde(rename = "arbiterCount")]
    pub arbiter_count: i32,
    #[serde(rename = "disperseCount")]
    pub disperse_count: i32,
    #[serde(rename = "redundancyCount")]
    pub redundancy_count: i32,
    #[serde(rename = "type")]
    pub volume_type: i32,
    #[serde(rename = "typeStr")]
    pub type_str: String,
    pub transport: i32,
    pub bricks: Bricks,
    #[serde(rename = "optCount")]
    pub opt_count: i32,
    pub options: VolumeOptions,
}

impl Volume {
    /// Durability scheme implied by the volume's counts
    pub fn durability(&self) -> DurabilityType {
        if self.disperse_count > 0 {
            DurabilityType::Dispersion
        } else if self.replica_count > 1 {
            DurabilityType::Replica
        } else {
            DurabilityType::None
        }
    }

    pub fn is_started(&self) -> bool {
        self.status == 1 || self.status_str == "Started"
    }

    /// Value of a reconfigured option, if set
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .option_list
            .iter()
            .find(|option| option.name == name)
            .map(|option| option.value.as_str())
    }

    /// `host:path` of every brick, in volume order
    pub fn brick_names(&self) -> Vec<&str> {
        self.bricks
            .brick_list
            .iter()
            .map(|brick| brick.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "volumes")]
pub struct Volumes {
    #[serde(default)]
    pub count: i32,
    #[serde(rename = "volume", default)]
    pub volume_list: Vec<Volume>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "volInfo")]
pub struct VolInfo {
    #[serde(default)]
    pub volumes: Volumes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "bricks")]
pub struct HealInfoBricks {
    #[serde(rename = "brick", default)]
    pub brick_list: Vec<BrickHealStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "healInfo")]
pub struct HealInfo {
    #[serde(default)]
    pub bricks: HealInfoBricks,
}

impl HealInfo {
    /// Total pending heal entries across bricks that reported a number
    pub fn pending_entries(&self) -> u64 {
        self.bricks
            .brick_list
            .iter()
            .filter_map(|brick| brick.number_of_entries.trim().parse::<u64>().ok())
            .sum()
    }
}

/// Envelope of every `gluster ... --xml` answer
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename = "cliOutput")]
pub struct CliOutput {
    #[serde(rename = "opRet", default)]
    pub op_ret: i32,
    #[serde(rename = "opErrno", default)]
    pub op_errno: i32,
    #[serde(rename = "opErrstr", default, skip_serializing_if = "Option::is_none")]
    pub op_errstr: Option<String>,
    #[serde(rename = "volInfo", skip_serializing_if = "Option::is_none")]
    pub vol_info: Option<VolInfo>,
    #[serde(rename = "healInfo", skip_serializing_if = "Option::is_none")]
    pub heal_info: Option<HealInfo>,
    #[serde(rename = "snapCreate", skip_serializing_if = "Option::is_none")]
    pub snap_create: Option<SnapCreate>,
    #[serde(rename = "CloneCreate", skip_serializing_if = "Option::is_none")]
    pub snap_clone: Option<SnapClone>,
    #[serde(rename = "snapDelete", skip_serializing_if = "Option::is_none")]
    pub snap_delete: Option<SnapDelete>,
    #[serde(rename = "snapActivate", skip_serializing_if = "Option::is_none")]
    pub snap_activate: Option<SnapActivate>,
    #[serde(rename = "snapDeactivate", skip_serializing_if = "Option::is_none")]
    pub snap_deactivate: Option<SnapDeactivate>,
    #[serde(rename = "snapList", skip_serializing_if = "Option::is_none")]
    pub snap_list: Option<SnapList>,
}

impl CliOutput {
    /// Turn a non-zero opRet into an error
    pub fn check(&self) -> Result<()> {
        if self.op_ret != 0 {
            return Err(BrickOpsError::Gluster {
                op_ret: self.op_ret,
                op_errno: self.op_errno,
                message: self.op_errstr.clone().unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// First volume of a `volume info` answer
    pub fn into_volume(self) -> Result<Volume> {
        self.vol_info
            .and_then(|info| info.volumes.volume_list.into_iter().next())
            .ok_or_else(|| {
                BrickOpsError::UnexpectedOutput("volume info returned no volumes".to_string())
            })
    }

    pub fn into_heal_info(self) -> Result<HealInfo> {
        self.heal_info.ok_or_else(|| {
            BrickOpsError::UnexpectedOutput("heal info output has no healInfo element".to_string())
        })
    }

    pub fn into_snapshot(self) -> Result<Snapshot> {
        self.snap_create
            .map(|create| create.snapshot)
            .ok_or_else(|| {
                BrickOpsError::UnexpectedOutput(
                    "snapshot create output has no snapCreate element".to_string(),
                )
            })
    }

    pub fn into_clone(self) -> Result<VolumeClone> {
        self.snap_clone.map(|clone| clone.volume).ok_or_else(|| {
            BrickOpsError::UnexpectedOutput(
                "snapshot clone output has no CloneCreate element".to_string(),
            )
        })
    }

    pub fn into_snap_delete(self) -> Result<SnapDelete> {
        self.snap_delete.ok_or_else(|| {
            BrickOpsError::UnexpectedOutput(
                "snapshot delete output has no snapDelete element".to_string(),
            )
        })
    }

    /// Names from `snapshot list`; a missing list means no snapshots
    pub fn into_snapshot_names(self) -> Vec<String> {
        self.snap_list
            .map(|list| list.snapshot_names)
            .unwrap_or_default()
    }
}

/// Parse a `cliOutput` document and fail on a non-zero opRet
pub fn parse_cli_output(xml: &str) -> Result<CliOutput> {
    let output: CliOutput =
        quick_xml::de::from_str(xml.trim()).map_err(|e| BrickOpsError::Xml(e.to_string()))?;
    output.check()?;
    Ok(output)
}

/// Parse any single record
pub fn from_xml<T>(xml: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    quick_xml::de::from_str(xml.trim()).map_err(|e| BrickOpsError::Xml(e.to_string()))
}

/// Serialize a record under its daemon element name
pub fn to_xml<T: Serialize>(value: &T) -> Result<String> {
    quick_xml::se::to_string(value).map_err(|e| BrickOpsError::Xml(e.to_string()))
}
