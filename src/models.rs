//! Request and response value objects exchanged with executors

use crate::error::{BrickOpsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Input validation limits
pub const MAX_OUTPUT_SIZE: usize = 10_485_760; // 10 MB
pub const MAX_COMMAND_LEN: usize = 131_072; // 128 KB, volume create lines get long
pub const MAX_NAME_LEN: usize = 128;

/// Volume durability scheme
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DurabilityType {
    /// Plain distribute
    #[default]
    #[serde(rename = "none", alias = "distribute")]
    None,
    /// N-way replication, optionally with an arbiter brick per set
    #[serde(rename = "replicate", alias = "replica")]
    Replica,
    /// Erasure coding with data + redundancy bricks per set
    #[serde(rename = "disperse", alias = "dispersion")]
    Dispersion,
}

impl fmt::Display for DurabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurabilityType::None => write!(f, "none"),
            DurabilityType::Replica => write!(f, "replicate"),
            DurabilityType::Dispersion => write!(f, "disperse"),
        }
    }
}

impl FromStr for DurabilityType {
    type Err = BrickOpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "distribute" => Ok(DurabilityType::None),
            "replicate" | "replica" => Ok(DurabilityType::Replica),
            "disperse" | "dispersion" => Ok(DurabilityType::Dispersion),
            other => Err(BrickOpsError::Validation(format!(
                "Unknown durability type '{}'",
                other
            ))),
        }
    }
}

/// Size of a device's volume group
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Free space in KiB
    pub size: u64,
    /// Physical extent size in KiB
    pub extent_size: u64,
}

/// Brick description
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrickRequest {
    pub vg_id: String,
    pub name: String,
    /// Thin pool size in KiB
    pub tp_size: u64,
    /// Virtual brick size in KiB
    pub size: u64,
    /// Thin pool metadata size in KiB
    pub pool_metadata_size: u64,
    pub gid: i64,
    /// Brick mount point
    pub path: String,
}

impl BrickRequest {
    pub fn validate(&self) -> Result<()> {
        validate_name("brick name", &self.name)?;
        validate_name("volume group id", &self.vg_id)?;

        if !self.path.starts_with('/') {
            return Err(BrickOpsError::Validation(format!(
                "Brick path '{}' must be absolute",
                self.path
            )));
        }

        if self.size == 0 || self.tp_size < self.size {
            return Err(BrickOpsError::Validation(format!(
                "Brick {} needs a non-zero size no larger than its thin pool ({} > {})",
                self.name, self.size, self.tp_size
            )));
        }

        if self.gid < 0 {
            return Err(BrickOpsError::Validation(format!(
                "Brick {} has negative gid {}",
                self.name, self.gid
            )));
        }

        Ok(())
    }
}

/// Location of a brick
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BrickInfo {
    pub path: String,
    pub host: String,
}

impl BrickInfo {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
        }
    }

    /// `host:path` form used by the gluster CLI
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.path)
    }

    pub fn validate(&self) -> Result<()> {
        validate_host(&self.host)?;
        validate_device_path("brick path", &self.path)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeRequest {
    pub bricks: Vec<BrickInfo>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub durability: DurabilityType,
    /// Each entry is "key value"
    #[serde(default)]
    pub gluster_volume_options: Vec<String>,

    // Dispersion
    #[serde(default)]
    pub data: u32,
    #[serde(default)]
    pub redundancy: u32,

    // Replica
    #[serde(default)]
    pub replica: u32,
    #[serde(default)]
    pub arbiter: bool,
}

impl VolumeRequest {
    /// Check that the brick count matches the durability parameters
    pub fn validate(&self) -> Result<()> {
        validate_name("volume name", &self.name)?;

        let count = self.bricks.len() as u32;
        if count == 0 {
            return Err(BrickOpsError::Validation(format!(
                "Volume {} has no bricks",
                self.name
            )));
        }

        match self.durability {
            DurabilityType::None => {}
            DurabilityType::Replica => {
                if self.replica == 0 {
                    return Err(BrickOpsError::Validation(
                        "Replica count must be at least 1".to_string(),
                    ));
                }
                if self.arbiter && self.replica != 3 {
                    return Err(BrickOpsError::Validation(format!(
                        "Arbiter volumes require replica 3, got {}",
                        self.replica
                    )));
                }
                if count % self.replica != 0 {
                    return Err(BrickOpsError::Validation(format!(
                        "Brick count {} is not a multiple of replica {}",
                        count, self.replica
                    )));
                }
            }
            DurabilityType::Dispersion => {
                if self.data == 0 || self.redundancy == 0 {
                    return Err(BrickOpsError::Validation(format!(
                        "Disperse volumes need data and redundancy of at least 1 (got {}+{})",
                        self.data, self.redundancy
                    )));
                }
                let set_size = self.data + self.redundancy;
                if count % set_size != 0 {
                    return Err(BrickOpsError::Validation(format!(
                        "Brick count {} is not a multiple of disperse set size {}",
                        count, set_size
                    )));
                }
            }
        }

        for brick in &self.bricks {
            brick.validate()?;
        }
        for option in &self.gluster_volume_options {
            validate_volume_option(option)?;
        }

        Ok(())
    }

    /// Bricks per replica or disperse set
    pub fn set_size(&self) -> u32 {
        match self.durability {
            DurabilityType::None => 1,
            DurabilityType::Replica => self.replica,
            DurabilityType::Dispersion => self.data + self.redundancy,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeCloneRequest {
    pub volume: String,
    pub clone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeSnapshotRequest {
    pub volume: String,
    pub snapshot: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotCloneRequest {
    pub volume: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockVolumeRequest {
    pub name: String,
    /// Size in GiB
    pub size: u64,
    pub gluster_volume_name: String,
    pub gluster_node: String,
    pub ha_count: u32,
    pub block_hosts: Vec<String>,
    #[serde(default)]
    pub auth: bool,
}

impl BlockVolumeRequest {
    pub fn validate(&self) -> Result<()> {
        validate_name("block volume name", &self.name)?;
        validate_name("block hosting volume name", &self.gluster_volume_name)?;

        if self.size == 0 {
            return Err(BrickOpsError::Validation(format!(
                "Block volume {} must have a non-zero size",
                self.name
            )));
        }
        if self.block_hosts.is_empty() {
            return Err(BrickOpsError::Validation(format!(
                "Block volume {} has no block hosts",
                self.name
            )));
        }
        for host in &self.block_hosts {
            validate_host(host)?;
        }
        if self.ha_count == 0 || self.ha_count as usize > self.block_hosts.len() {
            return Err(BrickOpsError::Validation(format!(
                "HA count {} must be between 1 and the number of block hosts ({})",
                self.ha_count,
                self.block_hosts.len()
            )));
        }

        Ok(())
    }
}

/// A provisioned block volume
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockVolumeInfo {
    pub name: String,
    /// Size in GiB
    pub size: u64,
    pub gluster_volume_name: String,
    pub gluster_node: String,
    pub ha_count: u32,
    pub block_hosts: Vec<String>,
    pub iqn: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Reject names that are empty, too long, or would break out of a command line
pub(crate) fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(BrickOpsError::Validation(format!("{} cannot be empty", kind)));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(BrickOpsError::Validation(format!(
            "{} '{}' exceeds {} characters",
            kind, name, MAX_NAME_LEN
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(BrickOpsError::Validation(format!(
            "Invalid {} '{}': only alphanumeric, underscore, dot and dash allowed",
            kind, name
        )));
    }

    Ok(())
}

/// Reject device paths that are relative or would break out of a command line
pub(crate) fn validate_device_path(kind: &str, path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(BrickOpsError::Validation(format!(
            "{} '{}' must be an absolute path",
            kind, path
        )));
    }
    if path
        .chars()
        .any(|c| c.is_whitespace() || "'\"`$;&|<>\\()*?".contains(c))
    {
        return Err(BrickOpsError::Validation(format!(
            "{} '{}' contains forbidden characters",
            kind, path
        )));
    }
    Ok(())
}

pub(crate) fn validate_host(host: &str) -> Result<()> {
    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".-_:[]".contains(c))
    {
        return Err(BrickOpsError::Validation(format!(
            "Invalid host '{}'",
            host
        )));
    }
    Ok(())
}

/// `key value` with a dotted key and a value free of shell syntax
pub(crate) fn validate_volume_option(option: &str) -> Result<()> {
    let parts: Vec<&str> = option.split_whitespace().collect();
    let [key, value] = parts.as_slice() else {
        return Err(BrickOpsError::Validation(format!(
            "Volume option '{}' must be of the form 'key value'",
            option
        )));
    };

    let key_ok = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._-".contains(c));
    let value_ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._,:/@=+%-".contains(c));
    if !key_ok || !value_ok {
        return Err(BrickOpsError::Validation(format!(
            "Volume option '{}' contains forbidden characters",
            option
        )));
    }
    Ok(())
}
