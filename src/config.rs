//! Executor configuration
//!
//! Settings are layered: built-in defaults, then an optional file (YAML, TOML
//! or JSON, picked by extension), then `BRICKOPS_*` environment variables.
//! Nested keys use a double underscore, e.g. `BRICKOPS_SSH__USER=admin`.

use crate::error::{BrickOpsError, Result};
use crate::logging::LogConfig;
use crate::retry::RetryConfig;
use clap::ValueEnum;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const ENV_PREFIX: &str = "BRICKOPS";

/// Which backend runs the commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    #[default]
    Ssh,
    Local,
    Mock,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrickOpsConfig {
    pub executor: ExecutorKind,
    pub commands: CmdConfig,
    pub ssh: SshSettings,
    pub retry: RetryConfig,
    pub log: LogConfig,
}

impl Default for BrickOpsConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorKind::default(),
            commands: CmdConfig::default(),
            ssh: SshSettings::default(),
            retry: RetryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Settings shared by every command-building executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmdConfig {
    /// fstab file that receives brick mount entries
    pub fstab: String,
    /// Prefix every command with sudo
    pub sudo: bool,
    /// snap-max-hard-limit applied when a peer joins
    pub snapshot_limit: u32,
    /// Start a rebalance after add-brick
    pub rebalance_on_expansion: bool,
    /// Let LVM write metadata backups on create/remove
    pub backup_lvm_metadata: bool,
    /// Fail brick destroy when unmount fails
    pub debug_umount_failures: bool,
    /// gluster-block prealloc mode ("full" or "no")
    pub block_volume_prealloc: String,
    pub pv_data_alignment: String,
    pub vg_physical_extent_size: String,
    pub lv_chunk_size: String,
    /// XFS stripe width; 0 leaves mkfs defaults
    pub xfs_sw: u32,
    /// XFS stripe unit in KiB; 0 leaves mkfs defaults
    pub xfs_su: u32,
    /// Value of `gluster --timeout`
    pub gluster_cli_timeout: u32,
    /// Transport-level timeout for one batch of commands, in seconds
    pub command_timeout: u64,
}

impl Default for CmdConfig {
    fn default() -> Self {
        Self {
            fstab: "/etc/fstab".to_string(),
            sudo: false,
            snapshot_limit: 14,
            rebalance_on_expansion: false,
            backup_lvm_metadata: true,
            debug_umount_failures: false,
            block_volume_prealloc: "full".to_string(),
            pv_data_alignment: "256K".to_string(),
            vg_physical_extent_size: "4M".to_string(),
            lv_chunk_size: "256K".to_string(),
            xfs_sw: 0,
            xfs_su: 0,
            gluster_cli_timeout: 600,
            command_timeout: 600,
        }
    }
}

impl CmdConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.command_timeout == 0 {
            return Err(BrickOpsError::Validation(
                "command_timeout must be at least 1 second".to_string(),
            ));
        }
        if self.block_volume_prealloc != "full" && self.block_volume_prealloc != "no" {
            return Err(BrickOpsError::Validation(format!(
                "block_volume_prealloc must be 'full' or 'no', got '{}'",
                self.block_volume_prealloc
            )));
        }
        if (self.xfs_sw == 0) != (self.xfs_su == 0) {
            return Err(BrickOpsError::Validation(
                "xfs_sw and xfs_su must be set together".to_string(),
            ));
        }
        if self.fstab.is_empty() || !self.fstab.starts_with('/') {
            return Err(BrickOpsError::Validation(format!(
                "fstab must be an absolute path, got '{}'",
                self.fstab
            )));
        }
        Ok(())
    }
}

/// SSH transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub user: String,
    pub port: u16,
    /// Private key; defaults to ~/.ssh/id_rsa
    pub keyfile: Option<String>,
    /// TCP connect timeout in seconds
    pub connect_timeout: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            port: 22,
            keyfile: None,
            connect_timeout: 10,
        }
    }
}

impl BrickOpsConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`BrickOpsConfig::load`], reading environment overrides from
    /// `env` instead of the process environment when given
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(BrickOpsError::Validation(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: BrickOpsConfig = builder.build()?.try_deserialize()?;
        config.commands.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogFormat, LogLevel};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = BrickOpsConfig::load_with_env(None, Some(HashMap::new())).unwrap();
        assert_eq!(config.executor, ExecutorKind::Ssh);
        assert_eq!(config.commands.fstab, "/etc/fstab");
        assert_eq!(config.commands.snapshot_limit, 14);
        assert_eq!(config.commands.gluster_cli_timeout, 600);
        assert_eq!(config.ssh.user, "root");
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_load_yaml_file() {
        let file = write_config(
            ".yaml",
            r#"
executor: local
commands:
  sudo: true
  snapshot_limit: 32
  rebalance_on_expansion: true
  xfs_sw: 4
  xfs_su: 64
ssh:
  user: storage
  keyfile: /etc/brickops/id_ed25519
log:
  level: debug
retry:
  max_retries: 5
  base_delay: 2
"#,
        );

        let config =
            BrickOpsConfig::load_with_env(Some(file.path()), Some(HashMap::new())).unwrap();
        assert_eq!(config.executor, ExecutorKind::Local);
        assert!(config.commands.sudo);
        assert_eq!(config.commands.snapshot_limit, 32);
        assert!(config.commands.rebalance_on_expansion);
        assert_eq!(config.commands.fstab, "/etc/fstab");
        assert_eq!(config.ssh.user, "storage");
        assert_eq!(config.ssh.port, 22);
        assert_eq!(
            config.ssh.keyfile.as_deref(),
            Some("/etc/brickops/id_ed25519")
        );
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay, Duration::from_secs(2));
        assert_eq!(config.retry.max_delay, Duration::from_secs(60));
        assert_eq!(config.log.level, LogLevel::Debug);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_load_toml_file() {
        let file = write_config(
            ".toml",
            r#"
executor = "mock"

[commands]
fstab = "/var/lib/brickops/fstab"
"#,
        );

        let config =
            BrickOpsConfig::load_with_env(Some(file.path()), Some(HashMap::new())).unwrap();
        assert_eq!(config.executor, ExecutorKind::Mock);
        assert_eq!(config.commands.fstab, "/var/lib/brickops/fstab");
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config(".yaml", "ssh:\n  user: storage\n");

        let mut env = HashMap::new();
        env.insert("BRICKOPS_SSH__USER".to_string(), "admin".to_string());
        env.insert("BRICKOPS_SSH__PORT".to_string(), "2222".to_string());
        env.insert("BRICKOPS_EXECUTOR".to_string(), "local".to_string());

        let config = BrickOpsConfig::load_with_env(Some(file.path()), Some(env)).unwrap();
        assert_eq!(config.ssh.user, "admin");
        assert_eq!(config.ssh.port, 2222);
        assert_eq!(config.executor, ExecutorKind::Local);
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = BrickOpsConfig::load_with_env(
            Some(Path::new("/nonexistent/brickops.yaml")),
            Some(HashMap::new()),
        );
        assert!(matches!(result, Err(BrickOpsError::Validation(_))));
    }

    #[test]
    fn test_invalid_command_config_rejected() {
        let file = write_config(
            ".yaml",
            "commands:\n  block_volume_prealloc: partial\n",
        );
        let result = BrickOpsConfig::load_with_env(Some(file.path()), Some(HashMap::new()));
        assert!(result.is_err());

        let config = CmdConfig {
            xfs_sw: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
