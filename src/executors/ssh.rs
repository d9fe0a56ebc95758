//! SSH transport for remote command execution
//!
//! This module runs command batches on storage nodes over SSH with the
//! following features:
//! - **Key-based authentication ONLY** (no password support)
//! - One session per batch, commands run sequentially on separate channels
//! - A single connection attempt per batch; retries belong to the caller
//! - Configurable connect and I/O timeouts
//!
//! # Example
//!
//! ```no_run
//! use brickops::config::{CmdConfig, SshSettings};
//! use brickops::executors::cmdexec::CmdExecutor;
//! use brickops::executors::ssh::SshTransport;
//! use brickops::executors::Executor;
//! use brickops::retry::RetryConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = SshSettings {
//!     user: "root".to_string(),
//!     keyfile: Some("/etc/brickops/id_rsa".to_string()),
//!     ..Default::default()
//! };
//! let transport = SshTransport::new(settings, false)?;
//! let executor = CmdExecutor::new(transport, CmdConfig::default(), RetryConfig::default());
//!
//! executor.glusterd_check("node1.example.com").await?;
//! # Ok(())
//! # }
//! ```

use crate::config::SshSettings;
use crate::error::{BrickOpsError, Result};
use crate::executors::local::failure_message;
use crate::executors::{truncate_output_str, wrap_command, RemoteTransport};
use crate::models::{MAX_COMMAND_LEN, MAX_OUTPUT_SIZE};
use async_trait::async_trait;
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// SSH transport for remote command execution
///
/// Creates a new SSH session for each batch of commands.
#[derive(Debug, Clone)]
pub struct SshTransport {
    settings: SshSettings,
    key_path: PathBuf,
    sudo: bool,
}

impl SshTransport {
    /// Create a new SSH transport
    ///
    /// Fails when the configured key (or the default `~/.ssh/id_rsa`) is
    /// missing or the user is empty.
    pub fn new(settings: SshSettings, sudo: bool) -> Result<Self> {
        Self::validate_settings(&settings)?;

        let key_path = match &settings.keyfile {
            Some(keyfile) => PathBuf::from(keyfile),
            None => std::env::var("HOME")
                .map(|home| Path::new(&home).join(".ssh").join("id_rsa"))
                .map_err(|_| {
                    BrickOpsError::Validation(
                        "No SSH key path specified and HOME is not set".to_string(),
                    )
                })?,
        };

        if !key_path.exists() {
            return Err(BrickOpsError::Validation(format!(
                "SSH key file not found: {}",
                key_path.display()
            )));
        }

        Ok(Self {
            settings,
            key_path,
            sudo,
        })
    }

    /// Validate SSH settings
    fn validate_settings(settings: &SshSettings) -> Result<()> {
        if settings.user.is_empty() {
            return Err(BrickOpsError::Validation(
                "SSH user cannot be empty".to_string(),
            ));
        }

        if settings.port == 0 {
            return Err(BrickOpsError::Validation(
                "SSH port cannot be 0".to_string(),
            ));
        }

        if settings.connect_timeout == 0 {
            return Err(BrickOpsError::Validation(
                "SSH connect timeout must be at least 1 second".to_string(),
            ));
        }

        Ok(())
    }

    fn ssh_error(host: &str, message: String) -> BrickOpsError {
        BrickOpsError::Ssh {
            host: host.to_string(),
            message,
        }
    }

    /// Create a new SSH session
    ///
    /// This establishes a TCP connection and performs SSH handshake with key-based auth.
    fn create_session(&self, host: &str, timeout: Duration) -> Result<Session> {
        let target = format!("{}:{}", host, self.settings.port);

        debug!("Creating SSH session to {}", target);

        let address = target
            .to_socket_addrs()
            .map_err(|e| Self::ssh_error(host, format!("Unable to resolve {}: {}", target, e)))?
            .next()
            .ok_or_else(|| Self::ssh_error(host, format!("No address found for {}", target)))?;

        let tcp = TcpStream::connect_timeout(
            &address,
            Duration::from_secs(self.settings.connect_timeout),
        )
        .map_err(|e| Self::ssh_error(host, format!("Failed to connect: {}", e)))?;

        let mut session = Session::new()
            .map_err(|e| Self::ssh_error(host, format!("Failed to create SSH session: {}", e)))?;

        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| Self::ssh_error(host, format!("SSH handshake failed: {}", e)))?;

        debug!("Authenticating with key: {}", self.key_path.display());
        session
            .userauth_pubkey_file(&self.settings.user, None, &self.key_path, None)
            .map_err(|e| Self::ssh_error(host, format!("Authentication failed: {}", e)))?;

        if !session.authenticated() {
            return Err(Self::ssh_error(host, "Authentication failed".to_string()));
        }

        // Blocking reads and writes on the session give up after this long
        session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);

        info!("SSH session established to {}", target);

        Ok(session)
    }

    /// Run one command on an open session
    fn exec_on_session(
        &self,
        session: &Session,
        host: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<String> {
        let command = wrap_command(command, self.sudo);
        let started = Instant::now();

        let mut channel = session
            .channel_session()
            .map_err(|e| Self::ssh_error(host, format!("Failed to open channel: {}", e)))?;

        debug!("Executing command on {}: {}", host, command);

        channel
            .exec(&command)
            .map_err(|e| Self::ssh_error(host, format!("Failed to execute command: {}", e)))?;

        let mut stdout = String::new();
        channel.read_to_string(&mut stdout).map_err(|e| {
            self.read_error(host, &command, timeout, started, format!("stdout: {}", e))
        })?;

        let mut stderr = String::new();
        channel.stderr().read_to_string(&mut stderr).map_err(|e| {
            self.read_error(host, &command, timeout, started, format!("stderr: {}", e))
        })?;

        channel
            .wait_close()
            .map_err(|e| Self::ssh_error(host, format!("Failed to close channel: {}", e)))?;

        let exit_code = channel
            .exit_status()
            .map_err(|e| Self::ssh_error(host, format!("Failed to get exit status: {}", e)))?;

        let (stdout, stdout_truncated) = truncate_output_str(&stdout);
        let (stderr, _) = truncate_output_str(&stderr);

        if stdout_truncated {
            warn!("Output truncated to {} bytes", MAX_OUTPUT_SIZE);
        }

        debug!("SSH command exit code: {}", exit_code);

        if exit_code != 0 {
            return Err(BrickOpsError::CommandFailed {
                host: host.to_string(),
                command,
                exit_code: Some(exit_code),
                stderr: failure_message(&stderr, &stdout),
            });
        }

        Ok(stdout)
    }

    /// Reads that hit the session timeout surface as timeouts, everything else as SSH errors
    fn read_error(
        &self,
        host: &str,
        command: &str,
        timeout: Duration,
        started: Instant,
        message: String,
    ) -> BrickOpsError {
        if started.elapsed() >= timeout {
            BrickOpsError::CommandTimeout {
                host: host.to_string(),
                command: command.to_string(),
                timeout: timeout.as_secs(),
            }
        } else {
            Self::ssh_error(host, format!("Failed to read {}", message))
        }
    }

    /// Execute a batch in blocking context (for use in spawn_blocking)
    fn exec_batch_blocking(
        &self,
        session: Session,
        host: &str,
        commands: &[String],
        timeout: Duration,
    ) -> Result<Vec<String>> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            results.push(self.exec_on_session(&session, host, command, timeout)?);
        }
        Ok(results)
    }

    async fn connect(&self, host: &str, timeout: Duration) -> Result<Session> {
        let transport = self.clone();
        let host = host.to_string();
        tokio::task::spawn_blocking(move || transport.create_session(&host, timeout))
            .await
            .map_err(|e| BrickOpsError::Execution(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl RemoteTransport for SshTransport {
    async fn exec_commands(
        &self,
        host: &str,
        commands: &[String],
        timeout: Duration,
    ) -> Result<Vec<String>> {
        if host.is_empty() {
            return Err(BrickOpsError::Validation(
                "SSH host cannot be empty".to_string(),
            ));
        }

        if let Some(command) = commands.iter().find(|c| c.len() > MAX_COMMAND_LEN) {
            return Err(BrickOpsError::Validation(format!(
                "SSH command exceeds maximum length of {} bytes: {}...",
                MAX_COMMAND_LEN,
                command.chars().take(64).collect::<String>()
            )));
        }

        info!(
            "Executing {} command(s) on {}@{}",
            commands.len(),
            self.settings.user,
            host
        );

        let start = Instant::now();
        let session = self.connect(host, timeout).await?;

        // ssh2 is synchronous
        let transport = self.clone();
        let host_owned = host.to_string();
        let commands = commands.to_vec();

        let results = tokio::task::spawn_blocking(move || {
            transport.exec_batch_blocking(session, &host_owned, &commands, timeout)
        })
        .await
        .map_err(|e| BrickOpsError::Execution(format!("Task join error: {}", e)))??;

        info!("SSH batch on {} completed in {:?}", host, start.elapsed());

        Ok(results)
    }
}
