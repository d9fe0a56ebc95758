//! Local command transport
//!
//! Runs command lines on the machine brickops itself runs on. Used when the
//! control plane is co-located with glusterd (for example inside the storage
//! pod) and by tests.

use crate::error::{BrickOpsError, Result};
use crate::executors::{truncate_output_bytes, wrap_command, RemoteTransport};
use crate::models::{MAX_COMMAND_LEN, MAX_OUTPUT_SIZE};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info};

const SHELL: &str = "/bin/sh";

/// Transport for local command execution
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    sudo: bool,
}

impl LocalTransport {
    pub fn new(sudo: bool) -> Self {
        Self { sudo }
    }

    async fn exec_one(&self, host: &str, command: &str, timeout: Duration) -> Result<String> {
        if command.len() > MAX_COMMAND_LEN {
            return Err(BrickOpsError::Validation(format!(
                "Command exceeds maximum length of {} bytes",
                MAX_COMMAND_LEN
            )));
        }

        let command = wrap_command(command, self.sudo);
        debug!("Executing local command: {}", command);

        let start = Instant::now();

        let mut cmd = Command::new(SHELL);
        cmd.arg("-c").arg(&command);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        // Ensure child process is killed when the future is dropped (e.g. on timeout).
        cmd.kill_on_drop(true);

        let output_result = tokio::time::timeout(timeout, cmd.output()).await;

        match output_result {
            Ok(Ok(output)) => {
                let (stdout, stdout_truncated) = truncate_output_bytes(&output.stdout);
                let (stderr, _) = truncate_output_bytes(&output.stderr);

                if stdout_truncated {
                    debug!("Output truncated to {} bytes", MAX_OUTPUT_SIZE);
                }

                if !output.status.success() {
                    error!(
                        "Command '{}' failed (exit code: {:?}): {}",
                        command,
                        output.status.code(),
                        stderr.trim()
                    );
                    return Err(BrickOpsError::CommandFailed {
                        host: host.to_string(),
                        command,
                        exit_code: output.status.code(),
                        stderr: failure_message(&stderr, &stdout),
                    });
                }

                debug!("Command completed in {:?}", start.elapsed());
                Ok(stdout)
            }
            Ok(Err(e)) => {
                error!("Command execution failed: {}", e);
                Err(BrickOpsError::Io(e))
            }
            Err(_) => {
                error!("Command timed out after {:?}", timeout);
                Err(BrickOpsError::CommandTimeout {
                    host: host.to_string(),
                    command,
                    timeout: timeout.as_secs(),
                })
            }
        }
    }
}

/// gluster reports some failures on stdout only
pub(crate) fn failure_message(stderr: &str, stdout: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.to_string()
    }
}

#[async_trait]
impl RemoteTransport for LocalTransport {
    async fn exec_commands(
        &self,
        host: &str,
        commands: &[String],
        timeout: Duration,
    ) -> Result<Vec<String>> {
        info!("Running {} command(s) locally for {}", commands.len(), host);

        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            results.push(self.exec_one(host, command, timeout).await?);
        }

        Ok(results)
    }
}
