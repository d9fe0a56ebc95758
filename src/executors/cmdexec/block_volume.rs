use super::{error_message, CmdExecutor};
use crate::error::{BrickOpsError, Result};
use crate::executors::RemoteTransport;
use crate::models::{validate_name, BlockVolumeInfo, BlockVolumeRequest};
use serde::Deserialize;
use tracing::{info, warn};

/// `gluster-block ... --json` answer
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BlockResult {
    #[serde(rename = "IQN")]
    iqn: String,
    #[serde(rename = "USERNAME")]
    username: String,
    #[serde(rename = "PASSWORD")]
    password: String,
    #[serde(rename = "PORTAL(S)")]
    portals: Vec<String>,
    #[serde(rename = "RESULT")]
    result: String,
    #[serde(rename = "errCode")]
    err_code: Option<i32>,
    #[serde(rename = "errMsg")]
    err_msg: Option<String>,
}

impl BlockResult {
    fn parse(output: &str) -> Result<Self> {
        Ok(serde_json::from_str(output.trim())?)
    }

    fn succeeded(&self) -> bool {
        self.result.eq_ignore_ascii_case("SUCCESS")
    }

    fn failure(&self, action: &str) -> BrickOpsError {
        BrickOpsError::UnexpectedOutput(format!(
            "gluster-block {} failed (code {}): {}",
            action,
            self.err_code.unwrap_or(-1),
            self.err_msg.as_deref().unwrap_or("no error message")
        ))
    }
}

/// gluster-block reports its JSON on stdout even when it exits non-zero
fn block_failure(err: BrickOpsError, action: &str) -> BrickOpsError {
    match BlockResult::parse(error_message(&err)) {
        Ok(result) if !result.succeeded() => result.failure(action),
        _ => err,
    }
}

fn is_missing(message: &str) -> bool {
    message.contains("doesn't exist")
        || message.contains("does not exist")
        || message.contains("not found")
}

impl<T: RemoteTransport> CmdExecutor<T> {
    pub(super) async fn exec_block_volume_create(
        &self,
        host: &str,
        block_volume: &BlockVolumeRequest,
    ) -> Result<BlockVolumeInfo> {
        block_volume.validate()?;

        let auth = if block_volume.auth { "auth enable " } else { "" };
        let command = format!(
            "gluster-block create {}/{} ha {} {}prealloc {} {} {}GiB --json",
            block_volume.gluster_volume_name,
            block_volume.name,
            block_volume.ha_count,
            auth,
            self.config.block_volume_prealloc,
            block_volume.block_hosts.join(","),
            block_volume.size
        );

        let output = self
            .exec_one(host, command)
            .await
            .map_err(|e| block_failure(e, "create"))?;
        let result = BlockResult::parse(&output)?;

        if !result.succeeded() {
            return Err(result.failure("create"));
        }
        if result.iqn.is_empty() {
            return Err(BrickOpsError::UnexpectedOutput(format!(
                "gluster-block create of {} returned no IQN",
                block_volume.name
            )));
        }
        if block_volume.auth && (result.username.is_empty() || result.password.is_empty()) {
            return Err(BrickOpsError::UnexpectedOutput(format!(
                "gluster-block create of {} returned no credentials",
                block_volume.name
            )));
        }

        info!(
            "Created block volume {}/{} exported on {}",
            block_volume.gluster_volume_name,
            block_volume.name,
            result.portals.join(",")
        );

        Ok(BlockVolumeInfo {
            name: block_volume.name.clone(),
            size: block_volume.size,
            gluster_volume_name: block_volume.gluster_volume_name.clone(),
            gluster_node: block_volume.gluster_node.clone(),
            ha_count: block_volume.ha_count,
            block_hosts: block_volume.block_hosts.clone(),
            iqn: result.iqn,
            username: result.username,
            password: result.password,
        })
    }

    pub(super) async fn exec_block_volume_destroy(
        &self,
        host: &str,
        block_hosting_volume_name: &str,
        block_volume_name: &str,
    ) -> Result<()> {
        validate_name("block hosting volume name", block_hosting_volume_name)?;
        validate_name("block volume name", block_volume_name)?;

        let command = format!(
            "gluster-block delete {}/{} --json",
            block_hosting_volume_name, block_volume_name
        );

        let output = match self.exec_one(host, command).await {
            Ok(output) => output,
            Err(e) => {
                let err = block_failure(e, "delete");
                let missing = match &err {
                    BrickOpsError::UnexpectedOutput(message) => is_missing(message),
                    other => is_missing(error_message(other)),
                };
                if missing {
                    warn!(
                        "Block volume {}/{} already gone",
                        block_hosting_volume_name, block_volume_name
                    );
                    return Ok(());
                }
                return Err(err);
            }
        };

        let result = BlockResult::parse(&output)?;
        if !result.succeeded() {
            if result.err_msg.as_deref().is_some_and(is_missing) {
                warn!(
                    "Block volume {}/{} already gone",
                    block_hosting_volume_name, block_volume_name
                );
                return Ok(());
            }
            return Err(result.failure("delete"));
        }

        info!(
            "Deleted block volume {}/{}",
            block_hosting_volume_name, block_volume_name
        );
        Ok(())
    }
}
