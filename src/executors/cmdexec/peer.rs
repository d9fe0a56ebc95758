use super::CmdExecutor;
use crate::error::Result;
use crate::models::validate_host;
use crate::executors::RemoteTransport;
use tracing::info;

impl<T: RemoteTransport> CmdExecutor<T> {
    pub(super) async fn exec_glusterd_check(&self, host: &str) -> Result<()> {
        validate_host(host)?;
        self.exec_one(host, "systemctl status glusterd".to_string())
            .await?;
        Ok(())
    }

    pub(super) async fn exec_peer_probe(&self, exec_host: &str, new_node: &str) -> Result<()> {
        validate_host(new_node)?;

        info!("Probing {} from {}", new_node, exec_host);
        self.gluster_exec(exec_host, &format!("peer probe {}", new_node))
            .await?;

        // Every pool member gets the same snapshot ceiling
        self.gluster_exec(
            exec_host,
            &format!(
                "snapshot config snap-max-hard-limit {}",
                self.config.snapshot_limit
            ),
        )
        .await
    }

    pub(super) async fn exec_peer_detach(&self, exec_host: &str, detach_node: &str) -> Result<()> {
        validate_host(detach_node)?;

        info!("Detaching {} from {}", detach_node, exec_host);
        self.gluster_exec(exec_host, &format!("peer detach {}", detach_node))
            .await
    }
}
