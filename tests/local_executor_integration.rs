//! Command executor over the local transport, against stand-in node tools
//!
//! `gluster`, `gluster-block` and `systemctl` are replaced by small shell
//! scripts placed first on PATH, so the real process handling (exit codes,
//! stdout/stderr, XML on failure) is exercised end to end.

use brickops::config::CmdConfig;
use brickops::error::BrickOpsError;
use brickops::executors::cmdexec::CmdExecutor;
use brickops::executors::local::LocalTransport;
use brickops::executors::Executor;
use brickops::models::{BlockVolumeRequest, BrickInfo, DurabilityType, VolumeRequest};
use brickops::retry::RetryConfig;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Once;

static FAKE_TOOLS: Once = Once::new();

const FAKE_GLUSTER: &str = r#"#!/bin/sh
case "$*" in
  *"volume info missing"*)
    echo '<cliOutput><opRet>-1</opRet><opErrno>30800</opErrno><opErrstr>Volume missing does not exist</opErrstr></cliOutput>'
    exit 1
    ;;
  *"volume info"*)
    cat <<'EOF'
<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cliOutput>
  <opRet>0</opRet>
  <opErrno>0</opErrno>
  <opErrstr/>
  <volInfo>
    <volumes>
      <volume>
        <name>vol1</name>
        <id>0f6a1e2c-1111-4222-8333-444455556666</id>
        <status>1</status>
        <statusStr>Started</statusStr>
        <brickCount>2</brickCount>
        <distCount>2</distCount>
        <stripeCount>1</stripeCount>
        <replicaCount>2</replicaCount>
        <arbiterCount>0</arbiterCount>
        <disperseCount>0</disperseCount>
        <redundancyCount>0</redundancyCount>
        <type>2</type>
        <typeStr>Replicate</typeStr>
        <transport>0</transport>
        <bricks>
          <brick uuid="a1"><name>node1:/b1/brick</name><hostUuid>a1</hostUuid><isArbiter>0</isArbiter></brick>
          <brick uuid="b2"><name>node2:/b2/brick</name><hostUuid>b2</hostUuid><isArbiter>0</isArbiter></brick>
        </bricks>
        <optCount>0</optCount>
        <options/>
      </volume>
      <count>1</count>
    </volumes>
  </volInfo>
</cliOutput>
EOF
    ;;
  *"heal"*)
    echo '<cliOutput><opRet>0</opRet><opErrno>0</opErrno><opErrstr/><healInfo><bricks><brick hostUuid="a1"><name>node1:/b1/brick</name><status>Connected</status><numberOfEntries>4</numberOfEntries></brick></bricks></healInfo></cliOutput>'
    ;;
  *"peer probe unreachable"*)
    echo "peer probe: failed: Probe returned with Transport endpoint is not connected" >&2
    exit 1
    ;;
  *"--xml"*)
    echo '<cliOutput><opRet>0</opRet><opErrno>0</opErrno><opErrstr/></cliOutput>'
    ;;
  *)
    echo "success"
    ;;
esac
"#;

const FAKE_GLUSTER_BLOCK: &str = r#"#!/bin/sh
case "$1" in
  create)
    echo '{ "IQN": "iqn.2016-12.org.gluster-block:5c6d", "USERNAME": "5c6d", "PASSWORD": "f00d", "PORTAL(S)": [ "10.0.0.1:3260" ], "RESULT": "SUCCESS" }'
    ;;
  delete)
    echo '{ "RESULT": "FAIL", "errCode": 2, "errMsg": "block bhv/gone doesn'"'"'t exist" }'
    exit 2
    ;;
esac
"#;

const FAKE_SYSTEMCTL: &str = "#!/bin/sh\necho 'Active: active (running)'\n";

fn write_tool(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

fn install_fake_tools() {
    FAKE_TOOLS.call_once(|| {
        let dir = tempfile::tempdir().unwrap().into_path();
        write_tool(&dir, "gluster", FAKE_GLUSTER);
        write_tool(&dir, "gluster-block", FAKE_GLUSTER_BLOCK);
        write_tool(&dir, "systemctl", FAKE_SYSTEMCTL);

        let path = std::env::var("PATH").unwrap_or_default();
        std::env::set_var("PATH", format!("{}:{}", dir.display(), path));
    });
}

fn local_executor() -> CmdExecutor<LocalTransport> {
    install_fake_tools();
    CmdExecutor::new(
        LocalTransport::new(false),
        CmdConfig {
            command_timeout: 10,
            ..Default::default()
        },
        RetryConfig::none(),
    )
}

#[tokio::test]
async fn test_glusterd_check() {
    let executor = local_executor();
    executor.glusterd_check("localhost").await.unwrap();
}

#[tokio::test]
async fn test_peer_probe() {
    let executor = local_executor();
    executor.peer_probe("localhost", "node2").await.unwrap();

    let result = executor.peer_probe("localhost", "unreachable").await;
    match result {
        Err(BrickOpsError::CommandFailed { stderr, .. }) => {
            assert!(stderr.contains("Transport endpoint is not connected"));
        }
        other => panic!("expected command failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_volume_create_and_info() {
    let executor = local_executor();
    let request = VolumeRequest {
        bricks: vec![
            BrickInfo::new("node1", "/b1/brick"),
            BrickInfo::new("node2", "/b2/brick"),
        ],
        name: "vol1".to_string(),
        durability: DurabilityType::Replica,
        gluster_volume_options: vec!["performance.readdir-ahead on".to_string()],
        replica: 2,
        ..Default::default()
    };

    let volume = executor.volume_create("localhost", &request).await.unwrap();
    assert_eq!(volume.volume_name, "vol1");
    assert_eq!(volume.durability(), DurabilityType::Replica);
    assert_eq!(volume.brick_names(), vec!["node1:/b1/brick", "node2:/b2/brick"]);
}

#[tokio::test]
async fn test_volume_info_missing_volume() {
    let executor = local_executor();
    let result = executor.volume_info("localhost", "missing").await;
    assert!(matches!(result, Err(BrickOpsError::NotFound(_))));
}

#[tokio::test]
async fn test_heal_info() {
    let executor = local_executor();
    let heal = executor.heal_info("localhost", "vol1").await.unwrap();
    assert_eq!(heal.pending_entries(), 4);
}

#[tokio::test]
async fn test_block_volume_create_and_missing_delete() {
    let executor = local_executor();
    let request = BlockVolumeRequest {
        name: "blk".to_string(),
        size: 1,
        gluster_volume_name: "bhv".to_string(),
        gluster_node: "localhost".to_string(),
        ha_count: 1,
        block_hosts: vec!["10.0.0.1".to_string()],
        auth: true,
    };

    let info = executor
        .block_volume_create("localhost", &request)
        .await
        .unwrap();
    assert_eq!(info.iqn, "iqn.2016-12.org.gluster-block:5c6d");
    assert_eq!(info.username, "5c6d");

    executor
        .block_volume_destroy("localhost", "bhv", "gone")
        .await
        .unwrap();
}
