// Integration tests for `ProxmoxClient` using wiremock.

#![allow(clippy::unwrap_used)]

use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pvesync_api::proxmox::models::ResourceKind;
use pvesync_api::{Error, ProxmoxClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ProxmoxClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = ProxmoxClient::with_client(reqwest::Client::new(), base, "pve1");
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_list_guests_unwraps_the_data_envelope() {
    let (server, client) = setup().await;

    let body = json!({
        "data": [
            { "vmid": 100, "name": "web", "status": "running", "maxmem": 2147483648u64 },
            { "vmid": 101, "name": "db", "status": "stopped", "tags": "prod;sql" },
        ]
    });

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let guests = client.list_guests(ResourceKind::Qemu).await.unwrap();

    assert_eq!(guests.len(), 2);
    assert_eq!(guests[0].vmid, 100);
    assert_eq!(guests[0].name.as_deref(), Some("web"));
    assert_eq!(guests[0].maxmem, Some(2_147_483_648));
    assert_eq!(guests[1].status, "stopped");
    assert_eq!(guests[1].tags.as_deref(), Some("prod;sql"));
}

#[tokio::test]
async fn test_guest_config_is_a_raw_map() {
    let (server, client) = setup().await;

    let body = json!({
        "data": {
            "name": "web",
            "cores": 4,
            "scsi0": "local-lvm:vm-100-disk-0,size=32G",
            "net0": "virtio=AA:BB:CC:DD:EE:FF,bridge=vmbr0",
        }
    });

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let config = client.guest_config(ResourceKind::Qemu, 100).await.unwrap();

    assert_eq!(config.get("name").and_then(|v| v.as_str()), Some("web"));
    assert_eq!(config.get("cores").and_then(serde_json::Value::as_u64), Some(4));
    assert!(config.get("scsi0").is_some());
}

#[tokio::test]
async fn test_agent_interfaces_accepts_the_result_wrapper() {
    let (server, client) = setup().await;

    let body = json!({
        "data": {
            "result": [
                {
                    "name": "eth0",
                    "hardware-address": "aa:bb:cc:dd:ee:ff",
                    "ip-addresses": [
                        { "ip-address": "10.0.0.5", "prefix": 24, "ip-address-type": "ipv4" }
                    ]
                }
            ]
        }
    });

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/agent/network-get-interfaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let interfaces = client.agent_network_interfaces(100).await.unwrap();

    assert_eq!(interfaces.len(), 1);
    assert_eq!(interfaces[0].hardware_address.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
    assert_eq!(interfaces[0].ip_addresses[0].prefix, 24);
}

#[tokio::test]
async fn test_node_status_and_network() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "cpuinfo": { "model": "AMD EPYC 7302", "sockets": 2, "cpus": 32 },
                "memory": { "total": 137438953472u64, "used": 1024 },
                "rootfs": { "total": 107374182400u64, "used": 2048 }
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/network"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "iface": "vmbr0",
                    "type": "bridge",
                    "active": 1,
                    "address": "192.168.1.5",
                    "netmask": "255.255.255.0",
                    "bridge_ports": "eno1"
                },
                { "iface": "eno1", "type": "eth", "active": 1, "mac": "aa:bb:cc:00:11:22" }
            ]
        })))
        .mount(&server)
        .await;

    let status = client.node_status().await.unwrap();
    assert_eq!(status.cpuinfo.unwrap().cpus, Some(32));
    assert_eq!(status.memory.unwrap().total, Some(137_438_953_472));

    let network = client.node_network().await.unwrap();
    assert_eq!(network.len(), 2);
    assert_eq!(network[0].iface, "vmbr0");
    assert_eq!(network[0].kind, "bridge");
    assert_eq!(network[1].mac.as_deref(), Some("aa:bb:cc:00:11:22"));
}

#[tokio::test]
async fn test_token_auth_header_is_sent() {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let client = ProxmoxClient::new(
        base,
        "pve1",
        "sync@pam!netbox",
        &secrecy::SecretString::from("super-secret"),
        &pvesync_api::transport::TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path("/api2/json/version"))
        .and(header("authorization", "PVEAPIToken=sync@pam!netbox=super-secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "version": "8.2.2" } })),
        )
        .mount(&server)
        .await;

    let version = client.version().await.unwrap();
    assert_eq!(version.version, "8.2.2");
}

// ── Error handling ──────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.list_guests(ResourceKind::Qemu).await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }));
}

#[tokio::test]
async fn test_server_error_carries_status_and_message() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/lxc"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error\ndetails"))
        .mount(&server)
        .await;

    let err = client.list_guests(ResourceKind::Lxc).await.unwrap_err();
    match err {
        Error::Proxmox { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "internal error");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_null_data_is_an_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api2/json/nodes/pve1/qemu/100/status/current"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": null })))
        .mount(&server)
        .await;

    let err = client.guest_status(ResourceKind::Qemu, 100).await.unwrap_err();
    assert!(matches!(err, Error::Proxmox { .. }));
}
