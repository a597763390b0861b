// Wire models for the Proxmox VE API.
//
// Guest configuration is deliberately kept as a raw JSON map: the config
// endpoint returns an open key/value bag (`scsi0`, `net1`, `mp3`, ...) whose
// slot keys cannot be enumerated up front. `pvesync-core`'s normalizer owns
// the parsing of those values.

use serde::Deserialize;

/// The two guest resource types Proxmox exposes per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Qemu,
    Lxc,
}

impl ResourceKind {
    /// Path segment under `/nodes/{node}/`.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Qemu => "qemu",
            Self::Lxc => "lxc",
        }
    }
}

/// Raw guest configuration: the untyped key/value bag from
/// `/nodes/{node}/{qemu|lxc}/{vmid}/config`.
pub type RawGuestConfig = serde_json::Map<String, serde_json::Value>;

/// A guest as returned by the `/nodes/{node}/qemu` and `/lxc` list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestSummary {
    pub vmid: u32,
    #[serde(default)]
    pub name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub maxmem: Option<u64>,
    #[serde(default)]
    pub maxdisk: Option<u64>,
    #[serde(default)]
    pub uptime: Option<u64>,
    #[serde(default)]
    pub tags: Option<String>,
}

/// Runtime status from `/nodes/{node}/{qemu|lxc}/{vmid}/status/current`.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestStatus {
    pub status: String,
}

/// One interface from the QEMU guest agent's `network-get-interfaces`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentInterface {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "hardware-address")]
    pub hardware_address: Option<String>,
    #[serde(default, rename = "ip-addresses")]
    pub ip_addresses: Vec<AgentIpAddress>,
}

/// One address entry inside an [`AgentInterface`].
#[derive(Debug, Clone, Deserialize)]
pub struct AgentIpAddress {
    #[serde(rename = "ip-address")]
    pub ip_address: String,
    pub prefix: u8,
    #[serde(rename = "ip-address-type")]
    pub ip_address_type: String,
}

/// Node status from `/nodes/{node}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub cpuinfo: Option<NodeCpuInfo>,
    #[serde(default)]
    pub memory: Option<NodeCapacity>,
    #[serde(default)]
    pub rootfs: Option<NodeCapacity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeCpuInfo {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub sockets: Option<u32>,
    /// Total logical cores across all sockets.
    #[serde(default)]
    pub cpus: Option<u32>,
}

/// A used/total pair (memory, root filesystem).
#[derive(Debug, Clone, Deserialize)]
pub struct NodeCapacity {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub used: Option<u64>,
}

/// Version info from `/version`.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionInfo {
    pub version: String,
}

/// One entry from `/nodes/{node}/network`.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeNetworkEntry {
    pub iface: String,
    /// Proxmox interface type: `bridge`, `bond`, `eth`, `vlan`, ...
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub active: Option<u8>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub slaves: Option<String>,
    #[serde(default)]
    pub bridge_ports: Option<String>,
}
