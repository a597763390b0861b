// ── Source-side snapshot types ──
//
// Ephemeral: rebuilt from a fresh Proxmox fetch on every pass. The
// normalizer is the only producer; the reconcilers are the only consumers.

use ipnet::IpNet;
use strum::Display;

use super::mac::MacAddr;

/// Guest resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GuestKind {
    #[strum(serialize = "VM")]
    Vm,
    #[strum(serialize = "CT")]
    Container,
}

/// Disk image format, explicit or inferred from the volume path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DiskFormat {
    Qcow2,
    Raw,
    Vmdk,
    Iso,
    Tar,
    #[strum(serialize = "tar.gz")]
    TarGz,
    #[strum(serialize = "tar.zst")]
    TarZst,
}

/// One virtual disk attached to a guest.
#[derive(Debug, Clone)]
pub struct VirtualDisk {
    /// Slot name (`scsi0`, `virtio2`, `rootfs`, `mp1`, ...), the stable
    /// key for child reconciliation.
    pub name: String,
    /// Parsed size in MiB; `None` when the size string was malformed.
    pub size_mb: Option<u64>,
    pub storage_id: Option<String>,
    pub format: Option<DiskFormat>,
    pub is_boot: bool,
    pub mount_point: Option<String>,
    /// The untouched Proxmox config value, mirrored into the registry
    /// record's description.
    pub raw_config: String,
}

/// Address family of an agent-reported address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

/// One address reported by the QEMU guest agent for an interface.
#[derive(Debug, Clone)]
pub struct AgentAddress {
    pub addr: IpNet,
    pub family: AddressFamily,
}

/// One guest network interface.
///
/// Interfaces without a resolvable MAC never make it here -- the MAC is
/// the downstream cross-reference key, so the normalizer drops them.
#[derive(Debug, Clone)]
pub struct NetInterface {
    pub name: String,
    pub mac: MacAddr,
    /// Static `ip=` config, or the best agent-reported address.
    pub ip_cidr: Option<IpNet>,
    pub bridge: Option<String>,
    pub model: Option<String>,
    pub vlan_tag: Option<u16>,
    /// Every usable address the agent reported for this MAC.
    pub agent_addresses: Vec<AgentAddress>,
}

/// Kind-specific guest attributes.
#[derive(Debug, Clone)]
pub enum GuestDetails {
    Vm {
        cpu_type: Option<String>,
        bios: String,
        machine: String,
        numa: bool,
        sockets: Option<u32>,
        cores_per_socket: u32,
        min_memory_mb: Option<u64>,
        boot_order: Option<String>,
    },
    Container {
        arch: Option<String>,
        unprivileged: bool,
        features: Option<String>,
    },
}

/// One guest (VM or container) from the source snapshot.
#[derive(Debug, Clone)]
pub struct SourceGuest {
    /// Stable numeric identity; survives renames, the registry matches on it.
    pub vmid: u32,
    pub name: String,
    pub kind: GuestKind,
    /// Live status (`running`, `stopped`, ...) when it could be fetched.
    pub status: Option<String>,
    pub vcpus: u32,
    pub memory_mb: Option<u64>,
    pub tags: Vec<String>,
    /// Free-form notes; may embed a platform override directive (`os: ...`).
    pub notes: String,
    pub os_type: Option<String>,
    pub details: GuestDetails,
    pub disks: Vec<VirtualDisk>,
    pub nics: Vec<NetInterface>,
}

impl SourceGuest {
    /// The boot disk, when one was identified.
    pub fn boot_disk(&self) -> Option<&VirtualDisk> {
        self.disks.iter().find(|d| d.is_boot)
    }

    /// Sum of all positive per-disk sizes; `None` when the guest carries
    /// no disk list at all (so the aggregate field is omitted, not zeroed).
    pub fn disk_total_mb(&self) -> Option<u64> {
        if self.disks.is_empty() {
            return None;
        }
        Some(self.disks.iter().filter_map(|d| d.size_mb).sum())
    }
}

/// Node interface classification, from the source's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeInterfaceKind {
    Bridge,
    Bond,
    Eth,
    Vlan,
    Loopback,
    Other,
}

impl NodeInterfaceKind {
    pub fn from_raw(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "bridge" => Self::Bridge,
            "bond" => Self::Bond,
            "eth" => Self::Eth,
            "vlan" => Self::Vlan,
            "loopback" => Self::Loopback,
            _ => Self::Other,
        }
    }
}

/// One host-level interface on the node itself.
#[derive(Debug, Clone)]
pub struct NodeInterface {
    pub name: String,
    /// Primary-source MAC; may be absent or the all-zero sentinel, in
    /// which case an out-of-band link report can fill it in.
    pub mac: Option<MacAddr>,
    pub kind: NodeInterfaceKind,
    pub kind_raw: String,
    pub active: bool,
    pub address: Option<String>,
    pub netmask: Option<String>,
    pub comments: Option<String>,
    pub bond_slaves: Option<String>,
    pub bridge_ports: Option<String>,
}

impl NodeInterface {
    /// A MAC usable for link-address assignment: present and not the
    /// zero sentinel.
    pub fn usable_mac(&self) -> Option<&MacAddr> {
        self.mac.as_ref().filter(|m| !m.is_zero())
    }
}

/// Host-level details for one hypervisor node.
#[derive(Debug, Clone)]
pub struct SourceNode {
    pub name: String,
    pub cpu_model: Option<String>,
    pub cpu_sockets: Option<u32>,
    pub cpu_cores: Option<u32>,
    pub memory_total_bytes: Option<u64>,
    pub rootfs_total_bytes: Option<u64>,
    pub version: Option<String>,
    pub interfaces: Vec<NodeInterface>,
}
