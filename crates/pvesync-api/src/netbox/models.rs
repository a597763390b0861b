// Wire models for the NetBox REST API.
//
// Read models mirror what NetBox serializes (nested refs, `{value, label}`
// choice fields); write models carry plain identifiers the way the API
// expects them. Clearable patch fields use `Option<Option<T>>` so that
// `Some(None)` serializes as an explicit JSON `null`.

use serde::{Deserialize, Serialize};

/// Content-type string for a virtual machine interface assignment target.
pub const OBJECT_TYPE_VM_INTERFACE: &str = "virtualization.vminterface";
/// Content-type string for a device (DCIM) interface assignment target.
pub const OBJECT_TYPE_DEVICE_INTERFACE: &str = "dcim.interface";

/// Offset-paginated list envelope.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    pub results: Vec<T>,
}

/// Minimal nested representation of a linked object.
#[derive(Debug, Clone, Deserialize)]
pub struct NestedRef {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// A `{value, label}` choice field.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub value: String,
}

/// Nested tag representation on read.
#[derive(Debug, Clone, Deserialize)]
pub struct TagRef {
    pub id: i64,
    pub name: String,
}

// ── Virtual machines ────────────────────────────────────────────────

/// Custom fields carried by every synchronized virtual machine record.
///
/// These fields must exist in the NetBox custom-field catalog; absent ones
/// deserialize as `None` and are skipped on write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmCustomFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_last_sync: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_sockets: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_memory_mb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qemu_cpu_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qemu_bios_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qemu_machine_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qemu_numa_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qemu_cores_per_socket: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qemu_boot_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lxc_architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lxc_unprivileged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lxc_features: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_disk_storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_disk_format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VirtualMachine {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub status: Option<Choice>,
    #[serde(default)]
    pub cluster: Option<NestedRef>,
    #[serde(default)]
    pub platform: Option<NestedRef>,
    #[serde(default)]
    pub vcpus: Option<f64>,
    #[serde(default)]
    pub memory: Option<u64>,
    #[serde(default)]
    pub disk: Option<u64>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub primary_ip4: Option<NestedRef>,
    #[serde(default)]
    pub primary_ip6: Option<NestedRef>,
    #[serde(default)]
    pub custom_fields: VmCustomFields,
}

/// Full create/update payload for a virtual machine.
#[derive(Debug, Clone, Serialize)]
pub struct VirtualMachineWrite {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<i64>>,
    pub custom_fields: VmCustomFields,
}

/// Partial patch for a virtual machine (renames, lifecycle flips,
/// primary address election).
#[derive(Debug, Clone, Default, Serialize)]
pub struct VirtualMachinePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<VmCustomFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_ip4: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_ip6: Option<Option<i64>>,
}

// ── Virtual disks ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct VirtualDisk {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VirtualDiskWrite {
    pub virtual_machine: i64,
    pub name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ── Interfaces ──────────────────────────────────────────────────────

/// Custom fields carried by synchronized VM interfaces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmInterfaceCustomFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VmInterface {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub mode: Option<Choice>,
    #[serde(default)]
    pub untagged_vlan: Option<NestedRef>,
    #[serde(default)]
    pub primary_mac_address: Option<NestedRef>,
    #[serde(default)]
    pub custom_fields: VmInterfaceCustomFields,
}

#[derive(Debug, Clone, Serialize)]
pub struct VmInterfaceWrite {
    pub virtual_machine: i64,
    pub name: String,
    pub enabled: bool,
    /// Always `virtual` for guest NICs.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub untagged_vlan: Option<i64>,
    pub custom_fields: VmInterfaceCustomFields,
}

/// Custom fields carried by synchronized device interfaces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInterfaceCustomFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxmox_interface_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxmox_interface_ports: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceInterface {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: Choice,
    #[serde(default)]
    pub mgmt_only: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub primary_mac_address: Option<NestedRef>,
    #[serde(default)]
    pub custom_fields: DeviceInterfaceCustomFields,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceInterfaceWrite {
    pub device: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub custom_fields: DeviceInterfaceCustomFields,
}

/// Shared partial patch for VM and device interfaces, generic over the
/// custom-field payload of the owning side.
///
/// `mode`, `untagged_vlan`, and `primary_mac_address` are clearable:
/// `Some(None)` writes an explicit `null`.
#[derive(Debug, Clone, Serialize)]
pub struct InterfacePatch<CF: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub untagged_vlan: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_mac_address: Option<Option<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<CF>,
}

impl<CF: Serialize> Default for InterfacePatch<CF> {
    fn default() -> Self {
        Self {
            enabled: None,
            kind: None,
            description: None,
            mode: None,
            untagged_vlan: None,
            primary_mac_address: None,
            custom_fields: None,
        }
    }
}

impl<CF: Serialize> InterfacePatch<CF> {
    /// Returns `true` when no field is set (nothing to send).
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.kind.is_none()
            && self.description.is_none()
            && self.mode.is_none()
            && self.untagged_vlan.is_none()
            && self.primary_mac_address.is_none()
            && self.custom_fields.is_none()
    }
}

// ── MAC addresses ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct MacAddress {
    pub id: i64,
    pub mac_address: String,
    #[serde(default)]
    pub assigned_object_type: Option<String>,
    #[serde(default)]
    pub assigned_object_id: Option<i64>,
}

// ── IP addresses ────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct IpAddress {
    pub id: i64,
    pub address: String,
    #[serde(default)]
    pub assigned_object_type: Option<String>,
    #[serde(default)]
    pub assigned_object_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IpAddressWrite {
    pub address: String,
    pub status: String,
    pub assigned_object_type: String,
    pub assigned_object_id: i64,
}

// ── Devices ─────────────────────────────────────────────────────────

/// Custom fields carried by a synchronized hypervisor device record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCustomFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxmox_pve_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxmox_cpu_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxmox_cpu_sockets: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxmox_cpu_cores_total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxmox_memory_total_gb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxmox_rootfs_total_gb: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxmox_node_last_sync: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub role: Option<NestedRef>,
    #[serde(default)]
    pub device_type: Option<NestedRef>,
    #[serde(default)]
    pub site: Option<NestedRef>,
    #[serde(default)]
    pub platform: Option<NestedRef>,
    #[serde(default)]
    pub custom_fields: DeviceCustomFields,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceWrite {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<i64>,
    pub custom_fields: DeviceCustomFields,
}

// ── Taxonomy objects ────────────────────────────────────────────────

/// Generic named object with a slug (tags, platforms, sites, roles, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct NamedObject {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cluster {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vlan {
    pub id: i64,
    pub vid: u16,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceType {
    pub id: i64,
    pub model: String,
}
