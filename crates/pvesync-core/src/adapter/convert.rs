// ── Wire-to-domain conversions ──
//
// Bridges raw `pvesync_api` response types into the engine's domain
// records, and drafts back into write payloads. Each conversion normalizes
// field names, parses strings into strong types, and fills sensible
// defaults for missing optional data.

use chrono::DateTime;

use pvesync_api::netbox::models::{
    Device, DeviceCustomFields, DeviceInterface, DeviceInterfaceCustomFields, DeviceWrite,
    IpAddress, MacAddress, VirtualDisk, VirtualMachine, VirtualMachineWrite, VmCustomFields,
    VmInterface, VmInterfaceCustomFields, OBJECT_TYPE_DEVICE_INTERFACE, OBJECT_TYPE_VM_INTERFACE,
};

use crate::model::{
    DeviceAttributes, DeviceDraft, DeviceRecord, DiskRecord, GuestAttributes, InterfaceCustom,
    InterfaceOwnerKind, InterfaceRecord, InterfaceRef, IpRecord, LifecycleStatus,
    LinkAddressRecord, RecordId, VmDraft, VmRecord,
};

/// Derive a registry slug from a display name.
pub(crate) fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '.' || c == '_' { '-' } else { c })
        .collect()
}

/// Resolve an `assigned_object_type`/`assigned_object_id` pair into an
/// interface reference, when the target is an interface at all.
fn assigned_interface(kind: Option<&str>, id: Option<i64>) -> Option<InterfaceRef> {
    let owner = match kind? {
        OBJECT_TYPE_VM_INTERFACE => InterfaceOwnerKind::VirtualMachine,
        OBJECT_TYPE_DEVICE_INTERFACE => InterfaceOwnerKind::Device,
        _ => return None,
    };
    Some(InterfaceRef {
        owner,
        id: RecordId(id?),
    })
}

pub(crate) fn owner_object_type(owner: InterfaceOwnerKind) -> &'static str {
    match owner {
        InterfaceOwnerKind::VirtualMachine => OBJECT_TYPE_VM_INTERFACE,
        InterfaceOwnerKind::Device => OBJECT_TYPE_DEVICE_INTERFACE,
    }
}

// ── Virtual machines ────────────────────────────────────────────────

impl From<VirtualMachine> for VmRecord {
    fn from(vm: VirtualMachine) -> Self {
        let cf = vm.custom_fields;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let vcpus = vm.vcpus.map(|v| v.round().max(0.0) as u32);

        VmRecord {
            id: RecordId(vm.id),
            name: vm.name,
            status: vm.status.map(|s| s.value),
            cluster: vm.cluster.map(|c| RecordId(c.id)),
            platform: vm.platform.map(|p| RecordId(p.id)),
            vcpus,
            memory_mb: vm.memory,
            disk_mb: vm.disk,
            comments: vm.comments.unwrap_or_default(),
            tags: vm.tags.into_iter().map(|t| RecordId(t.id)).collect(),
            vmid: cf.vmid,
            lifecycle: cf.vm_status.as_deref().and_then(|s| s.parse().ok()),
            last_sync: cf
                .vm_last_sync
                .as_deref()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|dt| dt.to_utc()),
            primary_ip4: vm.primary_ip4.map(|ip| RecordId(ip.id)),
            primary_ip6: vm.primary_ip6.map(|ip| RecordId(ip.id)),
            attrs: GuestAttributes {
                cpu_sockets: cf.cpu_sockets,
                min_memory_mb: cf.min_memory_mb,
                cpu_type: cf.qemu_cpu_type,
                bios_type: cf.qemu_bios_type,
                machine_type: cf.qemu_machine_type,
                numa_enabled: cf.qemu_numa_enabled,
                cores_per_socket: cf.qemu_cores_per_socket,
                boot_order: cf.qemu_boot_order,
                container_arch: cf.lxc_architecture,
                container_unprivileged: cf.lxc_unprivileged,
                container_features: cf.lxc_features,
                boot_disk_storage: cf.boot_disk_storage,
                boot_disk_format: cf.boot_disk_format,
            },
        }
    }
}

pub(crate) fn vm_write(draft: &VmDraft) -> VirtualMachineWrite {
    let attrs = &draft.attrs;
    VirtualMachineWrite {
        name: draft.name.clone(),
        status: draft.status.to_string(),
        cluster: draft.cluster.map(|c| c.0),
        platform: draft.platform.map(|p| p.0),
        vcpus: Some(f64::from(draft.vcpus)),
        memory: draft.memory_mb,
        disk: draft.disk_mb,
        comments: Some(draft.comments.clone()),
        tags: (!draft.tags.is_empty()).then(|| draft.tags.iter().map(|t| t.0).collect()),
        custom_fields: VmCustomFields {
            vmid: Some(draft.vmid),
            vm_status: Some(LifecycleStatus::Deployed.to_string()),
            vm_last_sync: Some(draft.timestamp.to_rfc3339()),
            cpu_sockets: attrs.cpu_sockets,
            min_memory_mb: attrs.min_memory_mb,
            qemu_cpu_type: attrs.cpu_type.clone(),
            qemu_bios_type: attrs.bios_type.clone(),
            qemu_machine_type: attrs.machine_type.clone(),
            qemu_numa_enabled: attrs.numa_enabled,
            qemu_cores_per_socket: attrs.cores_per_socket,
            qemu_boot_order: attrs.boot_order.clone(),
            lxc_architecture: attrs.container_arch.clone(),
            lxc_unprivileged: attrs.container_unprivileged,
            lxc_features: attrs.container_features.clone(),
            boot_disk_storage: attrs.boot_disk_storage.clone(),
            boot_disk_format: attrs.boot_disk_format.clone(),
        },
    }
}

// ── Child resources ─────────────────────────────────────────────────

impl From<VirtualDisk> for DiskRecord {
    fn from(disk: VirtualDisk) -> Self {
        DiskRecord {
            id: RecordId(disk.id),
            name: disk.name,
            size_mb: disk.size,
            description: disk.description.unwrap_or_default(),
        }
    }
}

impl From<VmInterface> for InterfaceRecord {
    fn from(iface: VmInterface) -> Self {
        InterfaceRecord {
            iface: InterfaceRef {
                owner: InterfaceOwnerKind::VirtualMachine,
                id: RecordId(iface.id),
            },
            name: iface.name,
            enabled: iface.enabled,
            kind: None,
            mgmt_only: false,
            description: String::new(),
            access_vlan: match iface.mode.as_ref().map(|m| m.value.as_str()) {
                Some("access") => iface.untagged_vlan.map(|v| RecordId(v.id)),
                _ => None,
            },
            primary_link: iface.primary_mac_address.map(|m| RecordId(m.id)),
            custom: Some(InterfaceCustom::Guest {
                bridge: iface.custom_fields.bridge,
                model: iface.custom_fields.interface_model,
            }),
        }
    }
}

impl From<DeviceInterface> for InterfaceRecord {
    fn from(iface: DeviceInterface) -> Self {
        InterfaceRecord {
            iface: InterfaceRef {
                owner: InterfaceOwnerKind::Device,
                id: RecordId(iface.id),
            },
            name: iface.name,
            enabled: iface.enabled,
            kind: Some(iface.kind.value),
            mgmt_only: iface.mgmt_only,
            description: iface.description.unwrap_or_default(),
            access_vlan: None,
            primary_link: iface.primary_mac_address.map(|m| RecordId(m.id)),
            custom: Some(InterfaceCustom::Node {
                kind_raw: iface.custom_fields.proxmox_interface_type,
                ports: iface.custom_fields.proxmox_interface_ports,
            }),
        }
    }
}

pub(crate) fn guest_custom_fields(custom: &InterfaceCustom) -> VmInterfaceCustomFields {
    match custom {
        InterfaceCustom::Guest { bridge, model } => VmInterfaceCustomFields {
            bridge: bridge.clone(),
            interface_model: model.clone(),
        },
        InterfaceCustom::Node { .. } => VmInterfaceCustomFields::default(),
    }
}

pub(crate) fn node_custom_fields(custom: &InterfaceCustom) -> DeviceInterfaceCustomFields {
    match custom {
        InterfaceCustom::Node { kind_raw, ports } => DeviceInterfaceCustomFields {
            proxmox_interface_type: kind_raw.clone(),
            proxmox_interface_ports: ports.clone(),
        },
        InterfaceCustom::Guest { .. } => DeviceInterfaceCustomFields::default(),
    }
}

// ── Link-address and IP objects ─────────────────────────────────────

impl From<MacAddress> for LinkAddressRecord {
    fn from(mac: MacAddress) -> Self {
        LinkAddressRecord {
            id: RecordId(mac.id),
            assigned: assigned_interface(
                mac.assigned_object_type.as_deref(),
                mac.assigned_object_id,
            ),
            mac: mac.mac_address,
        }
    }
}

impl From<IpAddress> for IpRecord {
    fn from(ip: IpAddress) -> Self {
        IpRecord {
            id: RecordId(ip.id),
            assigned: assigned_interface(
                ip.assigned_object_type.as_deref(),
                ip.assigned_object_id,
            ),
            address: ip.address,
        }
    }
}

// ── Devices ─────────────────────────────────────────────────────────

impl From<Device> for DeviceRecord {
    fn from(device: Device) -> Self {
        let cf = device.custom_fields;
        DeviceRecord {
            id: RecordId(device.id),
            name: device.name,
            role: device.role.map(|r| RecordId(r.id)),
            device_type: device.device_type.map(|t| RecordId(t.id)),
            site: device.site.map(|s| RecordId(s.id)),
            platform: device.platform.map(|p| RecordId(p.id)),
            attrs: DeviceAttributes {
                version: cf.proxmox_pve_version,
                cpu_model: cf.proxmox_cpu_model,
                cpu_sockets: cf.proxmox_cpu_sockets,
                cpu_cores: cf.proxmox_cpu_cores_total,
                memory_total_gb: cf.proxmox_memory_total_gb,
                rootfs_total_gb: cf.proxmox_rootfs_total_gb,
            },
        }
    }
}

pub(crate) fn device_write(draft: &DeviceDraft) -> DeviceWrite {
    DeviceWrite {
        name: draft.name.clone(),
        status: "active".into(),
        role: draft.role.map(|r| r.0),
        device_type: draft.device_type.map(|t| t.0),
        site: draft.site.map(|s| s.0),
        platform: draft.platform.map(|p| p.0),
        custom_fields: DeviceCustomFields {
            proxmox_pve_version: draft.attrs.version.clone(),
            proxmox_cpu_model: draft.attrs.cpu_model.clone(),
            proxmox_cpu_sockets: draft.attrs.cpu_sockets,
            proxmox_cpu_cores_total: draft.attrs.cpu_cores,
            proxmox_memory_total_gb: draft.attrs.memory_total_gb,
            proxmox_rootfs_total_gb: draft.attrs.rootfs_total_gb,
            proxmox_node_last_sync: Some(draft.timestamp.to_rfc3339()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("Proxmox VE 8.2"), "proxmox-ve-8-2");
        assert_eq!(slugify("Ubuntu 22.04"), "ubuntu-22-04");
        assert_eq!(slugify("prod_web"), "prod-web");
    }

    #[test]
    fn assigned_interface_requires_a_known_type() {
        assert!(assigned_interface(Some("dcim.device"), Some(1)).is_none());
        assert!(assigned_interface(None, Some(1)).is_none());
        let iface = assigned_interface(Some(OBJECT_TYPE_VM_INTERFACE), Some(9));
        assert_eq!(
            iface,
            Some(InterfaceRef {
                owner: InterfaceOwnerKind::VirtualMachine,
                id: RecordId(9)
            })
        );
    }
}
