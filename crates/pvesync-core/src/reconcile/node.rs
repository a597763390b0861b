// ── Node device reconciliation ──
//
// The hypervisor node itself becomes a device record: placement comes
// from configuration (site, role, device type), capacity figures from the
// node status endpoint, and the interface set from the node network list
// (with out-of-band MACs already merged by the normalizer).

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::model::source::{NodeInterface, NodeInterfaceKind, SourceNode};
use crate::model::{
    DeviceAttributes, DeviceDraft, InterfaceCustom, InterfaceDraft, InterfaceRecord,
    InterfaceUpdate, ParentRef, RecordId,
};
use crate::provider::{DirectoryProvider, TaxonSpec};
use crate::taxonomy::TaxonomyCache;

use super::interfaces::{assign_address, link_phase};
use super::NodeSettings;

const BYTES_IN_GB: u64 = 1024 * 1024 * 1024;

/// Map a node interface classification onto the registry's interface
/// type vocabulary.
fn registry_interface_type(kind: NodeInterfaceKind, name: &str, raw: &str) -> &'static str {
    match kind {
        NodeInterfaceKind::Bridge => "bridge",
        NodeInterfaceKind::Bond => "lag",
        NodeInterfaceKind::Vlan | NodeInterfaceKind::Loopback => "virtual",
        NodeInterfaceKind::Eth => "1000base-t",
        NodeInterfaceKind::Other => {
            warn!(interface = %name, kind = %raw, "unmapped interface type; using 'other'");
            "other"
        }
    }
}

/// Build the desired device payload, resolving placement taxonomy.
async fn resolve_draft<P: DirectoryProvider + ?Sized>(
    node: &SourceNode,
    settings: &NodeSettings,
    taxonomy: &mut TaxonomyCache<'_, P>,
) -> DeviceDraft {
    let site = match &settings.site {
        Some(name) => {
            taxonomy
                .resolve_lenient(&TaxonSpec::Site { name: name.clone() })
                .await
        }
        None => None,
    };
    let role = match &settings.role {
        Some(name) => {
            taxonomy
                .resolve_lenient(&TaxonSpec::DeviceRole { name: name.clone() })
                .await
        }
        None => None,
    };
    let manufacturer = match &settings.manufacturer {
        Some(name) => {
            taxonomy
                .resolve_lenient(&TaxonSpec::Manufacturer { name: name.clone() })
                .await
        }
        None => None,
    };
    // A device type cannot exist without its manufacturer.
    let device_type = match (&settings.device_type, manufacturer) {
        (Some(model), Some(manufacturer)) => {
            taxonomy
                .resolve_lenient(&TaxonSpec::DeviceType {
                    model: model.clone(),
                    manufacturer,
                })
                .await
        }
        _ => None,
    };

    let platform_name = settings
        .platform
        .clone()
        .or_else(|| node.version.as_ref().map(|v| format!("Proxmox VE {v}")));
    let platform = match platform_name {
        Some(name) => taxonomy.resolve_lenient(&TaxonSpec::Platform { name }).await,
        None => None,
    };

    DeviceDraft {
        name: node.name.clone(),
        role,
        device_type,
        site,
        platform,
        timestamp: Utc::now(),
        attrs: DeviceAttributes {
            version: node.version.clone(),
            cpu_model: node.cpu_model.clone(),
            cpu_sockets: node.cpu_sockets,
            cpu_cores: node.cpu_cores,
            memory_total_gb: node.memory_total_bytes.map(|b| b / BYTES_IN_GB),
            rootfs_total_gb: node.rootfs_total_bytes.map(|b| b / BYTES_IN_GB),
        },
    }
}

/// Reconcile the node into its device record and interface set.
pub(crate) async fn reconcile<P: DirectoryProvider + ?Sized>(
    directory: &P,
    node: &SourceNode,
    settings: &NodeSettings,
) -> Result<(), SyncError> {
    info!(node = %node.name, "reconciling node device record");

    let mut taxonomy = TaxonomyCache::new(directory);
    let draft = resolve_draft(node, settings, &mut taxonomy).await;

    let record = match directory.find_device(&node.name).await? {
        Some(current) => {
            if draft.differs_from(&current) {
                info!(node = %node.name, record = %current.id, "updating device record");
                match directory.update_device(current.id, &draft).await {
                    Ok(updated) => updated,
                    Err(e) => {
                        // Interfaces are still reconciled best-effort.
                        error!(node = %node.name, error = %e, "device update failed");
                        current
                    }
                }
            } else {
                debug!(node = %node.name, "device record unchanged");
                current
            }
        }
        None => {
            info!(node = %node.name, "creating device record");
            directory.create_device(&draft).await?
        }
    };

    reconcile_node_interfaces(directory, record.id, &node.name, &node.interfaces).await;
    Ok(())
}

/// Reconcile the node's interface set, with management-only preservation.
async fn reconcile_node_interfaces<P: DirectoryProvider + ?Sized>(
    directory: &P,
    device: RecordId,
    node_name: &str,
    interfaces: &[NodeInterface],
) {
    let parent = ParentRef::Device(device);

    let existing = match directory.list_interfaces(parent).await {
        Ok(existing) => existing,
        Err(e) => {
            error!(node = %node_name, error = %e, "could not list existing device interfaces");
            return;
        }
    };
    let mut by_name: HashMap<String, InterfaceRecord> =
        existing.into_iter().map(|i| (i.name.clone(), i)).collect();

    for iface in interfaces {
        let kind = registry_interface_type(iface.kind, &iface.name, &iface.kind_raw);
        let custom = InterfaceCustom::Node {
            kind_raw: Some(iface.kind_raw.clone()),
            ports: iface.bond_slaves.clone().or_else(|| iface.bridge_ports.clone()),
        };

        let record = match by_name.remove(&iface.name) {
            Some(current) => {
                let mut update = InterfaceUpdate::default();
                if current.kind.as_deref() != Some(kind) {
                    update.kind = Some(kind.to_owned());
                }
                if current.enabled != iface.active {
                    update.enabled = Some(iface.active);
                }
                if let Some(comments) = &iface.comments {
                    if current.description != *comments {
                        update.description = Some(comments.clone());
                    }
                }
                if current.custom.as_ref() != Some(&custom) {
                    update.custom = Some(custom);
                }

                if update.is_empty() {
                    debug!(node = %node_name, interface = %iface.name, "interface unchanged");
                    current
                } else {
                    info!(node = %node_name, interface = %iface.name, "updating interface");
                    match directory.update_interface(current.iface, &update).await {
                        Ok(updated) => updated,
                        Err(e) => {
                            error!(node = %node_name, interface = %iface.name, error = %e, "interface update failed");
                            continue;
                        }
                    }
                }
            }
            None => {
                info!(node = %node_name, interface = %iface.name, kind, "creating interface");
                let draft = InterfaceDraft {
                    name: iface.name.clone(),
                    enabled: iface.active,
                    kind: Some(kind.to_owned()),
                    description: iface.comments.clone(),
                    access_vlan: None,
                    custom: Some(custom),
                };
                match directory.create_interface(parent, &draft).await {
                    Ok(created) => created,
                    Err(e) => {
                        error!(node = %node_name, interface = %iface.name, error = %e, "interface create failed");
                        continue;
                    }
                }
            }
        };

        // Link-address phase, only with a usable (non-zero) MAC.
        if let Some(mac) = iface.usable_mac() {
            link_phase(directory, node_name, &record, mac).await;
        }

        if let Some(cidr) = node_interface_cidr(iface, node_name) {
            if let Err(e) = assign_address(directory, &cidr, record.iface).await {
                error!(node = %node_name, interface = %iface.name, address = %cidr, error = %e, "address assignment failed");
            }
        }
    }

    for leftover in by_name.values() {
        if leftover.mgmt_only {
            info!(node = %node_name, interface = %leftover.name, "preserving management-only interface");
            continue;
        }
        info!(node = %node_name, interface = %leftover.name, "deleting orphaned interface");
        if let Err(e) = directory.delete_interface(leftover.iface).await {
            error!(node = %node_name, interface = %leftover.name, error = %e, "orphan interface delete failed");
        }
    }
}

/// Build the CIDR for a node interface from its address + netmask pair.
/// The netmask may be a prefix length or a dotted mask.
fn node_interface_cidr(iface: &NodeInterface, node_name: &str) -> Option<ipnet::IpNet> {
    let address = iface.address.as_deref()?;
    let netmask = iface.netmask.as_deref()?;

    let addr: std::net::IpAddr = match address.parse() {
        Ok(addr) => addr,
        Err(_) => {
            warn!(node = %node_name, interface = %iface.name, address, "unparseable interface address");
            return None;
        }
    };

    let prefix = if let Ok(prefix) = netmask.parse::<u8>() {
        prefix
    } else if let Ok(mask) = netmask.parse::<std::net::Ipv4Addr>() {
        match ipnet::ipv4_mask_to_prefix(mask) {
            Ok(prefix) => prefix,
            Err(_) => {
                warn!(node = %node_name, interface = %iface.name, netmask, "invalid netmask");
                return None;
            }
        }
    } else {
        warn!(node = %node_name, interface = %iface.name, netmask, "unparseable netmask");
        return None;
    };

    match ipnet::IpNet::new(addr, prefix) {
        Ok(net) => Some(net),
        Err(_) => {
            warn!(node = %node_name, interface = %iface.name, prefix, "prefix out of range");
            None
        }
    }
}
