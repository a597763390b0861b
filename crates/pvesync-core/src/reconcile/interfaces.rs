// ── Interface set reconciliation (guest side) and shared MAC/IP logic ──
//
// MAC handling is two-phase because the link-address value is a
// first-class registry object distinct from the interface's cached string:
// an existing object is reused only when its current assignment is exactly
// this interface; otherwise a fresh object is created and assigned, and a
// uniqueness violation abandons the assignment after one re-fetch.

use std::collections::HashMap;
use std::net::IpAddr;

use ipnet::IpNet;
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::model::source::NetInterface;
use crate::model::{
    InterfaceCustom, InterfaceDraft, InterfaceRecord, InterfaceRef, InterfaceUpdate, MacAddr,
    RecordId,
};
use crate::model::ParentRef;
use crate::provider::{DirectoryProvider, TaxonSpec};
use crate::taxonomy::TaxonomyCache;

/// What the source wants done about an interface's VLAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VlanIntent {
    /// Access mode with this untagged VLAN.
    Set(RecordId),
    /// No tag in the source: clear any previously set mode/VLAN.
    Clear,
    /// The tag could not be resolved; leave the interface as it is.
    Leave,
}

/// Reconcile a guest record's interfaces against the source NIC list.
///
/// Returns the number of warnings raised.
pub(crate) async fn reconcile_guest_nics<P: DirectoryProvider + ?Sized>(
    directory: &P,
    vm: RecordId,
    vm_name: &str,
    nics: &[NetInterface],
    taxonomy: &mut TaxonomyCache<'_, P>,
) -> u32 {
    let mut warnings = 0u32;
    let parent = ParentRef::VirtualMachine(vm);

    let existing = match directory.list_interfaces(parent).await {
        Ok(existing) => existing,
        Err(e) => {
            error!(name = %vm_name, error = %e, "could not list existing interfaces");
            return 1;
        }
    };
    let mut by_name: HashMap<String, InterfaceRecord> =
        existing.into_iter().map(|i| (i.name.clone(), i)).collect();

    for nic in nics {
        let vlan = match nic.vlan_tag {
            Some(vid) => match taxonomy.resolve_lenient(&TaxonSpec::Vlan { vid }).await {
                Some(id) => VlanIntent::Set(id),
                None => {
                    warnings += 1;
                    VlanIntent::Leave
                }
            },
            None => VlanIntent::Clear,
        };

        let custom = InterfaceCustom::Guest {
            bridge: nic.bridge.clone(),
            model: nic.model.clone(),
        };

        let record = match by_name.remove(&nic.name) {
            Some(current) => {
                match update_existing(directory, vm_name, current, vlan, custom).await {
                    Ok(record) => record,
                    Err(e) => {
                        error!(name = %vm_name, interface = %nic.name, error = %e, "interface update failed");
                        warnings += 1;
                        continue;
                    }
                }
            }
            None => {
                info!(name = %vm_name, interface = %nic.name, mac = %nic.mac, "creating interface");
                let draft = InterfaceDraft {
                    name: nic.name.clone(),
                    enabled: true,
                    kind: None,
                    description: None,
                    access_vlan: match vlan {
                        VlanIntent::Set(id) => Some(id),
                        VlanIntent::Clear | VlanIntent::Leave => None,
                    },
                    custom: Some(custom),
                };
                match directory.create_interface(parent, &draft).await {
                    Ok(record) => record,
                    Err(e) => {
                        error!(name = %vm_name, interface = %nic.name, error = %e, "interface create failed");
                        warnings += 1;
                        continue;
                    }
                }
            }
        };

        warnings += link_phase(directory, vm_name, &record, &nic.mac).await;

        if let Some(cidr) = nic.ip_cidr {
            if let Err(e) = assign_address(directory, &cidr, record.iface).await {
                error!(name = %vm_name, interface = %record.name, address = %cidr, error = %e, "address assignment failed");
                warnings += 1;
            }
        }
    }

    // Orphan cleanup with the management-only exclusion.
    for leftover in by_name.values() {
        if leftover.mgmt_only {
            info!(name = %vm_name, interface = %leftover.name, "preserving management-only interface");
            continue;
        }
        info!(name = %vm_name, interface = %leftover.name, "deleting orphaned interface");
        if let Err(e) = directory.delete_interface(leftover.iface).await {
            error!(name = %vm_name, interface = %leftover.name, error = %e, "orphan interface delete failed");
            warnings += 1;
        }
    }

    warnings
}

/// Diff one existing guest interface and apply the delta, if any.
async fn update_existing<P: DirectoryProvider + ?Sized>(
    directory: &P,
    vm_name: &str,
    current: InterfaceRecord,
    vlan: VlanIntent,
    custom: InterfaceCustom,
) -> Result<InterfaceRecord, SyncError> {
    let mut update = InterfaceUpdate::default();

    if !current.enabled {
        update.enabled = Some(true);
    }
    if current.custom.as_ref() != Some(&custom) {
        update.custom = Some(custom);
    }
    match vlan {
        VlanIntent::Set(id) if current.access_vlan != Some(id) => {
            update.access_vlan = Some(Some(id));
        }
        VlanIntent::Clear if current.access_vlan.is_some() => {
            update.access_vlan = Some(None);
        }
        _ => {}
    }

    if update.is_empty() {
        debug!(name = %vm_name, interface = %current.name, "interface unchanged");
        return Ok(current);
    }

    info!(name = %vm_name, interface = %current.name, "updating interface");
    directory.update_interface(current.iface, &update).await
}

/// Two-phase link-address resolution plus the primary-link pointer update.
///
/// Returns the number of warnings raised.
pub(crate) async fn link_phase<P: DirectoryProvider + ?Sized>(
    directory: &P,
    parent_name: &str,
    record: &InterfaceRecord,
    mac: &MacAddr,
) -> u32 {
    let link = match resolve_link_address(directory, mac, record.iface).await {
        Ok(Some(id)) => Some(id),
        Ok(None) => return 1,
        Err(e) => {
            error!(parent = %parent_name, interface = %record.name, mac = %mac, error = %e, "link-address resolution failed");
            return 1;
        }
    };

    if record.primary_link == link {
        return 0;
    }
    match directory.set_primary_link(record.iface, link).await {
        Ok(()) => 0,
        Err(e) => {
            error!(parent = %parent_name, interface = %record.name, error = %e, "failed to set primary link address");
            1
        }
    }
}

/// Find or mint the link-address object for a MAC and assign it to the
/// interface.
///
/// Reuse demands an exact assignment match. A uniqueness violation on
/// create gets one re-fetch; if the object is still assigned elsewhere the
/// assignment is abandoned (`Ok(None)`) and logged -- two interfaces
/// legitimately sharing a MAC is not supported.
pub(crate) async fn resolve_link_address<P: DirectoryProvider + ?Sized>(
    directory: &P,
    mac: &MacAddr,
    iface: InterfaceRef,
) -> Result<Option<RecordId>, SyncError> {
    let candidates = directory.find_link_addresses(mac.as_str()).await?;
    if let Some(owned) = candidates.iter().find(|c| c.assigned == Some(iface)) {
        debug!(mac = %mac, link = %owned.id, "reusing correctly assigned link address");
        return Ok(Some(owned.id));
    }

    let created = match directory.create_link_address(mac.as_str()).await {
        Ok(created) => created,
        Err(e) if e.is_conflict() => {
            warn!(mac = %mac, "link-address create hit a uniqueness conflict; re-fetching");
            let refetched = directory.find_link_addresses(mac.as_str()).await?;
            if let Some(owned) = refetched.iter().find(|c| c.assigned == Some(iface)) {
                return Ok(Some(owned.id));
            }
            error!(
                mac = %mac,
                "link address exists but is assigned to another interface; abandoning assignment"
            );
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    match directory.assign_link_address(created.id, iface).await {
        Ok(assigned) => Ok(Some(assigned.id)),
        Err(e) => {
            error!(mac = %mac, link = %created.id, error = %e, "link-address assignment failed");
            Ok(None)
        }
    }
}

/// `true` for an address that may be elected as a record's primary.
pub(crate) fn is_electable(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => !v4.is_link_local() && !v4.is_loopback() && !v4.is_multicast(),
        IpAddr::V6(v6) => {
            let link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
            !link_local && !v6.is_loopback() && !v6.is_multicast()
        }
    }
}

/// Network and broadcast addresses are not assignable to an interface.
pub(crate) fn is_assignable(net: &IpNet) -> bool {
    match net {
        IpNet::V4(v4) => {
            v4.prefix_len() >= 31 || (v4.addr() != v4.network() && v4.addr() != v4.broadcast())
        }
        IpNet::V6(v6) => {
            v6.prefix_len() >= 127 || (v6.addr() != v6.network() && v6.addr() != v6.broadcast())
        }
    }
}

/// Assign an address to an interface by exact CIDR: reuse a correct
/// assignment, take over a foreign one, create when absent.
pub(crate) async fn assign_address<P: DirectoryProvider + ?Sized>(
    directory: &P,
    cidr: &IpNet,
    iface: InterfaceRef,
) -> Result<(), SyncError> {
    if !is_assignable(cidr) {
        warn!(address = %cidr, "network or broadcast address; not assignable");
        return Ok(());
    }

    let key = cidr.to_string();
    match directory.find_ip(&key).await? {
        Some(ip) if ip.assigned == Some(iface) => {
            debug!(address = %key, "address already assigned correctly");
            Ok(())
        }
        Some(ip) => {
            info!(address = %key, "address exists; taking it over");
            directory.reassign_ip(ip.id, iface).await?;
            Ok(())
        }
        None => {
            info!(address = %key, "creating and assigning address");
            directory.create_ip(&key, iface).await?;
            Ok(())
        }
    }
}
