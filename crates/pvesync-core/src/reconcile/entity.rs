// ── Top-level entity reconciliation ──
//
// Per guest: resolve the display name (renaming collision holders),
// match by vmid, build the desired payload, and apply the smallest write
// that converges the record. Child resources are reconciled against the
// upserted parent even when the parent write failed, so a transient apply
// error does not stall disk and interface state.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::identity::IdentityIndex;
use crate::model::source::GuestDetails;
use crate::model::{
    ApplyOutcome, GuestAttributes, RecordId, SourceGuest, VmDraft, VmRecord, VmStatus,
};
use crate::provider::{DirectoryProvider, TaxonSpec};
use crate::taxonomy::TaxonomyCache;

use super::{disks, interfaces};

/// Per-guest reconciliation result.
#[derive(Debug, Clone, Copy)]
pub struct GuestOutcome {
    pub applied: ApplyOutcome,
    pub warnings: u32,
}

/// A platform directive embedded in the guest notes: a line of the form
/// `os: <name>` overrides the source OS type.
fn platform_from_notes(notes: &str) -> Option<String> {
    for line in notes.lines() {
        let trimmed = line.trim();
        if trimmed.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("os:")) {
            let value = trimmed[3..].trim();
            if !value.is_empty() {
                return Some(value.to_owned());
            }
        }
    }
    None
}

fn build_attributes(guest: &SourceGuest) -> GuestAttributes {
    let mut attrs = match &guest.details {
        GuestDetails::Vm {
            cpu_type,
            bios,
            machine,
            numa,
            sockets,
            cores_per_socket,
            min_memory_mb,
            boot_order,
        } => GuestAttributes {
            cpu_sockets: *sockets,
            min_memory_mb: *min_memory_mb,
            cpu_type: cpu_type.clone(),
            bios_type: Some(bios.clone()),
            machine_type: Some(machine.clone()),
            numa_enabled: Some(*numa),
            cores_per_socket: Some(*cores_per_socket),
            boot_order: boot_order.clone(),
            ..GuestAttributes::default()
        },
        GuestDetails::Container {
            arch,
            unprivileged,
            features,
        } => GuestAttributes {
            container_arch: arch.clone(),
            container_unprivileged: Some(*unprivileged),
            container_features: features.clone(),
            ..GuestAttributes::default()
        },
    };

    if let Some(boot) = guest.boot_disk() {
        attrs.boot_disk_storage = boot.storage_id.clone();
        attrs.boot_disk_format = boot.format.map(|f| f.to_string());
    }
    attrs
}

/// Build the desired record payload for one guest.
async fn build_draft<P: DirectoryProvider + ?Sized>(
    guest: &SourceGuest,
    target_name: String,
    cluster: Option<RecordId>,
    taxonomy: &mut TaxonomyCache<'_, P>,
    warnings: &mut u32,
) -> VmDraft {
    // Disk total is the sum of per-disk sizes, never the source's
    // aggregate field: the per-disk figures are what gets reconciled, and
    // the aggregate must not be able to disagree with them.
    let disk_mb = guest.disk_total_mb();
    if disk_mb == Some(0) {
        warn!(
            name = %target_name,
            "guest carries disk entries but none has a valid positive size"
        );
        *warnings += 1;
    }

    let platform = match platform_from_notes(&guest.notes) {
        Some(name) => {
            info!(name = %target_name, platform = %name, "platform overridden by notes directive");
            Some(name)
        }
        None => guest.os_type.clone(),
    };
    let platform = match platform {
        Some(name) => taxonomy.resolve_lenient(&TaxonSpec::Platform { name }).await,
        None => None,
    };

    let tags = taxonomy.resolve_tags(&guest.tags).await;

    VmDraft {
        name: target_name,
        status: VmStatus::from_guest_status(guest.status.as_deref()),
        cluster,
        platform,
        vcpus: guest.vcpus,
        memory_mb: guest.memory_mb,
        disk_mb,
        comments: guest.notes.clone(),
        tags,
        vmid: guest.vmid,
        timestamp: Utc::now(),
        attrs: build_attributes(guest),
    }
}

/// Reconcile one guest and its child resources.
pub(crate) async fn reconcile_guest<P: DirectoryProvider + ?Sized>(
    directory: &P,
    guest: &SourceGuest,
    cluster: Option<RecordId>,
    name_shared: bool,
    index: &mut IdentityIndex,
    taxonomy: &mut TaxonomyCache<'_, P>,
) -> Result<GuestOutcome, SyncError> {
    let mut warnings = 0u32;

    // Symmetric disambiguation: vacate the bare name before taking ours.
    let resolution = index.resolve_name(&guest.name, guest.vmid, name_shared);
    for rename in &resolution.renames {
        info!(record = %rename.id, from = %rename.from, to = %rename.to, "renaming name-collision holder");
        match directory.rename_vm(rename.id, &rename.to).await {
            Ok(()) => index.apply_rename(rename),
            Err(e) => {
                error!(record = %rename.id, error = %e, "rename failed");
                warnings += 1;
            }
        }
    }

    let existing = index.match_vmid(guest.vmid).cloned();
    let draft = build_draft(guest, resolution.target_name, cluster, taxonomy, &mut warnings).await;

    let (record, applied) = match existing {
        Some(current) => apply_update(directory, guest, &draft, current, &mut warnings).await,
        None => match directory.create_vm(&draft).await {
            Ok(created) => {
                info!(vmid = guest.vmid, name = %created.name, record = %created.id, "created record");
                (Some(created), ApplyOutcome::Applied)
            }
            Err(e) => {
                error!(vmid = guest.vmid, name = %draft.name, error = %e, "create failed");
                (None, ApplyOutcome::Failed)
            }
        },
    };

    let Some(record) = record else {
        // Nothing to hang children off.
        return Ok(GuestOutcome {
            applied,
            warnings: warnings + 1,
        });
    };

    warnings += disks::reconcile_disks(directory, record.id, &record.name, &guest.disks).await;
    warnings +=
        interfaces::reconcile_guest_nics(directory, record.id, &record.name, &guest.nics, taxonomy)
            .await;
    warnings += elect_primary_ips(directory, &record, guest).await;

    index.upsert(record);
    Ok(GuestOutcome { applied, warnings })
}

/// Decide create vs. update vs. no-op for a matched record.
async fn apply_update<P: DirectoryProvider + ?Sized>(
    directory: &P,
    guest: &SourceGuest,
    draft: &VmDraft,
    current: VmRecord,
    warnings: &mut u32,
) -> (Option<VmRecord>, ApplyOutcome) {
    let reappeared = matches!(
        current.lifecycle,
        Some(crate::model::LifecycleStatus::Deleted)
    );
    if reappeared {
        // Reappearance forces a write even with an otherwise empty diff,
        // to flip the record back to Deployed.
        info!(vmid = guest.vmid, record = %current.id, "record reappeared in the snapshot; redeploying");
    } else if !draft.differs_from(&current) {
        debug!(vmid = guest.vmid, record = %current.id, "no changes");
        return (Some(current), ApplyOutcome::Unchanged);
    }

    match directory.update_vm(current.id, draft).await {
        Ok(updated) => {
            info!(vmid = guest.vmid, record = %updated.id, "updated record");
            (Some(updated), ApplyOutcome::Applied)
        }
        Err(e) => {
            // Children are still reconciled against the stale record.
            error!(vmid = guest.vmid, record = %current.id, error = %e, "update failed");
            *warnings += 1;
            (Some(current), ApplyOutcome::Failed)
        }
    }
}

/// Elect the record's primary addresses: the first global IPv4 and IPv6
/// among the guest's interface addresses.
async fn elect_primary_ips<P: DirectoryProvider + ?Sized>(
    directory: &P,
    record: &VmRecord,
    guest: &SourceGuest,
) -> u32 {
    let mut v4: Option<RecordId> = None;
    let mut v6: Option<RecordId> = None;

    for nic in &guest.nics {
        let Some(cidr) = nic.ip_cidr else { continue };
        if !interfaces::is_electable(&cidr.addr()) {
            continue;
        }
        let slot = match cidr {
            ipnet::IpNet::V4(_) => &mut v4,
            ipnet::IpNet::V6(_) => &mut v6,
        };
        if slot.is_some() {
            continue;
        }
        match directory.find_ip(&cidr.to_string()).await {
            Ok(Some(ip)) => *slot = Some(ip.id),
            Ok(None) => {}
            Err(e) => {
                warn!(name = %record.name, address = %cidr, error = %e, "primary address lookup failed");
                return 1;
            }
        }
        if v4.is_some() && v6.is_some() {
            break;
        }
    }

    let v4_change = (record.primary_ip4 != v4).then_some(v4);
    let v6_change = (record.primary_ip6 != v6).then_some(v6);
    if v4_change.is_none() && v6_change.is_none() {
        return 0;
    }

    match directory
        .set_vm_primary_ips(record.id, v4_change, v6_change)
        .await
    {
        Ok(()) => 0,
        Err(e) => {
            error!(name = %record.name, error = %e, "failed to update primary addresses");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_directive_overrides_platform() {
        let notes = "web frontend\nOS: Ubuntu 22.04\nmanaged by ansible";
        assert_eq!(platform_from_notes(notes).as_deref(), Some("Ubuntu 22.04"));
    }

    #[test]
    fn notes_without_directive() {
        assert_eq!(platform_from_notes("just a comment"), None);
        assert_eq!(platform_from_notes(""), None);
        assert_eq!(platform_from_notes("os:"), None);
    }

    #[test]
    fn directive_prefix_is_case_insensitive() {
        assert_eq!(platform_from_notes("oS: Debian 12").as_deref(), Some("Debian 12"));
    }
}
