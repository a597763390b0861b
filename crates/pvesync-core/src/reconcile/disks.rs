// ── Disk set reconciliation ──
//
// Name-keyed set reconciliation per parent: match, diff-update or create,
// then delete leftovers. Disks whose size failed to parse are skipped AND
// withdrawn from the orphan candidate set -- destructive action on
// ambiguous data is worse than staleness.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::model::source::VirtualDisk;
use crate::model::{DiskDraft, DiskRecord, RecordId};
use crate::provider::DirectoryProvider;

/// Reconcile a parent record's disks against the source list.
///
/// Returns the number of warnings raised; failures here never abort the
/// parent's pass.
pub(crate) async fn reconcile_disks<P: DirectoryProvider + ?Sized>(
    directory: &P,
    vm: RecordId,
    vm_name: &str,
    disks: &[VirtualDisk],
) -> u32 {
    let mut warnings = 0u32;

    let existing = match directory.list_disks(vm).await {
        Ok(existing) => existing,
        Err(e) => {
            error!(name = %vm_name, error = %e, "could not list existing disks");
            return 1;
        }
    };
    let mut by_name: HashMap<String, DiskRecord> =
        existing.into_iter().map(|d| (d.name.clone(), d)).collect();

    for disk in disks {
        let Some(size_mb) = disk.size_mb.filter(|s| *s > 0) else {
            warn!(
                name = %vm_name,
                disk = %disk.name,
                "disk has a non-positive or unparseable size; skipped, not deleted"
            );
            warnings += 1;
            // Withdrawn from the orphan candidates: same-named existing
            // disks survive even though this entry was unusable.
            by_name.remove(&disk.name);
            continue;
        };

        let draft = DiskDraft {
            name: disk.name.clone(),
            size_mb,
            description: disk.raw_config.clone(),
        };

        match by_name.remove(&disk.name) {
            Some(current) => {
                if draft.differs_from(&current) {
                    info!(name = %vm_name, disk = %disk.name, size_mb, "updating disk");
                    if let Err(e) = directory.update_disk(vm, current.id, &draft).await {
                        error!(name = %vm_name, disk = %disk.name, error = %e, "disk update failed");
                        warnings += 1;
                    }
                } else {
                    debug!(name = %vm_name, disk = %disk.name, "disk unchanged");
                }
            }
            None => {
                info!(name = %vm_name, disk = %disk.name, size_mb, "creating disk");
                if let Err(e) = directory.create_disk(vm, &draft).await {
                    error!(name = %vm_name, disk = %disk.name, error = %e, "disk create failed");
                    warnings += 1;
                }
            }
        }
    }

    for orphan in by_name.values() {
        info!(name = %vm_name, disk = %orphan.name, "deleting orphaned disk");
        if let Err(e) = directory.delete_disk(orphan.id).await {
            error!(name = %vm_name, disk = %orphan.name, error = %e, "orphan disk delete failed");
            warnings += 1;
        }
    }

    warnings
}
