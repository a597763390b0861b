// ── Orphan sweep ──
//
// Runs once per pass, after all entity upserts: every in-scope record not
// present in the snapshot's identity set is retired (never erased). A
// record is matched by its bare `(name, vmid)` pair and, defensively, by
// the pair with any disambiguation suffix stripped.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::error::SyncError;
use crate::identity::strip_suffix;
use crate::model::{LifecycleStatus, VmRecord};
use crate::provider::DirectoryProvider;
use crate::taxonomy::TaxonomyCache;

use super::Reconciler;

/// `true` when the record's identity appears in the active set.
fn is_active(record: &VmRecord, active: &HashSet<(String, u32)>) -> bool {
    let Some(vmid) = record.vmid else {
        // No stored identity: nothing in the snapshot can ever match it.
        return false;
    };
    if active.contains(&(record.name.clone(), vmid)) {
        return true;
    }
    let stripped = strip_suffix(&record.name, vmid);
    stripped != record.name && active.contains(&(stripped.to_owned(), vmid))
}

pub(crate) async fn run<P: DirectoryProvider + ?Sized>(
    reconciler: &Reconciler<'_, P>,
    active: &HashSet<(String, u32)>,
) -> Result<(u32, u32), SyncError> {
    let directory = reconciler.directory();
    let mut taxonomy = TaxonomyCache::new(directory);

    let Some(cluster) = reconciler.resolve_cluster(&mut taxonomy).await else {
        return Err(SyncError::Config(format!(
            "cluster '{}' could not be resolved; cannot sweep orphans",
            reconciler.scope().cluster_name
        )));
    };

    info!(cluster = %reconciler.scope().cluster_name, "checking for orphaned records");
    let records = directory.list_vms(Some(cluster)).await?;

    let now = Utc::now();
    let mut marked = 0u32;
    let mut errors = 0u32;

    for record in records {
        if is_active(&record, active) {
            debug!(record = %record.id, name = %record.name, "still present in the snapshot");
            continue;
        }
        if record.lifecycle == Some(LifecycleStatus::Deleted) {
            continue;
        }

        info!(record = %record.id, name = %record.name, vmid = ?record.vmid, "retiring orphaned record");
        match directory
            .mark_vm_lifecycle(record.id, LifecycleStatus::Deleted, now)
            .await
        {
            Ok(()) => marked += 1,
            Err(e) => {
                error!(record = %record.id, name = %record.name, error = %e, "failed to retire record");
                errors += 1;
            }
        }
    }

    info!(marked, errors, "orphan sweep finished");
    Ok((marked, errors))
}
