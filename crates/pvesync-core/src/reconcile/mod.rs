// ── Reconciliation driver ──
//
// One pass over one snapshot: strictly sequential, no concurrent registry
// writers. Per-guest failures are caught at the guest boundary, counted,
// and never abort the batch; the driver returns a summary instead of
// raising for partial failures. Callers serialize passes.

pub mod disks;
pub mod entity;
pub mod interfaces;
pub mod node;
pub mod sweep;

use std::collections::HashSet;
use std::fmt;

use tracing::{error, info};

use crate::error::SyncError;
use crate::identity::IdentityIndex;
use crate::model::{ApplyOutcome, RecordId, SourceGuest, SourceNode};
use crate::provider::{DirectoryProvider, TaxonSpec};
use crate::taxonomy::TaxonomyCache;

/// Where a pass operates: one registry cluster of a fixed cluster type.
///
/// Passed in explicitly; the engine holds no process-wide configuration.
#[derive(Debug, Clone)]
pub struct SyncScope {
    pub cluster_name: String,
    pub cluster_type: String,
}

/// Registry placement settings for the hypervisor node's device record.
#[derive(Debug, Clone, Default)]
pub struct NodeSettings {
    pub site: Option<String>,
    pub role: Option<String>,
    pub manufacturer: Option<String>,
    pub device_type: Option<String>,
    pub platform: Option<String>,
}

/// Aggregate result of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: u32,
    pub succeeded: u32,
    pub warned: u32,
    pub failed: u32,
    pub orphans_marked: u32,
    pub orphan_errors: u32,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} succeeded, {} with warnings, {} failed; {} orphan(s) retired, {} orphan error(s)",
            self.processed,
            self.succeeded,
            self.warned,
            self.failed,
            self.orphans_marked,
            self.orphan_errors
        )
    }
}

/// The reconciliation engine, generic over the registry provider.
pub struct Reconciler<'a, P: DirectoryProvider + ?Sized> {
    directory: &'a P,
    scope: SyncScope,
}

impl<'a, P: DirectoryProvider + ?Sized> Reconciler<'a, P> {
    pub fn new(directory: &'a P, scope: SyncScope) -> Self {
        Self { directory, scope }
    }

    pub fn scope(&self) -> &SyncScope {
        &self.scope
    }

    /// Resolve (or mint) the scope's cluster record.
    pub(crate) async fn resolve_cluster(
        &self,
        taxonomy: &mut TaxonomyCache<'_, P>,
    ) -> Option<RecordId> {
        let cluster_type = taxonomy
            .resolve_lenient(&TaxonSpec::ClusterType {
                name: self.scope.cluster_type.clone(),
            })
            .await?;
        taxonomy
            .resolve_lenient(&TaxonSpec::Cluster {
                name: self.scope.cluster_name.clone(),
                cluster_type,
            })
            .await
    }

    /// Reconcile every guest of a snapshot against the registry.
    ///
    /// Fails only when the initial registry read is impossible; everything
    /// after that is per-guest and ends up in the report counts.
    pub async fn reconcile_guests(
        &self,
        guests: &[SourceGuest],
    ) -> Result<BatchReport, SyncError> {
        let mut taxonomy = TaxonomyCache::new(self.directory);

        let cluster = self.resolve_cluster(&mut taxonomy).await;
        if cluster.is_none() {
            error!(
                cluster = %self.scope.cluster_name,
                "cluster could not be resolved; records will not be cluster-assigned"
            );
        }

        let records = self.directory.list_vms(cluster).await?;
        let mut index = IdentityIndex::build(records);
        let mut report = BatchReport::default();

        // Display names shared by several snapshot identities are
        // contested from the start, whatever the registry holds.
        let mut name_counts: std::collections::HashMap<&str, u32> = std::collections::HashMap::new();
        for guest in guests {
            *name_counts.entry(guest.name.as_str()).or_default() += 1;
        }

        for guest in guests {
            report.processed += 1;
            let name_shared = name_counts.get(guest.name.as_str()).copied().unwrap_or(0) > 1;
            match entity::reconcile_guest(
                self.directory,
                guest,
                cluster,
                name_shared,
                &mut index,
                &mut taxonomy,
            )
            .await
            {
                Ok(outcome) => {
                    match outcome.applied {
                        ApplyOutcome::Unchanged | ApplyOutcome::Applied => report.succeeded += 1,
                        ApplyOutcome::Failed => report.failed += 1,
                    }
                    if outcome.warnings > 0 {
                        report.warned += 1;
                    }
                }
                Err(e) => {
                    error!(vmid = guest.vmid, name = %guest.name, error = %e, "guest reconciliation failed");
                    report.failed += 1;
                }
            }
        }

        info!(%report, "guest reconciliation pass finished");
        Ok(report)
    }

    /// Retire in-scope records absent from the latest snapshot.
    pub async fn sweep_orphans(
        &self,
        active: &HashSet<(String, u32)>,
    ) -> Result<(u32, u32), SyncError> {
        sweep::run(self, active).await
    }

    /// Reconcile the hypervisor node itself into a device record.
    pub async fn reconcile_node(
        &self,
        node: &SourceNode,
        settings: &NodeSettings,
    ) -> Result<(), SyncError> {
        node::reconcile(self.directory, node, settings).await
    }

    /// Full pass: guests, then the orphan sweep over the same snapshot.
    pub async fn run(&self, guests: &[SourceGuest]) -> Result<BatchReport, SyncError> {
        let mut report = self.reconcile_guests(guests).await?;
        let active = Self::active_identities(guests);
        let (marked, errors) = self.sweep_orphans(&active).await?;
        report.orphans_marked = marked;
        report.orphan_errors = errors;
        Ok(report)
    }

    /// The `(name, vmid)` identity set of a snapshot.
    pub fn active_identities(guests: &[SourceGuest]) -> HashSet<(String, u32)> {
        guests.iter().map(|g| (g.name.clone(), g.vmid)).collect()
    }

    pub(crate) fn directory(&self) -> &P {
        self.directory
    }
}
