// ── Per-pass taxonomy resolution ──
//
// Tags, platforms, clusters, VLANs, and the DCIM catalog objects are
// resolved get-or-create style with an in-memory cache that lives for one
// pass. A uniqueness conflict on create gets exactly one re-fetch: someone
// minted the object between our lookup and our create, so it is there now.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::model::RecordId;
use crate::provider::{DirectoryProvider, TaxonSpec};

/// Get-or-create cache over the registry's taxonomy objects.
pub struct TaxonomyCache<'a, P: DirectoryProvider + ?Sized> {
    directory: &'a P,
    cache: HashMap<String, RecordId>,
}

impl<'a, P: DirectoryProvider + ?Sized> TaxonomyCache<'a, P> {
    pub fn new(directory: &'a P) -> Self {
        Self {
            directory,
            cache: HashMap::new(),
        }
    }

    /// Resolve a taxonomy object, creating it when absent.
    pub async fn resolve(&mut self, spec: &TaxonSpec) -> Result<RecordId, SyncError> {
        let key = spec.cache_key();
        if let Some(id) = self.cache.get(&key) {
            return Ok(*id);
        }

        if let Some(id) = self.directory.find_taxon(spec).await? {
            self.cache.insert(key, id);
            return Ok(id);
        }

        info!(taxon = %spec, "not found; creating");
        let id = match self.directory.create_taxon(spec).await {
            Ok(id) => id,
            Err(e) if e.is_conflict() => {
                // Lost a create race; the object exists now.
                warn!(taxon = %spec, "create hit a uniqueness conflict; re-fetching");
                self.directory
                    .find_taxon(spec)
                    .await?
                    .ok_or(e)?
            }
            Err(e) => return Err(e),
        };

        self.cache.insert(key, id);
        Ok(id)
    }

    /// Resolve, but degrade a failure to a logged `None` -- taxonomy
    /// trouble must not sink the entity being reconciled.
    pub async fn resolve_lenient(&mut self, spec: &TaxonSpec) -> Option<RecordId> {
        match self.resolve(spec).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(taxon = %spec, error = %e, "taxonomy resolution failed");
                None
            }
        }
    }

    /// Resolve a list of tag names into identifiers, skipping failures.
    pub async fn resolve_tags(&mut self, names: &[String]) -> Vec<RecordId> {
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            let spec = TaxonSpec::Tag { name: name.clone() };
            if let Some(id) = self.resolve_lenient(&spec).await {
                ids.push(id);
            } else {
                debug!(tag = %name, "tag skipped");
            }
        }
        ids
    }
}
