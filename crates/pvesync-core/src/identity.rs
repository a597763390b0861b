// ── Identity resolution ──
//
// The source guarantees vmid uniqueness but not name uniqueness; the
// registry enforces the opposite. The index matches records by vmid and
// computes collision-free display names, renaming every holder of a
// contested bare name -- disambiguation is symmetric, not newcomer-only.
//
// Rebuilt from a fresh registry read once per pass; never persisted.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::{RecordId, VmRecord};

/// Render the disambiguated form of a display name.
pub fn disambiguated(name: &str, vmid: u32) -> String {
    format!("{name} ({vmid})")
}

/// Strip a disambiguation suffix, if the name carries one for this vmid.
pub fn strip_suffix<'a>(name: &'a str, vmid: u32) -> &'a str {
    name.strip_suffix(&format!(" ({vmid})")).unwrap_or(name).trim_end()
}

#[derive(Debug, Clone)]
struct NameHolder {
    id: RecordId,
    vmid: Option<u32>,
}

/// A rename another record must undergo to vacate a contested bare name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRename {
    pub id: RecordId,
    pub from: String,
    pub to: String,
}

/// The outcome of name resolution for one incoming guest.
#[derive(Debug, Clone)]
pub struct NameResolution {
    pub target_name: String,
    pub renames: Vec<PendingRename>,
}

/// Per-pass lookup index over the in-scope registry records.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_vmid: HashMap<u32, VmRecord>,
    by_name: HashMap<String, Vec<NameHolder>>,
}

impl IdentityIndex {
    /// Build the index from one full in-scope registry read.
    pub fn build(records: Vec<VmRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            if let Some(vmid) = record.vmid {
                if let Some(previous) = index.by_vmid.get(&vmid) {
                    warn!(
                        vmid,
                        first = %previous.name,
                        second = %record.name,
                        "registry holds multiple records for one source identity; using the last"
                    );
                }
                index.by_vmid.insert(vmid, record.clone());
            }
            index
                .by_name
                .entry(record.name.clone())
                .or_default()
                .push(NameHolder {
                    id: record.id,
                    vmid: record.vmid,
                });
        }
        index
    }

    /// Match an incoming guest by its stable identity.
    pub fn match_vmid(&self, vmid: u32) -> Option<&VmRecord> {
        self.by_vmid.get(&vmid)
    }

    /// Decide the registry display name for `(name, vmid)`.
    ///
    /// A name is contested when another record occupies the bare form, or
    /// when the snapshot itself carries the same display name under more
    /// than one identity (`shared_in_snapshot`) -- without the latter, two
    /// stably coexisting same-named guests would swap between bare and
    /// suffixed forms on every pass. A contested guest takes its
    /// disambiguated form and every bare-name holder with a known vmid is
    /// queued for its own disambiguating rename. Holders without a stored
    /// vmid cannot be renamed safely and are left alone.
    pub fn resolve_name(&self, name: &str, vmid: u32, shared_in_snapshot: bool) -> NameResolution {
        let holders = self.by_name.get(name).map_or(&[][..], Vec::as_slice);

        let contested = shared_in_snapshot || holders.iter().any(|h| h.vmid != Some(vmid));
        if !contested {
            return NameResolution {
                target_name: name.to_owned(),
                renames: Vec::new(),
            };
        }

        let mut renames = Vec::new();
        for holder in holders {
            match holder.vmid {
                Some(other) if other != vmid => renames.push(PendingRename {
                    id: holder.id,
                    from: name.to_owned(),
                    to: disambiguated(name, other),
                }),
                Some(_) => {}
                None => {
                    warn!(
                        name,
                        record = %holder.id,
                        "name collision with a record that has no stored identity; not renaming it"
                    );
                }
            }
        }

        debug!(name, vmid, renames = renames.len(), "bare name contested; disambiguating");
        NameResolution {
            target_name: disambiguated(name, vmid),
            renames,
        }
    }

    /// Reflect an applied rename in the index.
    pub fn apply_rename(&mut self, rename: &PendingRename) {
        if let Some(holders) = self.by_name.get_mut(&rename.from) {
            if let Some(pos) = holders.iter().position(|h| h.id == rename.id) {
                let holder = holders.remove(pos);
                if let Some(vmid) = holder.vmid {
                    if let Some(record) = self.by_vmid.get_mut(&vmid) {
                        record.name.clone_from(&rename.to);
                    }
                }
                self.by_name.entry(rename.to.clone()).or_default().push(holder);
            }
            if self.by_name.get(&rename.from).is_some_and(Vec::is_empty) {
                self.by_name.remove(&rename.from);
            }
        }
    }

    /// Add a record the pass just created or updated.
    pub fn upsert(&mut self, record: VmRecord) {
        if let Some(holders) = self.by_name.get_mut(&record.name) {
            holders.retain(|h| h.id != record.id);
        }
        self.by_name
            .entry(record.name.clone())
            .or_default()
            .push(NameHolder {
                id: record.id,
                vmid: record.vmid,
            });
        if let Some(vmid) = record.vmid {
            self.by_vmid.insert(vmid, record);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{GuestAttributes, LifecycleStatus};
    use std::collections::BTreeSet;

    fn record(id: i64, name: &str, vmid: Option<u32>) -> VmRecord {
        VmRecord {
            id: RecordId(id),
            name: name.into(),
            status: Some("active".into()),
            cluster: None,
            platform: None,
            vcpus: Some(1),
            memory_mb: None,
            disk_mb: None,
            comments: String::new(),
            tags: BTreeSet::new(),
            vmid,
            lifecycle: Some(LifecycleStatus::Deployed),
            last_sync: None,
            primary_ip4: None,
            primary_ip6: None,
            attrs: GuestAttributes::default(),
        }
    }

    #[test]
    fn uncontested_name_stays_bare() {
        let index = IdentityIndex::build(vec![record(1, "web", Some(100))]);
        let resolution = index.resolve_name("web", 100, false);
        assert_eq!(resolution.target_name, "web");
        assert!(resolution.renames.is_empty());
    }

    #[test]
    fn fresh_name_stays_bare() {
        let index = IdentityIndex::build(Vec::new());
        assert_eq!(index.resolve_name("web", 100, false).target_name, "web");
    }

    #[test]
    fn collision_disambiguates_both_sides() {
        let index = IdentityIndex::build(vec![record(1, "web", Some(100))]);
        let resolution = index.resolve_name("web", 101, false);

        assert_eq!(resolution.target_name, "web (101)");
        assert_eq!(
            resolution.renames,
            vec![PendingRename {
                id: RecordId(1),
                from: "web".into(),
                to: "web (100)".into(),
            }]
        );
    }

    #[test]
    fn snapshot_sharing_contests_even_an_exact_match() {
        // The record already carries the suffixed name; as long as the
        // snapshot holds two guests named "web", vmid 100 must keep its
        // suffix instead of flapping back to the bare form.
        let index = IdentityIndex::build(vec![
            record(1, "web (100)", Some(100)),
            record(2, "web (101)", Some(101)),
        ]);
        let resolution = index.resolve_name("web", 100, true);
        assert_eq!(resolution.target_name, "web (100)");
        assert!(resolution.renames.is_empty());
    }

    #[test]
    fn holder_without_identity_is_not_renamed() {
        let index = IdentityIndex::build(vec![record(1, "web", None)]);
        let resolution = index.resolve_name("web", 101, false);
        assert_eq!(resolution.target_name, "web (101)");
        assert!(resolution.renames.is_empty());
    }

    #[test]
    fn rename_moves_the_holder() {
        let mut index = IdentityIndex::build(vec![record(1, "web", Some(100))]);
        let resolution = index.resolve_name("web", 101, false);
        for rename in &resolution.renames {
            index.apply_rename(rename);
        }

        // The bare name is free now; a later guest with vmid 100 resolves
        // to its already-disambiguated record by identity, not by name.
        assert_eq!(index.match_vmid(100).unwrap().name, "web (100)");
        let second = index.resolve_name("web", 102, false);
        assert_eq!(second.target_name, "web");
    }

    #[test]
    fn suffix_stripping() {
        assert_eq!(strip_suffix("web (100)", 100), "web");
        assert_eq!(strip_suffix("web (100)", 101), "web (100)");
        assert_eq!(strip_suffix("web", 100), "web");
    }
}
