// ── Collaborator traits ──
//
// The engine consumes two external providers: the source inventory and
// the registry directory. Both are object-safe async traits so a pass can
// run against the production adapters or an in-memory double.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::model::{
    DeviceDraft, DeviceRecord, DiskDraft, DiskRecord, InterfaceDraft, InterfaceRecord,
    InterfaceRef, InterfaceUpdate, IpRecord, LifecycleStatus, LinkAddressRecord, ParentRef,
    RecordId, SourceGuest, SourceNode, VmDraft, VmRecord,
};

/// A supporting taxonomy object the registry can look up or mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaxonSpec {
    Tag { name: String },
    Platform { name: String },
    ClusterType { name: String },
    Cluster { name: String, cluster_type: RecordId },
    Vlan { vid: u16 },
    Site { name: String },
    Manufacturer { name: String },
    DeviceType { model: String, manufacturer: RecordId },
    DeviceRole { name: String },
}

impl TaxonSpec {
    /// Stable cache key for per-pass lookup caching.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Tag { name } => format!("tag:{name}"),
            Self::Platform { name } => format!("platform:{name}"),
            Self::ClusterType { name } => format!("cluster-type:{name}"),
            Self::Cluster { name, cluster_type } => format!("cluster:{cluster_type}:{name}"),
            Self::Vlan { vid } => format!("vlan:{vid}"),
            Self::Site { name } => format!("site:{name}"),
            Self::Manufacturer { name } => format!("manufacturer:{name}"),
            Self::DeviceType { model, manufacturer } => {
                format!("device-type:{manufacturer}:{model}")
            }
            Self::DeviceRole { name } => format!("device-role:{name}"),
        }
    }
}

impl std::fmt::Display for TaxonSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tag { name } => write!(f, "tag '{name}'"),
            Self::Platform { name } => write!(f, "platform '{name}'"),
            Self::ClusterType { name } => write!(f, "cluster type '{name}'"),
            Self::Cluster { name, .. } => write!(f, "cluster '{name}'"),
            Self::Vlan { vid } => write!(f, "VLAN {vid}"),
            Self::Site { name } => write!(f, "site '{name}'"),
            Self::Manufacturer { name } => write!(f, "manufacturer '{name}'"),
            Self::DeviceType { model, .. } => write!(f, "device type '{model}'"),
            Self::DeviceRole { name } => write!(f, "device role '{name}'"),
        }
    }
}

/// Source inventory provider: delivers normalized snapshots.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Fetch every guest on the node, fully normalized.
    async fn fetch_guests(&self) -> Result<Vec<SourceGuest>, SyncError>;

    /// Fetch host-level node details, with any out-of-band MAC data
    /// already merged in.
    async fn fetch_node(&self) -> Result<SourceNode, SyncError>;
}

/// Registry directory provider: record-level access to entities, child
/// resources, link-address and IP objects, and supporting taxonomy.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    // ── Guest records ────────────────────────────────────────────────

    /// All guest records, optionally scoped to one cluster.
    async fn list_vms(&self, cluster: Option<RecordId>) -> Result<Vec<VmRecord>, SyncError>;

    async fn create_vm(&self, draft: &VmDraft) -> Result<VmRecord, SyncError>;

    async fn update_vm(&self, id: RecordId, draft: &VmDraft) -> Result<VmRecord, SyncError>;

    /// Rename only; used for symmetric disambiguation.
    async fn rename_vm(&self, id: RecordId, name: &str) -> Result<(), SyncError>;

    /// Flip the lifecycle state and stamp the sync timestamp.
    async fn mark_vm_lifecycle(
        &self,
        id: RecordId,
        status: LifecycleStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<(), SyncError>;

    /// Set or clear the primary addresses. `None` leaves a family
    /// untouched; `Some(None)` clears it.
    async fn set_vm_primary_ips(
        &self,
        id: RecordId,
        v4: Option<Option<RecordId>>,
        v6: Option<Option<RecordId>>,
    ) -> Result<(), SyncError>;

    // ── Disks ────────────────────────────────────────────────────────

    async fn list_disks(&self, vm: RecordId) -> Result<Vec<DiskRecord>, SyncError>;

    async fn create_disk(&self, vm: RecordId, draft: &DiskDraft) -> Result<DiskRecord, SyncError>;

    async fn update_disk(
        &self,
        vm: RecordId,
        id: RecordId,
        draft: &DiskDraft,
    ) -> Result<DiskRecord, SyncError>;

    async fn delete_disk(&self, id: RecordId) -> Result<(), SyncError>;

    // ── Interfaces ───────────────────────────────────────────────────

    async fn list_interfaces(&self, parent: ParentRef)
        -> Result<Vec<InterfaceRecord>, SyncError>;

    async fn create_interface(
        &self,
        parent: ParentRef,
        draft: &InterfaceDraft,
    ) -> Result<InterfaceRecord, SyncError>;

    async fn update_interface(
        &self,
        iface: InterfaceRef,
        update: &InterfaceUpdate,
    ) -> Result<InterfaceRecord, SyncError>;

    async fn delete_interface(&self, iface: InterfaceRef) -> Result<(), SyncError>;

    /// Point the interface's primary link-address reference at a
    /// link-address object, or clear it.
    async fn set_primary_link(
        &self,
        iface: InterfaceRef,
        link: Option<RecordId>,
    ) -> Result<(), SyncError>;

    // ── Link-address objects ─────────────────────────────────────────

    /// Every link-address object holding this MAC string.
    async fn find_link_addresses(&self, mac: &str)
        -> Result<Vec<LinkAddressRecord>, SyncError>;

    async fn create_link_address(&self, mac: &str) -> Result<LinkAddressRecord, SyncError>;

    async fn assign_link_address(
        &self,
        id: RecordId,
        target: InterfaceRef,
    ) -> Result<LinkAddressRecord, SyncError>;

    // ── IP addresses ─────────────────────────────────────────────────

    /// Exact-CIDR lookup.
    async fn find_ip(&self, cidr: &str) -> Result<Option<IpRecord>, SyncError>;

    async fn create_ip(&self, cidr: &str, target: InterfaceRef) -> Result<IpRecord, SyncError>;

    /// Takeover: move an existing address to a new owner.
    async fn reassign_ip(&self, id: RecordId, target: InterfaceRef)
        -> Result<IpRecord, SyncError>;

    // ── Devices ──────────────────────────────────────────────────────

    async fn find_device(&self, name: &str) -> Result<Option<DeviceRecord>, SyncError>;

    async fn create_device(&self, draft: &DeviceDraft) -> Result<DeviceRecord, SyncError>;

    async fn update_device(
        &self,
        id: RecordId,
        draft: &DeviceDraft,
    ) -> Result<DeviceRecord, SyncError>;

    // ── Taxonomy ─────────────────────────────────────────────────────

    async fn find_taxon(&self, spec: &TaxonSpec) -> Result<Option<RecordId>, SyncError>;

    async fn create_taxon(&self, spec: &TaxonSpec) -> Result<RecordId, SyncError>;
}
