// ── Registry-side records and write drafts ──
//
// Records are what the directory currently holds; drafts are the desired
// state computed from a source snapshot. Field-level diffing lives on the
// drafts: a field absent from the draft is not part of the payload and is
// never compared, so registry-curated values survive reconciliation.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use strum::Display;

/// Opaque registry record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Synchronization lifecycle of a registry entity.
///
/// Two states only: a record flips to `Deleted` when its source
/// counterpart vanishes and back to `Deployed` when it reappears. Records
/// are never erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LifecycleStatus {
    Deployed,
    Deleted,
}

impl FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deployed" => Ok(Self::Deployed),
            "Deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown lifecycle status: {other}")),
        }
    }
}

/// Registry operational status for a guest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum VmStatus {
    Active,
    Offline,
    Staged,
}

impl VmStatus {
    /// Map a source guest status onto the registry vocabulary:
    /// running → active, stopped → offline, anything else → staged.
    pub fn from_guest_status(status: Option<&str>) -> Self {
        match status {
            Some("running") => Self::Active,
            Some("stopped") => Self::Offline,
            _ => Self::Staged,
        }
    }
}

/// What an apply attempt actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// No field differed; zero writes issued.
    Unchanged,
    /// A create or update landed.
    Applied,
    /// The apply call failed; children are still reconciled best-effort.
    Failed,
}

// ── Guest records ───────────────────────────────────────────────────

/// Kind-specific attributes mirrored into the registry record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuestAttributes {
    pub cpu_sockets: Option<u32>,
    pub min_memory_mb: Option<u64>,
    pub cpu_type: Option<String>,
    pub bios_type: Option<String>,
    pub machine_type: Option<String>,
    pub numa_enabled: Option<bool>,
    pub cores_per_socket: Option<u32>,
    pub boot_order: Option<String>,
    pub container_arch: Option<String>,
    pub container_unprivileged: Option<bool>,
    pub container_features: Option<String>,
    pub boot_disk_storage: Option<String>,
    pub boot_disk_format: Option<String>,
}

impl GuestAttributes {
    /// Payload-field comparison: only attributes present on the draft
    /// side take part.
    fn draft_differs(&self, current: &Self) -> bool {
        fn field<T: PartialEq>(draft: &Option<T>, current: &Option<T>) -> bool {
            draft.is_some() && draft != current
        }

        field(&self.cpu_sockets, &current.cpu_sockets)
            || field(&self.min_memory_mb, &current.min_memory_mb)
            || field(&self.cpu_type, &current.cpu_type)
            || field(&self.bios_type, &current.bios_type)
            || field(&self.machine_type, &current.machine_type)
            || field(&self.numa_enabled, &current.numa_enabled)
            || field(&self.cores_per_socket, &current.cores_per_socket)
            || field(&self.boot_order, &current.boot_order)
            || field(&self.container_arch, &current.container_arch)
            || field(&self.container_unprivileged, &current.container_unprivileged)
            || field(&self.container_features, &current.container_features)
            || field(&self.boot_disk_storage, &current.boot_disk_storage)
            || field(&self.boot_disk_format, &current.boot_disk_format)
    }
}

/// A guest record as currently held by the registry.
#[derive(Debug, Clone)]
pub struct VmRecord {
    pub id: RecordId,
    pub name: String,
    pub status: Option<String>,
    pub cluster: Option<RecordId>,
    pub platform: Option<RecordId>,
    pub vcpus: Option<u32>,
    pub memory_mb: Option<u64>,
    pub disk_mb: Option<u64>,
    pub comments: String,
    pub tags: BTreeSet<RecordId>,
    /// The embedded source identity; the durable cross-reference.
    pub vmid: Option<u32>,
    pub lifecycle: Option<LifecycleStatus>,
    pub last_sync: Option<DateTime<Utc>>,
    pub primary_ip4: Option<RecordId>,
    pub primary_ip6: Option<RecordId>,
    pub attrs: GuestAttributes,
}

/// Desired state for one guest record.
#[derive(Debug, Clone)]
pub struct VmDraft {
    pub name: String,
    pub status: VmStatus,
    pub cluster: Option<RecordId>,
    pub platform: Option<RecordId>,
    pub vcpus: u32,
    pub memory_mb: Option<u64>,
    /// Aggregate of positive per-disk sizes; `None` omits the field.
    pub disk_mb: Option<u64>,
    pub comments: String,
    pub tags: Vec<RecordId>,
    pub vmid: u32,
    pub timestamp: DateTime<Utc>,
    pub attrs: GuestAttributes,
}

impl VmDraft {
    /// Field-level change detection against the current record.
    ///
    /// Linked fields (cluster, platform) compare by identifier, tag sets
    /// by identifier set, everything else by value. The sync timestamp is
    /// deliberately not compared -- it only moves when something else does,
    /// which is what makes an unchanged snapshot a zero-write pass.
    pub fn differs_from(&self, current: &VmRecord) -> bool {
        if self.name != current.name {
            return true;
        }
        if current.status.as_deref() != Some(self.status.to_string().as_str()) {
            return true;
        }
        if self.cluster.is_some() && self.cluster != current.cluster {
            return true;
        }
        if self.platform.is_some() && self.platform != current.platform {
            return true;
        }
        if current.vcpus != Some(self.vcpus) {
            return true;
        }
        if self.memory_mb.is_some() && self.memory_mb != current.memory_mb {
            return true;
        }
        if self.disk_mb.is_some() && self.disk_mb != current.disk_mb {
            return true;
        }
        if self.comments != current.comments {
            return true;
        }
        if !self.tags.is_empty() {
            let desired: BTreeSet<RecordId> = self.tags.iter().copied().collect();
            if desired != current.tags {
                return true;
            }
        }
        if current.vmid != Some(self.vmid) {
            return true;
        }
        if current.lifecycle != Some(LifecycleStatus::Deployed) {
            return true;
        }
        self.attrs.draft_differs(&current.attrs)
    }
}

// ── Child resources ─────────────────────────────────────────────────

/// A disk record owned by a guest record.
#[derive(Debug, Clone)]
pub struct DiskRecord {
    pub id: RecordId,
    pub name: String,
    pub size_mb: Option<u64>,
    pub description: String,
}

/// Desired state for one disk record. Only disks with a positive parsed
/// size ever become drafts.
#[derive(Debug, Clone)]
pub struct DiskDraft {
    pub name: String,
    pub size_mb: u64,
    pub description: String,
}

impl DiskDraft {
    pub fn differs_from(&self, current: &DiskRecord) -> bool {
        current.size_mb != Some(self.size_mb) || current.description != self.description
    }
}

/// Which side of the registry owns an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceOwnerKind {
    VirtualMachine,
    Device,
}

/// An interface's own identity (owner side + record id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceRef {
    pub owner: InterfaceOwnerKind,
    pub id: RecordId,
}

/// The parent a set of interfaces hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    VirtualMachine(RecordId),
    Device(RecordId),
}

impl ParentRef {
    pub fn owner_kind(self) -> InterfaceOwnerKind {
        match self {
            Self::VirtualMachine(_) => InterfaceOwnerKind::VirtualMachine,
            Self::Device(_) => InterfaceOwnerKind::Device,
        }
    }
}

/// Owner-specific descriptive fields mirrored onto an interface record.
#[derive(Debug, Clone, PartialEq)]
pub enum InterfaceCustom {
    Guest {
        bridge: Option<String>,
        model: Option<String>,
    },
    Node {
        kind_raw: Option<String>,
        ports: Option<String>,
    },
}

/// An interface record, either guest- or device-owned.
#[derive(Debug, Clone)]
pub struct InterfaceRecord {
    pub iface: InterfaceRef,
    pub name: String,
    pub enabled: bool,
    /// Registry interface type value (`virtual`, `bridge`, `lag`, ...).
    pub kind: Option<String>,
    /// Protected from orphan cleanup regardless of source absence.
    pub mgmt_only: bool,
    pub description: String,
    pub access_vlan: Option<RecordId>,
    pub primary_link: Option<RecordId>,
    pub custom: Option<InterfaceCustom>,
}

/// Creation payload for an interface.
#[derive(Debug, Clone)]
pub struct InterfaceDraft {
    pub name: String,
    pub enabled: bool,
    /// Registry interface type; `None` means the owner-side default
    /// (`virtual` for guest NICs).
    pub kind: Option<String>,
    pub description: Option<String>,
    /// `Some(vlan)` puts the interface in access mode with that untagged
    /// VLAN.
    pub access_vlan: Option<RecordId>,
    pub custom: Option<InterfaceCustom>,
}

/// Partial update for an interface; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct InterfaceUpdate {
    pub enabled: Option<bool>,
    pub kind: Option<String>,
    pub description: Option<String>,
    /// `Some(Some(vlan))` sets access mode with that untagged VLAN;
    /// `Some(None)` clears both mode and untagged VLAN.
    pub access_vlan: Option<Option<RecordId>>,
    pub custom: Option<InterfaceCustom>,
}

impl InterfaceUpdate {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.kind.is_none()
            && self.description.is_none()
            && self.access_vlan.is_none()
            && self.custom.is_none()
    }
}

// ── Link-address and IP objects ─────────────────────────────────────

/// A first-class MAC entity, assignable to at most one interface.
#[derive(Debug, Clone)]
pub struct LinkAddressRecord {
    pub id: RecordId,
    pub mac: String,
    pub assigned: Option<InterfaceRef>,
}

/// An IP address record, keyed by its exact CIDR string and owned by at
/// most one interface at a time.
#[derive(Debug, Clone)]
pub struct IpRecord {
    pub id: RecordId,
    pub address: String,
    pub assigned: Option<InterfaceRef>,
}

// ── Device records ──────────────────────────────────────────────────

/// Host-level attributes mirrored into a device record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceAttributes {
    pub version: Option<String>,
    pub cpu_model: Option<String>,
    pub cpu_sockets: Option<u32>,
    pub cpu_cores: Option<u32>,
    pub memory_total_gb: Option<u64>,
    pub rootfs_total_gb: Option<u64>,
}

/// A device record representing one hypervisor node.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub id: RecordId,
    pub name: String,
    pub role: Option<RecordId>,
    pub device_type: Option<RecordId>,
    pub site: Option<RecordId>,
    pub platform: Option<RecordId>,
    pub attrs: DeviceAttributes,
}

/// Desired state for one device record.
#[derive(Debug, Clone)]
pub struct DeviceDraft {
    pub name: String,
    pub role: Option<RecordId>,
    pub device_type: Option<RecordId>,
    pub site: Option<RecordId>,
    pub platform: Option<RecordId>,
    pub timestamp: DateTime<Utc>,
    pub attrs: DeviceAttributes,
}

impl DeviceDraft {
    pub fn differs_from(&self, current: &DeviceRecord) -> bool {
        fn linked(draft: Option<RecordId>, current: Option<RecordId>) -> bool {
            draft.is_some() && draft != current
        }

        self.name != current.name
            || linked(self.role, current.role)
            || linked(self.device_type, current.device_type)
            || linked(self.site, current.site)
            || linked(self.platform, current.platform)
            || attrs_differ(&self.attrs, &current.attrs)
    }
}

fn attrs_differ(draft: &DeviceAttributes, current: &DeviceAttributes) -> bool {
    fn field<T: PartialEq>(draft: &Option<T>, current: &Option<T>) -> bool {
        draft.is_some() && draft != current
    }

    field(&draft.version, &current.version)
        || field(&draft.cpu_model, &current.cpu_model)
        || field(&draft.cpu_sockets, &current.cpu_sockets)
        || field(&draft.cpu_cores, &current.cpu_cores)
        || field(&draft.memory_total_gb, &current.memory_total_gb)
        || field(&draft.rootfs_total_gb, &current.rootfs_total_gb)
}
