// pvesync-core: Reconciliation engine between Proxmox VE inventory and NetBox.
//
// One pass: fetch a fresh inventory snapshot, upsert each guest and its
// disks/interfaces/addresses into the registry, then retire registry
// records the snapshot no longer contains. All registry access goes
// through the DirectoryProvider trait so the engine can be driven against
// the real NetBox adapter or an in-memory double.

pub mod adapter;
pub mod error;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod reconcile;
pub mod taxonomy;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::SyncError;
pub use provider::{DirectoryProvider, InventoryProvider};
pub use reconcile::{BatchReport, NodeSettings, Reconciler, SyncScope};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ApplyOutcome, GuestDetails, GuestKind, LifecycleStatus, MacAddr, NetInterface,
    NodeInterface, RecordId, SourceGuest, SourceNode, VirtualDisk, VmStatus,
};
