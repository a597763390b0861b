// Domain model: source-side snapshot types and registry-side records.

pub mod mac;
pub mod registry;
pub mod source;

pub use mac::MacAddr;
pub use registry::{
    ApplyOutcome, DeviceAttributes, DeviceDraft, DeviceRecord, DiskDraft, DiskRecord,
    GuestAttributes, InterfaceCustom, InterfaceDraft, InterfaceOwnerKind, InterfaceRecord,
    InterfaceRef, InterfaceUpdate, IpRecord, LifecycleStatus, LinkAddressRecord, ParentRef,
    RecordId, VmDraft, VmRecord, VmStatus,
};
pub use source::{
    AddressFamily, AgentAddress, GuestDetails, GuestKind, NetInterface, NodeInterface,
    NodeInterfaceKind, SourceGuest, SourceNode, VirtualDisk,
};
