// Production adapters: the provider traits implemented over the real
// HTTP clients, with wire↔domain conversion kept in convert.rs.

pub mod convert;
pub mod netbox;
pub mod proxmox;

pub use netbox::NetboxDirectory;
pub use proxmox::ProxmoxInventory;
