// pvesync-api: Async Rust clients for the Proxmox VE and NetBox REST APIs

pub mod error;
pub mod netbox;
pub mod proxmox;
pub mod transport;

pub use error::Error;
pub use netbox::NetboxClient;
pub use proxmox::ProxmoxClient;
