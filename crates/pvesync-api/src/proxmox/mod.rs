// Proxmox VE API surface: client plus wire models for `/api2/json`.

pub mod client;
pub mod models;

pub use client::ProxmoxClient;
