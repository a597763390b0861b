// NetBox API surface: client plus wire models for the REST API.

pub mod client;
pub mod models;

pub use client::NetboxClient;
