//! Shared configuration for the pvesync CLI.
//!
//! TOML node profiles, credential resolution (env var + keyring +
//! plaintext), and translation to `pvesync_api` transport settings.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use pvesync_api::transport::{TlsMode, TransportConfig};

/// Keyring service name used for stored secrets.
const KEYRING_SERVICE: &str = "pvesync";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for '{name}'")]
    NoCredentials { name: String },

    #[error("unknown node '{name}'")]
    UnknownNode { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Registry (NetBox) connection settings.
    #[serde(default)]
    pub registry: RegistrySettings,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named source node profiles.
    #[serde(default)]
    pub nodes: HashMap<String, NodeConfig>,
}

impl Config {
    /// Look up one node profile by name.
    pub fn node(&self, name: &str) -> Result<&NodeConfig, ConfigError> {
        self.nodes.get(name).ok_or_else(|| ConfigError::UnknownNode {
            name: name.to_owned(),
        })
    }

    /// Node names in stable order.
    pub fn node_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            timeout: default_timeout(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_timeout() -> u64 {
    30
}

/// Registry (NetBox) connection settings.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RegistrySettings {
    /// Base URL, e.g. "https://netbox.example.net".
    pub url: Option<String>,

    /// API token (plaintext -- prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the API token.
    pub token_env: Option<String>,

    /// Cluster type every synced cluster is filed under.
    #[serde(default = "default_cluster_type")]
    pub cluster_type: String,

    /// Verify the registry's TLS certificate.
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,
}

fn default_cluster_type() -> String {
    "Proxmox VE".into()
}
fn default_true() -> bool {
    true
}

impl RegistrySettings {
    pub fn url(&self) -> Result<Url, ConfigError> {
        let raw = self.url.as_deref().ok_or_else(|| ConfigError::Validation {
            field: "registry.url".into(),
            reason: "not configured".into(),
        })?;
        Url::parse(raw).map_err(|e| ConfigError::Validation {
            field: "registry.url".into(),
            reason: e.to_string(),
        })
    }

    /// Resolve the API token: env var, then keyring, then plaintext.
    pub fn resolve_token(&self) -> Result<SecretString, ConfigError> {
        resolve_secret(
            self.token.as_deref(),
            self.token_env.as_deref(),
            "registry",
        )
    }

    pub fn transport(&self, timeout_secs: u64) -> TransportConfig {
        TransportConfig {
            tls: tls_mode(self.verify_tls, self.ca_cert.clone()),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// One source node profile.
#[derive(Debug, Deserialize, Serialize)]
pub struct NodeConfig {
    /// API endpoint, e.g. "https://pve1.example.net:8006".
    pub host: String,

    /// Node name as the cluster knows it.
    pub node_name: String,

    /// Full API token identifier (`user@realm!tokenname`).
    pub token_id: String,

    /// Token secret (plaintext -- prefer keyring or env var).
    pub token_secret: Option<String>,

    /// Environment variable name containing the token secret.
    pub token_secret_env: Option<String>,

    /// Verify the node's TLS certificate. Off by default: stock
    /// installations ship self-signed certificates.
    #[serde(default)]
    pub verify_tls: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Registry cluster the node's guests land in; the node name when
    /// unset.
    pub cluster_name: Option<String>,

    /// Registry placement for the node's own device record.
    pub site: Option<String>,
    #[serde(default = "default_device_role")]
    pub device_role: Option<String>,
    pub manufacturer: Option<String>,
    pub device_type: Option<String>,
    pub platform: Option<String>,

    /// Shell command producing an `ip -j link show` document for the
    /// node, used to fill MACs the API reports as all-zero.
    pub link_report_command: Option<String>,
}

fn default_device_role() -> Option<String> {
    Some("Hypervisor".into())
}

impl NodeConfig {
    pub fn host_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.host).map_err(|e| ConfigError::Validation {
            field: "host".into(),
            reason: e.to_string(),
        })
    }

    pub fn cluster_name(&self) -> &str {
        self.cluster_name.as_deref().unwrap_or(&self.node_name)
    }

    /// Resolve the token secret: env var, then keyring, then plaintext.
    pub fn resolve_token_secret(&self, profile: &str) -> Result<SecretString, ConfigError> {
        resolve_secret(
            self.token_secret.as_deref(),
            self.token_secret_env.as_deref(),
            &format!("node:{profile}"),
        )
    }

    pub fn transport(&self, timeout_secs: u64) -> TransportConfig {
        TransportConfig {
            tls: tls_mode(self.verify_tls, self.ca_cert.clone()),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

fn tls_mode(verify: bool, ca_cert: Option<PathBuf>) -> TlsMode {
    match (verify, ca_cert) {
        (_, Some(path)) => TlsMode::CustomCa(path),
        (true, None) => TlsMode::System,
        (false, None) => TlsMode::DangerAcceptInvalid,
    }
}

/// Resolve a secret with env var > keyring > plaintext precedence.
fn resolve_secret(
    plaintext: Option<&str>,
    env_var: Option<&str>,
    keyring_user: &str,
) -> Result<SecretString, ConfigError> {
    if let Some(var) = env_var {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return Ok(SecretString::from(value));
            }
        }
    }

    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, keyring_user) {
        if let Ok(value) = entry.get_password() {
            return Ok(SecretString::from(value));
        }
    }

    if let Some(value) = plaintext {
        if !value.is_empty() {
            return Ok(SecretString::from(value.to_owned()));
        }
    }

    Err(ConfigError::NoCredentials {
        name: keyring_user.to_owned(),
    })
}

/// Store a secret in the platform keyring.
pub fn store_secret(keyring_user: &str, value: &str) -> Result<(), ConfigError> {
    let entry =
        keyring::Entry::new(KEYRING_SERVICE, keyring_user).map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })?;
    entry.set_password(value).map_err(|e| ConfigError::Validation {
        field: "keyring".into(),
        reason: e.to_string(),
    })
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "pvesync", "pvesync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("pvesync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the default file path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from an explicit file + environment.
///
/// `PVESYNC_`-prefixed variables overlay the file, e.g.
/// `PVESYNC_REGISTRY__URL` for `registry.url`.
pub fn load_config_from(path: &std::path::Path) -> Result<Config, ConfigError> {
    let config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PVESYNC_").split("__"))
        .extract()?;
    Ok(config)
}
