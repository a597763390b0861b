use thiserror::Error;

/// Top-level error type for the `pvesync-api` crate.
///
/// Covers every failure mode across both API surfaces: authentication,
/// transport, Proxmox VE, and NetBox. `pvesync-core` maps these into
/// reconciliation-level error classes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token rejected (expired, revoked, or wrong realm).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API errors ──────────────────────────────────────────────────
    /// Structured error reported by the Proxmox VE API.
    #[error("Proxmox API error (HTTP {status}): {message}")]
    Proxmox { message: String, status: u16 },

    /// Structured error reported by the NetBox API.
    #[error("NetBox API error (HTTP {status}): {message}")]
    Netbox { message: String, status: u16 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Proxmox { status, .. } | Self::Netbox { status, .. } => {
                matches!(status, 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Proxmox { status: 404, .. } | Self::Netbox { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this error reports a uniqueness violation.
    ///
    /// NetBox answers 409 for hard conflicts and 400 with a validation
    /// message for unique-constraint failures, so both shapes are checked.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Netbox { status: 409, .. } => true,
            Self::Netbox { status: 400, message } => {
                let lower = message.to_lowercase();
                lower.contains("unique") || lower.contains("already exists")
            }
            _ => false,
        }
    }

    /// Returns `true` if the affected provider is unreachable.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Tls(_) => true,
            _ => false,
        }
    }
}
