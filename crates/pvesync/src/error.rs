//! CLI error surface.
//!
//! Wraps the config, API, and engine errors into one diagnostic type so
//! `main` can render everything through miette with a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] pvesync_config::ConfigError),

    #[error(transparent)]
    Api(#[from] pvesync_api::Error),

    #[error(transparent)]
    Sync(#[from] pvesync_core::SyncError),

    #[error("{count} of {total} node(s) finished with failures")]
    #[diagnostic(help("re-run with -v for the per-entity log"))]
    PartialFailure { count: u32, total: u32 },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Api(_) | Self::Sync(_) => 1,
            Self::PartialFailure { .. } => 3,
        }
    }
}
