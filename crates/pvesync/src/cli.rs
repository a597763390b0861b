//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "pvesync",
    about = "Keep NetBox in sync with Proxmox VE inventory",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the config file (defaults to the platform config dir).
    #[arg(long, global = true, env = "PVESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile guests from one node (or every configured node).
    Sync(SyncArgs),

    /// Reconcile a node itself into a registry device record.
    Node(NodeArgs),

    /// Fetch and display a node's guest inventory without writing.
    Guests(GuestsArgs),

    /// Inspect the configuration.
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Node profile to sync; all configured nodes when omitted.
    pub node: Option<String>,

    /// Skip the orphan sweep after the entity pass.
    #[arg(long)]
    pub skip_orphans: bool,
}

#[derive(Debug, Args)]
pub struct NodeArgs {
    /// Node profile to reconcile.
    pub node: String,
}

#[derive(Debug, Args)]
pub struct GuestsArgs {
    /// Node profile to inspect.
    pub node: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path.
    Path,

    /// Show the effective configuration (secrets redacted).
    Show,
}
