//! Shared command plumbing: config loading and client construction.

use pvesync_api::{NetboxClient, ProxmoxClient};
use pvesync_config::{Config, NodeConfig};
use pvesync_core::adapter::{NetboxDirectory, ProxmoxInventory};
use pvesync_core::reconcile::{NodeSettings, SyncScope};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the config from the explicit path or the platform default.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let config = match &global.config {
        Some(path) => pvesync_config::load_config_from(path)?,
        None => pvesync_config::load_config()?,
    };
    Ok(config)
}

/// Build the registry directory adapter from the config.
pub fn build_directory(config: &Config) -> Result<NetboxDirectory, CliError> {
    let url = config.registry.url()?;
    let token = config.registry.resolve_token()?;
    let transport = config.registry.transport(config.defaults.timeout);
    let client = NetboxClient::new(url, &token, &transport)?;
    Ok(NetboxDirectory::new(client))
}

/// Build the inventory adapter for one node profile.
pub fn build_inventory(
    config: &Config,
    profile: &str,
    node: &NodeConfig,
) -> Result<ProxmoxInventory, CliError> {
    let url = node.host_url()?;
    let secret = node.resolve_token_secret(profile)?;
    let transport = node.transport(config.defaults.timeout);
    let client = ProxmoxClient::new(url, &node.node_name, &node.token_id, &secret, &transport)?;
    Ok(ProxmoxInventory::new(client)
        .with_link_report_command(node.link_report_command.clone()))
}

/// The reconciliation scope for one node profile.
pub fn scope_for(config: &Config, node: &NodeConfig) -> SyncScope {
    SyncScope {
        cluster_name: node.cluster_name().to_owned(),
        cluster_type: config.registry.cluster_type.clone(),
    }
}

/// Registry placement settings for a node's device record.
pub fn node_settings(node: &NodeConfig) -> NodeSettings {
    NodeSettings {
        site: node.site.clone(),
        role: node.device_role.clone(),
        manufacturer: node.manufacturer.clone(),
        device_type: node.device_type.clone(),
        platform: node.platform.clone(),
    }
}
