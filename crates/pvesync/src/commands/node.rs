//! The `node` command: reconcile a hypervisor into a device record.

use owo_colors::OwoColorize;

use pvesync_core::provider::InventoryProvider;
use pvesync_core::reconcile::Reconciler;

use crate::cli::{GlobalOpts, NodeArgs};
use crate::error::CliError;

use super::util;

pub async fn handle(args: NodeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = util::load_config(global)?;
    let directory = util::build_directory(&config)?;

    let node_config = config.node(&args.node)?;
    let inventory = util::build_inventory(&config, &args.node, node_config)?;
    let reconciler = Reconciler::new(&directory, util::scope_for(&config, node_config));

    let node = inventory.fetch_node().await?;
    reconciler
        .reconcile_node(&node, &util::node_settings(node_config))
        .await?;

    if !global.quiet {
        eprintln!(
            "{} node '{}' ({} interface(s))",
            "synced".green().bold(),
            node.name,
            node.interfaces.len()
        );
    }
    Ok(())
}
