//! The `config` command: inspect configuration without network access.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;

use super::util;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = global
                .config
                .clone()
                .unwrap_or_else(pvesync_config::config_path);
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommand::Show => {
            let config = util::load_config(global)?;

            println!(
                "registry: {} (cluster type '{}')",
                config.registry.url.as_deref().unwrap_or("<unset>"),
                config.registry.cluster_type
            );
            for name in config.node_names() {
                let node = config.node(name)?;
                println!(
                    "node {name}: {} -> cluster '{}' (token {})",
                    node.host,
                    node.cluster_name(),
                    node.token_id
                );
            }
            Ok(())
        }
    }
}
