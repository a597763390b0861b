//! The `sync` command: one full reconciliation pass per node.

use owo_colors::OwoColorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use pvesync_core::provider::InventoryProvider;
use pvesync_core::reconcile::Reconciler;

use crate::cli::{GlobalOpts, SyncArgs};
use crate::error::CliError;

use super::util;

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "NODE")]
    node: String,
    #[tabled(rename = "PROCESSED")]
    processed: u32,
    #[tabled(rename = "OK")]
    succeeded: u32,
    #[tabled(rename = "WARN")]
    warned: u32,
    #[tabled(rename = "FAILED")]
    failed: u32,
    #[tabled(rename = "RETIRED")]
    orphans: u32,
}

pub async fn handle(args: SyncArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = util::load_config(global)?;
    let directory = util::build_directory(&config)?;

    let selected: Vec<String> = match &args.node {
        Some(node) => vec![node.clone()],
        None => config.node_names().into_iter().map(ToOwned::to_owned).collect(),
    };

    let mut rows = Vec::with_capacity(selected.len());
    let mut failed_nodes = 0u32;

    for profile in &selected {
        let node = config.node(profile)?;
        let inventory = util::build_inventory(&config, profile, node)?;
        let reconciler = Reconciler::new(&directory, util::scope_for(&config, node));

        if !global.quiet {
            eprintln!("{} {}", "syncing".cyan().bold(), profile);
        }

        let guests = inventory.fetch_guests().await?;
        let report = if args.skip_orphans {
            reconciler.reconcile_guests(&guests).await?
        } else {
            reconciler.run(&guests).await?
        };

        if report.failed > 0 || report.orphan_errors > 0 {
            failed_nodes += 1;
        }
        rows.push(SummaryRow {
            node: profile.clone(),
            processed: report.processed,
            succeeded: report.succeeded,
            warned: report.warned,
            failed: report.failed,
            orphans: report.orphans_marked,
        });
    }

    if !global.quiet {
        let mut table = Table::new(&rows);
        table.with(Style::sharp());
        println!("{table}");
    }

    if failed_nodes > 0 {
        #[allow(clippy::cast_possible_truncation)]
        return Err(CliError::PartialFailure {
            count: failed_nodes,
            total: selected.len() as u32,
        });
    }
    Ok(())
}
