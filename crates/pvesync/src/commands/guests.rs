//! The `guests` command: a read-only inventory listing.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use pvesync_core::model::SourceGuest;
use pvesync_core::provider::InventoryProvider;

use crate::cli::{GlobalOpts, GuestsArgs};
use crate::error::CliError;

use super::util;

#[derive(Tabled)]
struct GuestRow {
    #[tabled(rename = "VMID")]
    vmid: u32,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "VCPUS")]
    vcpus: u32,
    #[tabled(rename = "MEM (MB)")]
    memory: String,
    #[tabled(rename = "DISKS")]
    disks: usize,
    #[tabled(rename = "NICS")]
    nics: usize,
}

fn to_row(guest: &SourceGuest) -> GuestRow {
    GuestRow {
        vmid: guest.vmid,
        name: guest.name.clone(),
        kind: guest.kind.to_string(),
        status: guest.status.clone().unwrap_or_else(|| "unknown".into()),
        vcpus: guest.vcpus,
        memory: guest
            .memory_mb
            .map_or_else(|| "-".into(), |mb| mb.to_string()),
        disks: guest.disks.len(),
        nics: guest.nics.len(),
    }
}

pub async fn handle(args: GuestsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = util::load_config(global)?;
    let node = config.node(&args.node)?;
    let inventory = util::build_inventory(&config, &args.node, node)?;

    let mut guests = inventory.fetch_guests().await?;
    guests.sort_by_key(|g| g.vmid);

    let rows: Vec<GuestRow> = guests.iter().map(to_row).collect();
    let mut table = Table::new(&rows);
    table.with(Style::sharp());
    println!("{table}");
    Ok(())
}
