// ── Node detail assembly and link-report merging ──
//
// The node network endpoint is authoritative for interface existence but
// unreliable for MACs: bridges and bonds often report the all-zero
// sentinel. An out-of-band link report (`ip -j link show` collected over
// SSH or similar) fills those gaps; the primary source wins everywhere
// else.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{info, warn};

use pvesync_api::proxmox::models::{NodeNetworkEntry, NodeStatus};

use crate::error::SyncError;
use crate::model::source::{NodeInterface, NodeInterfaceKind, SourceNode};
use crate::model::MacAddr;

/// Assemble a SourceNode from the status, version, and network endpoints.
pub fn node_from_api(
    name: &str,
    status: &NodeStatus,
    version: Option<String>,
    entries: Vec<NodeNetworkEntry>,
) -> SourceNode {
    let cpuinfo = status.cpuinfo.as_ref();

    let interfaces = entries
        .into_iter()
        .map(|entry| {
            let mac = entry.mac.as_deref().and_then(MacAddr::parse);
            NodeInterface {
                name: entry.iface,
                mac,
                kind: NodeInterfaceKind::from_raw(&entry.kind),
                kind_raw: entry.kind,
                active: entry.active.unwrap_or(0) != 0,
                address: entry.address,
                netmask: entry.netmask,
                comments: entry.comments,
                bond_slaves: entry.slaves,
                bridge_ports: entry.bridge_ports,
            }
        })
        .collect();

    SourceNode {
        name: name.to_owned(),
        cpu_model: cpuinfo.and_then(|c| c.model.clone()),
        cpu_sockets: cpuinfo.and_then(|c| c.sockets),
        cpu_cores: cpuinfo.and_then(|c| c.cpus),
        memory_total_bytes: status.memory.as_ref().and_then(|m| m.total),
        rootfs_total_bytes: status.rootfs.as_ref().and_then(|r| r.total),
        version,
        interfaces,
    }
}

/// One entry of an `ip -j link show` report.
#[derive(Debug, Deserialize)]
struct LinkReportEntry {
    ifname: Option<String>,
    address: Option<String>,
}

/// Parse an `ip -j link show` JSON document into an interface→MAC map.
///
/// Zero MACs are as useless here as in the primary source and are dropped.
pub fn parse_link_report(raw: &str) -> Result<HashMap<String, MacAddr>, SyncError> {
    let entries: Vec<LinkReportEntry> = serde_json::from_str(raw)
        .map_err(|e| SyncError::Validation(format!("link report is not valid JSON: {e}")))?;

    let mut report = HashMap::new();
    for entry in entries {
        let (Some(name), Some(address)) = (entry.ifname, entry.address) else {
            continue;
        };
        match MacAddr::parse(&address) {
            Some(mac) if !mac.is_zero() => {
                report.insert(name, mac);
            }
            _ => {}
        }
    }
    Ok(report)
}

/// Fill interface MACs from a secondary report.
///
/// Merge policy: the primary source wins unless it reported the zero/empty
/// sentinel, in which case the report value takes over.
pub fn merge_link_report(interfaces: &mut [NodeInterface], report: &HashMap<String, MacAddr>) {
    for iface in interfaces {
        let primary_unusable = iface.usable_mac().is_none();
        if !primary_unusable {
            continue;
        }
        if let Some(mac) = report.get(&iface.name) {
            info!(
                interface = %iface.name,
                mac = %mac,
                "filling MAC from out-of-band link report"
            );
            iface.mac = Some(mac.clone());
        } else if iface.mac.is_some() {
            warn!(
                interface = %iface.name,
                "primary source reported a zero MAC and the link report has no replacement"
            );
        }
    }
}
