// ── Network interface spec parsing ──
//
// Guest NICs live in `net<N>` slots as `model=MAC,bridge=vmbr0,tag=10`
// option strings. The MAC is the downstream cross-reference key: entries
// without one are dropped. Static addressing comes from the `ip=` field;
// when it is absent, a live agent report can supply a best-candidate
// address.

use std::net::IpAddr;

use ipnet::IpNet;
use tracing::{debug, info, warn};

use pvesync_api::proxmox::models::{AgentInterface, RawGuestConfig};

use crate::model::source::{AddressFamily, AgentAddress, NetInterface};
use crate::model::{GuestKind, MacAddr};

use super::parse_options;

/// Device models the source emits in the leading `model=MAC` token.
const KNOWN_VM_MODELS: [&str; 10] = [
    "virtio", "e1000", "rtl8139", "vmxnet3", "i82551", "i82557b", "i82559er", "pcnet",
    "ne2k_pci", "ne2k_isa",
];

fn is_net_key(key: &str) -> bool {
    key.strip_prefix("net")
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Pull the MAC out of a net spec: explicit `hwaddr=` first, else the
/// value of the leading `model=MAC` device token.
fn extract_mac(value: &str, params: &std::collections::HashMap<String, String>) -> Option<MacAddr> {
    if let Some(mac) = params.get("hwaddr").and_then(|raw| MacAddr::parse(raw)) {
        return Some(mac);
    }
    let device_token = value.split(',').next()?;
    let (_, candidate) = device_token.split_once('=')?;
    MacAddr::parse(candidate)
}

/// The device model, when the leading token names a known one.
fn extract_model(value: &str, kind: GuestKind) -> Option<String> {
    match kind {
        GuestKind::Container => Some("veth".into()),
        GuestKind::Vm => {
            let token = value.split(['=', ',']).next()?;
            KNOWN_VM_MODELS
                .contains(&token)
                .then(|| token.to_owned())
        }
    }
}

/// Static `ip=` config counts only when it is a real CIDR, not `dhcp`.
fn extract_static_ip(params: &std::collections::HashMap<String, String>, vmid: u32) -> Option<IpNet> {
    let raw = params.get("ip")?;
    if raw.eq_ignore_ascii_case("dhcp") || !raw.contains('/') {
        return None;
    }
    match raw.parse() {
        Ok(net) => Some(net),
        Err(_) => {
            warn!(vmid, ip = %raw, "unparseable static address; ignoring");
            None
        }
    }
}

/// `true` for an address worth electing: not link-local, loopback, or
/// multicast.
fn is_global(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => !v4.is_link_local() && !v4.is_loopback() && !v4.is_multicast(),
        IpAddr::V6(v6) => {
            let link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
            !link_local && !v6.is_loopback() && !v6.is_multicast()
        }
    }
}

fn is_assignable(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_multicast(),
        IpAddr::V6(v6) => !v6.is_loopback() && !v6.is_multicast(),
    }
}

/// Every usable address the agent reported for the given MAC.
fn agent_addresses_for(mac: &MacAddr, agent: &[AgentInterface], vmid: u32) -> Vec<AgentAddress> {
    let Some(report) = agent.iter().find(|iface| {
        iface
            .hardware_address
            .as_deref()
            .and_then(MacAddr::parse)
            .is_some_and(|m| m == *mac)
    }) else {
        return Vec::new();
    };

    let mut addresses = Vec::new();
    for entry in &report.ip_addresses {
        let family = match entry.ip_address_type.as_str() {
            "ipv4" => AddressFamily::V4,
            "ipv6" => AddressFamily::V6,
            other => {
                debug!(vmid, family = other, "unknown agent address family; skipping");
                continue;
            }
        };
        match format!("{}/{}", entry.ip_address, entry.prefix).parse::<IpNet>() {
            Ok(addr) => addresses.push(AgentAddress { addr, family }),
            Err(_) => warn!(
                vmid,
                address = %entry.ip_address,
                prefix = entry.prefix,
                "invalid address in agent report; skipping"
            ),
        }
    }
    addresses
}

/// Pick the best agent-reported address to stand in for a static one:
/// global IPv4, then global IPv6, then any assignable address.
fn select_agent_address(addresses: &[AgentAddress]) -> Option<IpNet> {
    for family in [AddressFamily::V4, AddressFamily::V6] {
        if let Some(found) = addresses
            .iter()
            .find(|a| a.family == family && is_global(&a.addr.addr()))
        {
            return Some(found.addr);
        }
    }
    addresses
        .iter()
        .find(|a| is_assignable(&a.addr.addr()))
        .map(|a| a.addr)
}

/// Extract every guest NIC with a resolvable MAC from the configuration.
pub fn extract_interfaces(
    config: &RawGuestConfig,
    kind: GuestKind,
    vmid: u32,
    agent: &[AgentInterface],
) -> Vec<NetInterface> {
    let mut interfaces = Vec::new();

    for (key, value) in config {
        let Some(value) = value.as_str() else { continue };
        if !is_net_key(key) {
            continue;
        }

        let params = parse_options(value);
        let Some(mac) = extract_mac(value, &params) else {
            warn!(vmid, slot = %key, config = %value, "interface has no resolvable MAC; dropped");
            continue;
        };

        let name = params.get("name").cloned().unwrap_or_else(|| key.clone());
        let vlan_tag = params.get("tag").and_then(|raw| match raw.parse::<u16>() {
            Ok(tag) => Some(tag),
            Err(_) => {
                warn!(vmid, slot = %key, tag = %raw, "invalid VLAN tag; ignoring");
                None
            }
        });

        let static_ip = extract_static_ip(&params, vmid);
        let agent_addresses = agent_addresses_for(&mac, agent, vmid);
        let ip_cidr = static_ip.or_else(|| {
            let derived = select_agent_address(&agent_addresses);
            if let Some(addr) = derived {
                info!(vmid, slot = %key, address = %addr, "using agent-reported address");
            }
            derived
        });

        interfaces.push(NetInterface {
            name,
            mac,
            ip_cidr,
            bridge: params.get("bridge").cloned(),
            model: extract_model(value, kind),
            vlan_tag,
            agent_addresses,
        });
    }

    interfaces
}
