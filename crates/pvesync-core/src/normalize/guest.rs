// ── Guest assembly ──
//
// Merges the list-endpoint summary with the full configuration bag into
// one typed SourceGuest.

use pvesync_api::proxmox::models::{AgentInterface, GuestSummary, RawGuestConfig};
use tracing::warn;

use crate::model::source::{GuestDetails, SourceGuest};
use crate::model::GuestKind;

use super::{cfg_flag, cfg_str, cfg_u64, disks, nets};

const BYTES_IN_MB: u64 = 1024 * 1024;
const DEFAULT_BIOS: &str = "SeaBIOS";

/// The boot disk slot: first non-network device of the boot-order
/// directive, else the bare single-device form, else the legacy
/// `bootdisk` field.
fn boot_disk_key(config: &RawGuestConfig, vmid: u32) -> Option<String> {
    if let Some(boot) = cfg_str(config, "boot") {
        if let Some((_, order)) = boot.split_once("order=") {
            let order = order.split(',').next().unwrap_or(order);
            let key = order
                .split(';')
                .map(str::trim)
                .find(|entry| !entry.is_empty() && !entry.starts_with("net"));
            if key.is_none() {
                warn!(vmid, boot, "boot order names no disk device");
            }
            return key.map(ToOwned::to_owned);
        }
        // Bare single-device form: `boot: scsi0`
        if !boot.is_empty() && !boot.contains([';', '=']) && !boot.starts_with("net") {
            return Some(boot.to_owned());
        }
    }

    cfg_str(config, "bootdisk")
        .filter(|disk| !disk.starts_with("net"))
        .map(ToOwned::to_owned)
}

/// Default machine type when none is configured: q35 for Linux- and
/// Windows-like guests, i440fx otherwise.
fn default_machine_type(os_type: Option<&str>) -> &'static str {
    let os = os_type.unwrap_or_default().to_lowercase();
    let linux_like = os.starts_with('l')
        || ["ubuntu", "debian", "centos", "fedora", "rhel", "arch"]
            .iter()
            .any(|word| os.contains(word));
    let windows_like = os.starts_with('w');
    if linux_like || windows_like { "q35" } else { "i440fx" }
}

fn vm_details(config: &RawGuestConfig) -> GuestDetails {
    let os_type = cfg_str(config, "ostype");
    let machine = cfg_str(config, "machine")
        .filter(|m| !m.is_empty())
        .map_or_else(|| default_machine_type(os_type).to_owned(), ToOwned::to_owned);

    // Explicit minimum first, then the current balloon floor.
    let min_memory_mb = cfg_u64(config, "minmem")
        .filter(|v| *v > 0)
        .or_else(|| cfg_u64(config, "balloon").filter(|v| *v > 0));

    GuestDetails::Vm {
        cpu_type: cfg_str(config, "cpu").map(ToOwned::to_owned),
        bios: cfg_str(config, "bios")
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BIOS)
            .to_owned(),
        machine,
        numa: cfg_flag(config, "numa"),
        sockets: cfg_u64(config, "sockets").and_then(|v| u32::try_from(v).ok()),
        cores_per_socket: cfg_u64(config, "cores")
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(1),
        min_memory_mb,
        boot_order: cfg_str(config, "boot").map(ToOwned::to_owned),
    }
}

fn container_details(config: &RawGuestConfig) -> GuestDetails {
    GuestDetails::Container {
        arch: cfg_str(config, "arch").map(ToOwned::to_owned),
        unprivileged: cfg_flag(config, "unprivileged"),
        features: cfg_str(config, "features").map(ToOwned::to_owned),
    }
}

fn vcpu_count(config: &RawGuestConfig, kind: GuestKind) -> u32 {
    let count = match kind {
        GuestKind::Vm => cfg_u64(config, "cpus").or_else(|| {
            let cores = cfg_u64(config, "cores")?;
            Some(cores * cfg_u64(config, "sockets").unwrap_or(1))
        }),
        GuestKind::Container => cfg_u64(config, "cores").or_else(|| cfg_u64(config, "cpu")),
    };
    count.and_then(|v| u32::try_from(v).ok()).unwrap_or(1)
}

/// Assemble one SourceGuest from its summary, configuration, live status,
/// and optional agent report.
pub fn guest_from_config(
    summary: &GuestSummary,
    config: &RawGuestConfig,
    kind: GuestKind,
    status: Option<String>,
    agent: &[AgentInterface],
) -> SourceGuest {
    let vmid = summary.vmid;

    let name = summary
        .name
        .clone()
        .or_else(|| cfg_str(config, "name").map(ToOwned::to_owned))
        .or_else(|| cfg_str(config, "hostname").map(ToOwned::to_owned))
        .unwrap_or_else(|| format!("guest-{vmid}"));

    let memory_mb = summary
        .maxmem
        .map(|bytes| bytes / BYTES_IN_MB)
        .or_else(|| cfg_u64(config, "memory"));

    let tags = cfg_str(config, "tags")
        .or(summary.tags.as_deref())
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    let (details, disks) = match kind {
        GuestKind::Vm => {
            let boot_key = boot_disk_key(config, vmid);
            (
                vm_details(config),
                disks::extract_disks(config, kind, vmid, boot_key.as_deref()),
            )
        }
        GuestKind::Container => (
            container_details(config),
            disks::extract_disks(config, kind, vmid, None),
        ),
    };

    SourceGuest {
        vmid,
        name,
        kind,
        status,
        vcpus: vcpu_count(config, kind),
        memory_mb,
        tags,
        notes: cfg_str(config, "description").unwrap_or_default().to_owned(),
        os_type: cfg_str(config, "ostype").map(ToOwned::to_owned),
        details,
        disks,
        nics: nets::extract_interfaces(config, kind, vmid, agent),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn summary(vmid: u32, name: &str) -> GuestSummary {
        GuestSummary {
            vmid,
            name: Some(name.into()),
            status: "running".into(),
            maxmem: Some(2 * 1024 * 1024 * 1024),
            maxdisk: None,
            uptime: None,
            tags: None,
        }
    }

    fn config(entries: &[(&str, serde_json::Value)]) -> RawGuestConfig {
        entries.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect()
    }

    #[test]
    fn boot_order_skips_network_devices() {
        let cfg = config(&[("boot", json!("order=net0;scsi1;scsi0"))]);
        assert_eq!(boot_disk_key(&cfg, 100).as_deref(), Some("scsi1"));
    }

    #[test]
    fn bare_boot_device() {
        let cfg = config(&[("boot", json!("scsi0"))]);
        assert_eq!(boot_disk_key(&cfg, 100).as_deref(), Some("scsi0"));
    }

    #[test]
    fn legacy_bootdisk_fallback() {
        let cfg = config(&[("bootdisk", json!("virtio0"))]);
        assert_eq!(boot_disk_key(&cfg, 100).as_deref(), Some("virtio0"));
    }

    #[test]
    fn machine_type_defaults_by_os() {
        assert_eq!(default_machine_type(Some("l26")), "q35");
        assert_eq!(default_machine_type(Some("win11")), "q35");
        assert_eq!(default_machine_type(Some("solaris")), "i440fx");
        assert_eq!(default_machine_type(None), "i440fx");
    }

    #[test]
    fn assembles_a_vm() {
        let cfg = config(&[
            ("name", json!("web")),
            ("ostype", json!("l26")),
            ("cores", json!(2)),
            ("sockets", json!(2)),
            ("numa", json!(1)),
            ("tags", json!("prod;web")),
            ("description", json!("os: Ubuntu 22.04")),
            ("scsi0", json!("local-lvm:vm-100-disk-0,size=32G")),
            ("boot", json!("order=scsi0;net0")),
        ]);
        let guest = guest_from_config(
            &summary(100, "web"),
            &cfg,
            GuestKind::Vm,
            Some("running".into()),
            &[],
        );

        assert_eq!(guest.vmid, 100);
        assert_eq!(guest.vcpus, 4);
        assert_eq!(guest.memory_mb, Some(2048));
        assert_eq!(guest.tags, vec!["prod".to_owned(), "web".to_owned()]);
        assert_eq!(guest.disk_total_mb(), Some(32768));
        assert!(guest.boot_disk().is_some());
        match &guest.details {
            GuestDetails::Vm { machine, numa, cores_per_socket, .. } => {
                assert_eq!(machine, "q35");
                assert!(*numa);
                assert_eq!(*cores_per_socket, 2);
            }
            GuestDetails::Container { .. } => panic!("expected VM details"),
        }
    }

    #[test]
    fn balloon_feeds_min_memory_when_minmem_is_absent() {
        let cfg = config(&[("balloon", json!(1024))]);
        match vm_details(&cfg) {
            GuestDetails::Vm { min_memory_mb, .. } => assert_eq!(min_memory_mb, Some(1024)),
            GuestDetails::Container { .. } => unreachable!(),
        }
    }

    #[test]
    fn disk_total_omitted_without_disk_entries() {
        let guest = guest_from_config(
            &summary(100, "bare"),
            &config(&[]),
            GuestKind::Vm,
            None,
            &[],
        );
        assert_eq!(guest.disk_total_mb(), None);
    }
}
