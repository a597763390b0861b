// ── Disk spec parsing ──
//
// QEMU guests declare disks in `ide|sata|scsi|virtio<N>` slots; containers
// use `rootfs` plus `mp<N>` mount points. Values look like
// `storage:volume,size=32G,format=qcow2`. CD-ROM drives are not persistent
// storage and are excluded entirely.

use tracing::debug;

use pvesync_api::proxmox::models::RawGuestConfig;

use crate::model::source::{DiskFormat, VirtualDisk};
use crate::model::GuestKind;

use super::size::parse_size_mb;
use super::parse_options;

const QEMU_BUS_PREFIXES: [&str; 4] = ["ide", "sata", "scsi", "virtio"];

/// `true` for a QEMU disk slot key (`scsi0`, `virtio12`, ...).
fn is_qemu_disk_key(key: &str) -> bool {
    QEMU_BUS_PREFIXES.iter().any(|prefix| {
        key.strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    })
}

/// Split the leading `storage:volume` token of a disk spec.
fn split_volume(token: &str) -> (Option<String>, Option<String>) {
    match token.split_once(':') {
        Some((storage, volume)) => {
            let storage = (!storage.is_empty() && !storage.eq_ignore_ascii_case("none"))
                .then(|| storage.to_owned());
            let volume = (!volume.is_empty()).then(|| volume.to_owned());
            (storage, volume)
        }
        None => (None, (!token.is_empty()).then(|| token.to_owned())),
    }
}

/// Infer the disk format from the volume path's file extension.
fn format_from_path(path: &str) -> Option<DiskFormat> {
    let lower = path.to_lowercase();
    let (stem, ext) = lower.rsplit_once('.')?;
    match ext {
        "qcow2" => Some(DiskFormat::Qcow2),
        // .img is raw in practice
        "raw" | "img" => Some(DiskFormat::Raw),
        "vmdk" => Some(DiskFormat::Vmdk),
        "iso" => Some(DiskFormat::Iso),
        "tar" => Some(DiskFormat::Tar),
        "gz" if stem.ends_with(".tar") => Some(DiskFormat::TarGz),
        "zst" if stem.ends_with(".tar") => Some(DiskFormat::TarZst),
        _ => None,
    }
}

/// LVM/ZFS-style volume names carry no extension; recognize the common
/// naming conventions and default those to raw.
fn is_raw_volume_name(path: &str) -> bool {
    !path.contains('.') && (path.contains("subvol-") || (path.contains("vm-") && path.contains("-disk-")))
}

fn explicit_format(raw: &str) -> Option<DiskFormat> {
    match raw {
        "qcow2" => Some(DiskFormat::Qcow2),
        "raw" => Some(DiskFormat::Raw),
        "vmdk" => Some(DiskFormat::Vmdk),
        _ => None,
    }
}

/// Resolve a disk's format: explicit `format=` parameter first, then the
/// volume path extension, then the raw-volume naming convention.
fn resolve_format(
    params: &std::collections::HashMap<String, String>,
    volume: Option<&str>,
) -> Option<DiskFormat> {
    if let Some(fmt) = params.get("format").and_then(|f| explicit_format(f)) {
        return Some(fmt);
    }
    let volume = volume?;
    if let Some(fmt) = format_from_path(volume) {
        return Some(fmt);
    }
    is_raw_volume_name(volume).then_some(DiskFormat::Raw)
}

fn parse_disk_spec(name: &str, value: &str, is_boot: bool, mount_point: bool) -> VirtualDisk {
    let leading = value.split(',').next().unwrap_or_default();
    let (storage_id, volume) = split_volume(leading);
    let params = parse_options(value);

    VirtualDisk {
        name: name.to_owned(),
        size_mb: params.get("size").and_then(|s| parse_size_mb(s)),
        storage_id,
        format: resolve_format(&params, volume.as_deref()),
        is_boot,
        mount_point: if mount_point {
            params.get("mp").cloned()
        } else {
            None
        },
        raw_config: value.to_owned(),
    }
}

/// Extract every persistent disk from a guest configuration.
///
/// `boot_key` is the QEMU slot identified by the boot-order directive;
/// container roots are always boot disks.
pub fn extract_disks(
    config: &RawGuestConfig,
    kind: GuestKind,
    vmid: u32,
    boot_key: Option<&str>,
) -> Vec<VirtualDisk> {
    let mut disks = Vec::new();

    match kind {
        GuestKind::Vm => {
            for (key, value) in config {
                let Some(value) = value.as_str() else { continue };
                if !is_qemu_disk_key(key) {
                    continue;
                }
                if value.to_lowercase().contains("media=cdrom") {
                    debug!(vmid, disk = %key, "skipping CD-ROM drive");
                    continue;
                }
                disks.push(parse_disk_spec(key, value, boot_key == Some(key.as_str()), false));
            }
        }
        GuestKind::Container => {
            if let Some(value) = config.get("rootfs").and_then(serde_json::Value::as_str) {
                let mut root = parse_disk_spec("rootfs", value, true, false);
                root.mount_point = Some("/".into());
                disks.push(root);
            }
            for (key, value) in config {
                let Some(value) = value.as_str() else { continue };
                let is_mount_point = key
                    .strip_prefix("mp")
                    .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()));
                if is_mount_point {
                    disks.push(parse_disk_spec(key, value, false, true));
                }
            }
        }
    }

    // Boot disk first, then by slot name.
    disks.sort_by(|a, b| (!a.is_boot, &a.name).cmp(&(!b.is_boot, &b.name)));
    disks
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(entries: &[(&str, &str)]) -> RawGuestConfig {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_owned(), json!(v)))
            .collect()
    }

    #[test]
    fn qemu_disks_with_boot_flag() {
        let cfg = config(&[
            ("scsi0", "local-lvm:vm-100-disk-0,size=32G"),
            ("virtio1", "local:100/vm-100-disk-1.qcow2,size=10240M"),
            ("net0", "virtio=AA:BB:CC:DD:EE:FF,bridge=vmbr0"),
        ]);
        let disks = extract_disks(&cfg, GuestKind::Vm, 100, Some("scsi0"));

        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].name, "scsi0");
        assert!(disks[0].is_boot);
        assert_eq!(disks[0].size_mb, Some(32768));
        assert_eq!(disks[0].storage_id.as_deref(), Some("local-lvm"));
        assert_eq!(disks[0].format, Some(DiskFormat::Raw));
        assert_eq!(disks[1].format, Some(DiskFormat::Qcow2));
        assert_eq!(disks[1].size_mb, Some(10240));
    }

    #[test]
    fn cdrom_drives_are_excluded() {
        let cfg = config(&[
            ("ide2", "local:iso/debian-12.iso,media=cdrom"),
            ("scsi0", "local-lvm:vm-100-disk-0,size=8G"),
        ]);
        let disks = extract_disks(&cfg, GuestKind::Vm, 100, None);
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].name, "scsi0");
    }

    #[test]
    fn container_rootfs_and_mount_points() {
        let cfg = config(&[
            ("rootfs", "local-lvm:subvol-101-disk-0,size=8G"),
            ("mp0", "local:101/vm-101-disk-1.raw,mp=/data,size=100G"),
        ]);
        let disks = extract_disks(&cfg, GuestKind::Container, 101, None);

        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].name, "rootfs");
        assert!(disks[0].is_boot);
        assert_eq!(disks[0].mount_point.as_deref(), Some("/"));
        assert_eq!(disks[0].format, Some(DiskFormat::Raw));
        assert_eq!(disks[1].mount_point.as_deref(), Some("/data"));
        assert_eq!(disks[1].size_mb, Some(102_400));
    }

    #[test]
    fn malformed_size_yields_none_but_keeps_the_disk() {
        let cfg = config(&[("scsi0", "local-lvm:vm-100-disk-0,size=weird")]);
        let disks = extract_disks(&cfg, GuestKind::Vm, 100, None);
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].size_mb, None);
    }

    #[test]
    fn explicit_format_beats_inference() {
        let cfg = config(&[("scsi0", "local:100/vm-100-disk-0.raw,format=qcow2,size=4G")]);
        let disks = extract_disks(&cfg, GuestKind::Vm, 100, None);
        assert_eq!(disks[0].format, Some(DiskFormat::Qcow2));
    }

    #[test]
    fn tarball_extensions() {
        assert_eq!(format_from_path("backup/ct.tar.gz"), Some(DiskFormat::TarGz));
        assert_eq!(format_from_path("backup/ct.tar.zst"), Some(DiskFormat::TarZst));
        assert_eq!(format_from_path("backup/ct.tar"), Some(DiskFormat::Tar));
    }
}
