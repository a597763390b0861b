// Integration tests for the reconciliation engine against an in-memory
// registry directory. The double counts every mutating call, which is
// what makes the zero-write idempotence assertions possible.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;

use pvesync_core::error::SyncError;
use pvesync_core::model::{
    DeviceDraft, DeviceRecord, DiskDraft, DiskRecord, GuestDetails, GuestKind, InterfaceCustom,
    InterfaceDraft, InterfaceOwnerKind, InterfaceRecord, InterfaceRef, InterfaceUpdate, IpRecord,
    LifecycleStatus, LinkAddressRecord, MacAddr, NetInterface, NodeInterface, NodeInterfaceKind,
    ParentRef, RecordId, SourceGuest, SourceNode, VirtualDisk, VmDraft, VmRecord,
};
use pvesync_core::provider::{DirectoryProvider, TaxonSpec};
use pvesync_core::reconcile::{NodeSettings, Reconciler, SyncScope};

// ── In-memory directory double ──────────────────────────────────────

#[derive(Default)]
struct Store {
    next_id: i64,
    vms: BTreeMap<i64, VmRecord>,
    disks: BTreeMap<i64, (i64, DiskRecord)>,
    interfaces: BTreeMap<i64, (ParentRef, InterfaceRecord)>,
    links: BTreeMap<i64, LinkAddressRecord>,
    ips: BTreeMap<i64, IpRecord>,
    devices: BTreeMap<i64, DeviceRecord>,
    taxa: BTreeMap<String, i64>,
    writes: u32,
}

impl Store {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
struct InMemoryDirectory {
    store: Mutex<Store>,
}

fn apply_vm_draft(id: RecordId, draft: &VmDraft, prior: Option<&VmRecord>) -> VmRecord {
    VmRecord {
        id,
        name: draft.name.clone(),
        status: Some(draft.status.to_string()),
        cluster: draft.cluster,
        platform: draft.platform,
        vcpus: Some(draft.vcpus),
        memory_mb: draft.memory_mb,
        disk_mb: draft.disk_mb.or_else(|| prior.and_then(|p| p.disk_mb)),
        comments: draft.comments.clone(),
        tags: draft.tags.iter().copied().collect(),
        vmid: Some(draft.vmid),
        lifecycle: Some(LifecycleStatus::Deployed),
        last_sync: Some(draft.timestamp),
        primary_ip4: prior.and_then(|p| p.primary_ip4),
        primary_ip6: prior.and_then(|p| p.primary_ip6),
        attrs: draft.attrs.clone(),
    }
}

impl InMemoryDirectory {
    fn writes(&self) -> u32 {
        self.store.lock().unwrap().writes
    }

    fn vm_by_vmid(&self, vmid: u32) -> Option<VmRecord> {
        let store = self.store.lock().unwrap();
        store.vms.values().find(|vm| vm.vmid == Some(vmid)).cloned()
    }

    fn vm_names(&self) -> Vec<String> {
        let store = self.store.lock().unwrap();
        store.vms.values().map(|vm| vm.name.clone()).collect()
    }

    fn disks_of(&self, vm: RecordId) -> Vec<DiskRecord> {
        let store = self.store.lock().unwrap();
        store
            .disks
            .values()
            .filter(|(owner, _)| *owner == vm.0)
            .map(|(_, disk)| disk.clone())
            .collect()
    }

    fn interfaces_of(&self, parent: ParentRef) -> Vec<InterfaceRecord> {
        let store = self.store.lock().unwrap();
        store
            .interfaces
            .values()
            .filter(|(owner, _)| *owner == parent)
            .map(|(_, iface)| iface.clone())
            .collect()
    }

    fn links(&self) -> Vec<LinkAddressRecord> {
        self.store.lock().unwrap().links.values().cloned().collect()
    }

    fn ips(&self) -> Vec<IpRecord> {
        self.store.lock().unwrap().ips.values().cloned().collect()
    }

    fn device_by_name(&self, name: &str) -> Option<DeviceRecord> {
        let store = self.store.lock().unwrap();
        store.devices.values().find(|d| d.name == name).cloned()
    }

    fn seed_interface(&self, parent: ParentRef, name: &str, mgmt_only: bool) -> InterfaceRef {
        let mut store = self.store.lock().unwrap();
        let id = store.next();
        let iface = InterfaceRef {
            owner: parent.owner_kind(),
            id: RecordId(id),
        };
        store.interfaces.insert(
            id,
            (
                parent,
                InterfaceRecord {
                    iface,
                    name: name.to_owned(),
                    enabled: true,
                    kind: None,
                    mgmt_only,
                    description: String::new(),
                    access_vlan: None,
                    primary_link: None,
                    custom: None,
                },
            ),
        );
        iface
    }

    fn seed_ip(&self, address: &str, assigned: Option<InterfaceRef>) -> RecordId {
        let mut store = self.store.lock().unwrap();
        let id = store.next();
        store.ips.insert(
            id,
            IpRecord {
                id: RecordId(id),
                address: address.to_owned(),
                assigned,
            },
        );
        RecordId(id)
    }
}

#[async_trait]
impl DirectoryProvider for InMemoryDirectory {
    async fn list_vms(&self, cluster: Option<RecordId>) -> Result<Vec<VmRecord>, SyncError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .vms
            .values()
            .filter(|vm| cluster.is_none() || vm.cluster == cluster)
            .cloned()
            .collect())
    }

    async fn create_vm(&self, draft: &VmDraft) -> Result<VmRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        if store.vms.values().any(|vm| vm.name == draft.name) {
            return Err(SyncError::Conflict(format!(
                "virtual machine name already in use: {}",
                draft.name
            )));
        }
        let id = store.next();
        let record = apply_vm_draft(RecordId(id), draft, None);
        store.vms.insert(id, record.clone());
        store.writes += 1;
        Ok(record)
    }

    async fn update_vm(&self, id: RecordId, draft: &VmDraft) -> Result<VmRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        if store
            .vms
            .values()
            .any(|vm| vm.name == draft.name && vm.id != id)
        {
            return Err(SyncError::Conflict(format!(
                "virtual machine name already in use: {}",
                draft.name
            )));
        }
        let prior = store
            .vms
            .get(&id.0)
            .cloned()
            .ok_or_else(|| SyncError::PartialApply(format!("no record {id}")))?;
        let record = apply_vm_draft(id, draft, Some(&prior));
        store.vms.insert(id.0, record.clone());
        store.writes += 1;
        Ok(record)
    }

    async fn rename_vm(&self, id: RecordId, name: &str) -> Result<(), SyncError> {
        let mut store = self.store.lock().unwrap();
        if store
            .vms
            .values()
            .any(|vm| vm.name == name && vm.id != id)
        {
            return Err(SyncError::Conflict(format!("name already in use: {name}")));
        }
        let record = store
            .vms
            .get_mut(&id.0)
            .ok_or_else(|| SyncError::PartialApply(format!("no record {id}")))?;
        record.name = name.to_owned();
        store.writes += 1;
        Ok(())
    }

    async fn mark_vm_lifecycle(
        &self,
        id: RecordId,
        status: LifecycleStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let mut store = self.store.lock().unwrap();
        let record = store
            .vms
            .get_mut(&id.0)
            .ok_or_else(|| SyncError::PartialApply(format!("no record {id}")))?;
        record.lifecycle = Some(status);
        record.last_sync = Some(timestamp);
        store.writes += 1;
        Ok(())
    }

    async fn set_vm_primary_ips(
        &self,
        id: RecordId,
        v4: Option<Option<RecordId>>,
        v6: Option<Option<RecordId>>,
    ) -> Result<(), SyncError> {
        let mut store = self.store.lock().unwrap();
        let record = store
            .vms
            .get_mut(&id.0)
            .ok_or_else(|| SyncError::PartialApply(format!("no record {id}")))?;
        if let Some(v4) = v4 {
            record.primary_ip4 = v4;
        }
        if let Some(v6) = v6 {
            record.primary_ip6 = v6;
        }
        store.writes += 1;
        Ok(())
    }

    async fn list_disks(&self, vm: RecordId) -> Result<Vec<DiskRecord>, SyncError> {
        Ok(self.disks_of(vm))
    }

    async fn create_disk(&self, vm: RecordId, draft: &DiskDraft) -> Result<DiskRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        let id = store.next();
        let record = DiskRecord {
            id: RecordId(id),
            name: draft.name.clone(),
            size_mb: Some(draft.size_mb),
            description: draft.description.clone(),
        };
        store.disks.insert(id, (vm.0, record.clone()));
        store.writes += 1;
        Ok(record)
    }

    async fn update_disk(
        &self,
        vm: RecordId,
        id: RecordId,
        draft: &DiskDraft,
    ) -> Result<DiskRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        let record = DiskRecord {
            id,
            name: draft.name.clone(),
            size_mb: Some(draft.size_mb),
            description: draft.description.clone(),
        };
        store.disks.insert(id.0, (vm.0, record.clone()));
        store.writes += 1;
        Ok(record)
    }

    async fn delete_disk(&self, id: RecordId) -> Result<(), SyncError> {
        let mut store = self.store.lock().unwrap();
        store.disks.remove(&id.0);
        store.writes += 1;
        Ok(())
    }

    async fn list_interfaces(
        &self,
        parent: ParentRef,
    ) -> Result<Vec<InterfaceRecord>, SyncError> {
        Ok(self.interfaces_of(parent))
    }

    async fn create_interface(
        &self,
        parent: ParentRef,
        draft: &InterfaceDraft,
    ) -> Result<InterfaceRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        let id = store.next();
        let iface = InterfaceRef {
            owner: parent.owner_kind(),
            id: RecordId(id),
        };
        let record = InterfaceRecord {
            iface,
            name: draft.name.clone(),
            enabled: draft.enabled,
            kind: draft.kind.clone(),
            mgmt_only: false,
            description: draft.description.clone().unwrap_or_default(),
            access_vlan: draft.access_vlan,
            primary_link: None,
            custom: draft.custom.clone(),
        };
        store.interfaces.insert(id, (parent, record.clone()));
        store.writes += 1;
        Ok(record)
    }

    async fn update_interface(
        &self,
        iface: InterfaceRef,
        update: &InterfaceUpdate,
    ) -> Result<InterfaceRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        let (_, record) = store
            .interfaces
            .get_mut(&iface.id.0)
            .ok_or_else(|| SyncError::PartialApply(format!("no interface {}", iface.id)))?;
        if let Some(enabled) = update.enabled {
            record.enabled = enabled;
        }
        if let Some(kind) = &update.kind {
            record.kind = Some(kind.clone());
        }
        if let Some(description) = &update.description {
            record.description.clone_from(description);
        }
        if let Some(vlan) = update.access_vlan {
            record.access_vlan = vlan;
        }
        if let Some(custom) = &update.custom {
            record.custom = Some(custom.clone());
        }
        let record = record.clone();
        store.writes += 1;
        Ok(record)
    }

    async fn delete_interface(&self, iface: InterfaceRef) -> Result<(), SyncError> {
        let mut store = self.store.lock().unwrap();
        store.interfaces.remove(&iface.id.0);
        store.writes += 1;
        Ok(())
    }

    async fn set_primary_link(
        &self,
        iface: InterfaceRef,
        link: Option<RecordId>,
    ) -> Result<(), SyncError> {
        let mut store = self.store.lock().unwrap();
        let (_, record) = store
            .interfaces
            .get_mut(&iface.id.0)
            .ok_or_else(|| SyncError::PartialApply(format!("no interface {}", iface.id)))?;
        record.primary_link = link;
        store.writes += 1;
        Ok(())
    }

    async fn find_link_addresses(
        &self,
        mac: &str,
    ) -> Result<Vec<LinkAddressRecord>, SyncError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .links
            .values()
            .filter(|l| l.mac == mac)
            .cloned()
            .collect())
    }

    async fn create_link_address(&self, mac: &str) -> Result<LinkAddressRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        if store.links.values().any(|l| l.mac == mac) {
            return Err(SyncError::Conflict(format!(
                "mac address already exists: {mac}"
            )));
        }
        let id = store.next();
        let record = LinkAddressRecord {
            id: RecordId(id),
            mac: mac.to_owned(),
            assigned: None,
        };
        store.links.insert(id, record.clone());
        store.writes += 1;
        Ok(record)
    }

    async fn assign_link_address(
        &self,
        id: RecordId,
        target: InterfaceRef,
    ) -> Result<LinkAddressRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        let record = store
            .links
            .get_mut(&id.0)
            .ok_or_else(|| SyncError::PartialApply(format!("no link address {id}")))?;
        record.assigned = Some(target);
        let record = record.clone();
        store.writes += 1;
        Ok(record)
    }

    async fn find_ip(&self, cidr: &str) -> Result<Option<IpRecord>, SyncError> {
        let store = self.store.lock().unwrap();
        Ok(store.ips.values().find(|ip| ip.address == cidr).cloned())
    }

    async fn create_ip(&self, cidr: &str, target: InterfaceRef) -> Result<IpRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        let id = store.next();
        let record = IpRecord {
            id: RecordId(id),
            address: cidr.to_owned(),
            assigned: Some(target),
        };
        store.ips.insert(id, record.clone());
        store.writes += 1;
        Ok(record)
    }

    async fn reassign_ip(
        &self,
        id: RecordId,
        target: InterfaceRef,
    ) -> Result<IpRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        let record = store
            .ips
            .get_mut(&id.0)
            .ok_or_else(|| SyncError::PartialApply(format!("no address {id}")))?;
        record.assigned = Some(target);
        let record = record.clone();
        store.writes += 1;
        Ok(record)
    }

    async fn find_device(&self, name: &str) -> Result<Option<DeviceRecord>, SyncError> {
        Ok(self.device_by_name(name))
    }

    async fn create_device(&self, draft: &DeviceDraft) -> Result<DeviceRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        let id = store.next();
        let record = DeviceRecord {
            id: RecordId(id),
            name: draft.name.clone(),
            role: draft.role,
            device_type: draft.device_type,
            site: draft.site,
            platform: draft.platform,
            attrs: draft.attrs.clone(),
        };
        store.devices.insert(id, record.clone());
        store.writes += 1;
        Ok(record)
    }

    async fn update_device(
        &self,
        id: RecordId,
        draft: &DeviceDraft,
    ) -> Result<DeviceRecord, SyncError> {
        let mut store = self.store.lock().unwrap();
        let record = DeviceRecord {
            id,
            name: draft.name.clone(),
            role: draft.role,
            device_type: draft.device_type,
            site: draft.site,
            platform: draft.platform,
            attrs: draft.attrs.clone(),
        };
        store.devices.insert(id.0, record.clone());
        store.writes += 1;
        Ok(record)
    }

    async fn find_taxon(&self, spec: &TaxonSpec) -> Result<Option<RecordId>, SyncError> {
        let store = self.store.lock().unwrap();
        Ok(store.taxa.get(&spec.cache_key()).map(|id| RecordId(*id)))
    }

    async fn create_taxon(&self, spec: &TaxonSpec) -> Result<RecordId, SyncError> {
        let mut store = self.store.lock().unwrap();
        let id = store.next();
        store.taxa.insert(spec.cache_key(), id);
        store.writes += 1;
        Ok(RecordId(id))
    }
}

// ── Snapshot builders ───────────────────────────────────────────────

fn guest(vmid: u32, name: &str) -> SourceGuest {
    SourceGuest {
        vmid,
        name: name.to_owned(),
        kind: GuestKind::Vm,
        status: Some("running".into()),
        vcpus: 2,
        memory_mb: Some(2048),
        tags: Vec::new(),
        notes: String::new(),
        os_type: Some("l26".into()),
        details: GuestDetails::Vm {
            cpu_type: None,
            bios: "SeaBIOS".into(),
            machine: "q35".into(),
            numa: false,
            sockets: Some(1),
            cores_per_socket: 2,
            min_memory_mb: None,
            boot_order: None,
        },
        disks: Vec::new(),
        nics: Vec::new(),
    }
}

fn disk(name: &str, size_mb: Option<u64>, is_boot: bool) -> VirtualDisk {
    VirtualDisk {
        name: name.to_owned(),
        size_mb,
        storage_id: Some("local-lvm".into()),
        format: None,
        is_boot,
        mount_point: None,
        raw_config: format!("local-lvm:vm-disk-{name}"),
    }
}

fn nic(name: &str, mac: &str, ip: Option<&str>, vlan_tag: Option<u16>) -> NetInterface {
    NetInterface {
        name: name.to_owned(),
        mac: MacAddr::parse(mac).unwrap(),
        ip_cidr: ip.map(|raw| raw.parse().unwrap()),
        bridge: Some("vmbr0".into()),
        model: Some("virtio".into()),
        vlan_tag,
        agent_addresses: Vec::new(),
    }
}

fn scope() -> SyncScope {
    SyncScope {
        cluster_name: "pve1".into(),
        cluster_type: "Proxmox VE".into(),
    }
}

// ── Engine behavior ─────────────────────────────────────────────────

#[tokio::test]
async fn unchanged_snapshot_is_a_zero_write_second_pass() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    let mut web = guest(100, "web");
    web.tags = vec!["prod".into()];
    web.disks = vec![disk("scsi0", Some(32768), true)];
    web.nics = vec![nic("net0", "AA:BB:CC:DD:EE:FF", Some("10.0.0.5/24"), Some(10))];
    let snapshot = vec![web, guest(101, "db")];

    let first = reconciler.run(&snapshot).await.unwrap();
    assert_eq!(first.processed, 2);
    assert_eq!(first.succeeded, 2);
    assert_eq!(first.failed, 0);

    let writes_after_first = directory.writes();
    assert!(writes_after_first > 0);

    let second = reconciler.run(&snapshot).await.unwrap();
    assert_eq!(second.succeeded, 2);
    assert_eq!(
        directory.writes(),
        writes_after_first,
        "an unchanged snapshot must not produce a single write"
    );
}

#[tokio::test]
async fn shared_display_name_disambiguates_both_records() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    let snapshot = vec![guest(100, "web"), guest(101, "web")];
    let report = reconciler.run(&snapshot).await.unwrap();
    assert_eq!(report.failed, 0);

    let mut names = directory.vm_names();
    names.sort();
    assert_eq!(names, vec!["web (100)".to_owned(), "web (101)".to_owned()]);

    // And the layout is stable: a second pass changes nothing.
    let writes = directory.writes();
    reconciler.run(&snapshot).await.unwrap();
    assert_eq!(directory.writes(), writes);
}

#[tokio::test]
async fn registry_collision_renames_the_existing_holder() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    reconciler.run(&[guest(100, "web")]).await.unwrap();
    assert_eq!(directory.vm_by_vmid(100).unwrap().name, "web");

    // A different identity arrives under the same display name while the
    // old one is gone from the snapshot.
    reconciler.run(&[guest(101, "web")]).await.unwrap();

    let old = directory.vm_by_vmid(100).unwrap();
    assert_eq!(old.name, "web (100)");
    assert_eq!(old.lifecycle, Some(LifecycleStatus::Deleted));
    assert_eq!(directory.vm_by_vmid(101).unwrap().name, "web (101)");
}

#[tokio::test]
async fn orphan_lifecycle_round_trip() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    let snapshot = vec![guest(205, "batch"), guest(206, "other")];
    reconciler.run(&snapshot).await.unwrap();

    // vmid 205 vanishes.
    let report = reconciler.run(&[guest(206, "other")]).await.unwrap();
    assert_eq!(report.orphans_marked, 1);
    assert_eq!(report.orphan_errors, 0);

    let retired = directory.vm_by_vmid(205).unwrap();
    assert_eq!(retired.lifecycle, Some(LifecycleStatus::Deleted));
    // Everything else survives retirement untouched.
    assert_eq!(retired.name, "batch");
    assert_eq!(retired.memory_mb, Some(2048));

    // It reappears: the record flips back even though no field differs.
    reconciler.run(&snapshot).await.unwrap();
    let redeployed = directory.vm_by_vmid(205).unwrap();
    assert_eq!(redeployed.lifecycle, Some(LifecycleStatus::Deployed));
}

#[tokio::test]
async fn disk_total_is_the_sum_of_positive_sizes() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    let mut storage = guest(300, "storage");
    storage.disks = vec![
        disk("scsi0", Some(32768), true),
        disk("scsi1", Some(8192), false),
        disk("scsi2", None, false),
    ];
    reconciler.run(&[storage, guest(301, "diskless")]).await.unwrap();

    assert_eq!(directory.vm_by_vmid(300).unwrap().disk_mb, Some(40960));
    // No disk list at all: the aggregate field is omitted, not zeroed.
    assert_eq!(directory.vm_by_vmid(301).unwrap().disk_mb, None);

    // Only the two valid disks became child records.
    let record = directory.vm_by_vmid(300).unwrap();
    let mut disk_names: Vec<String> = directory
        .disks_of(record.id)
        .into_iter()
        .map(|d| d.name)
        .collect();
    disk_names.sort();
    assert_eq!(disk_names, vec!["scsi0".to_owned(), "scsi1".to_owned()]);
}

#[tokio::test]
async fn invalid_size_skips_the_disk_but_never_deletes_it() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    let mut g = guest(300, "storage");
    g.disks = vec![disk("scsi0", Some(32768), true)];
    reconciler.run(std::slice::from_ref(&g)).await.unwrap();

    // Same disk, but this pass its size string failed to parse.
    g.disks = vec![disk("scsi0", None, true)];
    let report = reconciler.run(&[g]).await.unwrap();
    assert_eq!(report.warned, 1);

    let record = directory.vm_by_vmid(300).unwrap();
    let disks = directory.disks_of(record.id);
    assert_eq!(disks.len(), 1, "ambiguous data must not trigger deletion");
    assert_eq!(disks[0].size_mb, Some(32768));
}

#[tokio::test]
async fn orphaned_children_are_deleted_except_management_only() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    let mut g = guest(400, "app");
    g.nics = vec![nic("net0", "AA:BB:CC:DD:EE:01", None, None)];
    reconciler.run(std::slice::from_ref(&g)).await.unwrap();

    let record = directory.vm_by_vmid(400).unwrap();
    let parent = ParentRef::VirtualMachine(record.id);
    directory.seed_interface(parent, "idrac", true);
    directory.seed_interface(parent, "stale0", false);

    reconciler.run(&[g]).await.unwrap();

    let mut names: Vec<String> = directory
        .interfaces_of(parent)
        .into_iter()
        .map(|i| i.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["idrac".to_owned(), "net0".to_owned()]);
}

#[tokio::test]
async fn interface_gets_vlan_link_address_and_ip() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    let mut g = guest(500, "edge");
    g.nics = vec![nic("net0", "AA:BB:CC:DD:EE:FF", Some("10.0.0.5/24"), Some(10))];
    reconciler.run(&[g]).await.unwrap();

    let record = directory.vm_by_vmid(500).unwrap();
    let interfaces = directory.interfaces_of(ParentRef::VirtualMachine(record.id));
    assert_eq!(interfaces.len(), 1);
    let iface = &interfaces[0];

    match iface.custom.as_ref().unwrap() {
        InterfaceCustom::Guest { bridge, model } => {
            assert_eq!(bridge.as_deref(), Some("vmbr0"));
            assert_eq!(model.as_deref(), Some("virtio"));
        }
        InterfaceCustom::Node { .. } => panic!("guest interface carries node fields"),
    }
    assert!(iface.access_vlan.is_some(), "access mode with the untagged VLAN");

    let links = directory.links();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].mac, "AA:BB:CC:DD:EE:FF");
    assert_eq!(links[0].assigned, Some(iface.iface));
    assert_eq!(iface.primary_link, Some(links[0].id));

    let ips = directory.ips();
    assert_eq!(ips.len(), 1);
    assert_eq!(ips[0].address, "10.0.0.5/24");
    assert_eq!(ips[0].assigned, Some(iface.iface));

    // The address also became the record's primary IPv4.
    assert_eq!(record.primary_ip4, Some(ips[0].id));
    assert_eq!(record.primary_ip6, None);
}

#[tokio::test]
async fn removing_the_tag_clears_vlan_settings() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    let mut g = guest(500, "edge");
    g.nics = vec![nic("net0", "AA:BB:CC:DD:EE:FF", None, Some(10))];
    reconciler.run(std::slice::from_ref(&g)).await.unwrap();

    g.nics = vec![nic("net0", "AA:BB:CC:DD:EE:FF", None, None)];
    reconciler.run(&[g]).await.unwrap();

    let record = directory.vm_by_vmid(500).unwrap();
    let interfaces = directory.interfaces_of(ParentRef::VirtualMachine(record.id));
    assert_eq!(interfaces[0].access_vlan, None);
}

#[tokio::test]
async fn existing_address_is_taken_over() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    let foreign = InterfaceRef {
        owner: InterfaceOwnerKind::Device,
        id: RecordId(9999),
    };
    let ip_id = directory.seed_ip("10.0.0.5/24", Some(foreign));

    let mut g = guest(500, "edge");
    g.nics = vec![nic("net0", "AA:BB:CC:DD:EE:FF", Some("10.0.0.5/24"), None)];
    reconciler.run(&[g]).await.unwrap();

    let record = directory.vm_by_vmid(500).unwrap();
    let interfaces = directory.interfaces_of(ParentRef::VirtualMachine(record.id));
    let ips = directory.ips();
    assert_eq!(ips.len(), 1, "takeover reassigns, it does not duplicate");
    assert_eq!(ips[0].id, ip_id);
    assert_eq!(ips[0].assigned, Some(interfaces[0].iface));
}

#[tokio::test]
async fn mac_assigned_elsewhere_abandons_the_assignment() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    let mut first = guest(600, "one");
    first.nics = vec![nic("net0", "AA:BB:CC:DD:EE:FF", None, None)];
    reconciler.run(std::slice::from_ref(&first)).await.unwrap();

    let mut second = guest(601, "two");
    second.nics = vec![nic("net0", "AA:BB:CC:DD:EE:FF", None, None)];
    let report = reconciler.run(&[first, second]).await.unwrap();
    assert_eq!(report.warned, 1, "the duplicate MAC surfaces as a warning");

    let one = directory.vm_by_vmid(600).unwrap();
    let two = directory.vm_by_vmid(601).unwrap();
    let one_iface = &directory.interfaces_of(ParentRef::VirtualMachine(one.id))[0];
    let two_iface = &directory.interfaces_of(ParentRef::VirtualMachine(two.id))[0];

    let links = directory.links();
    assert_eq!(links.len(), 1, "no second object for the same MAC string");
    assert_eq!(links[0].assigned, Some(one_iface.iface));
    assert_eq!(two_iface.primary_link, None);
}

#[tokio::test]
async fn node_becomes_a_device_with_interfaces_and_addresses() {
    let directory = InMemoryDirectory::default();
    let reconciler = Reconciler::new(&directory, scope());

    let node = SourceNode {
        name: "pve1".into(),
        cpu_model: Some("AMD EPYC 7302".into()),
        cpu_sockets: Some(2),
        cpu_cores: Some(32),
        memory_total_bytes: Some(128 * 1024 * 1024 * 1024),
        rootfs_total_bytes: Some(100 * 1024 * 1024 * 1024),
        version: Some("8.2.2".into()),
        interfaces: vec![
            NodeInterface {
                name: "vmbr0".into(),
                mac: MacAddr::parse("AA:BB:CC:00:11:22"),
                kind: NodeInterfaceKind::Bridge,
                kind_raw: "bridge".into(),
                active: true,
                address: Some("192.168.1.5".into()),
                netmask: Some("255.255.255.0".into()),
                comments: Some("uplink bridge".into()),
                bond_slaves: None,
                bridge_ports: Some("eno1".into()),
            },
            NodeInterface {
                name: "bond0".into(),
                // Zero sentinel with no out-of-band replacement: the
                // interface still syncs, just without a link address.
                mac: MacAddr::parse("00:00:00:00:00:00"),
                kind: NodeInterfaceKind::Bond,
                kind_raw: "bond".into(),
                active: true,
                address: None,
                netmask: None,
                comments: None,
                bond_slaves: Some("eno1 eno2".into()),
                bridge_ports: None,
            },
        ],
    };
    let settings = NodeSettings {
        site: Some("DC1".into()),
        role: Some("Hypervisor".into()),
        manufacturer: Some("Dell".into()),
        device_type: Some("PowerEdge R740".into()),
        platform: None,
    };

    reconciler.reconcile_node(&node, &settings).await.unwrap();

    let device = directory.device_by_name("pve1").unwrap();
    assert!(device.site.is_some());
    assert!(device.role.is_some());
    assert!(device.device_type.is_some());
    assert!(device.platform.is_some(), "platform derived from the version string");
    assert_eq!(device.attrs.memory_total_gb, Some(128));
    assert_eq!(device.attrs.cpu_cores, Some(32));

    let interfaces = directory.interfaces_of(ParentRef::Device(device.id));
    assert_eq!(interfaces.len(), 2);

    let bridge = interfaces.iter().find(|i| i.name == "vmbr0").unwrap();
    assert_eq!(bridge.kind.as_deref(), Some("bridge"));
    assert!(bridge.primary_link.is_some());

    let bond = interfaces.iter().find(|i| i.name == "bond0").unwrap();
    assert_eq!(bond.kind.as_deref(), Some("lag"));
    assert_eq!(bond.primary_link, None);

    let ips = directory.ips();
    assert_eq!(ips.len(), 1);
    assert_eq!(ips[0].address, "192.168.1.5/24");
    assert_eq!(ips[0].assigned, Some(bridge.iface));

    // A second node pass is also write-free.
    let writes = directory.writes();
    reconciler.reconcile_node(&node, &settings).await.unwrap();
    assert_eq!(directory.writes(), writes);
}
