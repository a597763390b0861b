// ── NetBox directory adapter ──
//
// DirectoryProvider over the NetboxClient. Pure delegation plus
// conversion; every reconciliation decision stays in the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pvesync_api::netbox::models::{
    DeviceInterfaceWrite, InterfacePatch, IpAddressWrite, VirtualDiskWrite, VirtualMachinePatch,
    VmCustomFields, VmInterfaceWrite,
};
use pvesync_api::NetboxClient;

use crate::error::SyncError;
use crate::model::{
    DeviceDraft, DeviceRecord, DiskDraft, DiskRecord, InterfaceDraft, InterfaceOwnerKind,
    InterfaceRecord, InterfaceRef, InterfaceUpdate, IpRecord, LifecycleStatus, LinkAddressRecord,
    ParentRef, RecordId, VmDraft, VmRecord,
};
use crate::provider::{DirectoryProvider, TaxonSpec};

use super::convert::{
    device_write, guest_custom_fields, node_custom_fields, owner_object_type, slugify, vm_write,
};

/// The registry directory, backed by a NetBox instance.
pub struct NetboxDirectory {
    client: NetboxClient,
}

impl NetboxDirectory {
    pub fn new(client: NetboxClient) -> Self {
        Self { client }
    }
}

/// Translate an engine-level VLAN intent into the wire's mode + VLAN pair.
fn vlan_patch(change: Option<Option<RecordId>>) -> (Option<Option<String>>, Option<Option<i64>>) {
    match change {
        None => (None, None),
        Some(Some(vlan)) => (Some(Some("access".into())), Some(Some(vlan.0))),
        Some(None) => (Some(None), Some(None)),
    }
}

#[async_trait]
impl DirectoryProvider for NetboxDirectory {
    // ── Guest records ────────────────────────────────────────────────

    async fn list_vms(&self, cluster: Option<RecordId>) -> Result<Vec<VmRecord>, SyncError> {
        let vms = self.client.list_vms(cluster.map(|c| c.0)).await?;
        Ok(vms.into_iter().map(VmRecord::from).collect())
    }

    async fn create_vm(&self, draft: &VmDraft) -> Result<VmRecord, SyncError> {
        Ok(self.client.create_vm(&vm_write(draft)).await?.into())
    }

    async fn update_vm(&self, id: RecordId, draft: &VmDraft) -> Result<VmRecord, SyncError> {
        Ok(self.client.update_vm(id.0, &vm_write(draft)).await?.into())
    }

    async fn rename_vm(&self, id: RecordId, name: &str) -> Result<(), SyncError> {
        let patch = VirtualMachinePatch {
            name: Some(name.to_owned()),
            ..VirtualMachinePatch::default()
        };
        self.client.patch_vm(id.0, &patch).await?;
        Ok(())
    }

    async fn mark_vm_lifecycle(
        &self,
        id: RecordId,
        status: LifecycleStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let patch = VirtualMachinePatch {
            custom_fields: Some(VmCustomFields {
                vm_status: Some(status.to_string()),
                vm_last_sync: Some(timestamp.to_rfc3339()),
                ..VmCustomFields::default()
            }),
            ..VirtualMachinePatch::default()
        };
        self.client.patch_vm(id.0, &patch).await?;
        Ok(())
    }

    async fn set_vm_primary_ips(
        &self,
        id: RecordId,
        v4: Option<Option<RecordId>>,
        v6: Option<Option<RecordId>>,
    ) -> Result<(), SyncError> {
        let patch = VirtualMachinePatch {
            primary_ip4: v4.map(|inner| inner.map(|ip| ip.0)),
            primary_ip6: v6.map(|inner| inner.map(|ip| ip.0)),
            ..VirtualMachinePatch::default()
        };
        self.client.patch_vm(id.0, &patch).await?;
        Ok(())
    }

    // ── Disks ────────────────────────────────────────────────────────

    async fn list_disks(&self, vm: RecordId) -> Result<Vec<DiskRecord>, SyncError> {
        let disks = self.client.list_vm_disks(vm.0).await?;
        Ok(disks.into_iter().map(DiskRecord::from).collect())
    }

    async fn create_disk(&self, vm: RecordId, draft: &DiskDraft) -> Result<DiskRecord, SyncError> {
        let payload = VirtualDiskWrite {
            virtual_machine: vm.0,
            name: draft.name.clone(),
            size: draft.size_mb,
            description: Some(draft.description.clone()),
        };
        Ok(self.client.create_vm_disk(&payload).await?.into())
    }

    async fn update_disk(
        &self,
        vm: RecordId,
        id: RecordId,
        draft: &DiskDraft,
    ) -> Result<DiskRecord, SyncError> {
        let payload = VirtualDiskWrite {
            virtual_machine: vm.0,
            name: draft.name.clone(),
            size: draft.size_mb,
            description: Some(draft.description.clone()),
        };
        Ok(self.client.update_vm_disk(id.0, &payload).await?.into())
    }

    async fn delete_disk(&self, id: RecordId) -> Result<(), SyncError> {
        Ok(self.client.delete_vm_disk(id.0).await?)
    }

    // ── Interfaces ───────────────────────────────────────────────────

    async fn list_interfaces(
        &self,
        parent: ParentRef,
    ) -> Result<Vec<InterfaceRecord>, SyncError> {
        match parent {
            ParentRef::VirtualMachine(vm) => {
                let interfaces = self.client.list_vm_interfaces(vm.0).await?;
                Ok(interfaces.into_iter().map(InterfaceRecord::from).collect())
            }
            ParentRef::Device(device) => {
                let interfaces = self.client.list_device_interfaces(device.0).await?;
                Ok(interfaces.into_iter().map(InterfaceRecord::from).collect())
            }
        }
    }

    async fn create_interface(
        &self,
        parent: ParentRef,
        draft: &InterfaceDraft,
    ) -> Result<InterfaceRecord, SyncError> {
        match parent {
            ParentRef::VirtualMachine(vm) => {
                let payload = VmInterfaceWrite {
                    virtual_machine: vm.0,
                    name: draft.name.clone(),
                    enabled: draft.enabled,
                    kind: "virtual".into(),
                    mode: draft.access_vlan.map(|_| "access".into()),
                    untagged_vlan: draft.access_vlan.map(|v| v.0),
                    custom_fields: draft
                        .custom
                        .as_ref()
                        .map(guest_custom_fields)
                        .unwrap_or_default(),
                };
                Ok(self.client.create_vm_interface(&payload).await?.into())
            }
            ParentRef::Device(device) => {
                let payload = DeviceInterfaceWrite {
                    device: device.0,
                    name: draft.name.clone(),
                    kind: draft.kind.clone().unwrap_or_else(|| "other".into()),
                    enabled: draft.enabled,
                    description: draft.description.clone(),
                    custom_fields: draft
                        .custom
                        .as_ref()
                        .map(node_custom_fields)
                        .unwrap_or_default(),
                };
                Ok(self.client.create_device_interface(&payload).await?.into())
            }
        }
    }

    async fn update_interface(
        &self,
        iface: InterfaceRef,
        update: &InterfaceUpdate,
    ) -> Result<InterfaceRecord, SyncError> {
        let (mode, untagged_vlan) = vlan_patch(update.access_vlan);
        match iface.owner {
            InterfaceOwnerKind::VirtualMachine => {
                let patch = InterfacePatch {
                    enabled: update.enabled,
                    kind: update.kind.clone(),
                    description: update.description.clone(),
                    mode,
                    untagged_vlan,
                    primary_mac_address: None,
                    custom_fields: update.custom.as_ref().map(guest_custom_fields),
                };
                Ok(self.client.patch_vm_interface(iface.id.0, &patch).await?.into())
            }
            InterfaceOwnerKind::Device => {
                let patch = InterfacePatch {
                    enabled: update.enabled,
                    kind: update.kind.clone(),
                    description: update.description.clone(),
                    mode,
                    untagged_vlan,
                    primary_mac_address: None,
                    custom_fields: update.custom.as_ref().map(node_custom_fields),
                };
                Ok(self
                    .client
                    .patch_device_interface(iface.id.0, &patch)
                    .await?
                    .into())
            }
        }
    }

    async fn delete_interface(&self, iface: InterfaceRef) -> Result<(), SyncError> {
        match iface.owner {
            InterfaceOwnerKind::VirtualMachine => {
                Ok(self.client.delete_vm_interface(iface.id.0).await?)
            }
            InterfaceOwnerKind::Device => {
                Ok(self.client.delete_device_interface(iface.id.0).await?)
            }
        }
    }

    async fn set_primary_link(
        &self,
        iface: InterfaceRef,
        link: Option<RecordId>,
    ) -> Result<(), SyncError> {
        let primary = Some(link.map(|l| l.0));
        match iface.owner {
            InterfaceOwnerKind::VirtualMachine => {
                let patch = InterfacePatch {
                    primary_mac_address: primary,
                    ..InterfacePatch::default()
                };
                self.client.patch_vm_interface(iface.id.0, &patch).await?;
            }
            InterfaceOwnerKind::Device => {
                let patch = InterfacePatch {
                    primary_mac_address: primary,
                    ..InterfacePatch::default()
                };
                self.client.patch_device_interface(iface.id.0, &patch).await?;
            }
        }
        Ok(())
    }

    // ── Link-address objects ─────────────────────────────────────────

    async fn find_link_addresses(
        &self,
        mac: &str,
    ) -> Result<Vec<LinkAddressRecord>, SyncError> {
        let macs = self.client.find_mac_addresses(mac).await?;
        Ok(macs.into_iter().map(LinkAddressRecord::from).collect())
    }

    async fn create_link_address(&self, mac: &str) -> Result<LinkAddressRecord, SyncError> {
        Ok(self.client.create_mac_address(mac).await?.into())
    }

    async fn assign_link_address(
        &self,
        id: RecordId,
        target: InterfaceRef,
    ) -> Result<LinkAddressRecord, SyncError> {
        Ok(self
            .client
            .assign_mac_address(id.0, owner_object_type(target.owner), target.id.0)
            .await?
            .into())
    }

    // ── IP addresses ─────────────────────────────────────────────────

    async fn find_ip(&self, cidr: &str) -> Result<Option<IpRecord>, SyncError> {
        Ok(self.client.find_ip_address(cidr).await?.map(IpRecord::from))
    }

    async fn create_ip(&self, cidr: &str, target: InterfaceRef) -> Result<IpRecord, SyncError> {
        let payload = IpAddressWrite {
            address: cidr.to_owned(),
            status: "active".into(),
            assigned_object_type: owner_object_type(target.owner).to_owned(),
            assigned_object_id: target.id.0,
        };
        Ok(self.client.create_ip_address(&payload).await?.into())
    }

    async fn reassign_ip(
        &self,
        id: RecordId,
        target: InterfaceRef,
    ) -> Result<IpRecord, SyncError> {
        Ok(self
            .client
            .reassign_ip_address(id.0, owner_object_type(target.owner), target.id.0)
            .await?
            .into())
    }

    // ── Devices ──────────────────────────────────────────────────────

    async fn find_device(&self, name: &str) -> Result<Option<DeviceRecord>, SyncError> {
        Ok(self.client.find_device(name).await?.map(DeviceRecord::from))
    }

    async fn create_device(&self, draft: &DeviceDraft) -> Result<DeviceRecord, SyncError> {
        Ok(self.client.create_device(&device_write(draft)).await?.into())
    }

    async fn update_device(
        &self,
        id: RecordId,
        draft: &DeviceDraft,
    ) -> Result<DeviceRecord, SyncError> {
        Ok(self
            .client
            .update_device(id.0, &device_write(draft))
            .await?
            .into())
    }

    // ── Taxonomy ─────────────────────────────────────────────────────

    async fn find_taxon(&self, spec: &TaxonSpec) -> Result<Option<RecordId>, SyncError> {
        let id = match spec {
            TaxonSpec::Tag { name } => self
                .client
                .find_tag(name, &slugify(name))
                .await?
                .map(|t| t.id),
            TaxonSpec::Platform { name } => self
                .client
                .find_platform(name, &slugify(name))
                .await?
                .map(|p| p.id),
            TaxonSpec::ClusterType { name } => {
                self.client.find_cluster_type(name).await?.map(|t| t.id)
            }
            TaxonSpec::Cluster { name, .. } => self.client.find_cluster(name).await?.map(|c| c.id),
            TaxonSpec::Vlan { vid } => self.client.find_vlan(*vid).await?.map(|v| v.id),
            TaxonSpec::Site { name } => self
                .client
                .find_site(name, &slugify(name))
                .await?
                .map(|s| s.id),
            TaxonSpec::Manufacturer { name } => self
                .client
                .find_manufacturer(name, &slugify(name))
                .await?
                .map(|m| m.id),
            TaxonSpec::DeviceType {
                model,
                manufacturer,
            } => self
                .client
                .find_device_type(model, manufacturer.0)
                .await?
                .map(|t| t.id),
            TaxonSpec::DeviceRole { name } => {
                self.client.find_device_role(name).await?.map(|r| r.id)
            }
        };
        Ok(id.map(RecordId))
    }

    async fn create_taxon(&self, spec: &TaxonSpec) -> Result<RecordId, SyncError> {
        let id = match spec {
            TaxonSpec::Tag { name } => self.client.create_tag(name, &slugify(name)).await?.id,
            TaxonSpec::Platform { name } => {
                self.client.create_platform(name, &slugify(name)).await?.id
            }
            TaxonSpec::ClusterType { name } => {
                self.client
                    .create_cluster_type(name, &slugify(name))
                    .await?
                    .id
            }
            TaxonSpec::Cluster { name, cluster_type } => {
                self.client.create_cluster(name, cluster_type.0).await?.id
            }
            TaxonSpec::Vlan { vid } => {
                self.client.create_vlan(*vid, &format!("VLAN_{vid}")).await?.id
            }
            TaxonSpec::Site { name } => self.client.create_site(name, &slugify(name)).await?.id,
            TaxonSpec::Manufacturer { name } => {
                self.client
                    .create_manufacturer(name, &slugify(name))
                    .await?
                    .id
            }
            TaxonSpec::DeviceType {
                model,
                manufacturer,
            } => {
                self.client
                    .create_device_type(model, &slugify(model), manufacturer.0)
                    .await?
                    .id
            }
            TaxonSpec::DeviceRole { name } => {
                self.client.create_device_role(name, &slugify(name)).await?.id
            }
        };
        Ok(RecordId(id))
    }
}
