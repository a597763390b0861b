// ── Proxmox inventory adapter ──
//
// InventoryProvider over the ProxmoxClient plus the normalizer. Per-guest
// fetch failures skip that guest (logged), they never sink the snapshot.
// The optional link-report command supplies out-of-band MACs for node
// interfaces whose primary source reports the zero sentinel.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use pvesync_api::proxmox::models::{AgentInterface, GuestSummary, ResourceKind};
use pvesync_api::ProxmoxClient;

use crate::error::SyncError;
use crate::model::{GuestKind, SourceGuest, SourceNode};
use crate::normalize;
use crate::provider::InventoryProvider;

/// The source inventory, backed by one Proxmox VE node.
pub struct ProxmoxInventory {
    client: ProxmoxClient,
    /// Shell command whose stdout is an `ip -j link show` document for
    /// the node (typically wrapped in ssh). Optional.
    link_report_command: Option<String>,
}

impl ProxmoxInventory {
    pub fn new(client: ProxmoxClient) -> Self {
        Self {
            client,
            link_report_command: None,
        }
    }

    pub fn with_link_report_command(mut self, command: Option<String>) -> Self {
        self.link_report_command = command;
        self
    }

    async fn fetch_kind(&self, kind: ResourceKind) -> Result<Vec<SourceGuest>, SyncError> {
        let summaries = self.client.list_guests(kind).await?;
        let mut guests = Vec::with_capacity(summaries.len());

        for summary in summaries {
            match self.fetch_one(kind, &summary).await {
                Ok(guest) => guests.push(guest),
                Err(e) => {
                    error!(
                        vmid = summary.vmid,
                        name = summary.name.as_deref().unwrap_or("<unnamed>"),
                        error = %e,
                        "failed to fetch guest configuration; skipping"
                    );
                }
            }
        }
        Ok(guests)
    }

    async fn fetch_one(
        &self,
        kind: ResourceKind,
        summary: &GuestSummary,
    ) -> Result<SourceGuest, SyncError> {
        let config = self.client.guest_config(kind, summary.vmid).await?;

        let status = match self.client.guest_status(kind, summary.vmid).await {
            Ok(status) => Some(status.status),
            Err(e) => {
                warn!(vmid = summary.vmid, error = %e, "could not fetch guest status");
                None
            }
        };

        let agent = if kind == ResourceKind::Qemu && status.as_deref() == Some("running") {
            self.fetch_agent_report(summary.vmid).await
        } else {
            Vec::new()
        };

        let guest_kind = match kind {
            ResourceKind::Qemu => GuestKind::Vm,
            ResourceKind::Lxc => GuestKind::Container,
        };
        Ok(normalize::guest_from_config(
            summary,
            &config,
            guest_kind,
            status,
            &agent,
        ))
    }

    /// Agent data is strictly best-effort: the agent may not be installed,
    /// not running, or the command may be unsupported.
    async fn fetch_agent_report(&self, vmid: u32) -> Vec<AgentInterface> {
        match self.client.agent_network_interfaces(vmid).await {
            Ok(report) => {
                debug!(vmid, interfaces = report.len(), "agent report fetched");
                report
            }
            Err(e) => {
                debug!(vmid, error = %e, "no agent report");
                Vec::new()
            }
        }
    }

    /// Run the configured link-report command and parse its output.
    async fn fetch_link_report(
        &self,
    ) -> Option<std::collections::HashMap<String, crate::model::MacAddr>> {
        let command = self.link_report_command.as_deref()?;
        info!(node = self.client.node(), "collecting out-of-band link report");

        let output = match tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, "link-report command failed to start");
                return None;
            }
        };

        if !output.status.success() {
            error!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "link-report command exited with failure"
            );
            return None;
        }

        match normalize::parse_link_report(&String::from_utf8_lossy(&output.stdout)) {
            Ok(report) => {
                info!(interfaces = report.len(), "link report collected");
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "link-report output could not be parsed");
                None
            }
        }
    }
}

#[async_trait]
impl InventoryProvider for ProxmoxInventory {
    async fn fetch_guests(&self) -> Result<Vec<SourceGuest>, SyncError> {
        let mut guests = self.fetch_kind(ResourceKind::Qemu).await?;
        guests.extend(self.fetch_kind(ResourceKind::Lxc).await?);
        info!(
            node = self.client.node(),
            guests = guests.len(),
            "inventory snapshot fetched"
        );
        Ok(guests)
    }

    async fn fetch_node(&self) -> Result<SourceNode, SyncError> {
        let status = self.client.node_status().await?;
        let version = match self.client.version().await {
            Ok(info) => Some(info.version),
            Err(e) => {
                warn!(error = %e, "could not fetch platform version");
                None
            }
        };
        let entries = self.client.node_network().await?;

        let mut node =
            normalize::node_from_api(self.client.node(), &status, version, entries);

        if let Some(report) = self.fetch_link_report().await {
            normalize::merge_link_report(&mut node.interfaces, &report);
        }
        Ok(node)
    }
}
