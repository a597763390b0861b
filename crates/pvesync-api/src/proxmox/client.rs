// Proxmox VE HTTP client
//
// Wraps `reqwest::Client` with API-token auth, `/api2/json` URL
// construction, and `{ "data": ... }` envelope unwrapping. All methods
// return unwrapped `data` payloads.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::proxmox::models::{
    AgentInterface, GuestStatus, GuestSummary, NodeNetworkEntry, NodeStatus, RawGuestConfig,
    ResourceKind, VersionInfo,
};
use crate::transport::TransportConfig;

/// Every Proxmox response wraps its payload in a `data` member.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

/// Raw HTTP client for the Proxmox VE API.
///
/// Authenticates with an API token (`Authorization: PVEAPIToken=...`),
/// which needs no session or ticket handling. The `base_url` is the
/// cluster node root, e.g. `https://pve1.example.net:8006`.
pub struct ProxmoxClient {
    http: reqwest::Client,
    base_url: Url,
    node: String,
}

impl ProxmoxClient {
    /// Create a new client from a `TransportConfig` and API-token parts.
    ///
    /// `token_id` is the full `user@realm!tokenname` identifier; the secret
    /// stays wrapped until the header is built.
    pub fn new(
        base_url: Url,
        node: impl Into<String>,
        token_id: &str,
        token_secret: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        let value = format!("PVEAPIToken={}={}", token_id, token_secret.expose_secret());
        let mut auth = reqwest::header::HeaderValue::from_str(&value)
            .map_err(|_| Error::Authentication {
                message: "API token contains characters not valid in a header".into(),
            })?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self {
            http,
            base_url,
            node: node.into(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client` (tests, shared pools).
    pub fn with_client(http: reqwest::Client, base_url: Url, node: impl Into<String>) -> Self {
        Self {
            http,
            base_url,
            node: node.into(),
        }
    }

    /// The node this client is scoped to.
    pub fn node(&self) -> &str {
        &self.node
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for a cluster-level API path: `{base}/api2/json/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/api2/json/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path
        );
        Ok(Url::parse(&full)?)
    }

    /// Build a node-scoped URL: `{base}/api2/json/nodes/{node}/{path}`.
    pub(crate) fn node_url(&self, path: &str) -> Result<Url, Error> {
        self.api_url(&format!("nodes/{}/{}", self.node, path))
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and unwrap the `data` envelope.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "API token rejected".into(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(Error::Proxmox {
                message: first_line(&body),
                status: status.as_u16(),
            });
        }

        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        envelope.data.ok_or_else(|| Error::Proxmox {
            message: "response carried no data".into(),
            status: status.as_u16(),
        })
    }

    // ── Guest inventory ──────────────────────────────────────────────

    /// List guest summaries of one resource kind on this node.
    pub async fn list_guests(&self, kind: ResourceKind) -> Result<Vec<GuestSummary>, Error> {
        let url = self.node_url(kind.path_segment())?;
        self.get(url).await
    }

    /// Fetch the raw configuration bag for one guest.
    pub async fn guest_config(
        &self,
        kind: ResourceKind,
        vmid: u32,
    ) -> Result<RawGuestConfig, Error> {
        let url = self.node_url(&format!("{}/{vmid}/config", kind.path_segment()))?;
        self.get(url).await
    }

    /// Fetch the current runtime status for one guest.
    pub async fn guest_status(&self, kind: ResourceKind, vmid: u32) -> Result<GuestStatus, Error> {
        let url = self.node_url(&format!("{}/{vmid}/status/current", kind.path_segment()))?;
        self.get(url).await
    }

    /// Query the QEMU guest agent for its interface list.
    ///
    /// The agent wraps its payload in an extra `result` member on some
    /// versions, so both `[...]` and `{"result": [...]}` are accepted.
    /// Fails whenever the agent is not installed or not running; callers
    /// treat that as "no agent data", not as a guest failure.
    pub async fn agent_network_interfaces(
        &self,
        vmid: u32,
    ) -> Result<Vec<AgentInterface>, Error> {
        let url = self.node_url(&format!("qemu/{vmid}/agent/network-get-interfaces"))?;
        let raw: serde_json::Value = self.get(url).await?;

        let list = match raw {
            serde_json::Value::Array(items) => items,
            serde_json::Value::Object(mut map) => match map.remove("result") {
                Some(serde_json::Value::Array(items)) => items,
                _ => {
                    debug!(vmid, "agent returned an unexpected shape; treating as no data");
                    return Ok(Vec::new());
                }
            },
            _ => return Ok(Vec::new()),
        };

        let parsed = list
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();
        Ok(parsed)
    }

    // ── Node details ─────────────────────────────────────────────────

    /// Fetch node CPU/memory/rootfs status.
    pub async fn node_status(&self) -> Result<NodeStatus, Error> {
        let url = self.node_url("status")?;
        self.get(url).await
    }

    /// Fetch the Proxmox VE version string.
    pub async fn version(&self) -> Result<VersionInfo, Error> {
        let url = self.api_url("version")?;
        self.get(url).await
    }

    /// List the node's network interfaces.
    pub async fn node_network(&self) -> Result<Vec<NodeNetworkEntry>, Error> {
        let url = self.node_url("network")?;
        self.get(url).await
    }
}

/// Proxmox error bodies are free-form text; keep only the first line.
fn first_line(body: &str) -> String {
    let line = body.lines().next().unwrap_or_default().trim();
    if line.is_empty() {
        "unknown error".into()
    } else {
        line.to_owned()
    }
}
