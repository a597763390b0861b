// NetBox HTTP client
//
// Wraps `reqwest::Client` with token auth, `/api/` URL construction,
// offset pagination, and DRF error-body extraction. Endpoint methods are
// thin wrappers over the generic request helpers; callers in
// `pvesync-core` own all reconciliation decisions.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::netbox::models::{
    Cluster, Device, DeviceInterface, DeviceInterfaceCustomFields, DeviceInterfaceWrite,
    DeviceType, DeviceWrite, InterfacePatch, IpAddress, IpAddressWrite, MacAddress, NamedObject,
    Page, VirtualDisk, VirtualDiskWrite, VirtualMachine, VirtualMachinePatch,
    VirtualMachineWrite, VmInterface, VmInterfaceCustomFields, VmInterfaceWrite, Vlan,
};
use crate::transport::TransportConfig;

/// Page size used for list requests.
const PAGE_LIMIT: u64 = 100;

/// Raw HTTP client for the NetBox REST API.
pub struct NetboxClient {
    http: reqwest::Client,
    base_url: Url,
}

impl NetboxClient {
    /// Create a new client from a `TransportConfig` and an API token.
    pub fn new(
        base_url: Url,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!(
            "Token {}",
            token.expose_secret()
        ))
        .map_err(|_| Error::Authentication {
            message: "API token contains characters not valid in a header".into(),
        })?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client` (tests, shared pools).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    // ── URL / request helpers ────────────────────────────────────────

    fn api_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, Error> {
        let full = format!(
            "{}/api/{}/",
            self.base_url.as_str().trim_end_matches('/'),
            path
        );
        let mut url = Url::parse(&full)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn read_body<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: "API token rejected".into(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(Error::Netbox {
                message: extract_error_detail(&body),
                status: status.as_u16(),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// GET one page of a list endpoint.
    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        offset: u64,
    ) -> Result<Page<T>, Error> {
        let mut query = query.to_vec();
        query.push(("limit", PAGE_LIMIT.to_string()));
        query.push(("offset", offset.to_string()));
        let url = self.api_url(path, &query)?;
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        Self::read_body(resp).await
    }

    /// GET every result of a filtered list endpoint, following pagination.
    pub(crate) async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, Error> {
        let mut results: Vec<T> = Vec::new();
        loop {
            #[allow(clippy::cast_possible_truncation)]
            let page: Page<T> = self.get_page(path, query, results.len() as u64).await?;
            let done = page.next.is_none() || page.results.is_empty();
            results.extend(page.results);
            if done {
                return Ok(results);
            }
        }
    }

    /// GET the single object matching a filter, or `None`.
    ///
    /// Multiple matches are a registry data issue; the first one wins and a
    /// warning is logged, mirroring how loose lookups behave elsewhere.
    pub(crate) async fn find_one<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, Error> {
        let page: Page<T> = self.get_page(path, query, 0).await?;
        if page.count > 1 {
            warn!(path, count = page.count, "filter matched multiple objects; using the first");
        }
        Ok(page.results.into_iter().next())
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        let url = self.api_url(path, &[])?;
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::read_body(resp).await
    }

    async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        id: i64,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        let url = self.api_url(&format!("{path}/{id}"), &[])?;
        debug!("PATCH {}", url);

        let resp = self
            .http
            .patch(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::read_body(resp).await
    }

    async fn delete(&self, path: &str, id: i64) -> Result<(), Error> {
        let url = self.api_url(&format!("{path}/{id}"), &[])?;
        debug!("DELETE {}", url);

        let resp = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(Error::Transport)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Netbox {
            message: extract_error_detail(&body),
            status: status.as_u16(),
        })
    }

    // ── Virtual machines ─────────────────────────────────────────────

    /// List all virtual machines, optionally scoped to one cluster.
    pub async fn list_vms(&self, cluster_id: Option<i64>) -> Result<Vec<VirtualMachine>, Error> {
        let mut query = Vec::new();
        if let Some(id) = cluster_id {
            query.push(("cluster_id", id.to_string()));
        }
        self.list_all("virtualization/virtual-machines", &query).await
    }

    pub async fn create_vm(&self, payload: &VirtualMachineWrite) -> Result<VirtualMachine, Error> {
        self.post("virtualization/virtual-machines", payload).await
    }

    pub async fn update_vm(
        &self,
        id: i64,
        payload: &VirtualMachineWrite,
    ) -> Result<VirtualMachine, Error> {
        self.patch("virtualization/virtual-machines", id, payload).await
    }

    pub async fn patch_vm(
        &self,
        id: i64,
        payload: &VirtualMachinePatch,
    ) -> Result<VirtualMachine, Error> {
        self.patch("virtualization/virtual-machines", id, payload).await
    }

    // ── Virtual disks ────────────────────────────────────────────────

    pub async fn list_vm_disks(&self, vm_id: i64) -> Result<Vec<VirtualDisk>, Error> {
        self.list_all(
            "virtualization/virtual-disks",
            &[("virtual_machine_id", vm_id.to_string())],
        )
        .await
    }

    pub async fn create_vm_disk(&self, payload: &VirtualDiskWrite) -> Result<VirtualDisk, Error> {
        self.post("virtualization/virtual-disks", payload).await
    }

    pub async fn update_vm_disk(
        &self,
        id: i64,
        payload: &VirtualDiskWrite,
    ) -> Result<VirtualDisk, Error> {
        self.patch("virtualization/virtual-disks", id, payload).await
    }

    pub async fn delete_vm_disk(&self, id: i64) -> Result<(), Error> {
        self.delete("virtualization/virtual-disks", id).await
    }

    // ── VM interfaces ────────────────────────────────────────────────

    pub async fn list_vm_interfaces(&self, vm_id: i64) -> Result<Vec<VmInterface>, Error> {
        self.list_all(
            "virtualization/interfaces",
            &[("virtual_machine_id", vm_id.to_string())],
        )
        .await
    }

    pub async fn create_vm_interface(
        &self,
        payload: &VmInterfaceWrite,
    ) -> Result<VmInterface, Error> {
        self.post("virtualization/interfaces", payload).await
    }

    pub async fn patch_vm_interface(
        &self,
        id: i64,
        payload: &InterfacePatch<VmInterfaceCustomFields>,
    ) -> Result<VmInterface, Error> {
        self.patch("virtualization/interfaces", id, payload).await
    }

    pub async fn delete_vm_interface(&self, id: i64) -> Result<(), Error> {
        self.delete("virtualization/interfaces", id).await
    }

    // ── Device interfaces ────────────────────────────────────────────

    pub async fn list_device_interfaces(
        &self,
        device_id: i64,
    ) -> Result<Vec<DeviceInterface>, Error> {
        self.list_all("dcim/interfaces", &[("device_id", device_id.to_string())])
            .await
    }

    pub async fn create_device_interface(
        &self,
        payload: &DeviceInterfaceWrite,
    ) -> Result<DeviceInterface, Error> {
        self.post("dcim/interfaces", payload).await
    }

    pub async fn patch_device_interface(
        &self,
        id: i64,
        payload: &InterfacePatch<DeviceInterfaceCustomFields>,
    ) -> Result<DeviceInterface, Error> {
        self.patch("dcim/interfaces", id, payload).await
    }

    pub async fn delete_device_interface(&self, id: i64) -> Result<(), Error> {
        self.delete("dcim/interfaces", id).await
    }

    // ── MAC address objects ──────────────────────────────────────────

    /// Find every MAC address object holding the given string value.
    ///
    /// The API cannot filter by assignment, so callers inspect the
    /// returned objects' `assigned_object_*` fields themselves.
    pub async fn find_mac_addresses(&self, mac: &str) -> Result<Vec<MacAddress>, Error> {
        self.list_all("dcim/mac-addresses", &[("mac_address", mac.to_owned())])
            .await
    }

    pub async fn create_mac_address(&self, mac: &str) -> Result<MacAddress, Error> {
        self.post("dcim/mac-addresses", &json!({ "mac_address": mac }))
            .await
    }

    /// Point a MAC address object at an interface.
    pub async fn assign_mac_address(
        &self,
        id: i64,
        object_type: &str,
        object_id: i64,
    ) -> Result<MacAddress, Error> {
        self.patch(
            "dcim/mac-addresses",
            id,
            &json!({
                "assigned_object_type": object_type,
                "assigned_object_id": object_id,
            }),
        )
        .await
    }

    // ── IP addresses ─────────────────────────────────────────────────

    /// Exact-CIDR lookup.
    pub async fn find_ip_address(&self, cidr: &str) -> Result<Option<IpAddress>, Error> {
        self.find_one("ipam/ip-addresses", &[("address", cidr.to_owned())])
            .await
    }

    pub async fn create_ip_address(&self, payload: &IpAddressWrite) -> Result<IpAddress, Error> {
        self.post("ipam/ip-addresses", payload).await
    }

    /// Reassign an existing IP address to a new interface (takeover).
    pub async fn reassign_ip_address(
        &self,
        id: i64,
        object_type: &str,
        object_id: i64,
    ) -> Result<IpAddress, Error> {
        self.patch(
            "ipam/ip-addresses",
            id,
            &json!({
                "assigned_object_type": object_type,
                "assigned_object_id": object_id,
                "status": "active",
            }),
        )
        .await
    }

    // ── Devices ──────────────────────────────────────────────────────

    pub async fn find_device(&self, name: &str) -> Result<Option<Device>, Error> {
        self.find_one("dcim/devices", &[("name", name.to_owned())]).await
    }

    pub async fn create_device(&self, payload: &DeviceWrite) -> Result<Device, Error> {
        self.post("dcim/devices", payload).await
    }

    pub async fn update_device(&self, id: i64, payload: &DeviceWrite) -> Result<Device, Error> {
        self.patch("dcim/devices", id, payload).await
    }

    // ── Taxonomy: tags, platforms, clusters, VLANs, DCIM catalog ─────

    pub async fn find_tag(&self, name: &str, slug: &str) -> Result<Option<NamedObject>, Error> {
        if let Some(tag) = self
            .find_one("extras/tags", &[("name", name.to_owned())])
            .await?
        {
            return Ok(Some(tag));
        }
        self.find_one("extras/tags", &[("slug", slug.to_owned())]).await
    }

    pub async fn create_tag(&self, name: &str, slug: &str) -> Result<NamedObject, Error> {
        self.post("extras/tags", &json!({ "name": name, "slug": slug }))
            .await
    }

    pub async fn find_platform(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<Option<NamedObject>, Error> {
        if let Some(platform) = self
            .find_one("dcim/platforms", &[("name", name.to_owned())])
            .await?
        {
            return Ok(Some(platform));
        }
        self.find_one("dcim/platforms", &[("slug", slug.to_owned())])
            .await
    }

    pub async fn create_platform(&self, name: &str, slug: &str) -> Result<NamedObject, Error> {
        self.post("dcim/platforms", &json!({ "name": name, "slug": slug }))
            .await
    }

    pub async fn find_cluster(&self, name: &str) -> Result<Option<Cluster>, Error> {
        self.find_one("virtualization/clusters", &[("name", name.to_owned())])
            .await
    }

    pub async fn create_cluster(&self, name: &str, type_id: i64) -> Result<Cluster, Error> {
        self.post(
            "virtualization/clusters",
            &json!({ "name": name, "type": type_id }),
        )
        .await
    }

    pub async fn find_cluster_type(&self, name: &str) -> Result<Option<NamedObject>, Error> {
        self.find_one("virtualization/cluster-types", &[("name", name.to_owned())])
            .await
    }

    pub async fn create_cluster_type(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<NamedObject, Error> {
        self.post(
            "virtualization/cluster-types",
            &json!({ "name": name, "slug": slug }),
        )
        .await
    }

    pub async fn find_vlan(&self, vid: u16) -> Result<Option<Vlan>, Error> {
        self.find_one("ipam/vlans", &[("vid", vid.to_string())]).await
    }

    pub async fn create_vlan(&self, vid: u16, name: &str) -> Result<Vlan, Error> {
        self.post("ipam/vlans", &json!({ "vid": vid, "name": name })).await
    }

    pub async fn find_site(&self, name: &str, slug: &str) -> Result<Option<NamedObject>, Error> {
        if let Some(site) = self
            .find_one("dcim/sites", &[("name", name.to_owned())])
            .await?
        {
            return Ok(Some(site));
        }
        self.find_one("dcim/sites", &[("slug", slug.to_owned())]).await
    }

    pub async fn create_site(&self, name: &str, slug: &str) -> Result<NamedObject, Error> {
        self.post(
            "dcim/sites",
            &json!({ "name": name, "slug": slug, "status": "active" }),
        )
        .await
    }

    pub async fn find_manufacturer(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<Option<NamedObject>, Error> {
        if let Some(manu) = self
            .find_one("dcim/manufacturers", &[("name", name.to_owned())])
            .await?
        {
            return Ok(Some(manu));
        }
        self.find_one("dcim/manufacturers", &[("slug", slug.to_owned())])
            .await
    }

    pub async fn create_manufacturer(&self, name: &str, slug: &str) -> Result<NamedObject, Error> {
        self.post("dcim/manufacturers", &json!({ "name": name, "slug": slug }))
            .await
    }

    /// Device types are unique per manufacturer and model.
    pub async fn find_device_type(
        &self,
        model: &str,
        manufacturer_id: i64,
    ) -> Result<Option<DeviceType>, Error> {
        self.find_one(
            "dcim/device-types",
            &[
                ("model", model.to_owned()),
                ("manufacturer_id", manufacturer_id.to_string()),
            ],
        )
        .await
    }

    pub async fn create_device_type(
        &self,
        model: &str,
        slug: &str,
        manufacturer_id: i64,
    ) -> Result<DeviceType, Error> {
        self.post(
            "dcim/device-types",
            &json!({
                "model": model,
                "slug": slug,
                "manufacturer": manufacturer_id,
                "u_height": 1,
                "is_full_depth": true,
            }),
        )
        .await
    }

    pub async fn find_device_role(&self, name: &str) -> Result<Option<NamedObject>, Error> {
        self.find_one("dcim/device-roles", &[("name", name.to_owned())])
            .await
    }

    pub async fn create_device_role(&self, name: &str, slug: &str) -> Result<NamedObject, Error> {
        self.post(
            "dcim/device-roles",
            &json!({ "name": name, "slug": slug, "color": "00bcd4", "vm_role": false }),
        )
        .await
    }
}

/// Pull the most useful message out of a DRF error body.
///
/// Bodies are usually `{"detail": "..."}` or a field-keyed map of
/// validation messages; anything else is passed through truncated.
fn extract_error_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => {
            if let Some(serde_json::Value::String(detail)) = map.get("detail") {
                return detail.clone();
            }
            let mut parts: Vec<String> = Vec::new();
            for (field, value) in &map {
                match value {
                    serde_json::Value::String(s) => parts.push(format!("{field}: {s}")),
                    serde_json::Value::Array(items) => {
                        let joined: Vec<&str> =
                            items.iter().filter_map(|v| v.as_str()).collect();
                        if !joined.is_empty() {
                            parts.push(format!("{field}: {}", joined.join("; ")));
                        }
                    }
                    _ => {}
                }
            }
            if parts.is_empty() {
                truncated(body)
            } else {
                parts.join(", ")
            }
        }
        _ => truncated(body),
    }
}

fn truncated(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_owned()
    }
}
