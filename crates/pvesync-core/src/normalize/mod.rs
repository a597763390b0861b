// ── Inventory normalizer ──
//
// Turns the source's raw key/value configuration bags into the typed
// snapshot model. Pure and stateless: all I/O happens in the adapters,
// all parsing happens here, exactly once per pass.

pub mod disks;
pub mod guest;
pub mod nets;
pub mod node;
pub mod size;

pub use guest::guest_from_config;
pub use node::{merge_link_report, node_from_api, parse_link_report};
pub use size::parse_size_mb;

use pvesync_api::proxmox::models::RawGuestConfig;

/// Read a config value as a string slice, whatever JSON type it arrived as.
pub(crate) fn cfg_str<'a>(config: &'a RawGuestConfig, key: &str) -> Option<&'a str> {
    config.get(key).and_then(serde_json::Value::as_str)
}

/// Read a config value as an unsigned integer, accepting numeric strings.
pub(crate) fn cfg_u64(config: &RawGuestConfig, key: &str) -> Option<u64> {
    match config.get(key)? {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a 0/1 flag, accepting both numeric and string forms.
pub(crate) fn cfg_flag(config: &RawGuestConfig, key: &str) -> bool {
    cfg_u64(config, key).is_some_and(|v| v != 0)
}

/// Split a `key=value,key=value` option string into a map, ignoring
/// tokens without an `=`.
pub(crate) fn parse_options(raw: &str) -> std::collections::HashMap<String, String> {
    raw.split(',')
        .filter_map(|part| {
            part.split_once('=')
                .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        })
        .collect()
}
