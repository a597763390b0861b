// ── MAC address newtype ──
//
// The registry treats the MAC string as the cross-reference key between a
// source interface and its link-address object, so every MAC is normalized
// to one canonical form (uppercase, colon-separated) at the model boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The all-zero sentinel some node interfaces report instead of a real MAC.
const ZERO_MAC: &str = "00:00:00:00:00:00";

/// MAC address, normalized to uppercase colon-separated form
/// (`AA:BB:CC:DD:EE:FF`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddr(String);

impl MacAddr {
    /// Parse and normalize a MAC from colon- or dash-separated form.
    ///
    /// Returns `None` for anything that is not six hex octets -- callers
    /// drop such interfaces rather than guessing.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_uppercase().replace('-', ":");
        let octets: Vec<&str> = normalized.split(':').collect();
        if octets.len() != 6 {
            return None;
        }
        if octets
            .iter()
            .any(|o| o.len() != 2 || !o.chars().all(|c| c.is_ascii_hexdigit()))
        {
            return None;
        }
        Some(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for the `00:00:00:00:00:00` placeholder.
    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_MAC
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid MAC address: {s}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_case() {
        let mac = MacAddr::parse("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(mac.as_str(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn parses_dash_separated() {
        let mac = MacAddr::parse("aa-bb-cc-dd-ee-ff").unwrap();
        assert_eq!(mac.as_str(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn rejects_short_and_garbage_input() {
        assert!(MacAddr::parse("aa:bb:cc").is_none());
        assert!(MacAddr::parse("virtio").is_none());
        assert!(MacAddr::parse("zz:bb:cc:dd:ee:ff").is_none());
    }

    #[test]
    fn zero_sentinel() {
        assert!(MacAddr::parse("00:00:00:00:00:00").unwrap().is_zero());
        assert!(!MacAddr::parse("00:00:00:00:00:01").unwrap().is_zero());
    }
}
