// ── Device identity ──
//
// DeviceIdentity is the dedup key for every record in the pipeline.
// It wraps the hardware address reported by the radio and is compared
// case-insensitively by normalizing once at construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable hardware address of a nearby device, normalized to lowercase
/// colon-separated form (`aa:bb:cc:dd:ee:ff`).
///
/// Two identities built from `"AA:BB:CC:DD:EE:FF"` and `"aa-bb-cc-dd-ee-ff"`
/// compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// Create a normalized identity from any common address format.
    /// Accepts colon-separated, dash-separated, or bare hex.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw.as_ref().trim().to_lowercase().replace('-', ":");
        if normalized.len() == 12 && normalized.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Self(colon_pairs(&normalized));
        }
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `aabbccddeeff` -> `aa:bb:cc:dd:ee:ff`.
fn colon_pairs(hex: &str) -> String {
    let chars: Vec<char> = hex.chars().collect();
    chars
        .chunks(2)
        .map(|pair| pair.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(":")
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceIdentity {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for DeviceIdentity {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for DeviceIdentity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<DeviceIdentity> for String {
    fn from(id: DeviceIdentity) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identity_normalizes_dashes() {
        let id = DeviceIdentity::new("AA-BB-CC-DD-EE-FF");
        assert_eq!(id.as_str(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn identity_normalizes_bare_hex() {
        let colon = DeviceIdentity::new("AA:BB:CC:DD:EE:FF");
        assert_eq!(DeviceIdentity::new("aabbccddeeff"), colon);
        assert_eq!(DeviceIdentity::new(" AABBCCDDEEFF "), colon);
        // Short or non-hex strings are left alone.
        assert_eq!(DeviceIdentity::new("aabbcc").as_str(), "aabbcc");
        assert_eq!(DeviceIdentity::new("tile-tracker").as_str(), "tile:tracker");
    }

    #[test]
    fn identity_normalizes_case() {
        let id = DeviceIdentity::new("AA:BB:CC:DD:EE:FF");
        assert_eq!(id.as_str(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn identity_compares_case_insensitively() {
        let mut set = HashSet::new();
        set.insert(DeviceIdentity::new("AA:BB:CC:DD:EE:FF"));
        assert!(set.contains(&DeviceIdentity::new("aa:bb:cc:dd:ee:ff")));
        assert!(!set.insert(DeviceIdentity::new(" aa-bb-cc-dd-ee-ff ")));
    }

    #[test]
    fn identity_from_str() {
        let id: DeviceIdentity = "AA-BB-CC-DD-EE-FF".parse().unwrap();
        assert_eq!(id.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn identity_deserializes_normalized() {
        let id: DeviceIdentity = serde_json::from_str("\"AA:BB:CC:00:11:22\"").unwrap();
        assert_eq!(id.as_str(), "aa:bb:cc:00:11:22");
    }
}
