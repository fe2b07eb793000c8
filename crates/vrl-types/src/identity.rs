use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const ADDRESS_LEN: usize = 20;

/// Account address of a ledger submitter.
///
/// An `Identity` is derived deterministically from a label using BLAKE3 and
/// truncated to 20 bytes, the width of an account address. The same label
/// always produces the same identity. All writes from one identity are
/// funnelled through a single ordered queue.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity {
    address: [u8; ADDRESS_LEN],
}

impl Identity {
    /// Derive an identity from a human-readable label.
    pub fn derive(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"vrl-identity-v1:");
        hasher.update(label.as_bytes());
        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&hasher.finalize().as_bytes()[..ADDRESS_LEN]);
        Self { address }
    }

    /// Create from raw address bytes.
    pub fn from_raw(address: [u8; ADDRESS_LEN]) -> Self {
        Self { address }
    }

    /// The raw address bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.address
    }

    /// Full `0x`-prefixed hex address.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.address))
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("0x{}", hex::encode(&self.address[..4]))
    }

    /// Parse from a hex address, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != ADDRESS_LEN {
            return Err(TypeError::InvalidLength {
                expected: ADDRESS_LEN,
                actual: bytes.len(),
            });
        }
        let mut address = [0u8; ADDRESS_LEN];
        address.copy_from_slice(&bytes);
        Ok(Self { address })
    }
}

impl TryFrom<String> for Identity {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.to_hex()
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.short_id())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        assert_eq!(Identity::derive("fleet-writer"), Identity::derive("fleet-writer"));
        assert_ne!(Identity::derive("a"), Identity::derive("b"));
    }

    #[test]
    fn hex_roundtrip_with_and_without_prefix() {
        let id = Identity::derive("dealer");
        let hex = id.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 42);
        assert_eq!(Identity::from_hex(&hex).unwrap(), id);
        assert_eq!(Identity::from_hex(&hex[2..]).unwrap(), id);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = Identity::from_hex("0xabcd").unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 20, actual: 2 });
    }

    #[test]
    fn serializes_as_hex_string() {
        let id = Identity::from_raw([0xab; 20]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
        let parsed: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
