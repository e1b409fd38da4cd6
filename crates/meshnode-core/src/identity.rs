//! Node identities.
//!
//! A node is identified by a 33-byte compressed public key, carried around as
//! a lowercase hex string on the wire and in configuration files.

use crate::error::{NodeError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of an encoded identity in bytes.
pub const IDENTITY_LEN: usize = 33;

/// Public key identifying a node on the mesh.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity([u8; IDENTITY_LEN]);

impl Identity {
    /// The all-zero identity, used where an identity could not be resolved.
    pub const NULL: Identity = Identity([0u8; IDENTITY_LEN]);

    pub fn from_bytes(bytes: [u8; IDENTITY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random identity with a compressed-key prefix.
    pub fn generate() -> Self {
        let body: [u8; 32] = rand::random();
        let mut bytes = [0u8; IDENTITY_LEN];
        bytes[0] = 0x02;
        bytes[1..].copy_from_slice(&body);
        Self(bytes)
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn as_bytes(&self) -> &[u8; IDENTITY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::NULL
    }
}

impl FromStr for Identity {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self> {
        let raw = hex::decode(s)
            .map_err(|e| NodeError::invalid(format!("identity is not valid hex: {}", e)))?;
        let bytes: [u8; IDENTITY_LEN] = raw.try_into().map_err(|raw: Vec<u8>| {
            NodeError::invalid(format!(
                "identity must be {} bytes, got {}",
                IDENTITY_LEN,
                raw.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.to_hex())
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
