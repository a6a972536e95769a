//! Ethereum address type.
//!
//! Addresses are held as raw 20-byte values and rendered as lowercase
//! `0x`-prefixed hex. Parsing accepts either case so checksummed input from
//! relayers round-trips to the same value.

use std::fmt;
use std::str::FromStr;

use cosmwasm_std::{StdError, StdResult};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 20-byte Ethereum account or contract address
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EthAddress([u8; 20]);

impl EthAddress {
    /// The all-zero address, never a valid signer or token contract
    pub const ZERO: EthAddress = EthAddress([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Build from a byte slice that must be exactly 20 bytes long
    pub fn from_slice(bytes: &[u8]) -> StdResult<Self> {
        let raw: [u8; 20] = bytes.try_into().map_err(|_| {
            StdError::generic_err(format!(
                "Invalid Ethereum address length: expected 20 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    /// Parse a `0x`-prefixed 40 character hex string
    pub fn parse(s: &str) -> StdResult<Self> {
        let hex_str = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| StdError::generic_err(format!("Ethereum address missing 0x prefix: {s}")))?;
        if hex_str.len() != 40 {
            return Err(StdError::generic_err(format!(
                "Invalid Ethereum address length: expected 40 hex characters, got {}",
                hex_str.len()
            )));
        }
        let bytes = hex::decode(hex_str)
            .map_err(|e| StdError::generic_err(format!("Invalid Ethereum address {s}: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Left-pad to a 32-byte ABI word
    pub fn to_bytes32(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EthAddress({self})")
    }
}

impl FromStr for EthAddress {
    type Err = StdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; 20]> for EthAddress {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Serialize for EthAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

impl JsonSchema for EthAddress {
    fn schema_name() -> String {
        "EthAddress".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_case() {
        let checksummed = EthAddress::parse("0x835973768750b3ED2D5c3EF5AdcD5eDb44d12aD4").unwrap();
        let lower = EthAddress::parse("0x835973768750b3ed2d5c3ef5adcd5edb44d12ad4").unwrap();
        assert_eq!(checksummed, lower);
        assert_eq!(
            checksummed.to_string(),
            "0x835973768750b3ed2d5c3ef5adcd5edb44d12ad4"
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(EthAddress::parse("835973768750b3ed2d5c3ef5adcd5edb44d12ad4").is_err());
        assert!(EthAddress::parse("0x1234").is_err());
        assert!(EthAddress::parse("0xzz5973768750b3ed2d5c3ef5adcd5edb44d12ad4").is_err());
    }

    #[test]
    fn test_to_bytes32_left_pads() {
        let addr = EthAddress::new([0xAB; 20]);
        let word = addr.to_bytes32();
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], &[0xAB; 20]);
    }

    #[test]
    fn test_json_is_hex_string() {
        let addr = EthAddress::new([0x11; 20]);
        let json = cosmwasm_std::to_json_string(&addr).unwrap();
        assert_eq!(json, "\"0x1111111111111111111111111111111111111111\"");
        let back: EthAddress = cosmwasm_std::from_json(json.as_bytes()).unwrap();
        assert_eq!(back, addr);
    }
}
