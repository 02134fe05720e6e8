//! Wallet address as reported by a provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// An opaque provider-issued account identifier (e.g. `0x9a2b...` or a principal).
///
/// The core never interprets the contents; it only requires a non-empty token
/// without whitespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Validate and wrap a raw address string.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TypesError::EmptyAddress);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(TypesError::MalformedAddress(s));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Return the raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for compact display: first six and last four characters.
    pub fn abbreviated(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 10 {
            return self.0.clone();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WalletAddress {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = TypesError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<WalletAddress> for String {
    fn from(addr: WalletAddress) -> Self {
        addr.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_surrounding_whitespace() {
        let addr = WalletAddress::parse("  0x9a2b  ").unwrap();
        assert_eq!(addr.as_str(), "0x9a2b");
    }

    #[test]
    fn empty_and_blank_are_rejected() {
        assert_eq!(WalletAddress::parse(""), Err(TypesError::EmptyAddress));
        assert_eq!(WalletAddress::parse("   "), Err(TypesError::EmptyAddress));
    }

    #[test]
    fn inner_whitespace_is_rejected() {
        assert!(matches!(
            WalletAddress::parse("0x9a 2b"),
            Err(TypesError::MalformedAddress(_))
        ));
    }

    #[test]
    fn abbreviated_keeps_head_and_tail() {
        let addr = WalletAddress::parse("0x1234567890abcdef").unwrap();
        assert_eq!(addr.abbreviated(), "0x1234...cdef");

        let short = WalletAddress::parse("0x9a2b").unwrap();
        assert_eq!(short.abbreviated(), "0x9a2b");
    }

    #[test]
    fn deserialize_rejects_empty_address() {
        let ok: WalletAddress = serde_json::from_str("\"0xf8d6e0586b0a20c7\"").unwrap();
        assert_eq!(ok.as_str(), "0xf8d6e0586b0a20c7");
        assert!(serde_json::from_str::<WalletAddress>("\"\"").is_err());
    }
}
