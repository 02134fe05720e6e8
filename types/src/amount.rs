//! Fixed-point token amounts.
//!
//! Amounts are represented as integers of the smallest unit (10^-8 of a token)
//! to avoid floating-point errors. They parse from and print as decimal strings.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// A non-negative token amount with eight fractional digits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    /// Number of fractional decimal digits.
    pub const DECIMALS: u32 = 8;

    /// Smallest units per whole token.
    pub const UNIT: u128 = 10u128.pow(Self::DECIMALS);

    pub fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// An amount of whole tokens.
    pub fn from_whole(tokens: u64) -> Self {
        Self(u128::from(tokens) * Self::UNIT)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    fn invalid(input: &str, reason: &'static str) -> TypesError {
        TypesError::InvalidAmount {
            input: input.to_string(),
            reason,
        }
    }
}

impl FromStr for TokenAmount {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(Self::invalid(s, "empty"));
        }
        if input.starts_with('-') {
            return Err(Self::invalid(s, "negative"));
        }

        let (whole, frac) = match input.split_once('.') {
            Some((w, f)) => (w, f),
            None => (input, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(Self::invalid(s, "no digits"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(Self::invalid(s, "not a decimal number"));
        }
        if frac.len() > Self::DECIMALS as usize {
            return Err(Self::invalid(s, "more than 8 fractional digits"));
        }

        let whole_units = if whole.is_empty() {
            0
        } else {
            whole
                .parse::<u128>()
                .map_err(|_| Self::invalid(s, "out of range"))?
        };
        let frac_units = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<width$}", width = Self::DECIMALS as usize);
            padded
                .parse::<u128>()
                .map_err(|_| Self::invalid(s, "out of range"))?
        };

        whole_units
            .checked_mul(Self::UNIT)
            .and_then(|w| w.checked_add(frac_units))
            .map(Self)
            .ok_or_else(|| Self::invalid(s, "out of range"))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::UNIT;
        let frac = self.0 % Self::UNIT;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:0>width$}", width = Self::DECIMALS as usize);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct TokenAmountVisitor;

impl<'de> Visitor<'de> for TokenAmountVisitor {
    type Value = TokenAmount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative decimal amount")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(TokenAmount::from_whole(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(TokenAmount::from_whole)
            .map_err(|_| E::custom("amount must not be negative"))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(E::custom("amount must be finite"));
        }
        self.visit_str(&v.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TokenAmountVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional() {
        assert_eq!("10".parse::<TokenAmount>().unwrap(), TokenAmount::from_whole(10));
        assert_eq!(
            "2.45".parse::<TokenAmount>().unwrap(),
            TokenAmount::from_raw(245_000_000)
        );
        assert_eq!(".5".parse::<TokenAmount>().unwrap(), TokenAmount::from_raw(50_000_000));
        assert_eq!("0.00735".parse::<TokenAmount>().unwrap().to_string(), "0.00735");
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", ".", "-1", "1.2.3", "abc", "1e5", "0.000000001"] {
            assert!(bad.parse::<TokenAmount>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(TokenAmount::from_raw(10_000_000).to_string(), "0.1");
        assert_eq!(TokenAmount::from_whole(50).to_string(), "50");
        assert_eq!(TokenAmount::ZERO.to_string(), "0");
    }

    #[test]
    fn deserializes_from_toml_numbers_and_strings() {
        #[derive(Deserialize)]
        struct Row {
            a: TokenAmount,
            b: TokenAmount,
            c: TokenAmount,
        }
        let row: Row = toml::from_str("a = 0.1\nb = 50\nc = \"2.45\"").unwrap();
        assert_eq!(row.a, TokenAmount::from_raw(10_000_000));
        assert_eq!(row.b, TokenAmount::from_whole(50));
        assert_eq!(row.c, TokenAmount::from_raw(245_000_000));
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&TokenAmount::from_raw(245_000_000)).unwrap();
        assert_eq!(json, "\"2.45\"");
    }
}
