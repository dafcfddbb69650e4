//! Ledger amounts
//!
//! Amounts are counted in a ledger's smallest unit and routinely exceed
//! 64 bits worth of TOML integers (`10 * 10^18`), so they travel as decimal
//! strings. Use `#[serde(with = "summoner_core::types::amount")]` on fields.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

/// Amount in a ledger's smallest unit
pub type Amount = u128;

pub fn serialize<S>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&amount.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Amount, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(AmountVisitor)
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative integer or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(v as Amount)
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        u128::try_from(v).map_err(|_| E::custom(format!("negative amount: {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        parse_amount(v).map_err(|reason| E::custom(format!("invalid amount '{}': {}", v, reason)))
    }
}

/// Decimal digits, optionally grouped by single underscores between digits
/// (`10_000`). Signs, empty groups and other characters are rejected.
fn parse_amount(v: &str) -> Result<Amount, String> {
    if v.is_empty() {
        return Err("empty".to_string());
    }
    let mut digits = String::with_capacity(v.len());
    for group in v.split('_') {
        if group.is_empty() {
            return Err("misplaced '_' separator".to_string());
        }
        if !group.bytes().all(|b| b.is_ascii_digit()) {
            return Err("expected decimal digits".to_string());
        }
        digits.push_str(group);
    }
    digits.parse::<u128>().map_err(|e| e.to_string())
}
