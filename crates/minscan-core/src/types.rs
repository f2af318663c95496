//! Domain types shared by the provider, resolver and view layers.
//!
//! Transactions are normalized into [`TransactionRecord`] no matter which
//! lookup produced them, so the view layer only ever deals with one shape.

use std::fmt;

use chrono::{Local, TimeZone};
use serde::{Serialize, Serializer};

pub use alloy_primitives::{Address, B256, U256};

/// A 32-byte transaction hash.
pub type TxHash = B256;

/// Maximum number of address-history records requested from the provider.
pub const ADDRESS_HISTORY_LIMIT: u32 = 100;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==============================================================================
// Block Number
// ==============================================================================

/// An Ethereum block number, serialized as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BlockNumber(pub u64);

impl From<u64> for BlockNumber {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl From<BlockNumber> for u64 {
    fn from(n: BlockNumber) -> Self {
        n.0
    }
}

impl BlockNumber {
    /// JSON-RPC quantity encoding (`0x`-prefixed, no leading zeros).
    pub fn to_quantity(self) -> String {
        format!("{:#x}", self.0)
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ==============================================================================
// Transactions
// ==============================================================================

/// A single on-chain transaction as returned by the provider.
///
/// Fields the explorer does not interpret are kept verbatim in `extra` so the
/// detail view can show everything the provider sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub hash: TxHash,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    /// Value in wei.
    pub value: U256,
    pub block_number: Option<BlockNumber>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A block together with its full transaction list.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub number: BlockNumber,
    /// Unix seconds.
    pub timestamp: u64,
    pub transactions: Vec<TransactionRecord>,
}

/// Paging parameters for an address-history lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressQuery {
    pub page_token: Option<String>,
    pub max_count: u32,
}

impl AddressQuery {
    /// The first page, up to `max_count` records.
    pub fn first_page(max_count: u32) -> Self {
        Self {
            page_token: None,
            max_count,
        }
    }
}

/// One page of address history. `page_token` is the provider's continuation
/// token, present when more records exist.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AddressHistory {
    pub transactions: Vec<TransactionRecord>,
    pub page_token: Option<String>,
}

// ==============================================================================
// Resolution Result
// ==============================================================================

/// What the "block" slot of a result shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLabel {
    Number(BlockNumber),
    /// Sentinel for address lookups, rendered as `"Address"`.
    Address,
}

impl fmt::Display for BlockLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => n.fmt(f),
            Self::Address => f.write_str("Address"),
        }
    }
}

impl Serialize for BlockLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(n) => n.serialize(serializer),
            Self::Address => serializer.serialize_str("Address"),
        }
    }
}

/// A formatted block time, or the `"N/A"` sentinel when the lookup has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    Formatted(String),
    NotAvailable,
}

impl Timestamp {
    /// Format unix seconds as local date/time.
    pub fn from_unix(secs: u64) -> Self {
        Self::from_unix_in(secs, &Local)
    }

    /// Format unix seconds in the given time zone. Out-of-range values are
    /// `NotAvailable`.
    pub fn from_unix_in<Tz>(secs: u64, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let Ok(secs) = i64::try_from(secs) else {
            return Self::NotAvailable;
        };
        match tz.timestamp_opt(secs, 0).single() {
            Some(dt) => Self::Formatted(dt.format(TIMESTAMP_FORMAT).to_string()),
            None => Self::NotAvailable,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Formatted(s) => s,
            Self::NotAvailable => "N/A",
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Normalized output of a successful resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    pub block_label: Option<BlockLabel>,
    pub timestamp: Timestamp,
    pub transactions: Vec<TransactionRecord>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn block_number_quantity_has_no_leading_zeros() {
        assert_eq!(BlockNumber(0).to_quantity(), "0x0");
        assert_eq!(BlockNumber(18_000_000).to_quantity(), "0x112a880");
    }

    #[test]
    fn timestamp_formats_in_given_zone() {
        let ts = Timestamp::from_unix_in(1_700_000_000, &Utc);
        assert_eq!(ts.as_str(), "2023-11-14 22:13:20");
    }

    #[test]
    fn timestamp_out_of_range_is_not_available() {
        assert_eq!(Timestamp::from_unix(u64::MAX), Timestamp::NotAvailable);
    }

    #[test]
    fn labels_serialize_as_bare_values() {
        assert_eq!(
            serde_json::to_value(BlockLabel::Number(BlockNumber(7))).expect("serialize"),
            serde_json::json!(7)
        );
        assert_eq!(
            serde_json::to_value(BlockLabel::Address).expect("serialize"),
            serde_json::json!("Address")
        );
        assert_eq!(
            serde_json::to_value(Timestamp::NotAvailable).expect("serialize"),
            serde_json::json!("N/A")
        );
    }

    #[test]
    fn transaction_record_flattens_extra_fields() {
        let mut extra = serde_json::Map::new();
        extra.insert("nonce".into(), serde_json::json!("0x1"));
        let tx = TransactionRecord {
            hash: B256::repeat_byte(0xaa),
            from: Address::repeat_byte(0x11),
            to: None,
            value: U256::from(5u64),
            block_number: Some(BlockNumber(1)),
            extra,
        };

        let json = serde_json::to_value(&tx).expect("serialize");
        assert_eq!(json.get("nonce"), Some(&serde_json::json!("0x1")));
        assert_eq!(json.get("to"), Some(&serde_json::Value::Null));
        assert_eq!(json.get("block_number"), Some(&serde_json::json!(1)));
    }
}
