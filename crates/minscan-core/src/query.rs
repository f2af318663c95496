//! Lexical classification of explorer search input.
//!
//! The rules are ordered and the first match wins:
//!
//! 1. ASCII digits only → block number
//! 2. `0x` + 64 hex digits → transaction hash
//! 3. `0x` + 40 hex digits → address
//! 4. anything else → invalid

use std::fmt;

use crate::types::{Address, BlockNumber, TxHash};

const TX_HASH_HEX_LEN: usize = 64;
const ADDRESS_HEX_LEN: usize = 40;

/// User input, trimmed once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    pub fn classify(&self) -> QueryKind {
        classify(&self.0)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    BlockNumber(BlockNumber),
    TxHash(TxHash),
    Address(Address),
    Invalid,
}

impl QueryKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BlockNumber(_) => "block",
            Self::TxHash(_) => "transaction",
            Self::Address(_) => "address",
            Self::Invalid => "invalid",
        }
    }
}

/// Classify an already-trimmed query string.
pub fn classify(input: &str) -> QueryKind {
    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        // A digit string too large for u64 cannot name a block.
        return match input.parse::<u64>() {
            Ok(n) => QueryKind::BlockNumber(BlockNumber(n)),
            Err(_) => QueryKind::Invalid,
        };
    }

    let Some(hex) = input.strip_prefix("0x") else {
        return QueryKind::Invalid;
    };
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return QueryKind::Invalid;
    }

    match hex.len() {
        TX_HASH_HEX_LEN => input
            .parse::<TxHash>()
            .map_or(QueryKind::Invalid, QueryKind::TxHash),
        ADDRESS_HEX_LEN => input
            .parse::<Address>()
            .map_or(QueryKind::Invalid, QueryKind::Address),
        _ => QueryKind::Invalid,
    }
}
