use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::types::{Address, Block, BlockNumber, TransactionRecord, TxHash, U256};

fn invalid(message: String) -> ProviderError {
    ProviderError::InvalidResponse(message)
}

// ==============================================================================
// Scalar Fields
// ==============================================================================

/// Parse a JSON-RPC quantity (`"0x1b4"`). Plain JSON integers are accepted too.
pub(super) fn parse_quantity(value: Option<&Value>, field: &str) -> Result<u64, ProviderError> {
    match value {
        Some(Value::String(s)) => {
            let digits = strip_hex_prefix(s, field)?;
            u64::from_str_radix(digits, 16)
                .map_err(|e| invalid(format!("invalid {field} `{s}`: {e}")))
        }
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| invalid(format!("{field} out of range: {n}"))),
        Some(Value::Null) | None => Err(invalid(format!("missing {field}"))),
        Some(other) => Err(invalid(format!("invalid {field}: {other}"))),
    }
}

pub(super) fn parse_opt_quantity(
    value: Option<&Value>,
    field: &str,
) -> Result<Option<u64>, ProviderError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(_) => parse_quantity(value, field).map(Some),
    }
}

pub(super) fn parse_u256(value: Option<&Value>, field: &str) -> Result<U256, ProviderError> {
    match value {
        Some(Value::String(s)) => {
            let digits = strip_hex_prefix(s, field)?;
            U256::from_str_radix(digits, 16)
                .map_err(|e| invalid(format!("invalid {field} `{s}`: {e}")))
        }
        Some(Value::Number(n)) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| invalid(format!("invalid {field}: {n}"))),
        Some(Value::Null) | None => Err(invalid(format!("missing {field}"))),
        Some(other) => Err(invalid(format!("invalid {field}: {other}"))),
    }
}

pub(super) fn parse_hash(value: Option<&Value>, field: &str) -> Result<TxHash, ProviderError> {
    let s = value
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("missing {field}")))?;
    s.parse()
        .map_err(|e| invalid(format!("invalid {field} `{s}`: {e}")))
}

pub(super) fn parse_address(value: Option<&Value>, field: &str) -> Result<Address, ProviderError> {
    let s = value
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(format!("missing {field}")))?;
    s.parse()
        .map_err(|e| invalid(format!("invalid {field} `{s}`: {e}")))
}

pub(super) fn parse_opt_address(
    value: Option<&Value>,
    field: &str,
) -> Result<Option<Address>, ProviderError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(_) => parse_address(value, field).map(Some),
    }
}

fn strip_hex_prefix<'a>(s: &'a str, field: &str) -> Result<&'a str, ProviderError> {
    match s.strip_prefix("0x") {
        Some(digits) if !digits.is_empty() => Ok(digits),
        _ => Err(invalid(format!("invalid {field} `{s}`: expected 0x-prefixed hex"))),
    }
}

// ==============================================================================
// Transactions and Blocks
// ==============================================================================

fn into_object(raw: Value, what: &str) -> Result<Map<String, Value>, ProviderError> {
    match raw {
        Value::Object(fields) => Ok(fields),
        other => Err(invalid(format!("{what} is not a JSON object: {other}"))),
    }
}

/// Parse an `eth_getTransactionByHash` / hydrated block transaction object.
/// Fields not lifted into the record stay in `extra`.
pub(super) fn parse_transaction(raw: Value) -> Result<TransactionRecord, ProviderError> {
    let mut fields = into_object(raw, "transaction")?;

    let hash = parse_hash(fields.remove("hash").as_ref(), "hash")?;
    let from = parse_address(fields.remove("from").as_ref(), "from")?;
    let to = parse_opt_address(fields.remove("to").as_ref(), "to")?;
    let value = parse_u256(fields.remove("value").as_ref(), "value")?;
    let block_number =
        parse_opt_quantity(fields.remove("blockNumber").as_ref(), "blockNumber")?.map(BlockNumber);

    Ok(TransactionRecord {
        hash,
        from,
        to,
        value,
        block_number,
        extra: fields,
    })
}

/// Parse an `eth_getBlockByNumber(n, true)` result.
pub(super) fn parse_block(raw: Value) -> Result<Block, ProviderError> {
    let mut fields = into_object(raw, "block")?;

    let number = parse_quantity(fields.get("number"), "number").map(BlockNumber)?;
    let timestamp = parse_quantity(fields.get("timestamp"), "timestamp")?;
    let transactions = match fields.remove("transactions") {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| {
                if item.is_string() {
                    return Err(invalid(
                        "block transactions are hashes; expected full objects".to_owned(),
                    ));
                }
                parse_transaction(item)
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => return Err(invalid(format!("invalid transactions: {other}"))),
    };

    Ok(Block {
        number,
        timestamp,
        transactions,
    })
}

// ==============================================================================
// Address History (alchemy_getAssetTransfers)
// ==============================================================================

/// Parse one transfer into a transaction record. The wei value comes from
/// `rawContract.value`; the decimal `value` is dropped because it would
/// collide with the record's own `value` field.
pub(super) fn parse_transfer(raw: Value) -> Result<TransactionRecord, ProviderError> {
    let mut fields = into_object(raw, "transfer")?;

    let hash = parse_hash(fields.remove("hash").as_ref(), "hash")?;
    let from = parse_address(fields.remove("from").as_ref(), "from")?;
    let to = parse_opt_address(fields.remove("to").as_ref(), "to")?;
    let value = parse_u256(
        fields
            .get("rawContract")
            .and_then(|contract| contract.get("value")),
        "rawContract.value",
    )?;
    let block_number =
        parse_opt_quantity(fields.remove("blockNum").as_ref(), "blockNum")?.map(BlockNumber);
    fields.remove("value");

    Ok(TransactionRecord {
        hash,
        from,
        to,
        value,
        block_number,
        extra: fields,
    })
}

/// A parsed `alchemy_getAssetTransfers` result: the transfers plus `pageKey`.
pub(super) fn parse_transfers_result(
    raw: Value,
) -> Result<(Vec<TransactionRecord>, Option<String>), ProviderError> {
    let mut fields = into_object(raw, "asset transfers result")?;

    let page_key = match fields.remove("pageKey") {
        Some(Value::String(key)) if !key.is_empty() => Some(key),
        _ => None,
    };
    let transfers = match fields.remove("transfers") {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(parse_transfer)
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => return Err(invalid(format!("invalid transfers: {other}"))),
    };

    Ok((transfers, page_key))
}

/// Merge outgoing and incoming transfers newest first, dropping repeated
/// hashes (self-transfers appear in both lists) and keeping at most
/// `max_count` records.
pub(super) fn merge_address_history(
    outgoing: Vec<TransactionRecord>,
    incoming: Vec<TransactionRecord>,
    max_count: usize,
) -> Vec<TransactionRecord> {
    let mut merged: Vec<TransactionRecord> = outgoing.into_iter().chain(incoming).collect();
    // Stable sort; pending (no block) sorts first.
    merged.sort_by(|a, b| {
        let a = a.block_number.map_or(u64::MAX, u64::from);
        let b = b.block_number.map_or(u64::MAX, u64::from);
        b.cmp(&a)
    });

    let mut seen = HashSet::with_capacity(merged.len());
    merged.retain(|tx| seen.insert(tx.hash));
    merged.truncate(max_count);
    merged
}
