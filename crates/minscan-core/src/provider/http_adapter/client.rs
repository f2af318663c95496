use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{header, Url};
use serde_json::json;
use tracing::{debug, trace, warn};

use crate::error::ProviderError;
use crate::types::{
    Address, AddressHistory, AddressQuery, Block, BlockNumber, TransactionRecord, TxHash,
};

use super::super::ChainProvider;
use super::connection::{build_endpoint, redacted};
use super::parsing::{
    merge_address_history, parse_block, parse_quantity, parse_transaction, parse_transfers_result,
};
use super::protocol::{JsonRpcRequest, JsonRpcResponse};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Connection settings for [`HttpProvider`].
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// `http://...` or `https://...` JSON-RPC endpoint.
    pub url: String,
    /// Appended to the URL path when set.
    pub api_key: Option<String>,
    /// Outbound request cap; batched calls count as one request.
    pub requests_per_second: Option<u32>,
    pub request_timeout: Duration,
}

impl HttpProviderConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            requests_per_second: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Ethereum JSON-RPC client over HTTP(S).
///
/// Address history uses Alchemy's `alchemy_getAssetTransfers`, so that lookup
/// needs an Alchemy-compatible endpoint; the other lookups are plain `eth_*`.
pub struct HttpProvider {
    client: reqwest::Client,
    url: Url,
    limiter: Option<DirectRateLimiter>,
    next_id: AtomicU64,
}

impl HttpProvider {
    pub fn new(config: &HttpProviderConfig) -> Result<Self, ProviderError> {
        let url = build_endpoint(&config.url, config.api_key.as_deref())?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()?;

        let limiter = match config.requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    ProviderError::Config("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            client,
            url,
            limiter,
            next_id: AtomicU64::new(initial_request_id()),
        })
    }

    /// The endpoint without its credential path, for logs and messages.
    pub fn endpoint(&self) -> String {
        redacted(&self.url)
    }

    /// Atomically reserve `count` consecutive request IDs for batch calls.
    fn reserve_request_ids(&self, count: u64) -> u64 {
        self.next_id.fetch_add(count, Ordering::Relaxed)
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    async fn post_body(
        &self,
        payload: &impl serde::Serialize,
    ) -> Result<(reqwest::StatusCode, String), ProviderError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn rpc_call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, ProviderError> {
        self.wait_for_rate_limit().await;
        let id = self.reserve_request_ids(1);
        debug!(
            rpc.id = id,
            rpc.method = method,
            rpc.params = params.len(),
            "rpc call"
        );
        let req = JsonRpcRequest::new(id, method, &params);

        let (status, body) = self.post_body(&req).await?;
        debug!(rpc.id = id, rpc.method = method, %status, body_len = body.len(), "rpc response");
        trace!(rpc.id = id, rpc.method = method, body = %body, "rpc response body");

        let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "decode JSON-RPC response (HTTP {status}): {e}; body={body}"
            ))
        })?;

        decoded.into_result()
    }

    /// Send `calls` as one batch. The outer error covers the envelope (transport,
    /// undecodable or incomplete batch); each inner result is that call's own
    /// JSON-RPC outcome, in request order.
    async fn rpc_batch(
        &self,
        calls: &[(&str, Vec<serde_json::Value>)],
    ) -> Result<Vec<Result<serde_json::Value, ProviderError>>, ProviderError> {
        self.wait_for_rate_limit().await;
        let start_id = self.reserve_request_ids(calls.len() as u64);
        debug!(
            rpc.batch_start_id = start_id,
            rpc.batch_size = calls.len(),
            "rpc batch call"
        );
        let requests: Vec<JsonRpcRequest<'_>> = calls
            .iter()
            .zip(start_id..)
            .map(|((method, params), id)| JsonRpcRequest::new(id, method, params))
            .collect();

        let (status, body) = self.post_body(&requests).await?;
        debug!(
            rpc.batch_start_id = start_id,
            rpc.batch_size = calls.len(),
            %status,
            body_len = body.len(),
            "rpc batch response"
        );
        trace!(
            rpc.batch_start_id = start_id,
            rpc.batch_size = calls.len(),
            body = %body,
            "rpc batch response body"
        );

        let decoded: Vec<JsonRpcResponse> = serde_json::from_str(&body).map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "decode JSON-RPC batch response (HTTP {status}): {e}; body={body}"
            ))
        })?;

        let mut by_id: HashMap<u64, JsonRpcResponse> = HashMap::with_capacity(decoded.len());
        for item in decoded {
            by_id.insert(item.batch_id()?, item);
        }

        let mut ordered = Vec::with_capacity(calls.len());
        for id in start_id..(start_id + calls.len() as u64) {
            let item = by_id.remove(&id).ok_or_else(|| {
                ProviderError::InvalidResponse(format!("batch response missing id {id}"))
            })?;
            ordered.push(item.into_result());
        }

        Ok(ordered)
    }
}

#[async_trait]
impl ChainProvider for HttpProvider {
    async fn get_head_block_number(&self) -> Result<BlockNumber, ProviderError> {
        let raw = self.rpc_call("eth_blockNumber", Vec::new()).await?;
        parse_quantity(Some(&raw), "eth_blockNumber result").map(BlockNumber)
    }

    async fn get_block_with_transactions(
        &self,
        number: BlockNumber,
    ) -> Result<Block, ProviderError> {
        let raw = self
            .rpc_call(
                "eth_getBlockByNumber",
                vec![json!(number.to_quantity()), json!(true)],
            )
            .await?;
        if raw.is_null() {
            return Err(ProviderError::not_found("block", number));
        }
        parse_block(raw)
    }

    async fn get_transaction_by_hash(
        &self,
        hash: TxHash,
    ) -> Result<TransactionRecord, ProviderError> {
        let raw = self
            .rpc_call("eth_getTransactionByHash", vec![json!(hash)])
            .await?;
        if raw.is_null() {
            return Err(ProviderError::not_found("transaction", hash));
        }
        parse_transaction(raw)
    }

    async fn get_transactions_for_address(
        &self,
        address: Address,
        query: AddressQuery,
    ) -> Result<AddressHistory, ProviderError> {
        let calls = [
            (
                "alchemy_getAssetTransfers",
                vec![transfer_params("fromAddress", address, &query)],
            ),
            (
                "alchemy_getAssetTransfers",
                vec![transfer_params("toAddress", address, &query)],
            ),
        ];

        // Only a batch the endpoint could not answer as a batch is retried
        // call by call; a per-item JSON-RPC error is final.
        let raw_results = match self.rpc_batch(&calls).await {
            Ok(results) => results.into_iter().collect::<Result<Vec<_>, _>>()?,
            Err(batch_error @ ProviderError::InvalidResponse(_)) => {
                warn!(
                    %address,
                    error = %batch_error,
                    "batch alchemy_getAssetTransfers failed; falling back to sequential requests"
                );
                let mut sequential = Vec::with_capacity(calls.len());
                for (method, params) in &calls {
                    sequential.push(self.rpc_call(method, params.clone()).await?);
                }
                sequential
            }
            Err(err) => return Err(err),
        };

        let mut results = raw_results.into_iter();
        let (outgoing, outgoing_key) =
            parse_transfers_result(results.next().unwrap_or_default())?;
        let (incoming, incoming_key) =
            parse_transfers_result(results.next().unwrap_or_default())?;

        Ok(AddressHistory {
            transactions: merge_address_history(outgoing, incoming, query.max_count as usize),
            page_token: outgoing_key.or(incoming_key),
        })
    }
}

fn transfer_params(direction: &str, address: Address, query: &AddressQuery) -> serde_json::Value {
    let mut params = json!({
        "fromBlock": "0x0",
        "toBlock": "latest",
        "category": ["external"],
        "order": "desc",
        "withMetadata": false,
        "excludeZeroValue": false,
        "maxCount": format!("{:#x}", query.max_count),
    });
    params[direction] = json!(address);
    if let Some(page_key) = &query.page_token {
        params["pageKey"] = json!(page_key);
    }
    params
}

fn initial_request_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}
