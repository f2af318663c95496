//! Turns a classified query into exactly one provider lookup and normalizes
//! the answer into a [`ResolutionResult`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{ProviderError, ResolveError};
use crate::provider::ChainProvider;
use crate::query::{Query, QueryKind};
use crate::types::{
    Address, AddressQuery, BlockLabel, BlockNumber, ResolutionResult, Timestamp, TxHash,
    ADDRESS_HISTORY_LIMIT,
};

/// Default upper bound on a single provider call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

pub struct Resolver {
    provider: Arc<dyn ChainProvider>,
    timeout: Duration,
}

impl Resolver {
    pub fn new(provider: Arc<dyn ChainProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Classify `query` and run the matching lookup. Invalid input fails
    /// without touching the provider.
    pub async fn resolve(&self, query: &Query) -> Result<ResolutionResult, ResolveError> {
        let kind = query.classify();
        info!(kind = kind.name(), query = %query, "resolving query");

        let result = match kind {
            QueryKind::BlockNumber(number) => self.resolve_block(number).await?,
            QueryKind::TxHash(hash) => self.resolve_transaction(hash).await?,
            QueryKind::Address(address) => self.resolve_address(address).await?,
            QueryKind::Invalid => return Err(ResolveError::InvalidQuery(query.to_string())),
        };
        Ok(result)
    }

    pub async fn resolve_block(
        &self,
        number: BlockNumber,
    ) -> Result<ResolutionResult, ProviderError> {
        let block = self
            .bounded(self.provider.get_block_with_transactions(number))
            .await?;
        debug!(
            block = %number,
            tx_count = block.transactions.len(),
            "fetched block"
        );

        Ok(ResolutionResult {
            block_label: Some(BlockLabel::Number(number)),
            timestamp: Timestamp::from_unix(block.timestamp),
            transactions: block.transactions,
        })
    }

    pub async fn resolve_transaction(
        &self,
        hash: TxHash,
    ) -> Result<ResolutionResult, ProviderError> {
        let tx = self
            .bounded(self.provider.get_transaction_by_hash(hash))
            .await?;

        Ok(ResolutionResult {
            block_label: tx.block_number.map(BlockLabel::Number),
            timestamp: Timestamp::NotAvailable,
            transactions: vec![tx],
        })
    }

    /// Only the first page of history is fetched; a continuation token from
    /// the provider is logged and not followed.
    pub async fn resolve_address(
        &self,
        address: Address,
    ) -> Result<ResolutionResult, ProviderError> {
        let history = self
            .bounded(
                self.provider
                    .get_transactions_for_address(
                        address,
                        AddressQuery::first_page(ADDRESS_HISTORY_LIMIT),
                    ),
            )
            .await?;
        if let Some(token) = &history.page_token {
            debug!(%address, page_token = %token, "address history truncated to first page");
        }

        Ok(ResolutionResult {
            block_label: Some(BlockLabel::Address),
            timestamp: Timestamp::NotAvailable,
            transactions: history.transactions,
        })
    }

    /// Resolve the current chain head block.
    pub async fn resolve_latest(&self) -> Result<ResolutionResult, ProviderError> {
        let head = self
            .bounded(self.provider.get_head_block_number())
            .await?;
        debug!(head = %head, "fetched chain head");
        self.resolve_block(head).await
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout))?
    }
}
