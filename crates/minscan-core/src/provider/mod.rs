//! Chain-data provider abstraction.
//!
//! Defines the [`ChainProvider`] trait and provides an Ethereum JSON-RPC
//! implementation ([`HttpProvider`]) plus a test mock (`mock::MockProvider`).

mod http_adapter;
#[cfg(test)]
pub mod mock;

pub use http_adapter::{HttpProvider, HttpProviderConfig};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{
    Address, AddressHistory, AddressQuery, Block, BlockNumber, TransactionRecord, TxHash,
};

/// The chain reads the explorer needs.
///
/// Implementations own authentication and response decoding. A lookup for
/// something that does not exist is `ProviderError::NotFound`; an address
/// with no history is an empty `AddressHistory`, not an error.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Number of the current chain head.
    async fn get_head_block_number(&self) -> Result<BlockNumber, ProviderError>;

    /// Fetch a block with its full transaction objects.
    async fn get_block_with_transactions(&self, number: BlockNumber)
        -> Result<Block, ProviderError>;

    async fn get_transaction_by_hash(&self, hash: TxHash)
        -> Result<TransactionRecord, ProviderError>;

    /// Fetch one page of transactions sent from or to `address`, newest first.
    async fn get_transactions_for_address(
        &self,
        address: Address,
        query: AddressQuery,
    ) -> Result<AddressHistory, ProviderError>;
}
