use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{
    Address, AddressHistory, AddressQuery, Block, BlockNumber, TransactionRecord, TxHash,
};

use super::ChainProvider;

/// A mock chain provider for testing. Returns canned data populated via the
/// builder pattern and counts every call it receives.
pub struct MockProvider {
    head: BlockNumber,
    blocks: HashMap<BlockNumber, Block>,
    transactions: HashMap<TxHash, TransactionRecord>,
    histories: HashMap<Address, AddressHistory>,
    failing: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
    address_queries: std::sync::Mutex<Vec<AddressQuery>>,
}

impl MockProvider {
    pub fn builder() -> MockProviderBuilder {
        MockProviderBuilder {
            head: BlockNumber(0),
            blocks: HashMap::new(),
            transactions: HashMap::new(),
            histories: HashMap::new(),
            failing: false,
            delay: None,
        }
    }

    /// Total number of provider calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every `AddressQuery` received, in call order.
    pub fn address_queries(&self) -> Vec<AddressQuery> {
        self.address_queries
            .lock()
            .expect("address query log lock")
            .clone()
    }

    async fn enter(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(ProviderError::ServerError {
                code: -32000,
                message: "mock provider failure".to_owned(),
            });
        }
        Ok(())
    }
}

pub struct MockProviderBuilder {
    head: BlockNumber,
    blocks: HashMap<BlockNumber, Block>,
    transactions: HashMap<TxHash, TransactionRecord>,
    histories: HashMap<Address, AddressHistory>,
    failing: bool,
    delay: Option<Duration>,
}

impl MockProviderBuilder {
    pub fn with_head(mut self, head: BlockNumber) -> Self {
        self.head = head;
        self
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.insert(block.number, block);
        self
    }

    pub fn with_tx(mut self, tx: TransactionRecord) -> Self {
        self.transactions.insert(tx.hash, tx);
        self
    }

    pub fn with_history(mut self, address: Address, history: AddressHistory) -> Self {
        self.histories.insert(address, history);
        self
    }

    /// Every call fails with a server error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn build(self) -> MockProvider {
        MockProvider {
            head: self.head,
            blocks: self.blocks,
            transactions: self.transactions,
            histories: self.histories,
            failing: self.failing,
            delay: self.delay,
            calls: AtomicUsize::new(0),
            address_queries: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChainProvider for MockProvider {
    async fn get_head_block_number(&self) -> Result<BlockNumber, ProviderError> {
        self.enter().await?;
        Ok(self.head)
    }

    async fn get_block_with_transactions(
        &self,
        number: BlockNumber,
    ) -> Result<Block, ProviderError> {
        self.enter().await?;
        self.blocks
            .get(&number)
            .cloned()
            .ok_or_else(|| ProviderError::not_found("block", number))
    }

    async fn get_transaction_by_hash(
        &self,
        hash: TxHash,
    ) -> Result<TransactionRecord, ProviderError> {
        self.enter().await?;
        self.transactions
            .get(&hash)
            .cloned()
            .ok_or_else(|| ProviderError::not_found("transaction", hash))
    }

    async fn get_transactions_for_address(
        &self,
        address: Address,
        query: AddressQuery,
    ) -> Result<AddressHistory, ProviderError> {
        self.address_queries
            .lock()
            .expect("address query log lock")
            .push(query.clone());
        self.enter().await?;
        let mut history = self.histories.get(&address).cloned().unwrap_or_default();
        history.transactions.truncate(query.max_count as usize);
        Ok(history)
    }
}

// ==============================================================================
// Fixtures
// ==============================================================================

/// A transaction whose hash is `hash_byte` repeated, in block `block`.
pub fn sample_tx(hash_byte: u8, block: Option<u64>) -> TransactionRecord {
    TransactionRecord {
        hash: TxHash::repeat_byte(hash_byte),
        from: Address::repeat_byte(0x11),
        to: Some(Address::repeat_byte(0x22)),
        value: crate::types::U256::from(1_000u64),
        block_number: block.map(BlockNumber),
        extra: serde_json::Map::new(),
    }
}

/// A block holding `count` sample transactions with distinct hashes.
pub fn sample_block(number: u64, timestamp: u64, count: u8) -> Block {
    Block {
        number: BlockNumber(number),
        timestamp,
        transactions: (1..=count).map(|i| sample_tx(i, Some(number))).collect(),
    }
}
