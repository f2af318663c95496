//! Explorer view state and the controller that sequences resolutions into it.
//!
//! [`ViewState`] is plain data with synchronous transitions. [`ViewController`]
//! owns one behind a lock, runs resolutions against a [`Resolver`] and applies
//! their outcomes. Every request takes a new id when it begins, and only the
//! outcome of the newest request is ever applied, whatever order responses
//! arrive in.

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::query::Query;
use crate::resolver::Resolver;
use crate::types::{BlockLabel, ResolutionResult, Timestamp, TransactionRecord, TxHash};

/// Transactions shown per page.
pub const PAGE_SIZE: usize = 10;

/// Number of pages needed for `count` items; never less than one.
pub fn total_pages(count: usize) -> usize {
    count.div_ceil(PAGE_SIZE).max(1)
}

/// The items shown on 1-based `page`.
pub fn page_slice<T>(items: &[T], page: usize) -> &[T] {
    let start = page.saturating_sub(1).saturating_mul(PAGE_SIZE).min(items.len());
    let end = start.saturating_add(PAGE_SIZE).min(items.len());
    &items[start..end]
}

// ==============================================================================
// State
// ==============================================================================

/// Why the last resolution produced the blank result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidQuery,
    Provider,
}

impl From<&ResolveError> for FailureKind {
    fn from(err: &ResolveError) -> Self {
        match err {
            ResolveError::InvalidQuery(_) => Self::InvalidQuery,
            ResolveError::Provider(_) => Self::Provider,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Idle,
    Loading,
    Resolved(ResolutionResult),
    Failed(FailureKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestId(u64);

#[derive(Debug)]
pub struct ViewState {
    query: String,
    resolution: Resolution,
    page: usize,
    selected: Option<usize>,
    latest_request: u64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        Self {
            query: String::new(),
            resolution: Resolution::Idle,
            page: 1,
            selected: None,
            latest_request: 0,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.resolution, Resolution::Loading)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Transactions of the current result; empty unless resolved.
    pub fn transactions(&self) -> &[TransactionRecord] {
        match &self.resolution {
            Resolution::Resolved(result) => &result.transactions,
            _ => &[],
        }
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.transactions().len())
    }

    pub fn visible(&self) -> &[TransactionRecord] {
        page_slice(self.transactions(), self.page)
    }

    pub fn selected_tx(&self) -> Option<&TransactionRecord> {
        self.selected.and_then(|i| self.transactions().get(i))
    }

    /// Start a request: enter `Loading`, reset page and detail, and hand out
    /// the id the outcome must present to be applied. `query` replaces the
    /// stored query text when given.
    pub fn begin(&mut self, query: Option<&Query>) -> RequestId {
        if let Some(query) = query {
            self.query = query.as_str().to_owned();
        }
        self.latest_request += 1;
        self.resolution = Resolution::Loading;
        self.page = 1;
        self.selected = None;
        RequestId(self.latest_request)
    }

    /// Apply a finished request. Returns `false` and leaves the state alone
    /// when a newer request has begun since `id` was issued.
    pub fn complete(
        &mut self,
        id: RequestId,
        outcome: Result<ResolutionResult, ResolveError>,
    ) -> bool {
        if id.0 != self.latest_request {
            return false;
        }
        self.resolution = match outcome {
            Ok(result) => Resolution::Resolved(result),
            Err(err) => Resolution::Failed(FailureKind::from(&err)),
        };
        self.page = 1;
        self.selected = None;
        true
    }

    /// Move to `requested`, clamped into `1..=total_pages`.
    pub fn set_page(&mut self, requested: i64) -> usize {
        let last = i64::try_from(self.total_pages()).unwrap_or(i64::MAX);
        // Both bounds are within 1..=usize::MAX after the clamp.
        self.page = requested.clamp(1, last) as usize;
        self.page
    }

    pub fn next_page(&mut self) -> usize {
        self.set_page(self.page_as_i64().saturating_add(1))
    }

    pub fn prev_page(&mut self) -> usize {
        self.set_page(self.page_as_i64().saturating_sub(1))
    }

    fn page_as_i64(&self) -> i64 {
        i64::try_from(self.page).unwrap_or(i64::MAX)
    }

    /// Select the first transaction in the current result with `hash`.
    pub fn select_detail(&mut self, hash: &TxHash) -> bool {
        let found = self.transactions().iter().position(|tx| &tx.hash == hash);
        if found.is_some() {
            self.selected = found;
        }
        found.is_some()
    }

    pub fn clear_detail(&mut self) {
        self.selected = None;
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let (block_label, timestamp) = match &self.resolution {
            Resolution::Resolved(result) => (result.block_label, Some(result.timestamp.clone())),
            _ => (None, None),
        };
        ViewSnapshot {
            query: self.query.clone(),
            loading: self.is_loading(),
            block_label,
            timestamp,
            visible: self.visible().to_vec(),
            page: self.page,
            total_pages: self.total_pages(),
            selected_tx: self.selected_tx().cloned(),
            error_occurred: matches!(self.resolution, Resolution::Failed(_)),
        }
    }
}

/// Everything a renderer may read. A failed resolution looks like an empty
/// result apart from `error_occurred`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSnapshot {
    pub query: String,
    pub loading: bool,
    pub block_label: Option<BlockLabel>,
    pub timestamp: Option<Timestamp>,
    pub visible: Vec<TransactionRecord>,
    pub page: usize,
    pub total_pages: usize,
    pub selected_tx: Option<TransactionRecord>,
    pub error_occurred: bool,
}

// ==============================================================================
// Controller
// ==============================================================================

/// Runs resolutions and keeps the shared [`ViewState`] consistent.
///
/// The state lock is never held while waiting on the provider.
pub struct ViewController {
    resolver: Resolver,
    state: RwLock<ViewState>,
}

impl ViewController {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            state: RwLock::new(ViewState::new()),
        }
    }

    pub async fn snapshot(&self) -> ViewSnapshot {
        self.state.read().await.snapshot()
    }

    /// Show the chain head block. Used at start-up and by refresh.
    pub async fn load_latest(&self) -> ViewSnapshot {
        self.load_latest_for(None).await
    }

    /// Like [`load_latest`](Self::load_latest), but also records `query` as
    /// the current query text.
    async fn load_latest_for(&self, query: Option<&Query>) -> ViewSnapshot {
        let id = self.state.write().await.begin(query);
        let outcome = self
            .resolver
            .resolve_latest()
            .await
            .map_err(ResolveError::from);
        self.finish(id, outcome).await
    }

    /// Resolve `raw` as typed. Blank input fails as an invalid query.
    pub async fn resolve(&self, raw: &str) -> ViewSnapshot {
        let query = Query::new(raw);
        let id = self.state.write().await.begin(Some(&query));
        let outcome = self.resolver.resolve(&query).await;
        self.finish(id, outcome).await
    }

    /// Search-button semantics: blank input shows the latest block instead.
    pub async fn search(&self, raw: &str) -> ViewSnapshot {
        let query = Query::new(raw);
        if query.is_blank() {
            self.load_latest_for(Some(&query)).await
        } else {
            self.resolve(raw).await
        }
    }

    async fn finish(
        &self,
        id: RequestId,
        outcome: Result<ResolutionResult, ResolveError>,
    ) -> ViewSnapshot {
        if let Err(err) = &outcome {
            warn!(request = id.0, error = %err, "resolution failed");
        }
        let mut state = self.state.write().await;
        if !state.complete(id, outcome) {
            debug!(
                request = id.0,
                latest = state.latest_request,
                "discarding stale resolution"
            );
        }
        state.snapshot()
    }

    pub async fn set_page(&self, page: i64) -> ViewSnapshot {
        let mut state = self.state.write().await;
        state.set_page(page);
        state.snapshot()
    }

    pub async fn next_page(&self) -> ViewSnapshot {
        let mut state = self.state.write().await;
        state.next_page();
        state.snapshot()
    }

    pub async fn prev_page(&self) -> ViewSnapshot {
        let mut state = self.state.write().await;
        state.prev_page();
        state.snapshot()
    }

    /// `None` when no transaction in the current result has `hash`.
    pub async fn select_detail(&self, hash: &TxHash) -> Option<ViewSnapshot> {
        let mut state = self.state.write().await;
        state.select_detail(hash).then(|| state.snapshot())
    }

    pub async fn clear_detail(&self) -> ViewSnapshot {
        let mut state = self.state.write().await;
        state.clear_detail();
        state.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::error::ProviderError;
    use crate::provider::mock::{sample_block, sample_tx, MockProvider};
    use crate::provider::ChainProvider;
    use crate::types::{
        Address, AddressHistory, AddressQuery, Block, BlockNumber, TransactionRecord,
    };

    fn resolved(count: u8) -> ResolutionResult {
        ResolutionResult {
            block_label: Some(BlockLabel::Number(BlockNumber(1))),
            timestamp: Timestamp::NotAvailable,
            transactions: sample_block(1, 0, count).transactions,
        }
    }

    fn state_with(count: u8) -> ViewState {
        let mut state = ViewState::new();
        let id = state.begin(None);
        assert!(state.complete(id, Ok(resolved(count))));
        state
    }

    fn controller(provider: Arc<MockProvider>) -> ViewController {
        ViewController::new(Resolver::new(provider))
    }

    // ==========================================================================
    // Pagination
    // ==========================================================================

    #[test]
    fn pagination_math_for_twenty_three_transactions() {
        let mut state = state_with(23);
        assert_eq!(state.total_pages(), 3);
        assert_eq!(state.visible().len(), 10);

        state.set_page(3);
        assert_eq!(state.visible().len(), 3);
        assert_eq!(state.visible()[0].hash, TxHash::repeat_byte(21));
    }

    #[test]
    fn total_pages_is_at_least_one() {
        assert_eq!(total_pages(0), 1);
        assert_eq!(total_pages(10), 1);
        assert_eq!(total_pages(11), 2);
        assert!(page_slice::<u8>(&[], 1).is_empty());
    }

    #[test]
    fn set_page_clamps_into_range() {
        let mut state = state_with(23);
        for (requested, expected) in [(0, 1), (-7, 1), (2, 2), (4, 3), (i64::MAX, 3), (i64::MIN, 1)] {
            assert_eq!(state.set_page(requested), expected, "requested {requested}");
            assert!(state.page() >= 1 && state.page() <= state.total_pages());
        }

        let mut empty = state_with(0);
        assert_eq!(empty.set_page(5), 1);
    }

    #[test]
    fn set_page_to_current_page_is_a_no_op() {
        let mut state = state_with(23);
        state.set_page(2);
        let id = state.begin(None);
        assert!(state.complete(id, Ok(resolved(23))));
        state.set_page(2);
        let before = state.snapshot();

        state.set_page(state.page() as i64);
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn next_and_prev_stop_at_the_edges() {
        let mut state = state_with(15);
        assert_eq!(state.prev_page(), 1);
        assert_eq!(state.next_page(), 2);
        assert_eq!(state.next_page(), 2);
        assert_eq!(state.prev_page(), 1);
    }

    // ==========================================================================
    // Transitions
    // ==========================================================================

    #[test]
    fn completion_resets_page_and_detail() {
        let mut state = state_with(23);
        state.set_page(3);
        assert!(state.select_detail(&TxHash::repeat_byte(22)));

        let id = state.begin(None);
        assert!(state.complete(
            id,
            Err(ResolveError::InvalidQuery("nope".to_owned()))
        ));

        assert_eq!(state.page(), 1);
        assert!(state.selected_tx().is_none());
        assert_eq!(state.resolution(), &Resolution::Failed(FailureKind::InvalidQuery));
    }

    #[test]
    fn loading_has_no_stale_transactions() {
        let mut state = state_with(5);
        state.begin(None);
        assert!(state.is_loading());
        assert!(state.transactions().is_empty());
        let snapshot = state.snapshot();
        assert!(snapshot.loading);
        assert!(snapshot.visible.is_empty());
        assert_eq!(snapshot.block_label, None);
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut state = ViewState::new();
        let first = state.begin(None);
        let second = state.begin(None);

        assert!(state.complete(second, Ok(resolved(2))));
        assert!(!state.complete(first, Ok(resolved(7))));
        assert_eq!(state.transactions().len(), 2);
    }

    #[test]
    fn select_detail_requires_a_matching_transaction() {
        let mut state = state_with(3);
        assert!(!state.select_detail(&TxHash::repeat_byte(0xee)));
        assert!(state.selected_tx().is_none());

        assert!(state.select_detail(&TxHash::repeat_byte(2)));
        assert_eq!(
            state.selected_tx().map(|tx| tx.hash),
            Some(TxHash::repeat_byte(2))
        );

        state.clear_detail();
        assert!(state.selected_tx().is_none());
    }

    #[test]
    fn failed_snapshot_is_blank_with_error_flag() {
        let mut state = ViewState::new();
        let id = state.begin(None);
        state.complete(
            id,
            Err(ResolveError::Provider(ProviderError::not_found("block", 1))),
        );

        let snapshot = state.snapshot();
        assert_eq!(snapshot.block_label, None);
        assert_eq!(snapshot.timestamp, None);
        assert!(snapshot.visible.is_empty());
        assert!(snapshot.error_occurred);
        assert!(!snapshot.loading);
        assert_eq!(snapshot.total_pages, 1);
    }

    // ==========================================================================
    // Controller
    // ==========================================================================

    #[tokio::test]
    async fn load_latest_shows_head_block() {
        let provider = Arc::new(
            MockProvider::builder()
                .with_head(BlockNumber(18_000_000))
                .with_block(sample_block(18_000_000, 1_700_000_000, 12))
                .build(),
        );
        let controller = controller(provider);

        let snapshot = controller.load_latest().await;
        assert!(!snapshot.loading);
        assert!(!snapshot.error_occurred);
        assert_eq!(
            snapshot.block_label,
            Some(BlockLabel::Number(BlockNumber(18_000_000)))
        );
        assert_eq!(snapshot.timestamp, Some(Timestamp::from_unix(1_700_000_000)));
        assert_eq!(snapshot.visible.len(), 10);
        assert_eq!(snapshot.total_pages, 2);
        assert_eq!(snapshot.query, "");
    }

    #[tokio::test]
    async fn resolve_blank_query_fails_without_provider_calls() {
        let provider = Arc::new(MockProvider::builder().build());
        let controller = controller(provider.clone());

        for raw in ["", "   "] {
            let snapshot = controller.resolve(raw).await;
            assert!(snapshot.error_occurred);
            assert!(!snapshot.loading);
            assert_eq!(snapshot.query, "");
        }
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn search_with_blank_query_loads_latest() {
        let provider = Arc::new(
            MockProvider::builder()
                .with_head(BlockNumber(3))
                .with_block(sample_block(3, 0, 1))
                .build(),
        );
        let controller = controller(provider.clone());

        let snapshot = controller.search("3").await;
        assert_eq!(snapshot.query, "3");
        assert_eq!(provider.calls(), 1);

        let snapshot = controller.search("  ").await;
        assert_eq!(snapshot.block_label, Some(BlockLabel::Number(BlockNumber(3))));
        assert_eq!(snapshot.query, "");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn refresh_keeps_query_text() {
        let provider = Arc::new(
            MockProvider::builder()
                .with_head(BlockNumber(3))
                .with_block(sample_block(3, 0, 1))
                .build(),
        );
        let controller = controller(provider);

        controller.resolve("3").await;
        let snapshot = controller.load_latest().await;
        assert_eq!(snapshot.query, "3");
    }

    #[tokio::test]
    async fn slow_provider_ends_in_blank_failed_state() {
        let provider = Arc::new(
            MockProvider::builder()
                .with_head(BlockNumber(1))
                .with_block(sample_block(1, 0, 4))
                .with_delay(Duration::from_secs(5))
                .build(),
        );
        let controller = ViewController::new(
            Resolver::new(provider).with_timeout(Duration::from_millis(20)),
        );

        let snapshot = controller.resolve("1").await;
        assert!(snapshot.error_occurred);
        assert!(!snapshot.loading);
        assert_eq!(snapshot.block_label, None);
        assert!(snapshot.visible.is_empty());

        let snapshot = controller.load_latest().await;
        assert!(snapshot.error_occurred);
        assert!(!snapshot.loading);
    }

    #[tokio::test]
    async fn provider_failure_leaves_blank_state_and_not_loading() {
        let provider = Arc::new(
            MockProvider::builder()
                .with_block(sample_block(5, 0, 2))
                .failing()
                .build(),
        );
        let controller = controller(provider);

        let snapshot = controller.resolve("5").await;
        assert!(!snapshot.loading);
        assert!(snapshot.error_occurred);
        assert_eq!(snapshot.block_label, None);
        assert_eq!(snapshot.timestamp, None);
        assert!(snapshot.visible.is_empty());
        assert_eq!(snapshot.page, 1);
    }

    #[tokio::test]
    async fn empty_address_history_is_not_an_error_state() {
        let provider = Arc::new(MockProvider::builder().build());
        let controller = controller(provider);

        let snapshot = controller.resolve(&format!("0x{}", "1".repeat(40))).await;
        assert!(!snapshot.error_occurred);
        assert_eq!(snapshot.block_label, Some(BlockLabel::Address));
        assert!(snapshot.visible.is_empty());
    }

    #[tokio::test]
    async fn new_resolution_clears_page_and_detail() {
        let provider = Arc::new(
            MockProvider::builder()
                .with_block(sample_block(1, 0, 25))
                .with_block(sample_block(2, 0, 25))
                .build(),
        );
        let controller = controller(provider);

        controller.resolve("1").await;
        controller.set_page(3).await;
        let selected = controller
            .select_detail(&TxHash::repeat_byte(21))
            .await
            .expect("transaction 21 is in block 1");
        assert_eq!(selected.page, 3);
        assert!(selected.selected_tx.is_some());

        let snapshot = controller.resolve("2").await;
        assert_eq!(snapshot.page, 1);
        assert!(snapshot.selected_tx.is_none());
    }

    #[tokio::test]
    async fn select_unknown_hash_returns_none() {
        let provider = Arc::new(
            MockProvider::builder()
                .with_block(sample_block(1, 0, 2))
                .build(),
        );
        let controller = controller(provider);
        controller.resolve("1").await;

        assert!(controller
            .select_detail(&TxHash::repeat_byte(0x77))
            .await
            .is_none());
        assert!(controller.snapshot().await.selected_tx.is_none());
    }

    /// Serves blocks immediately except block 1, which waits for `release`.
    struct GatedProvider {
        entered: Notify,
        release: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainProvider for GatedProvider {
        async fn get_head_block_number(&self) -> Result<BlockNumber, ProviderError> {
            Ok(BlockNumber(2))
        }

        async fn get_block_with_transactions(
            &self,
            number: BlockNumber,
        ) -> Result<Block, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if number == BlockNumber(1) {
                self.entered.notify_one();
                self.release.notified().await;
                return Ok(sample_block(1, 0, 7));
            }
            Ok(sample_block(number.0, 0, 2))
        }

        async fn get_transaction_by_hash(
            &self,
            hash: TxHash,
        ) -> Result<TransactionRecord, ProviderError> {
            Err(ProviderError::not_found("transaction", hash))
        }

        async fn get_transactions_for_address(
            &self,
            _address: Address,
            _query: AddressQuery,
        ) -> Result<AddressHistory, ProviderError> {
            Ok(AddressHistory::default())
        }
    }

    #[tokio::test]
    async fn newest_request_wins_over_late_stale_response() {
        let provider = Arc::new(GatedProvider {
            entered: Notify::new(),
            release: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let controller = Arc::new(ViewController::new(Resolver::new(provider.clone())));

        let slow = tokio::spawn({
            let controller = controller.clone();
            async move { controller.resolve("1").await }
        });
        provider.entered.notified().await;
        assert!(controller.snapshot().await.loading);

        let fast = controller.resolve("2").await;
        assert_eq!(fast.block_label, Some(BlockLabel::Number(BlockNumber(2))));
        assert!(!fast.loading);

        provider.release.notify_one();
        let late = slow.await.expect("slow request task");
        assert_eq!(late.block_label, Some(BlockLabel::Number(BlockNumber(2))));
        assert_eq!(late.query, "2");
        assert_eq!(late.visible.len(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn loading_stays_true_until_newest_request_finishes() {
        let provider = Arc::new(GatedProvider {
            entered: Notify::new(),
            release: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let controller = Arc::new(ViewController::new(Resolver::new(provider.clone())));

        let pending = tokio::spawn({
            let controller = controller.clone();
            async move { controller.resolve("1").await }
        });
        provider.entered.notified().await;

        let during = controller.snapshot().await;
        assert!(during.loading);
        assert!(during.visible.is_empty());

        provider.release.notify_one();
        let done = pending.await.expect("request task");
        assert!(!done.loading);
        assert_eq!(done.visible.len(), 7);
        assert_eq!(
            done.visible.first().map(|tx| tx.hash),
            Some(sample_tx(1, Some(1)).hash)
        );
    }
}
