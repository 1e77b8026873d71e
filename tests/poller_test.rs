//! Status poller timing tests
//!
//! All of these run on tokio's paused clock, so deadlines measured in
//! minutes resolve instantly and tick counts are exact.

use async_trait::async_trait;
use dukapay::database::error::{StoreError, StoreResult};
use dukapay::database::memory::InMemoryTransactionStore;
use dukapay::database::payment_store::{
    PaymentTransaction, TransactionStatus, TransactionStore, UpdateOutcome,
};
use dukapay::payments::poller::{PollOutcome, StatusPoller};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn pending(id: &str) -> PaymentTransaction {
    PaymentTransaction::pending(
        id,
        "29115-34620561-1",
        "254712345678",
        1500,
        "DK1A2B3C4D5E",
        "Order #3",
    )
}

/// Counts every `get` so tests can pin exactly how many checks ran.
struct CountingStore {
    inner: InMemoryTransactionStore,
    checks: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryTransactionStore::new(),
            checks: AtomicUsize::new(0),
        }
    }

    fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionStore for CountingStore {
    async fn create(&self, transaction: PaymentTransaction) -> StoreResult<()> {
        self.inner.create(transaction).await
    }

    async fn get(&self, transaction_id: &str) -> StoreResult<PaymentTransaction> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.inner.get(transaction_id).await
    }

    async fn update_status(
        &self,
        transaction_id: &str,
        new_status: TransactionStatus,
        receipt_number: Option<&str>,
    ) -> StoreResult<UpdateOutcome> {
        self.inner
            .update_status(transaction_id, new_status, receipt_number)
            .await
    }

    async fn recent(&self, limit: i64) -> StoreResult<Vec<PaymentTransaction>> {
        self.inner.recent(limit).await
    }
}

/// Fails the first `failures` status checks, then delegates.
struct FlakyStore {
    inner: InMemoryTransactionStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryTransactionStore::new(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl TransactionStore for FlakyStore {
    async fn create(&self, transaction: PaymentTransaction) -> StoreResult<()> {
        self.inner.create(transaction).await
    }

    async fn get(&self, transaction_id: &str) -> StoreResult<PaymentTransaction> {
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::connection("connection reset"));
        }
        self.inner.get(transaction_id).await
    }

    async fn update_status(
        &self,
        transaction_id: &str,
        new_status: TransactionStatus,
        receipt_number: Option<&str>,
    ) -> StoreResult<UpdateOutcome> {
        self.inner
            .update_status(transaction_id, new_status, receipt_number)
            .await
    }

    async fn recent(&self, limit: i64) -> StoreResult<Vec<PaymentTransaction>> {
        self.inner.recent(limit).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_watch_resolves_completed_after_mid_flight_callback() {
    let store = Arc::new(InMemoryTransactionStore::new());
    store.create(pending("ws_CO_A")).await.unwrap();

    let poller = StatusPoller::new(
        store.clone(),
        Duration::from_secs(3),
        Duration::from_secs(120),
    );
    let start = Instant::now();
    let watch = tokio::spawn({
        let poller = poller.clone();
        async move { poller.watch("ws_CO_A").await }
    });

    // Callback lands between the checks at t=6 and t=9.
    tokio::time::sleep(Duration::from_secs(7)).await;
    store
        .update_status("ws_CO_A", TransactionStatus::Completed, Some("ABC123"))
        .await
        .unwrap();

    let outcome = watch.await.unwrap();
    assert_eq!(outcome, PollOutcome::Completed);
    // Resolved on the very next tick, never later.
    assert_eq!(start.elapsed(), Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn test_watch_resolves_failed_after_declined_payment() {
    let store = Arc::new(InMemoryTransactionStore::new());
    store.create(pending("ws_CO_B")).await.unwrap();

    let poller = StatusPoller::new(
        store.clone(),
        Duration::from_secs(3),
        Duration::from_secs(120),
    );
    let watch = tokio::spawn({
        let poller = poller.clone();
        async move { poller.watch("ws_CO_B").await }
    });

    tokio::time::sleep(Duration::from_secs(4)).await;
    store
        .update_status("ws_CO_B", TransactionStatus::Failed, None)
        .await
        .unwrap();

    assert_eq!(watch.await.unwrap(), PollOutcome::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_watch_times_out_at_exactly_the_deadline() {
    let store = Arc::new(CountingStore::new());
    store.create(pending("ws_CO_C")).await.unwrap();

    let poller = StatusPoller::new(
        store.clone(),
        Duration::from_secs(3),
        Duration::from_secs(120),
    );

    let start = Instant::now();
    let outcome = poller.watch("ws_CO_C").await;

    assert_eq!(outcome, PollOutcome::Timeout);
    assert_eq!(start.elapsed(), Duration::from_secs(120));
    // Checks at t=0, 3, ..., 120 inclusive; none after the deadline.
    assert_eq!(store.checks(), 41);
}

#[tokio::test(start_paused = true)]
async fn test_check_at_the_deadline_instant_wins_over_timeout() {
    let store = Arc::new(InMemoryTransactionStore::new());
    store.create(pending("ws_CO_D")).await.unwrap();

    // Ticks at t=0, 7, 14; deadline also at t=14.
    let poller = StatusPoller::new(
        store.clone(),
        Duration::from_secs(7),
        Duration::from_secs(14),
    );
    let start = Instant::now();
    let watch = tokio::spawn({
        let poller = poller.clone();
        async move { poller.watch("ws_CO_D").await }
    });

    tokio::time::sleep(Duration::from_secs(10)).await;
    store
        .update_status("ws_CO_D", TransactionStatus::Completed, Some("ABC123"))
        .await
        .unwrap();

    // The check scheduled at the deadline instant runs first, so the real
    // outcome beats the timeout.
    assert_eq!(watch.await.unwrap(), PollOutcome::Completed);
    assert_eq!(start.elapsed(), Duration::from_secs(14));
}

#[tokio::test(start_paused = true)]
async fn test_first_check_fires_immediately() {
    let store = Arc::new(InMemoryTransactionStore::new());
    store.create(pending("ws_CO_E")).await.unwrap();
    store
        .update_status("ws_CO_E", TransactionStatus::Completed, Some("ABC123"))
        .await
        .unwrap();

    let poller = StatusPoller::new(
        store.clone(),
        Duration::from_secs(3),
        Duration::from_secs(120),
    );

    let start = Instant::now();
    let outcome = poller.watch("ws_CO_E").await;

    // A row that is terminal when the watch starts resolves on the first
    // check without waiting a full interval.
    assert_eq!(outcome, PollOutcome::Completed);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_transient_store_errors_are_swallowed() {
    let store = Arc::new(FlakyStore::new(2));
    store.create(pending("ws_CO_F")).await.unwrap();
    store
        .update_status("ws_CO_F", TransactionStatus::Completed, Some("ABC123"))
        .await
        .unwrap();

    let poller = StatusPoller::new(
        store.clone(),
        Duration::from_secs(3),
        Duration::from_secs(120),
    );

    let start = Instant::now();
    let outcome = poller.watch("ws_CO_F").await;

    // Checks at t=0 and t=3 fail; the t=6 check sees the terminal row.
    assert_eq!(outcome, PollOutcome::Completed);
    assert_eq!(start.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_store_errors_all_the_way_to_the_deadline_time_out() {
    let store = Arc::new(FlakyStore::new(usize::MAX));
    store.create(pending("ws_CO_G")).await.unwrap();

    let poller = StatusPoller::new(
        store.clone(),
        Duration::from_secs(3),
        Duration::from_secs(15),
    );

    let outcome = poller.watch("ws_CO_G").await;
    assert_eq!(outcome, PollOutcome::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_spawn_watch_delivers_the_outcome_once() {
    let store = Arc::new(InMemoryTransactionStore::new());
    store.create(pending("ws_CO_H")).await.unwrap();

    let poller = StatusPoller::new(
        store.clone(),
        Duration::from_secs(3),
        Duration::from_secs(120),
    );
    let mut guard = poller.spawn_watch("ws_CO_H");

    tokio::time::sleep(Duration::from_secs(5)).await;
    store
        .update_status("ws_CO_H", TransactionStatus::Completed, Some("ABC123"))
        .await
        .unwrap();

    assert_eq!(guard.outcome().await, Some(PollOutcome::Completed));
    // The outcome is handed over exactly once; asking again yields nothing.
    assert_eq!(guard.outcome().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_watch_never_resolves() {
    let store = Arc::new(InMemoryTransactionStore::new());
    store.create(pending("ws_CO_I")).await.unwrap();

    let poller = StatusPoller::new(
        store.clone(),
        Duration::from_secs(3),
        Duration::from_secs(120),
    );
    let mut guard = poller.spawn_watch("ws_CO_I");

    tokio::time::sleep(Duration::from_secs(4)).await;
    guard.cancel();
    assert_eq!(guard.outcome().await, None);
    assert_eq!(guard.outcome().await, None);

    // A late callback still lands in the store for manual status queries.
    store
        .update_status("ws_CO_I", TransactionStatus::Completed, Some("ABC123"))
        .await
        .unwrap();
    let row = store.get("ws_CO_I").await.unwrap();
    assert_eq!(row.status, TransactionStatus::Completed);
    assert_eq!(row.receipt_number.as_deref(), Some("ABC123"));
}
