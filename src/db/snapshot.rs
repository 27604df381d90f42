use futures_util::{stream::BoxStream, TryStreamExt};
use tokio::time::Instant;

use crate::{
    models::RecommendationRow,
    services::{predicate::ParamStyle, union_query::QuerySpec},
};

/// Failures raised by the backing store
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Transient; the whole request may be retried by the caller
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store timed out: {0}")]
    Timeout(String),

    /// Malformed statement or undecodable row
    #[error("store query failed: {0}")]
    Query(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A backing store able to hand out read-only, point-in-time snapshots
///
/// Implementations are shared across requests and must be safe for concurrent use.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Opens a fresh strongly-consistent read snapshot for one request
    ///
    /// When a deadline is given the store must enforce it server-side as well, so
    /// an abandoned read stops consuming store resources.
    async fn open_snapshot(&self, deadline: Option<Instant>) -> StoreResult<Box<dyn ScopedSnapshot>>;

    /// Placeholder spelling this store binds
    fn param_style(&self) -> ParamStyle {
        ParamStyle::Named
    }

    /// Store name for logging
    fn name(&self) -> &'static str;
}

/// A single read snapshot
///
/// `close` may be called more than once. An implementation dropped without `close`
/// (for example when the request is cancelled) must still release its resources.
#[async_trait::async_trait]
pub trait ScopedSnapshot: Send {
    /// Runs the query with its bound parameters and streams positional rows
    fn execute<'a>(&'a mut self, query: &'a QuerySpec) -> BoxStream<'a, StoreResult<RecommendationRow>>;

    /// Marks the read as incomplete; the following `close` must release without
    /// waiting on the abandoned statement
    fn abandon(&mut self) {}

    async fn close(&mut self) -> StoreResult<()>;
}

/// Reads every row of `query` under a single snapshot
///
/// The deadline is handed to the store and also bounds the read here. The snapshot
/// is closed on every exit path; a failed or timed-out read is abandoned first so
/// closing never blocks on it. Either the complete row set is returned or an error;
/// never a prefix.
pub async fn fetch_rows(
    store: &dyn SnapshotStore,
    query: &QuerySpec,
    deadline: Option<Instant>,
) -> StoreResult<Vec<RecommendationRow>> {
    let mut snapshot = store.open_snapshot(deadline).await?;

    let outcome = {
        let read = snapshot.execute(query).try_collect::<Vec<_>>();
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, read)
                .await
                .unwrap_or_else(|_| Err(StoreError::Timeout("request deadline elapsed".to_string()))),
            None => read.await,
        }
    };

    if outcome.is_err() {
        snapshot.abandon();
    }

    if let Err(e) = snapshot.close().await {
        tracing::warn!(store = store.name(), error = %e, "Failed to close read snapshot");
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FilterRequest, FilterSet};
    use crate::services::{predicate::compile, union_query::UnionQueryBuilder};
    use futures_util::{stream, StreamExt};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use std::time::Duration;

    /// Snapshot that yields scripted rows and counts how often it is closed
    struct ScriptedSnapshot {
        rows: Vec<StoreResult<RecommendationRow>>,
        stall: bool,
        closes: Arc<AtomicUsize>,
        abandons: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ScopedSnapshot for ScriptedSnapshot {
        fn execute<'a>(
            &'a mut self,
            _query: &'a QuerySpec,
        ) -> BoxStream<'a, StoreResult<RecommendationRow>> {
            if self.stall {
                return stream::pending().boxed();
            }
            stream::iter(std::mem::take(&mut self.rows)).boxed()
        }

        fn abandon(&mut self) {
            self.abandons.fetch_add(1, Ordering::SeqCst);
        }

        async fn close(&mut self) -> StoreResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Counters {
        closes: Arc<AtomicUsize>,
        abandons: Arc<AtomicUsize>,
    }

    fn query() -> QuerySpec {
        let filters = FilterSet::try_from(FilterRequest {
            city: Some("Cape Town".to_string()),
            ..Default::default()
        })
        .unwrap();
        UnionQueryBuilder::default()
            .build(compile(&filters, ParamStyle::Named))
            .unwrap()
    }

    fn row(id: &str) -> RecommendationRow {
        (
            "AF".to_string(),
            "South Africa".to_string(),
            "Western Cape".to_string(),
            "Cape Town".to_string(),
            id.to_string(),
            1,
            "game".to_string(),
            "play".to_string(),
        )
    }

    fn store_with(rows: Vec<StoreResult<RecommendationRow>>, stall: bool) -> (MockSnapshotStore, Counters) {
        let counters = Counters {
            closes: Arc::new(AtomicUsize::new(0)),
            abandons: Arc::new(AtomicUsize::new(0)),
        };
        let closes = counters.closes.clone();
        let abandons = counters.abandons.clone();
        let mut store = MockSnapshotStore::new();
        store.expect_name().return_const("scripted");
        store.expect_open_snapshot().times(1).return_once(move |_| {
            let snapshot: Box<dyn ScopedSnapshot> = Box::new(ScriptedSnapshot {
                rows,
                stall,
                closes,
                abandons,
            });
            Ok(snapshot)
        });
        (store, counters)
    }

    #[tokio::test]
    async fn test_fetch_rows_returns_all_rows_and_closes() {
        let (store, counters) = store_with(vec![Ok(row("G1")), Ok(row("A1")), Ok(row("C1"))], false);

        let rows = fetch_rows(&store, &query(), None).await.unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].4, "A1");
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.abandons.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_rows_is_not_an_error() {
        let (store, counters) = store_with(vec![], false);

        let rows = fetch_rows(&store, &query(), None).await.unwrap();

        assert!(rows.is_empty());
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_mid_stream_returns_no_partial_rows() {
        let (store, counters) = store_with(
            vec![Ok(row("G1")), Err(StoreError::Unavailable("connection reset".to_string()))],
            false,
        );

        let result = fetch_rows(&store, &query(), None).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(counters.abandons.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_closes_snapshot_and_times_out() {
        let (store, counters) = store_with(vec![], true);
        let deadline = Instant::now() + Duration::from_millis(20);

        let result = fetch_rows(&store, &query(), Some(deadline)).await;

        assert!(matches!(result, Err(StoreError::Timeout(_))));
        assert_eq!(counters.abandons.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_is_handed_to_the_store() {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut store = MockSnapshotStore::new();
        store
            .expect_open_snapshot()
            .withf(move |d| *d == Some(deadline))
            .times(1)
            .returning(|_| Err(StoreError::Timeout("deadline elapsed".to_string())));

        let result = fetch_rows(&store, &query(), Some(deadline)).await;

        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_open_failure_is_surfaced() {
        let mut store = MockSnapshotStore::new();
        store
            .expect_open_snapshot()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("no route to host".to_string())));

        let result = fetch_rows(&store, &query(), None).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
