use futures_util::{stream, stream::BoxStream, StreamExt};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Postgres, Row, Transaction,
};
use tokio::time::Instant;

use crate::{
    db::snapshot::{ScopedSnapshot, SnapshotStore, StoreError, StoreResult},
    models::RecommendationRow,
    services::{
        predicate::{ParamStyle, ParamType},
        union_query::QuerySpec,
    },
};

/// Postgres `query_canceled`, raised by `statement_timeout`
const QUERY_CANCELED: &str = "57014";

/// Milliseconds left before `deadline`, rounded up; `None` once it has passed
fn remaining_millis(deadline: Instant, now: Instant) -> Option<u64> {
    let remaining = deadline.checked_duration_since(now)?;
    if remaining.is_zero() {
        return None;
    }
    let micros = remaining.as_micros();
    Some(micros.div_ceil(1000).min(u64::MAX as u128) as u64)
}

/// Creates a PostgreSQL connection pool
///
/// Connections are opened lazily, so the service can start before the database
/// is reachable.
pub fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_lazy(database_url)?;

    Ok(pool)
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut => StoreError::Timeout(e.to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
                StoreError::Timeout(e.to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Query(e.to_string()),
        }
    }
}

/// Snapshot store backed by a Postgres pool
///
/// Each snapshot is a `REPEATABLE READ, READ ONLY` transaction, which pins every
/// statement in it to the same point-in-time view. A request deadline becomes a
/// transaction-local `statement_timeout`, so the server cancels the read itself.
#[derive(Clone)]
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn open_snapshot(&self, deadline: Option<Instant>) -> StoreResult<Box<dyn ScopedSnapshot>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        if let Some(deadline) = deadline {
            let Some(millis) = remaining_millis(deadline, Instant::now()) else {
                return Err(StoreError::Timeout("request deadline elapsed".to_string()));
            };
            // SET does not accept bind parameters; the value is a computed integer
            sqlx::query(&format!("SET LOCAL statement_timeout = {}", millis))
                .execute(&mut *tx)
                .await?;
            tracing::debug!(statement_timeout_ms = millis, "Opened read-only snapshot");
        } else {
            tracing::debug!("Opened read-only snapshot");
        }

        Ok(Box::new(PgSnapshot { tx: Some(tx) }))
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Positional
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// An open snapshot transaction
///
/// Dropping it without `close` rolls the transaction back. `close` commits only a
/// read that ran to completion; an abandoned one is dropped instead, since a commit
/// would first wait for the cancelled statement to drain.
pub struct PgSnapshot {
    tx: Option<Transaction<'static, Postgres>>,
}

#[async_trait::async_trait]
impl ScopedSnapshot for PgSnapshot {
    fn execute<'a>(&'a mut self, query: &'a QuerySpec) -> BoxStream<'a, StoreResult<RecommendationRow>> {
        let Some(tx) = self.tx.as_mut() else {
            return stream::iter([Err(StoreError::Query("snapshot already closed".to_string()))])
                .boxed();
        };

        let mut statement = sqlx::query(&query.sql);
        for param in &query.bindings {
            statement = match param.param_type {
                ParamType::String => statement.bind(param.value.as_str()),
            };
        }

        statement
            .fetch(&mut **tx)
            .map(|row| row.map_err(StoreError::from).and_then(|row| decode_row(&row)))
            .boxed()
    }

    fn abandon(&mut self) {
        if self.tx.take().is_some() {
            tracing::debug!("Abandoned read-only snapshot");
        }
    }

    async fn close(&mut self) -> StoreResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            tracing::debug!("Closed read-only snapshot");
        }
        Ok(())
    }
}

fn decode_row(row: &PgRow) -> StoreResult<RecommendationRow> {
    Ok((
        row.try_get(0)?,
        row.try_get(1)?,
        row.try_get(2)?,
        row.try_get(3)?,
        row.try_get(4)?,
        decode_ranking(row)?,
        row.try_get(6)?,
        row.try_get(7)?,
    ))
}

/// Rank columns may be declared as either INTEGER or BIGINT
fn decode_ranking(row: &PgRow) -> Result<i64, sqlx::Error> {
    row.try_get::<i64, _>(5)
        .or_else(|_| row.try_get::<i32, _>(5).map(i64::from))
}
