pub mod postgres;
pub mod snapshot;

pub use postgres::{create_pool, PgSnapshotStore};
pub use snapshot::{fetch_rows, ScopedSnapshot, SnapshotStore, StoreError, StoreResult};
