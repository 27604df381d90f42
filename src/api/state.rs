use std::sync::Arc;
use std::time::Duration;

use crate::db::SnapshotStore;

/// Shared application state
///
/// Holds no per-request data; the store handles its own pooling.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SnapshotStore>,
    /// Deadline applied to each snapshot read, if any
    pub request_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}
