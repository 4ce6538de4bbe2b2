// Use cases sitting between the HTTP surface and the store

pub mod admin_use_case;
pub mod catalog_use_case;
pub mod registration_use_case;

pub use admin_use_case::EventAdmin;
pub use catalog_use_case::{EventCatalog, EventQuery, TimeFilter};
pub use registration_use_case::RegistrationWriter;

use crate::storage::StoreResult;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run a store call under a deadline. `None` means the deadline passed and
/// the pending call was abandoned.
pub(crate) async fn bounded<T, F>(operation: &'static str, limit: Duration, call: F) -> Option<StoreResult<T>>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Some(result),
        Err(_) => {
            warn!(operation, timeout_ms = limit.as_millis() as u64, "Store call timed out");
            crate::observability::metrics::store::timeout(operation);
            None
        }
    }
}
