// Event and registration persistence

#[cfg(feature = "db")]
pub mod database;
pub mod in_memory;
pub mod rows;
pub mod sqlite;
pub mod traits;

#[cfg(feature = "db")]
pub use database::LibsqlStore;
pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{EventStore, Page, StoreError, StoreResult};

use crate::types::{parse_instant, RawEventData};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

pub(crate) const MIGRATION_SQL: &str =
    include_str!("../../migrations/001_create_events_and_registrations.sql");

/// Give a document its id before it is stored.
///
/// Imported documents keep the id they carry; new ones get a fresh UUID.
/// A document whose `id` disagrees with `expected_id` is rejected.
pub(crate) fn prepare_document(
    mut data: RawEventData,
    expected_id: Option<&str>,
) -> StoreResult<(String, RawEventData)> {
    let object = data
        .as_object_mut()
        .ok_or_else(|| StoreError::Backend("event document must be a JSON object".to_string()))?;

    let carried = match object.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let id = match (expected_id, carried) {
        (Some(expected), Some(carried)) if expected != carried => {
            return Err(StoreError::Backend(format!(
                "document id '{carried}' does not match '{expected}'"
            )))
        }
        (Some(expected), _) => expected.to_string(),
        (None, Some(carried)) => carried,
        (None, None) => Uuid::new_v4().to_string(),
    };

    object.insert("id".to_string(), Value::String(id.clone()));
    Ok((id, data))
}

/// Sort key for a document's start date: RFC 3339 UTC, or `None` when the
/// date is missing or unreadable (such documents sort last).
pub(crate) fn start_key(data: &RawEventData) -> Option<String> {
    data.get("date")
        .and_then(|v| v.as_str())
        .and_then(parse_instant)
        .map(|dt| dt.to_rfc3339())
}

/// Decode one stored document for a listing. A row that is not valid JSON
/// is logged, counted and left out so the rest of the listing survives.
pub(crate) fn decode_listed(id: &str, data: &str) -> Option<RawEventData> {
    match serde_json::from_str(data) {
        Ok(document) => Some(document),
        Err(e) => {
            warn!(id = %id, error = %e, "Skipping undecodable event document");
            crate::observability::metrics::store::undecodable_document();
            None
        }
    }
}
