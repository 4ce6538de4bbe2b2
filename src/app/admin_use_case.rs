use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{bounded, EventCatalog};
use crate::domain::{Event, Registration};
use crate::error::{EventsError, Result};
use crate::storage::{EventStore, StoreError};
use crate::types::RawEventData;

/// Admin-side event maintenance.
///
/// Documents are checked with the same normalizer the public listing uses,
/// so nothing the listing would skip can be saved.
pub struct EventAdmin {
    store: Arc<dyn EventStore>,
    catalog: Arc<EventCatalog>,
    timeout: Duration,
}

fn write_error(e: StoreError) -> EventsError {
    match e {
        StoreError::UniqueViolation(_) => {
            EventsError::invalid_input("id", "An event with this id already exists.")
        }
        StoreError::NotFound(what) => EventsError::NotFound(what),
        other => EventsError::WriteFailed {
            message: other.to_string(),
        },
    }
}

fn timed_out(operation: &str) -> EventsError {
    EventsError::WriteFailed {
        message: format!("{operation} timed out"),
    }
}

impl EventAdmin {
    pub fn new(store: Arc<dyn EventStore>, catalog: Arc<EventCatalog>, timeout: Duration) -> Self {
        Self {
            store,
            catalog,
            timeout,
        }
    }

    /// Reject a document the catalog could not display. Documents without an
    /// id are checked as if the store had already assigned one.
    fn check_document(&self, data: &RawEventData, id: Option<&str>) -> Result<()> {
        let object = data
            .as_object()
            .ok_or_else(|| EventsError::invalid_input("event", "Event must be a JSON object."))?;

        if let (Some(expected), Some(carried)) = (id, object.get("id")) {
            let carried = match carried {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if carried != expected {
                return Err(EventsError::invalid_input(
                    "id",
                    format!("Document id '{carried}' does not match '{expected}'."),
                ));
            }
        }

        let mut probe = data.clone();
        if let Some(map) = probe.as_object_mut() {
            map.entry("id")
                .or_insert_with(|| Value::String(id.unwrap_or("pending").to_string()));
        }
        self.catalog.normalize_document(&probe).map(|_| ())
    }

    pub async fn create_event(&self, data: RawEventData) -> Result<Event> {
        self.check_document(&data, None)?;

        let stored = bounded("create_event", self.timeout, self.store.create_event(data))
            .await
            .ok_or_else(|| timed_out("creating event"))?
            .map_err(write_error)?;

        self.catalog.invalidate().await;
        let event = self.catalog.normalize_document(&stored)?;
        info!(event_id = %event.id, "Event created");
        Ok(event)
    }

    pub async fn update_event(&self, id: &str, data: RawEventData) -> Result<Event> {
        self.check_document(&data, Some(id))?;

        let stored = bounded("update_event", self.timeout, self.store.update_event(id, data))
            .await
            .ok_or_else(|| timed_out("updating event"))?
            .map_err(write_error)?;

        self.catalog.invalidate().await;
        let event = self.catalog.normalize_document(&stored)?;
        info!(event_id = %event.id, "Event updated");
        Ok(event)
    }

    pub async fn delete_event(&self, id: &str) -> Result<()> {
        bounded("delete_event", self.timeout, self.store.delete_event(id))
            .await
            .ok_or_else(|| timed_out("deleting event"))?
            .map_err(write_error)?;

        self.catalog.invalidate().await;
        info!(event_id = %id, "Event deleted");
        Ok(())
    }

    /// Registrations for one event, oldest first
    pub async fn list_registrations(&self, event_id: &str) -> Result<Vec<Registration>> {
        // 404 for unknown events rather than an empty list
        match bounded("get_raw_event", self.timeout, self.store.get_raw_event(event_id)).await {
            Some(Ok(Some(_))) => {}
            Some(Ok(None)) | Some(Err(StoreError::NotFound(_))) => {
                return Err(EventsError::NotFound(format!("Event {event_id}")))
            }
            Some(Err(e)) => {
                return Err(EventsError::ReadFailed {
                    message: e.to_string(),
                })
            }
            None => {
                return Err(EventsError::ReadFailed {
                    message: "reading event timed out".to_string(),
                })
            }
        }

        match bounded(
            "list_registrations",
            self.timeout,
            self.store.list_registrations(event_id),
        )
        .await
        {
            Some(Ok(registrations)) => Ok(registrations),
            Some(Err(e)) => Err(EventsError::ReadFailed {
                message: e.to_string(),
            }),
            None => Err(EventsError::ReadFailed {
                message: "listing registrations timed out".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::InMemoryStore;
    use serde_json::json;

    fn admin() -> EventAdmin {
        let store: Arc<dyn EventStore> = Arc::new(InMemoryStore::new());
        let catalog = Arc::new(EventCatalog::from_config(store.clone(), &Config::default()));
        EventAdmin::new(store, catalog, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_returns_canonical_event() {
        let admin = admin();
        let event = admin
            .create_event(json!({
                "title": "Code Camp",
                "date": "2030-01-10T09:00:00Z",
                "location": "Kumasi",
                "price": 50
            }))
            .await
            .unwrap();

        assert!(!event.id.is_empty());
        assert_eq!(event.price_display, "GHS 50.00");
    }

    #[tokio::test]
    async fn test_create_rejects_document_missing_title() {
        let admin = admin();
        let result = admin
            .create_event(json!({"date": "2030-01-10", "location": "Kumasi"}))
            .await;
        assert!(matches!(result, Err(EventsError::MalformedRecord { .. })));
    }

    #[tokio::test]
    async fn test_update_rejects_mismatched_id() {
        let admin = admin();
        let result = admin
            .update_event(
                "a",
                json!({"id": "b", "title": "t", "date": "2030-01-10", "location": "l"}),
            )
            .await;
        assert!(matches!(result, Err(EventsError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_registrations_for_unknown_event_is_not_found() {
        let admin = admin();
        assert!(matches!(
            admin.list_registrations("ghost").await,
            Err(EventsError::NotFound(_))
        ));
        assert!(matches!(
            admin.delete_event("ghost").await,
            Err(EventsError::NotFound(_))
        ));
    }
}
