use super::traits::{EventStore, Page, StoreError, StoreResult};
use super::{prepare_document, start_key};
use crate::domain::{NewRegistration, Registration};
use crate::types::RawEventData;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct State {
    events: HashMap<String, RawEventData>,
    registrations: Vec<Registration>,
}

/// In-memory store for development and tests.
///
/// One lock guards events and registrations together, so the existence and
/// uniqueness checks on insert happen atomically with the insert itself.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn list_raw_events(&self, page: Page) -> StoreResult<Vec<RawEventData>> {
        let state = self.state.lock().await;
        let mut keyed: Vec<(Option<String>, &String, &RawEventData)> = state
            .events
            .iter()
            .map(|(id, data)| (start_key(data), id, data))
            .collect();

        // Undated documents last, ties broken by id for a stable order
        keyed.sort_by(|a, b| {
            (a.0.is_none(), &a.0, a.1).cmp(&(b.0.is_none(), &b.0, b.1))
        });

        let limit = page.limit.unwrap_or(usize::MAX);
        Ok(keyed
            .into_iter()
            .skip(page.offset)
            .take(limit)
            .map(|(_, _, data)| data.clone())
            .collect())
    }

    async fn get_raw_event(&self, id: &str) -> StoreResult<Option<RawEventData>> {
        let state = self.state.lock().await;
        Ok(state.events.get(id).cloned())
    }

    async fn create_event(&self, data: RawEventData) -> StoreResult<RawEventData> {
        let (id, data) = prepare_document(data, None)?;
        let mut state = self.state.lock().await;
        if state.events.contains_key(&id) {
            return Err(StoreError::UniqueViolation(format!("events.id = {id}")));
        }
        state.events.insert(id.clone(), data.clone());

        debug!("Created event document with id {}", id);
        Ok(data)
    }

    async fn update_event(&self, id: &str, data: RawEventData) -> StoreResult<RawEventData> {
        let (id, data) = prepare_document(data, Some(id))?;
        let mut state = self.state.lock().await;
        match state.events.get_mut(&id) {
            Some(existing) => {
                *existing = data.clone();
                debug!("Updated event document with id {}", id);
                Ok(data)
            }
            None => Err(StoreError::NotFound(format!("event {id}"))),
        }
    }

    async fn delete_event(&self, id: &str) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.events.remove(id).is_none() {
            return Err(StoreError::NotFound(format!("event {id}")));
        }
        state.registrations.retain(|r| r.event_id != id);

        debug!("Deleted event {} and its registrations", id);
        Ok(())
    }

    async fn insert_registration(&self, registration: NewRegistration) -> StoreResult<Registration> {
        let mut state = self.state.lock().await;

        if !state.events.contains_key(&registration.event_id) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "registrations.event_id = {}",
                registration.event_id
            )));
        }
        if state
            .registrations
            .iter()
            .any(|r| r.event_id == registration.event_id && r.email == registration.email)
        {
            return Err(StoreError::UniqueViolation(
                "registrations.event_id, registrations.email".to_string(),
            ));
        }

        let stored = Registration::from_new(Uuid::new_v4().to_string(), registration, Utc::now());
        state.registrations.push(stored.clone());

        debug!("Created registration {} for event {}", stored.id, stored.event_id);
        Ok(stored)
    }

    async fn list_registrations(&self, event_id: &str) -> StoreResult<Vec<Registration>> {
        let state = self.state.lock().await;
        let mut registrations: Vec<Registration> = state
            .registrations
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        registrations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(registrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RegistrationStatus;
    use serde_json::json;

    fn new_registration(event_id: &str, email: &str) -> NewRegistration {
        NewRegistration {
            event_id: event_id.to_string(),
            full_name: "Ama Mensah".to_string(),
            email: email.to_string(),
            phone: None,
            participant_count: 1,
            special_requests: None,
            location: None,
            user_id: None,
            is_anonymous: true,
            status: RegistrationStatus::Pending,
            payment_status: false,
        }
    }

    #[tokio::test]
    async fn test_events_listed_by_start_date() {
        let store = InMemoryStore::new();
        store
            .create_event(json!({"id": "late", "date": "2025-09-01"}))
            .await
            .unwrap();
        store
            .create_event(json!({"id": "undated"}))
            .await
            .unwrap();
        store
            .create_event(json!({"id": "early", "date": "2025-02-01T10:00:00Z"}))
            .await
            .unwrap();

        let ids: Vec<String> = store
            .list_raw_events(Page::all())
            .await
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["early", "late", "undated"]);

        let page = store
            .list_raw_events(Page::new(Some(1), Some(1)))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["id"], json!("late"));
    }

    #[tokio::test]
    async fn test_registration_constraints() {
        let store = InMemoryStore::new();
        store.create_event(json!({"id": "e1"})).await.unwrap();

        let first = store
            .insert_registration(new_registration("e1", "ama@example.com"))
            .await
            .unwrap();
        assert_eq!(first.status, RegistrationStatus::Pending);

        let duplicate = store
            .insert_registration(new_registration("e1", "ama@example.com"))
            .await;
        assert!(matches!(duplicate, Err(StoreError::UniqueViolation(_))));

        let dangling = store
            .insert_registration(new_registration("missing", "ama@example.com"))
            .await;
        assert!(matches!(dangling, Err(StoreError::ForeignKeyViolation(_))));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_registrations() {
        let store = InMemoryStore::new();
        store.create_event(json!({"id": "e1"})).await.unwrap();
        store
            .insert_registration(new_registration("e1", "kofi@example.com"))
            .await
            .unwrap();

        store.delete_event("e1").await.unwrap();
        assert!(store.list_registrations("e1").await.unwrap().is_empty());
        assert!(matches!(
            store.delete_event("e1").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
