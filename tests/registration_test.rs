use anyhow::Result;
use community_events::app::RegistrationWriter;
use community_events::domain::{Identity, RegistrationForm};
use community_events::error::EventsError;
use community_events::storage::{EventStore, InMemoryStore, SqliteStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn form(event_id: &str, email: &str) -> RegistrationForm {
    RegistrationForm {
        event_id: event_id.to_string(),
        full_name: "Kojo Mensah".to_string(),
        email: email.to_string(),
        phone: Some("+233 20 000 0000".to_string()),
        participant_count: 2,
        special_requests: None,
        location: Some("Accra".to_string()),
    }
}

async fn seed_event(store: &dyn EventStore) -> Result<()> {
    store
        .create_event(json!({
            "id": "workshop",
            "title": "Pottery Workshop",
            "date": "2030-03-01T10:00:00Z",
            "location": "Osu"
        }))
        .await?;
    Ok(())
}

/// Two simultaneous submissions for the same event and email: one lands,
/// the other is reported as a duplicate.
async fn race_duplicate_submissions(store: Arc<dyn EventStore>) -> Result<()> {
    seed_event(store.as_ref()).await?;
    let writer = Arc::new(RegistrationWriter::new(store.clone(), Duration::from_secs(10)));

    let first = {
        let writer = writer.clone();
        tokio::spawn(async move {
            writer
                .submit(&form("workshop", "kojo@example.com"), Identity::Anonymous)
                .await
        })
    };
    let second = {
        let writer = writer.clone();
        tokio::spawn(async move {
            // Differs only in case and whitespace
            writer
                .submit(&form("workshop", " Kojo@Example.com"), Identity::Anonymous)
                .await
        })
    };

    let outcomes = vec![first.await?, second.await?];
    let stored = outcomes.iter().filter(|r| r.is_ok()).count();
    let duplicates = outcomes
        .iter()
        .filter(|r| matches!(r, Err(EventsError::DuplicateRegistration)))
        .count();
    assert_eq!(stored, 1);
    assert_eq!(duplicates, 1);

    let registrations = store.list_registrations("workshop").await?;
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].email, "kojo@example.com");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_duplicates_in_memory() -> Result<()> {
    race_duplicate_submissions(Arc::new(InMemoryStore::new())).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_duplicates_sqlite() -> Result<()> {
    let dir = tempdir()?;
    let store = SqliteStore::open(dir.path().join("events.db"))?;
    race_duplicate_submissions(Arc::new(store)).await
}

#[tokio::test]
async fn test_registration_for_missing_event_is_invalid_reference() -> Result<()> {
    let dir = tempdir()?;
    let store: Arc<dyn EventStore> = Arc::new(SqliteStore::open(dir.path().join("events.db"))?);
    let writer = RegistrationWriter::new(store.clone(), Duration::from_secs(10));

    let err = writer
        .submit(&form("no-such-event", "ama@example.com"), Identity::Anonymous)
        .await
        .unwrap_err();
    assert!(matches!(err, EventsError::InvalidReference { .. }));
    assert!(store.list_registrations("no-such-event").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_same_email_may_register_for_different_events() -> Result<()> {
    let store: Arc<dyn EventStore> = Arc::new(InMemoryStore::new());
    seed_event(store.as_ref()).await?;
    store
        .create_event(json!({
            "id": "hike",
            "title": "Aburi Hike",
            "date": "2030-04-01",
            "location": "Aburi"
        }))
        .await?;
    let writer = RegistrationWriter::new(store.clone(), Duration::from_secs(10));

    let signed_in = Identity::Authenticated {
        user_id: "user-42".to_string(),
    };
    writer
        .submit(&form("workshop", "esi@example.com"), signed_in.clone())
        .await?;
    let second = writer
        .submit(&form("hike", "esi@example.com"), signed_in)
        .await?;

    assert_eq!(second.user_id.as_deref(), Some("user-42"));
    assert!(!second.is_anonymous);
    Ok(())
}

#[tokio::test]
async fn test_deleting_event_removes_its_registrations() -> Result<()> {
    let dir = tempdir()?;
    let store: Arc<dyn EventStore> = Arc::new(SqliteStore::open(dir.path().join("events.db"))?);
    seed_event(store.as_ref()).await?;
    let writer = RegistrationWriter::new(store.clone(), Duration::from_secs(10));
    writer
        .submit(&form("workshop", "yaw@example.com"), Identity::Anonymous)
        .await?;

    store.delete_event("workshop").await?;
    assert!(store.list_registrations("workshop").await?.is_empty());
    Ok(())
}
