use super::rows::{RegistrationRow, REGISTRATION_COLUMNS};
use super::traits::{EventStore, Page, StoreError, StoreResult};
use super::{decode_listed, prepare_document, start_key, MIGRATION_SQL};
use crate::domain::{NewRegistration, Registration};
use crate::types::RawEventData;
use async_trait::async_trait;
use chrono::Utc;
use libsql::{Builder, Connection, Database, Row, Value};
use std::env;
use tracing::{debug, info};
use uuid::Uuid;

/// Remote Turso/libSQL store.
///
/// Constraint failures come back from the remote protocol as text, so they
/// are classified by message. The event reference on registrations is
/// checked inside the insert statement because `PRAGMA foreign_keys` does not
/// carry across remote connections.
pub struct LibsqlStore {
    db: Database,
}

impl LibsqlStore {
    /// Connect using `LIBSQL_URL` and `LIBSQL_AUTH_TOKEN`, then run migrations
    pub async fn from_env() -> StoreResult<Self> {
        let url = env::var("LIBSQL_URL")
            .map_err(|_| StoreError::Backend("LIBSQL_URL environment variable not set".to_string()))?;
        let auth_token = env::var("LIBSQL_AUTH_TOKEN").map_err(|_| {
            StoreError::Backend("LIBSQL_AUTH_TOKEN environment variable not set".to_string())
        })?;

        info!("Connecting to Turso database at {}", url);

        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to database: {e}")))?;

        let store = Self { db };
        store.run_migrations().await?;
        Ok(store)
    }

    fn connection(&self) -> StoreResult<Connection> {
        self.db
            .connect()
            .map_err(|e| StoreError::Backend(format!("Failed to get database connection: {e}")))
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        info!("Running database migrations...");
        self.connection()?
            .execute_batch(MIGRATION_SQL)
            .await
            .map_err(map_libsql_error)?;
        info!("Database migrations completed successfully");
        Ok(())
    }
}

fn map_libsql_error(e: libsql::Error) -> StoreError {
    classify_message(e.to_string())
}

/// SQLite reports constraint failures as `<KIND> constraint failed: <detail>`
fn classify_message(message: String) -> StoreError {
    if message.contains("UNIQUE constraint failed")
        || message.contains("PRIMARY KEY constraint failed")
    {
        StoreError::UniqueViolation(message)
    } else if message.contains("FOREIGN KEY constraint failed") {
        StoreError::ForeignKeyViolation(message)
    } else {
        StoreError::Backend(message)
    }
}

fn text_at(row: &Row, idx: i32) -> StoreResult<Option<String>> {
    match row.get_value(idx).map_err(map_libsql_error)? {
        Value::Text(s) => Ok(Some(s)),
        Value::Null => Ok(None),
        other => Err(StoreError::Backend(format!(
            "expected text in column {idx}, found {other:?}"
        ))),
    }
}

fn required_text_at(row: &Row, idx: i32) -> StoreResult<String> {
    text_at(row, idx)?.ok_or_else(|| StoreError::Backend(format!("column {idx} is NULL")))
}

fn integer_at(row: &Row, idx: i32) -> StoreResult<i64> {
    match row.get_value(idx).map_err(map_libsql_error)? {
        Value::Integer(n) => Ok(n),
        other => Err(StoreError::Backend(format!(
            "expected integer in column {idx}, found {other:?}"
        ))),
    }
}

fn read_registration(row: &Row) -> StoreResult<RegistrationRow> {
    Ok(RegistrationRow {
        id: required_text_at(row, 0)?,
        event_id: required_text_at(row, 1)?,
        full_name: required_text_at(row, 2)?,
        email: required_text_at(row, 3)?,
        phone: text_at(row, 4)?,
        participant_count: integer_at(row, 5)?,
        special_requests: text_at(row, 6)?,
        location: text_at(row, 7)?,
        user_id: text_at(row, 8)?,
        is_anonymous: integer_at(row, 9)?,
        status: required_text_at(row, 10)?,
        payment_status: integer_at(row, 11)?,
        created_at: required_text_at(row, 12)?,
    })
}

fn decode_document(data: &str) -> StoreResult<RawEventData> {
    serde_json::from_str(data)
        .map_err(|e| StoreError::Backend(format!("Failed to deserialize event document: {e}")))
}

fn encode_document(data: &RawEventData) -> StoreResult<String> {
    serde_json::to_string(data)
        .map_err(|e| StoreError::Backend(format!("Failed to serialize event document: {e}")))
}

#[async_trait]
impl EventStore for LibsqlStore {
    async fn list_raw_events(&self, page: Page) -> StoreResult<Vec<RawEventData>> {
        let limit = page.limit.map(|l| l as i64).unwrap_or(-1);
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, data FROM events ORDER BY starts_at IS NULL, starts_at, id LIMIT ?1 OFFSET ?2",
                libsql::params![limit, page.offset as i64],
            )
            .await
            .map_err(map_libsql_error)?;

        let mut documents = Vec::new();
        while let Some(row) = rows.next().await.map_err(map_libsql_error)? {
            let id = required_text_at(&row, 0)?;
            if let Some(document) = decode_listed(&id, &required_text_at(&row, 1)?) {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    async fn get_raw_event(&self, id: &str) -> StoreResult<Option<RawEventData>> {
        let conn = self.connection()?;
        let mut rows = conn
            .query("SELECT data FROM events WHERE id = ?1", libsql::params![id])
            .await
            .map_err(map_libsql_error)?;

        match rows.next().await.map_err(map_libsql_error)? {
            Some(row) => Ok(Some(decode_document(&required_text_at(&row, 0)?)?)),
            None => Ok(None),
        }
    }

    async fn create_event(&self, data: RawEventData) -> StoreResult<RawEventData> {
        let (id, data) = prepare_document(data, None)?;
        let encoded = encode_document(&data)?;

        self.connection()?
            .execute(
                "INSERT INTO events (id, starts_at, data) VALUES (?1, ?2, ?3)",
                libsql::params![id.as_str(), start_key(&data), encoded],
            )
            .await
            .map_err(map_libsql_error)?;

        debug!("Created event document with id {}", id);
        Ok(data)
    }

    async fn update_event(&self, id: &str, data: RawEventData) -> StoreResult<RawEventData> {
        let (id, data) = prepare_document(data, Some(id))?;
        let encoded = encode_document(&data)?;

        let changed = self
            .connection()?
            .execute(
                "UPDATE events SET starts_at = ?2, data = ?3, updated_at = datetime('now') WHERE id = ?1",
                libsql::params![id.as_str(), start_key(&data), encoded],
            )
            .await
            .map_err(map_libsql_error)?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("event {id}")));
        }
        debug!("Updated event document with id {}", id);
        Ok(data)
    }

    async fn delete_event(&self, id: &str) -> StoreResult<()> {
        let conn = self.connection()?;
        conn.execute(
            "DELETE FROM registrations WHERE event_id = ?1",
            libsql::params![id],
        )
        .await
        .map_err(map_libsql_error)?;

        let changed = conn
            .execute("DELETE FROM events WHERE id = ?1", libsql::params![id])
            .await
            .map_err(map_libsql_error)?;

        if changed == 0 {
            return Err(StoreError::NotFound(format!("event {id}")));
        }
        debug!("Deleted event {}", id);
        Ok(())
    }

    async fn insert_registration(&self, registration: NewRegistration) -> StoreResult<Registration> {
        let stored = Registration::from_new(Uuid::new_v4().to_string(), registration, Utc::now());

        let inserted = self
            .connection()?
            .execute(
                &format!(
                    "INSERT INTO registrations ({REGISTRATION_COLUMNS}) \
                     SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13 \
                     WHERE EXISTS (SELECT 1 FROM events WHERE id = ?2)"
                ),
                libsql::params![
                    stored.id.as_str(),
                    stored.event_id.as_str(),
                    stored.full_name.as_str(),
                    stored.email.as_str(),
                    stored.phone.clone(),
                    stored.participant_count as i64,
                    stored.special_requests.clone(),
                    stored.location.clone(),
                    stored.user_id.clone(),
                    stored.is_anonymous as i64,
                    stored.status.as_str(),
                    stored.payment_status as i64,
                    stored.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(map_libsql_error)?;

        if inserted == 0 {
            return Err(StoreError::ForeignKeyViolation(format!(
                "registrations.event_id = {}",
                stored.event_id
            )));
        }

        debug!("Created registration {} for event {}", stored.id, stored.event_id);
        Ok(stored)
    }

    async fn list_registrations(&self, event_id: &str) -> StoreResult<Vec<Registration>> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE event_id = ?1 ORDER BY created_at"
                ),
                libsql::params![event_id],
            )
            .await
            .map_err(map_libsql_error)?;

        let mut registrations = Vec::new();
        while let Some(row) = rows.next().await.map_err(map_libsql_error)? {
            registrations.push(Registration::try_from(read_registration(&row)?)?);
        }
        Ok(registrations)
    }
}
