use super::rows::{RegistrationRow, REGISTRATION_COLUMNS};
use super::traits::{EventStore, Page, StoreError, StoreResult};
use super::{decode_listed, prepare_document, start_key, MIGRATION_SQL};
use crate::domain::{NewRegistration, Registration};
use crate::types::RawEventData;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

// Extended result codes for constraint failures
const SQLITE_CONSTRAINT_FOREIGNKEY: i32 = 787;
const SQLITE_CONSTRAINT_PRIMARYKEY: i32 = 1555;
const SQLITE_CONSTRAINT_UNIQUE: i32 = 2067;

/// Local SQLite store.
///
/// rusqlite is blocking, so every call runs on the blocking pool against a
/// single shared connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Backend(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(map_sqlite_error)?;
        info!("Opened SQLite store at {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_error)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(map_sqlite_error)?;
        conn.execute_batch(MIGRATION_SQL).map_err(map_sqlite_error)?;
        debug!("SQLite migrations applied");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("sqlite task failed: {e}")))?
    }
}

pub(crate) fn map_sqlite_error(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(err, message) = &e {
        let detail = message.clone().unwrap_or_else(|| e.to_string());
        match err.extended_code {
            SQLITE_CONSTRAINT_UNIQUE | SQLITE_CONSTRAINT_PRIMARYKEY => {
                return StoreError::UniqueViolation(detail)
            }
            SQLITE_CONSTRAINT_FOREIGNKEY => return StoreError::ForeignKeyViolation(detail),
            _ => {}
        }
    }
    StoreError::Backend(e.to_string())
}

fn decode_document(data: &str) -> StoreResult<RawEventData> {
    serde_json::from_str(data)
        .map_err(|e| StoreError::Backend(format!("Failed to deserialize event document: {e}")))
}

fn encode_document(data: &RawEventData) -> StoreResult<String> {
    serde_json::to_string(data)
        .map_err(|e| StoreError::Backend(format!("Failed to serialize event document: {e}")))
}

fn read_registration(row: &rusqlite::Row<'_>) -> rusqlite::Result<RegistrationRow> {
    Ok(RegistrationRow {
        id: row.get(0)?,
        event_id: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        participant_count: row.get(5)?,
        special_requests: row.get(6)?,
        location: row.get(7)?,
        user_id: row.get(8)?,
        is_anonymous: row.get(9)?,
        status: row.get(10)?,
        payment_status: row.get(11)?,
        created_at: row.get(12)?,
    })
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn list_raw_events(&self, page: Page) -> StoreResult<Vec<RawEventData>> {
        // LIMIT -1 means no limit in SQLite
        let limit = page.limit.map(|l| l as i64).unwrap_or(-1);
        let offset = page.offset as i64;

        let rows: Vec<(String, String)> = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, data FROM events \
                         ORDER BY starts_at IS NULL, starts_at, id \
                         LIMIT ?1 OFFSET ?2",
                    )
                    .map_err(map_sqlite_error)?;
                let rows = stmt
                    .query_map(params![limit, offset], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })
                    .map_err(map_sqlite_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(map_sqlite_error)
            })
            .await?;

        Ok(rows
            .iter()
            .filter_map(|(id, data)| decode_listed(id, data))
            .collect())
    }

    async fn get_raw_event(&self, id: &str) -> StoreResult<Option<RawEventData>> {
        let id = id.to_string();
        let document: Option<String> = self
            .with_conn(move |conn| {
                conn.query_row("SELECT data FROM events WHERE id = ?1", params![id], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(map_sqlite_error)
            })
            .await?;

        document.as_deref().map(decode_document).transpose()
    }

    async fn create_event(&self, data: RawEventData) -> StoreResult<RawEventData> {
        let (id, data) = prepare_document(data, None)?;
        let encoded = encode_document(&data)?;
        let starts_at = start_key(&data);

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO events (id, starts_at, data) VALUES (?1, ?2, ?3)",
                params![id, starts_at, encoded],
            )
            .map_err(map_sqlite_error)?;
            debug!("Created event document with id {}", id);
            Ok(())
        })
        .await?;

        Ok(data)
    }

    async fn update_event(&self, id: &str, data: RawEventData) -> StoreResult<RawEventData> {
        let (id, data) = prepare_document(data, Some(id))?;
        let encoded = encode_document(&data)?;
        let starts_at = start_key(&data);

        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE events SET starts_at = ?2, data = ?3, updated_at = datetime('now') \
                     WHERE id = ?1",
                    params![id, starts_at, encoded],
                )
                .map_err(map_sqlite_error)?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("event {id}")));
            }
            debug!("Updated event document with id {}", id);
            Ok(())
        })
        .await?;

        Ok(data)
    }

    async fn delete_event(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn
                .execute("DELETE FROM events WHERE id = ?1", params![id])
                .map_err(map_sqlite_error)?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("event {id}")));
            }
            debug!("Deleted event {}", id);
            Ok(())
        })
        .await
    }

    async fn insert_registration(&self, registration: NewRegistration) -> StoreResult<Registration> {
        let stored = Registration::from_new(Uuid::new_v4().to_string(), registration, Utc::now());
        let row = stored.clone();

        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO registrations ({REGISTRATION_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    row.id,
                    row.event_id,
                    row.full_name,
                    row.email,
                    row.phone,
                    row.participant_count as i64,
                    row.special_requests,
                    row.location,
                    row.user_id,
                    row.is_anonymous as i64,
                    row.status.as_str(),
                    row.payment_status as i64,
                    row.created_at.to_rfc3339(),
                ],
            )
            .map_err(map_sqlite_error)?;
            Ok(())
        })
        .await?;

        debug!("Created registration {} for event {}", stored.id, stored.event_id);
        Ok(stored)
    }

    async fn list_registrations(&self, event_id: &str) -> StoreResult<Vec<Registration>> {
        let event_id = event_id.to_string();
        let rows: Vec<RegistrationRow> = self
            .with_conn(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {REGISTRATION_COLUMNS} FROM registrations \
                         WHERE event_id = ?1 ORDER BY created_at"
                    ))
                    .map_err(map_sqlite_error)?;
                let rows = stmt
                    .query_map(params![event_id], read_registration)
                    .map_err(map_sqlite_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(map_sqlite_error)
            })
            .await?;

        rows.into_iter().map(Registration::try_from).collect()
    }
}
