use crate::domain::{NewRegistration, Registration};
use crate::types::RawEventData;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Failures as the store reports them, before use cases give them meaning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Pagination window for event listings. Also the fetch signature the
/// catalog cache is keyed by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self {
            limit,
            offset: offset.unwrap_or(0),
        }
    }
}

/// Backing store for raw event documents and registrations
#[async_trait]
pub trait EventStore: Send + Sync {
    // Event documents, ordered by start date ascending
    async fn list_raw_events(&self, page: Page) -> StoreResult<Vec<RawEventData>>;
    async fn get_raw_event(&self, id: &str) -> StoreResult<Option<RawEventData>>;

    // Admin writes. The stored document is returned with its `id` filled in.
    async fn create_event(&self, data: RawEventData) -> StoreResult<RawEventData>;
    async fn update_event(&self, id: &str, data: RawEventData) -> StoreResult<RawEventData>;
    async fn delete_event(&self, id: &str) -> StoreResult<()>;

    // Registrations. Inserting enforces the (event_id, email) uniqueness key
    // and the reference to an existing event.
    async fn insert_registration(&self, registration: NewRegistration) -> StoreResult<Registration>;
    async fn list_registrations(&self, event_id: &str) -> StoreResult<Vec<Registration>>;
}
