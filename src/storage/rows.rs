use super::traits::{StoreError, StoreResult};
use crate::domain::{Registration, RegistrationStatus};
use chrono::{DateTime, Utc};

/// Column order shared by the SQL stores' registration queries.
pub(crate) const REGISTRATION_COLUMNS: &str = "id, event_id, full_name, email, phone, \
     participant_count, special_requests, location, user_id, is_anonymous, status, \
     payment_status, created_at";

/// A `registrations` row as read from SQL, before domain conversion
#[derive(Debug, Clone)]
pub(crate) struct RegistrationRow {
    pub id: String,
    pub event_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub participant_count: i64,
    pub special_requests: Option<String>,
    pub location: Option<String>,
    pub user_id: Option<String>,
    pub is_anonymous: i64,
    pub status: String,
    pub payment_status: i64,
    pub created_at: String,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = StoreError;

    fn try_from(row: RegistrationRow) -> StoreResult<Self> {
        let status: RegistrationStatus = row.status.parse().map_err(StoreError::Backend)?;
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| StoreError::Backend(format!("bad created_at '{}': {e}", row.created_at)))?
            .with_timezone(&Utc);
        let participant_count = u32::try_from(row.participant_count).map_err(|_| {
            StoreError::Backend(format!("bad participant_count {}", row.participant_count))
        })?;

        Ok(Registration {
            id: row.id,
            event_id: row.event_id,
            full_name: row.full_name,
            email: row.email,
            phone: row.phone,
            participant_count,
            special_requests: row.special_requests,
            location: row.location,
            user_id: row.user_id,
            is_anonymous: row.is_anonymous != 0,
            status,
            payment_status: row.payment_status != 0,
            created_at,
        })
    }
}
