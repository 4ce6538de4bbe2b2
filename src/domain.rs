use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Published => "published",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Completed => "completed",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(EventStatus::Draft),
            "published" => Ok(EventStatus::Published),
            // both spellings occur in stored data
            "cancelled" | "canceled" => Ok(EventStatus::Cancelled),
            "completed" => Ok(EventStatus::Completed),
            other => Err(format!("unknown event status '{other}'")),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical, display-ready event.
///
/// Only the normalizer builds these, so `is_past` always agrees with
/// `status` and `date`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub time_label: String,
    pub price_display: String,
    pub capacity_display: String,
    pub image_url: String,
    pub gallery: Vec<String>,
    pub status: Option<EventStatus>,
    pub(crate) is_past: bool,
}

impl Event {
    pub fn is_past(&self) -> bool {
        self.is_past
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RegistrationStatus::Pending),
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            other => Err(format!("unknown registration status '{other}'")),
        }
    }
}

/// Who is submitting a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Authenticated { user_id: String },
    Anonymous,
}

impl Identity {
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(user_id) => Identity::Authenticated {
                user_id: user_id.to_string(),
            },
            None => Identity::Anonymous,
        }
    }
}

/// Registration form as submitted by the public site.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    #[serde(default = "default_participant_count")]
    pub participant_count: i64,
    pub special_requests: Option<String>,
    pub location: Option<String>,
}

fn default_participant_count() -> i64 {
    1
}

/// A validated registration ready to be written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRegistration {
    pub event_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub participant_count: u32,
    pub special_requests: Option<String>,
    pub location: Option<String>,
    pub user_id: Option<String>,
    pub is_anonymous: bool,
    pub status: RegistrationStatus,
    pub payment_status: bool,
}

/// A registration as stored, including the store-assigned id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub event_id: String,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub participant_count: u32,
    pub special_requests: Option<String>,
    pub location: Option<String>,
    pub user_id: Option<String>,
    pub is_anonymous: bool,
    pub status: RegistrationStatus,
    pub payment_status: bool,
    pub created_at: DateTime<Utc>,
}

impl Registration {
    pub fn from_new(id: String, new: NewRegistration, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            event_id: new.event_id,
            full_name: new.full_name,
            email: new.email,
            phone: new.phone,
            participant_count: new.participant_count,
            special_requests: new.special_requests,
            location: new.location,
            user_id: new.user_id,
            is_anonymous: new.is_anonymous,
            status: new.status,
            payment_status: new.payment_status,
            created_at,
        }
    }
}
