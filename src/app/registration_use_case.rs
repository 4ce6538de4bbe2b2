use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::bounded;
use crate::constants::{MAX_PARTICIPANTS, MIN_PARTICIPANTS};
use crate::domain::{Identity, NewRegistration, Registration, RegistrationForm, RegistrationStatus};
use crate::error::{EventsError, Result};
use crate::storage::{EventStore, StoreError};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Validates and writes registrations.
///
/// Duplicate protection is the store's `(event_id, email)` uniqueness key;
/// nothing here locks or retries. A resubmission after a transient failure
/// is a fresh attempt.
pub struct RegistrationWriter {
    store: Arc<dyn EventStore>,
    timeout: Duration,
}

impl RegistrationWriter {
    pub fn new(store: Arc<dyn EventStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Validate and store one registration for the event named in the form
    pub async fn submit(&self, form: &RegistrationForm, identity: Identity) -> Result<Registration> {
        let registration = match validate(form, identity) {
            Ok(registration) => registration,
            Err(e) => {
                crate::observability::metrics::registrations::rejected(e.code());
                return Err(e);
            }
        };

        let event_id = registration.event_id.clone();
        let outcome = bounded(
            "insert_registration",
            self.timeout,
            self.store.insert_registration(registration),
        )
        .await;

        let result = match outcome {
            Some(Ok(stored)) => {
                info!(
                    registration_id = %stored.id,
                    event_id = %stored.event_id,
                    anonymous = stored.is_anonymous,
                    "Registration stored"
                );
                crate::observability::metrics::registrations::submitted();
                return Ok(stored);
            }
            Some(Err(StoreError::UniqueViolation(detail))) => {
                info!(event_id = %event_id, detail = %detail, "Duplicate registration rejected");
                EventsError::DuplicateRegistration
            }
            Some(Err(StoreError::ForeignKeyViolation(detail))) => {
                info!(event_id = %event_id, detail = %detail, "Registration for unknown event");
                EventsError::InvalidReference { event_id }
            }
            Some(Err(e)) => {
                warn!(event_id = %event_id, error = %e, "Registration write failed");
                EventsError::WriteFailed {
                    message: e.to_string(),
                }
            }
            None => EventsError::WriteFailed {
                message: format!("registration write timed out after {:?}", self.timeout),
            },
        };

        crate::observability::metrics::registrations::rejected(result.code());
        Err(result)
    }
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Check a submitted form and build the payload for the store.
///
/// Runs before any I/O, so a rejected form never reaches the store.
pub fn validate(form: &RegistrationForm, identity: Identity) -> Result<NewRegistration> {
    let event_id = form.event_id.trim();
    if event_id.is_empty() {
        return Err(EventsError::invalid_input("eventId", "An event must be selected."));
    }

    let full_name = form.full_name.trim();
    if full_name.is_empty() {
        return Err(EventsError::invalid_input("fullName", "Please enter your full name."));
    }

    let email = form.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(EventsError::invalid_input("email", "Please enter your email address."));
    }
    if !EMAIL_PATTERN.is_match(&email) {
        return Err(EventsError::invalid_input("email", "Please enter a valid email address."));
    }

    let participant_count = form.participant_count;
    if participant_count < MIN_PARTICIPANTS as i64 || participant_count > MAX_PARTICIPANTS as i64 {
        return Err(EventsError::invalid_input(
            "participantCount",
            format!("Number of participants must be between {MIN_PARTICIPANTS} and {MAX_PARTICIPANTS}."),
        ));
    }

    let (user_id, is_anonymous) = match identity {
        Identity::Authenticated { user_id } => (Some(user_id), false),
        Identity::Anonymous => (None, true),
    };

    Ok(NewRegistration {
        event_id: event_id.to_string(),
        full_name: full_name.to_string(),
        email,
        phone: optional_text(&form.phone),
        participant_count: participant_count as u32,
        special_requests: optional_text(&form.special_requests),
        location: optional_text(&form.location),
        user_id,
        is_anonymous,
        status: RegistrationStatus::Pending,
        payment_status: false,
    })
}
