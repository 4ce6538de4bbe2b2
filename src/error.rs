use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventsError {
    #[error("Malformed event record: missing or unreadable field '{field}'")]
    MalformedRecord { field: String },

    #[error("Gallery could not be parsed: {0}")]
    GalleryParseFailure(String),

    #[error("A registration with this email already exists for this event")]
    DuplicateRegistration,

    #[error("Registration references an event that does not exist: {event_id}")]
    InvalidReference { event_id: String },

    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },

    #[error("Read failed: {message}")]
    ReadFailed { message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EventsError {
    pub fn malformed(field: &str) -> Self {
        EventsError::MalformedRecord {
            field: field.to_string(),
        }
    }

    pub fn invalid_input(field: &str, message: impl Into<String>) -> Self {
        EventsError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            EventsError::MalformedRecord { .. } => "malformed_record",
            EventsError::GalleryParseFailure(_) => "gallery_parse_failure",
            EventsError::DuplicateRegistration => "duplicate_registration",
            EventsError::InvalidReference { .. } => "invalid_reference",
            EventsError::InvalidInput { .. } => "invalid_input",
            EventsError::WriteFailed { .. } => "write_failed",
            EventsError::ReadFailed { .. } => "read_failed",
            EventsError::NotFound(_) => "not_found",
            EventsError::Storage { .. } => "storage_error",
            EventsError::Config(_) => "config_error",
            EventsError::Json(_) => "invalid_json",
            EventsError::Toml(_) => "config_error",
            EventsError::Io(_) => "io_error",
        }
    }

    /// Message suitable for showing to the person who submitted a form.
    ///
    /// Store and transport failures collapse into a generic retry-later text;
    /// the underlying detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            EventsError::DuplicateRegistration => {
                "A registration with this email already exists for this event.".to_string()
            }
            EventsError::InvalidReference { .. } => {
                "This event is no longer available for registration.".to_string()
            }
            EventsError::InvalidInput { message, .. } => message.clone(),
            EventsError::NotFound(what) => format!("{what} was not found."),
            EventsError::MalformedRecord { .. } => "This event could not be displayed.".to_string(),
            EventsError::WriteFailed { .. }
            | EventsError::ReadFailed { .. }
            | EventsError::Storage { .. } => {
                "Something went wrong on our side. Please try again later.".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EventsError>;
