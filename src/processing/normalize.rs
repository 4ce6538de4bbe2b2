use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::DisplayConfig;
use crate::constants::{FREE_PRICE_LABEL, NO_DESCRIPTION, TBA_TIME_LABEL, UNLIMITED_CAPACITY_LABEL};
use crate::domain::{Event, EventStatus};
use crate::error::{EventsError, Result};
use crate::processing::gallery::GalleryResolver;
use crate::processing::temporal;
use crate::types::{parse_instant, RawEventRecord};

// 2^53 - 1, the largest integer an f64 holds exactly
const MAX_EXACT_CAPACITY: f64 = 9_007_199_254_740_991.0;

/// Trait for turning raw event records into canonical events
pub trait Normalizer: Send + Sync {
    /// Fails only when an identity field (`id`, `title`, `date`, `location`)
    /// is missing or unreadable.
    fn normalize(&self, record: &RawEventRecord, now: DateTime<Utc>) -> Result<Event>;
}

/// Normalizer driven by the display settings from configuration
pub struct DefaultNormalizer {
    currency: String,
    placeholder_image_url: String,
    gallery: GalleryResolver,
}

impl DefaultNormalizer {
    pub fn new(display: &DisplayConfig) -> Self {
        Self {
            currency: display.currency.clone(),
            placeholder_image_url: display.placeholder_image_url.clone(),
            gallery: GalleryResolver::new(display.default_gallery.clone()),
        }
    }

    pub fn price_display(&self, price: Option<f64>) -> String {
        match price {
            Some(value) => format!("{} {:.2}", self.currency, value),
            None => FREE_PRICE_LABEL.to_string(),
        }
    }
}

impl Default for DefaultNormalizer {
    fn default() -> Self {
        Self::new(&DisplayConfig::default())
    }
}

/// Capacities that are not positive, not finite, or beyond exact integer
/// range read as unlimited.
pub fn capacity_display(capacity: Option<f64>) -> String {
    match capacity {
        Some(value) if !value.is_finite() || value <= 0.0 || value > MAX_EXACT_CAPACITY => {
            UNLIMITED_CAPACITY_LABEL.to_string()
        }
        Some(value) if value.fract() == 0.0 => format!("{} participants", value as i64),
        Some(value) => format!("{value} participants"),
        None => UNLIMITED_CAPACITY_LABEL.to_string(),
    }
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str> {
    value.as_deref().ok_or_else(|| EventsError::malformed(field))
}

fn parse_status(raw: Option<&str>, event_id: &str) -> Option<EventStatus> {
    let raw = raw?;
    match raw.parse() {
        Ok(status) => Some(status),
        Err(e) => {
            debug!(event_id, "Ignoring status: {}", e);
            None
        }
    }
}

impl Normalizer for DefaultNormalizer {
    fn normalize(&self, record: &RawEventRecord, now: DateTime<Utc>) -> Result<Event> {
        let id = required(&record.id, "id")?;
        let title = required(&record.title, "title")?;
        let date = required(&record.date, "date").and_then(|raw| {
            parse_instant(raw).ok_or_else(|| EventsError::malformed("date"))
        })?;
        let location = required(&record.location, "location")?;

        let end_date = record.end_date.as_deref().and_then(parse_instant);
        let status = parse_status(record.status.as_deref(), id);
        let is_past = temporal::classify(status, date, now);

        let gallery = self
            .gallery
            .resolve(&record.gallery, record.image_url.as_deref(), is_past);

        let time_label = record
            .time_range
            .as_deref()
            .or(record.time.as_deref())
            .unwrap_or(TBA_TIME_LABEL)
            .to_string();

        Ok(Event {
            id: id.to_string(),
            title: title.to_string(),
            description: record
                .description
                .clone()
                .unwrap_or_else(|| NO_DESCRIPTION.to_string()),
            location: location.to_string(),
            date,
            end_date,
            time_label,
            price_display: self.price_display(record.price),
            capacity_display: capacity_display(record.capacity),
            image_url: record
                .image_url
                .clone()
                .unwrap_or_else(|| self.placeholder_image_url.clone()),
            gallery,
            status,
            is_past,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PLACEHOLDER_IMAGE_URL;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap()
    }

    fn normalize(data: serde_json::Value) -> Result<Event> {
        DefaultNormalizer::default().normalize(&RawEventRecord::from_json(&data), now())
    }

    fn base() -> serde_json::Value {
        json!({
            "id": "evt-1",
            "title": "Accra Tech Meetup",
            "description": "Monthly meetup",
            "date": "2025-06-01T17:00:00Z",
            "location": "Osu, Accra"
        })
    }

    #[test]
    fn test_price_formatting() {
        let mut data = base();
        data["price"] = json!(200);
        assert_eq!(normalize(data).unwrap().price_display, "GHS 200.00");

        let mut data = base();
        data["price"] = json!("75.5");
        assert_eq!(normalize(data).unwrap().price_display, "GHS 75.50");

        assert_eq!(normalize(base()).unwrap().price_display, "Free");

        let mut data = base();
        data["price"] = json!("donation");
        assert_eq!(normalize(data).unwrap().price_display, "Free");
    }

    #[test]
    fn test_capacity_formatting() {
        let mut data = base();
        data["capacity"] = json!(50);
        assert_eq!(normalize(data).unwrap().capacity_display, "50 participants");
        assert_eq!(normalize(base()).unwrap().capacity_display, "Unlimited");
        assert_eq!(capacity_display(Some(12.5)), "12.5 participants");
    }

    #[test]
    fn test_out_of_range_capacity_is_unlimited() {
        for value in [0.0, -3.0, 1e300, f64::NAN, f64::INFINITY] {
            assert_eq!(capacity_display(Some(value)), "Unlimited", "{value}");
        }
        assert_eq!(capacity_display(Some(9_007_199_254_740_991.0)), "9007199254740991 participants");
    }

    #[test]
    fn test_defaults_for_missing_optional_fields() {
        let mut data = base();
        data["description"] = json!("");
        let event = normalize(data).unwrap();

        assert_eq!(event.description, NO_DESCRIPTION);
        assert_eq!(event.time_label, "TBA");
        assert_eq!(event.image_url, PLACEHOLDER_IMAGE_URL);
        assert!(event.gallery.is_empty());
        assert_eq!(event.status, None);
        assert!(!event.is_past());
    }

    #[test]
    fn test_time_label_prefers_time_range() {
        let mut data = base();
        data["time"] = json!("5pm");
        assert_eq!(normalize(data.clone()).unwrap().time_label, "5pm");

        data["time_range"] = json!("5pm - 9pm");
        assert_eq!(normalize(data).unwrap().time_label, "5pm - 9pm");
    }

    #[test]
    fn test_missing_identity_fields_are_malformed() {
        for field in ["id", "title", "date", "location"] {
            let mut data = base();
            data.as_object_mut().unwrap().remove(field);
            match normalize(data) {
                Err(EventsError::MalformedRecord { field: f }) => assert_eq!(f, field),
                other => panic!("expected malformed {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unreadable_date_is_malformed() {
        let mut data = base();
        data["date"] = json!("sometime soon");
        assert!(matches!(
            normalize(data),
            Err(EventsError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_completed_status_forces_past_and_gallery() {
        let mut data = base();
        data["status"] = json!("completed");
        data["gallery"] = json!("[\"https://img/1.jpg\",\"https://img/1.jpg\"]");
        let event = normalize(data).unwrap();

        assert!(event.is_past());
        assert_eq!(event.status, Some(EventStatus::Completed));
        assert_eq!(event.gallery, vec!["https://img/1.jpg"]);
    }

    #[test]
    fn test_upcoming_event_discards_gallery() {
        let mut data = base();
        data["gallery"] = json!(["https://img/1.jpg"]);
        data["image_url"] = json!("https://img/cover.jpg");
        let event = normalize(data).unwrap();

        assert!(!event.is_past());
        assert!(event.gallery.is_empty());
        assert_eq!(event.image_url, "https://img/cover.jpg");
    }

    #[test]
    fn test_past_event_without_gallery_gets_defaults() {
        let mut data = base();
        data["date"] = json!("2024-01-01");
        let event = normalize(data).unwrap();

        assert!(event.is_past());
        assert_eq!(
            event.gallery,
            crate::constants::DEFAULT_PAST_GALLERY
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_unknown_status_is_ignored() {
        let mut data = base();
        data["status"] = json!("archived");
        assert_eq!(normalize(data).unwrap().status, None);
    }

    #[test]
    fn test_end_date_is_carried() {
        let mut data = base();
        data["end_date"] = json!("2025-06-01T21:00:00Z");
        let event = normalize(data).unwrap();
        assert_eq!(
            event.end_date,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 21, 0, 0).unwrap())
        );
    }
}
