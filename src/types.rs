use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Raw event document as returned from the backing store
pub type RawEventData = serde_json::Value;

/// The shapes a stored `gallery` field is seen in.
#[derive(Debug, Clone, PartialEq)]
pub enum RawGalleryField {
    Absent,
    SingleUrl(String),
    /// A string holding a JSON document, normally an array of URLs
    JsonEncoded(String),
    UrlList(Vec<Value>),
}

impl RawGalleryField {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => RawGalleryField::Absent,
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    RawGalleryField::Absent
                } else if trimmed.starts_with(['[', '{', '"']) {
                    RawGalleryField::JsonEncoded(trimmed.to_string())
                } else {
                    RawGalleryField::SingleUrl(trimmed.to_string())
                }
            }
            Some(Value::Array(items)) => RawGalleryField::UrlList(items.clone()),
            Some(_) => RawGalleryField::Absent,
        }
    }
}

/// Event fields pulled out of a raw document with their loose types resolved.
///
/// Nothing here fails: a missing or mistyped field becomes `None` and the
/// normalizer decides whether that is fatal for the record.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEventRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub end_date: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub capacity: Option<f64>,
    pub status: Option<String>,
    pub gallery: RawGalleryField,
    pub time_range: Option<String>,
    pub time: Option<String>,
}

impl RawEventRecord {
    pub fn from_json(data: &RawEventData) -> Self {
        Self {
            id: identifier(data.get("id")),
            title: text(data.get("title")),
            description: text(data.get("description")),
            date: text(data.get("date")),
            end_date: text(data.get("end_date").or_else(|| data.get("endDate"))),
            location: text(data.get("location")),
            image_url: text(data.get("image_url")),
            price: loose_number(data.get("price")),
            capacity: loose_number(data.get("capacity")),
            status: text(data.get("status")),
            gallery: RawGalleryField::from_value(data.get("gallery")),
            time_range: text(data.get("time_range")),
            time: text(data.get("time")),
        }
    }
}

/// Non-empty, trimmed string value.
fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Store ids arrive as strings from document stores and as integers from
/// relational ones.
fn identifier(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::Number(n)) => Some(n.to_string()),
        other => text(other),
    }
}

/// A JSON number, or a string that reads as a finite number.
pub fn loose_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Read a stored date as an absolute UTC instant.
///
/// Accepts RFC 3339, naive date-times (taken as UTC) and bare dates
/// (midnight UTC).
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
