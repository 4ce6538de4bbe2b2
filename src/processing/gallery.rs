use crate::error::{EventsError, Result};
use crate::types::RawGalleryField;
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

/// Turns whatever is stored in an event's `gallery` field into the list of
/// image URLs to render.
///
/// Upcoming events never show a gallery, only their primary image. Past
/// events always show something: when nothing usable is stored, the curated
/// default gallery is used instead.
#[derive(Debug, Clone)]
pub struct GalleryResolver {
    default_gallery: Vec<String>,
}

impl GalleryResolver {
    pub fn new(default_gallery: Vec<String>) -> Self {
        Self { default_gallery }
    }

    pub fn default_gallery(&self) -> &[String] {
        &self.default_gallery
    }

    pub fn resolve(
        &self,
        raw: &RawGalleryField,
        image_url: Option<&str>,
        is_past: bool,
    ) -> Vec<String> {
        // TODO: upcoming events drop even a curated gallery; revisit once product confirms.
        if !is_past {
            return Vec::new();
        }

        let images = usable_urls(self.candidates(raw, image_url));
        if images.is_empty() {
            return usable_urls(self.default_gallery.iter().cloned().map(Value::String).collect());
        }
        images
    }

    fn candidates(&self, raw: &RawGalleryField, image_url: Option<&str>) -> Vec<Value> {
        match raw {
            RawGalleryField::UrlList(items) => items.clone(),
            RawGalleryField::SingleUrl(url) => vec![Value::String(url.clone())],
            RawGalleryField::JsonEncoded(text) => match parse_encoded_gallery(text) {
                Ok(items) => items,
                Err(e) => {
                    warn!(error = %e, "Falling back from unreadable gallery");
                    crate::observability::metrics::gallery::parse_failure();
                    primary_image_only(image_url)
                }
            },
            RawGalleryField::Absent => primary_image_only(image_url),
        }
    }
}

fn primary_image_only(image_url: Option<&str>) -> Vec<Value> {
    image_url
        .filter(|url| !url.is_empty())
        .map(|url| vec![Value::String(url.to_string())])
        .unwrap_or_default()
}

/// Parse a JSON-encoded gallery. Some rows were written twice-encoded, so a
/// JSON string holding an array is unwrapped once.
pub fn parse_encoded_gallery(text: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| EventsError::GalleryParseFailure(e.to_string()))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::String(inner) => match serde_json::from_str::<Value>(&inner) {
            Ok(Value::Array(items)) => Ok(items),
            _ => Err(EventsError::GalleryParseFailure(
                "encoded string does not hold an array".to_string(),
            )),
        },
        other => Err(EventsError::GalleryParseFailure(format!(
            "expected an array, found {}",
            json_kind(&other)
        ))),
    }
}

/// Keep non-empty strings only, first occurrence wins.
fn usable_urls(items: Vec<Value>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(url) if !url.is_empty() => Some(url),
            _ => None,
        })
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver() -> GalleryResolver {
        GalleryResolver::new(vec![
            "https://img/default-1.jpg".to_string(),
            "https://img/default-2.jpg".to_string(),
            "https://img/default-1.jpg".to_string(),
        ])
    }

    #[test]
    fn test_upcoming_events_never_get_a_gallery() {
        let r = resolver();
        let inputs = [
            RawGalleryField::Absent,
            RawGalleryField::SingleUrl("https://img/a.jpg".to_string()),
            RawGalleryField::JsonEncoded("[\"https://img/a.jpg\"]".to_string()),
            RawGalleryField::UrlList(vec![json!("https://img/a.jpg")]),
        ];
        for raw in &inputs {
            assert!(r.resolve(raw, Some("https://img/cover.jpg"), false).is_empty());
        }
    }

    #[test]
    fn test_json_encoded_array_is_deduplicated_in_order() {
        let raw = RawGalleryField::JsonEncoded(
            json!(["https://img/b.jpg", "https://img/a.jpg", "https://img/b.jpg"]).to_string(),
        );
        assert_eq!(
            resolver().resolve(&raw, None, true),
            vec!["https://img/b.jpg", "https://img/a.jpg"]
        );
    }

    #[test]
    fn test_native_list_drops_falsy_and_non_string_entries() {
        let raw = RawGalleryField::UrlList(vec![
            json!(""),
            json!(null),
            json!("https://img/a.jpg"),
            json!(false),
            json!(3),
            json!("https://img/a.jpg"),
        ]);
        assert_eq!(resolver().resolve(&raw, None, true), vec!["https://img/a.jpg"]);
    }

    #[test]
    fn test_unparseable_gallery_falls_back_to_primary_image() {
        let raw = RawGalleryField::JsonEncoded("[not json".to_string());
        assert_eq!(
            resolver().resolve(&raw, Some("https://img/cover.jpg"), true),
            vec!["https://img/cover.jpg"]
        );
    }

    #[test]
    fn test_object_is_a_parse_failure() {
        let err = parse_encoded_gallery("{\"a\": 1}").unwrap_err();
        assert!(matches!(err, EventsError::GalleryParseFailure(_)));
    }

    #[test]
    fn test_double_encoded_array_is_unwrapped() {
        let encoded = serde_json::to_string(&json!(["x.jpg"]).to_string()).unwrap();
        assert_eq!(parse_encoded_gallery(&encoded).unwrap(), vec![json!("x.jpg")]);
    }

    #[test]
    fn test_absent_gallery_uses_primary_image() {
        assert_eq!(
            resolver().resolve(&RawGalleryField::Absent, Some("https://img/cover.jpg"), true),
            vec!["https://img/cover.jpg"]
        );
    }

    #[test]
    fn test_single_url_gallery() {
        let raw = RawGalleryField::SingleUrl("https://img/only.jpg".to_string());
        assert_eq!(
            resolver().resolve(&raw, Some("https://img/cover.jpg"), true),
            vec!["https://img/only.jpg"]
        );
    }

    #[test]
    fn test_past_event_without_images_gets_default_gallery_deduplicated() {
        assert_eq!(
            resolver().resolve(&RawGalleryField::Absent, None, true),
            vec!["https://img/default-1.jpg", "https://img/default-2.jpg"]
        );
        assert_eq!(
            resolver().resolve(&RawGalleryField::JsonEncoded("[]".to_string()), None, true),
            vec!["https://img/default-1.jpg", "https://img/default-2.jpg"]
        );
    }

    #[test]
    fn test_list_of_only_falsy_entries_gets_default_gallery() {
        let raw = RawGalleryField::UrlList(vec![json!(""), json!(null)]);
        assert_eq!(resolver().resolve(&raw, None, true).len(), 2);
    }
}
