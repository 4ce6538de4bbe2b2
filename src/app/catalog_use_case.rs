use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::bounded;
use crate::cache::{FetchSignature, ReadThroughCache};
use crate::config::Config;
use crate::domain::Event;
use crate::error::{EventsError, Result};
use crate::processing::{Clock, DefaultNormalizer, Normalizer, SystemClock};
use crate::storage::{EventStore, Page, StoreError};
use crate::types::{RawEventData, RawEventRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    #[default]
    All,
    Upcoming,
    Past,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    pub when: TimeFilter,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Read side of the events service: fetches raw documents, normalizes them,
/// and owns the read-through cache of store listings.
pub struct EventCatalog {
    store: Arc<dyn EventStore>,
    normalizer: Box<dyn Normalizer>,
    clock: Arc<dyn Clock>,
    cache: ReadThroughCache<Vec<RawEventData>>,
    timeout: Duration,
}

impl EventCatalog {
    pub fn new(
        store: Arc<dyn EventStore>,
        normalizer: Box<dyn Normalizer>,
        clock: Arc<dyn Clock>,
        cache_ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            normalizer,
            clock,
            cache: ReadThroughCache::new(cache_ttl),
            timeout,
        }
    }

    /// Catalog wired from configuration with the system clock
    pub fn from_config(store: Arc<dyn EventStore>, config: &Config) -> Self {
        Self::new(
            store,
            Box::new(DefaultNormalizer::new(&config.display)),
            Arc::new(SystemClock),
            Duration::from_secs(config.catalog.cache_ttl_secs),
            config.store.timeout(),
        )
    }

    /// List canonical events in start-date order.
    ///
    /// Records that fail normalization are logged and left out; they never
    /// fail the listing.
    pub async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>> {
        // Temporal filters need the full list, so pagination happens after them
        let page = match query.when {
            TimeFilter::All => Page::new(query.limit, query.offset),
            TimeFilter::Upcoming | TimeFilter::Past => Page::all(),
        };

        let documents = self.fetch_page(page).await?;
        let now = self.clock.now();
        let events = documents
            .iter()
            .filter_map(|data| match self.normalize_at(data, now) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(
                        id = %data.get("id").map(|v| v.to_string()).unwrap_or_default(),
                        error = %e,
                        "Skipping event record"
                    );
                    None
                }
            });

        let events: Vec<Event> = match query.when {
            TimeFilter::All => events.collect(),
            TimeFilter::Upcoming => events
                .filter(|e| !e.is_past())
                .skip(query.offset.unwrap_or(0))
                .take(query.limit.unwrap_or(usize::MAX))
                .collect(),
            TimeFilter::Past => events
                .filter(|e| e.is_past())
                .skip(query.offset.unwrap_or(0))
                .take(query.limit.unwrap_or(usize::MAX))
                .collect(),
        };

        debug!(count = events.len(), when = ?query.when, "Listed events");
        Ok(events)
    }

    /// One canonical event by id
    pub async fn get_event(&self, id: &str) -> Result<Event> {
        let document = match bounded("get_raw_event", self.timeout, self.store.get_raw_event(id)).await {
            Some(Ok(Some(document))) => document,
            Some(Ok(None)) | Some(Err(StoreError::NotFound(_))) => {
                return Err(EventsError::NotFound(format!("Event {id}")))
            }
            Some(Err(e)) => {
                return Err(EventsError::ReadFailed {
                    message: e.to_string(),
                })
            }
            None => {
                return Err(EventsError::ReadFailed {
                    message: format!("reading event {id} timed out"),
                })
            }
        };

        self.normalize_document(&document)
    }

    /// Normalize a document against the current clock
    pub fn normalize_document(&self, data: &RawEventData) -> Result<Event> {
        self.normalize_at(data, self.clock.now())
    }

    /// Drop cached listings after a write
    pub async fn invalidate(&self) {
        self.cache.invalidate_all().await;
    }

    fn normalize_at(&self, data: &RawEventData, now: chrono::DateTime<chrono::Utc>) -> Result<Event> {
        let record = RawEventRecord::from_json(data);
        match self.normalizer.normalize(&record, now) {
            Ok(event) => {
                crate::observability::metrics::events::normalized();
                Ok(event)
            }
            Err(e) => {
                if let EventsError::MalformedRecord { field } = &e {
                    crate::observability::metrics::events::malformed(field);
                }
                Err(e)
            }
        }
    }

    async fn fetch_page(&self, page: Page) -> Result<Arc<Vec<RawEventData>>> {
        let signature = FetchSignature::of("list_raw_events", &page);
        self.cache
            .get_or_load(&signature, || async {
                match bounded("list_raw_events", self.timeout, self.store.list_raw_events(page)).await {
                    Some(Ok(documents)) => Ok(documents),
                    Some(Err(e)) => Err(EventsError::ReadFailed {
                        message: e.to_string(),
                    }),
                    None => Err(EventsError::ReadFailed {
                        message: "listing events timed out".to_string(),
                    }),
                }
            })
            .await
    }
}
