//! Metrics for the events service
//!
//! Counters are recorded through the `metrics` facade and rendered in the
//! Prometheus text format by the handle returned from [`init`]. Recording
//! before `init` (or in tests) is a no-op.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// All metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    EventsNormalized,
    EventsMalformed,
    GalleryParseFailures,
    CacheHits,
    CacheMisses,
    RegistrationsSubmitted,
    RegistrationsRejected,
    StoreTimeouts,
    UndecodableDocuments,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::EventsNormalized => "events_normalized_total",
            MetricName::EventsMalformed => "events_malformed_total",
            MetricName::GalleryParseFailures => "gallery_parse_failures_total",
            MetricName::CacheHits => "catalog_cache_hits_total",
            MetricName::CacheMisses => "catalog_cache_misses_total",
            MetricName::RegistrationsSubmitted => "registrations_submitted_total",
            MetricName::RegistrationsRejected => "registrations_rejected_total",
            MetricName::StoreTimeouts => "store_timeouts_total",
            MetricName::UndecodableDocuments => "store_undecodable_documents_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once; later calls
/// return the handle installed first.
pub fn init() -> Result<PrometheusHandle, String> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))?;
    info!("Metrics system initialized");

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

/// Render current metrics, if the recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

pub mod events {
    use super::MetricName;

    pub fn normalized() {
        ::metrics::counter!(MetricName::EventsNormalized.as_str()).increment(1);
    }

    pub fn malformed(field: &str) {
        ::metrics::counter!(MetricName::EventsMalformed.as_str(), "field" => field.to_string())
            .increment(1);
    }
}

pub mod gallery {
    use super::MetricName;

    pub fn parse_failure() {
        ::metrics::counter!(MetricName::GalleryParseFailures.as_str()).increment(1);
    }
}

pub mod cache {
    use super::MetricName;

    pub fn hit() {
        ::metrics::counter!(MetricName::CacheHits.as_str()).increment(1);
    }

    pub fn miss() {
        ::metrics::counter!(MetricName::CacheMisses.as_str()).increment(1);
    }
}

pub mod registrations {
    use super::MetricName;

    pub fn submitted() {
        ::metrics::counter!(MetricName::RegistrationsSubmitted.as_str()).increment(1);
    }

    /// `reason` is the error code returned to the caller
    pub fn rejected(reason: &'static str) {
        ::metrics::counter!(MetricName::RegistrationsRejected.as_str(), "reason" => reason)
            .increment(1);
    }
}

pub mod store {
    use super::MetricName;

    pub fn timeout(operation: &'static str) {
        ::metrics::counter!(MetricName::StoreTimeouts.as_str(), "operation" => operation)
            .increment(1);
    }

    pub fn undecodable_document() {
        ::metrics::counter!(MetricName::UndecodableDocuments.as_str()).increment(1);
    }
}
