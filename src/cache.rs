use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::constants::DEFAULT_CACHE_MAX_ENTRIES;

/// Identifies one store read by operation name and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchSignature(String);

impl FetchSignature {
    pub fn of<P: Serialize>(operation: &str, params: &P) -> Self {
        let encoded = serde_json::to_string(params).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(operation.as_bytes());
        hasher.update(b"|");
        hasher.update(encoded.as_bytes());
        FetchSignature(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct CachedEntry<V> {
    value: Arc<V>,
    stored_at: Instant,
}

/// Read-through cache for store fetches.
///
/// Owned by a single component; other components read through that
/// component's query methods and never touch the entries directly. A zero
/// TTL disables caching. Expired entries are purged on insert and the map
/// never holds more than `max_entries`, oldest evicted first.
///
/// A load that started before `invalidate_all` is returned to its caller
/// but not stored.
pub struct ReadThroughCache<V> {
    ttl: Duration,
    max_entries: usize,
    generation: AtomicU64,
    entries: RwLock<HashMap<FetchSignature, CachedEntry<V>>>,
}

impl<V: Send + Sync> ReadThroughCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_max_entries(ttl, DEFAULT_CACHE_MAX_ENTRIES)
    }

    pub fn with_max_entries(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            generation: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_load<F, Fut, E>(&self, signature: &FetchSignature, load: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if self.ttl.is_zero() {
            return load().await.map(Arc::new);
        }

        if let Some(entry) = self.entries.read().await.get(signature) {
            if entry.stored_at.elapsed() < self.ttl {
                crate::observability::metrics::cache::hit();
                return Ok(entry.value.clone());
            }
        }

        crate::observability::metrics::cache::miss();
        let generation = self.generation.load(Ordering::Acquire);
        let value = Arc::new(load().await?);

        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(signature = signature.as_str(), "Invalidated during load, not caching");
            return Ok(value);
        }

        let ttl = self.ttl;
        entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        if entries.len() >= self.max_entries && !entries.contains_key(signature) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            signature.clone(),
            CachedEntry {
                value: value.clone(),
                stored_at: Instant::now(),
            },
        );
        debug!(signature = signature.as_str(), "Cached fetch result");
        Ok(value)
    }

    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        if !entries.is_empty() {
            debug!("Invalidating {} cached fetches", entries.len());
        }
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_signature_depends_on_operation_and_params() {
        let a = FetchSignature::of("list", &(Some(10), 0));
        let b = FetchSignature::of("list", &(Some(10), 0));
        let c = FetchSignature::of("list", &(Some(10), 10));
        let d = FetchSignature::of("get", &(Some(10), 0));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.as_str().len(), 64);
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache: ReadThroughCache<Vec<u32>> = ReadThroughCache::new(Duration::from_secs(60));
        let loads = AtomicUsize::new(0);
        let sig = FetchSignature::of("list", &());

        for _ in 0..3 {
            let value = cache
                .get_or_load(&sig, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(*value, vec![1, 2, 3]);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        cache.invalidate_all().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: ReadThroughCache<u32> = ReadThroughCache::new(Duration::from_secs(60));
        let sig = FetchSignature::of("get", &"x");

        let failed = cache
            .get_or_load(&sig, || async { Err::<u32, _>("boom") })
            .await;
        assert!(failed.is_err());
        assert_eq!(cache.len().await, 0);

        let ok = cache.get_or_load(&sig, || async { Ok::<_, &str>(7) }).await;
        assert_eq!(*ok.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_loads() {
        let cache: ReadThroughCache<u32> = ReadThroughCache::new(Duration::ZERO);
        let loads = AtomicUsize::new(0);
        let sig = FetchSignature::of("get", &1);

        for _ in 0..2 {
            cache
                .get_or_load(&sig, || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(1)
                })
                .await
                .unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_load_overlapping_invalidation_is_not_cached() {
        let cache: ReadThroughCache<u32> = ReadThroughCache::new(Duration::from_secs(60));
        let sig = FetchSignature::of("list", &());
        let (release, gate) = tokio::sync::oneshot::channel::<()>();

        let load = cache.get_or_load(&sig, || async move {
            let _ = gate.await;
            Ok::<_, String>(1)
        });
        let write = async {
            cache.invalidate_all().await;
            let _ = release.send(());
        };
        let (loaded, ()) = tokio::join!(load, write);

        assert_eq!(*loaded.unwrap(), 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_entry_count_is_bounded() {
        let cache: ReadThroughCache<usize> =
            ReadThroughCache::with_max_entries(Duration::from_secs(60), 8);

        for offset in 0..500usize {
            let sig = FetchSignature::of("list", &offset);
            cache
                .get_or_load(&sig, || async move { Ok::<_, String>(offset) })
                .await
                .unwrap();
            assert!(cache.len().await <= 8);
        }

        // most recent entry survives eviction
        let last = FetchSignature::of("list", &499usize);
        let value = cache
            .get_or_load(&last, || async { Err::<usize, _>("should be cached") })
            .await
            .unwrap();
        assert_eq!(*value, 499);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_purged_on_insert() {
        let cache: ReadThroughCache<u32> = ReadThroughCache::new(Duration::from_secs(30));
        let first = FetchSignature::of("list", &1);
        cache.get_or_load(&first, || async { Ok::<_, String>(1) }).await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;

        let second = FetchSignature::of("list", &2);
        cache.get_or_load(&second, || async { Ok::<_, String>(2) }).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }
}
