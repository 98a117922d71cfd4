//! Resilient two-source fetch: prefer live API data, fall back to the cache,
//! and keep the cache warm on success.
//!
//! The cache read and the API call run as two concurrent tasks joined before
//! any decision is made. Cache I/O is best-effort throughout: a cache failure
//! is logged and treated as "no cached data", never propagated.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache::ObjectCache;
use crate::error::Result;

/// Fetch a resource with the default content-hash comparator.
pub async fn fetch_with_cache<T, F, Fut>(
    cache: &dyn ObjectCache,
    key: &str,
    api_call: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    fetch_with_cache_by(cache, key, api_call, content_hash_eq).await
}

/// Fetch a resource with a caller-supplied equality comparator deciding
/// whether the cache needs a refresh.
pub async fn fetch_with_cache_by<T, F, Fut, Cmp>(
    cache: &dyn ObjectCache,
    key: &str,
    api_call: F,
    same: Cmp,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
    Cmp: Fn(&T, &T) -> bool,
{
    let (cached, live) = tokio::join!(read_cached::<T>(cache, key), api_call());

    match live {
        Ok(value) => {
            let unchanged = cached.as_ref().is_some_and(|c| same(c, &value));
            if unchanged {
                debug!(key, "cache already current");
            } else {
                write_back(cache, key, &value).await;
            }
            Ok(value)
        }
        Err(api_err) => match cached {
            Some(stale) => {
                warn!(key, error = %api_err, "API fetch failed, serving cached value");
                Ok(stale)
            }
            None => Err(api_err),
        },
    }
}

/// Default comparator: SHA-256 over the serialized value. A serialization
/// failure reports "differs" so the cache write is forced rather than
/// skipped.
pub fn content_hash_eq<T: Serialize>(a: &T, b: &T) -> bool {
    match (serde_json::to_vec(a), serde_json::to_vec(b)) {
        (Ok(left), Ok(right)) => {
            Sha256::digest(&left).as_slice() == Sha256::digest(&right).as_slice()
        }
        _ => false,
    }
}

async fn read_cached<T: DeserializeOwned>(cache: &dyn ObjectCache, key: &str) -> Option<T> {
    let data = match cache.get(key).await {
        Ok(Some(data)) => data,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "cache read failed, treating as empty");
            return None;
        }
    };
    match serde_json::from_slice(&data) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "cached blob is unreadable, treating as empty");
            None
        }
    }
}

async fn write_back<T: Serialize>(cache: &dyn ObjectCache, key: &str, value: &T) {
    let data = match serde_json::to_vec(value) {
        Ok(data) => data,
        Err(e) => {
            warn!(key, error = %e, "cannot serialize value for cache write");
            return;
        }
    };
    if let Err(e) = cache.put(key, &data).await {
        warn!(key, error = %e, "cache write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::AttrSyncError;
    use async_trait::async_trait;

    /// Cache whose reads and writes always fail.
    struct BrokenCache;

    #[async_trait]
    impl ObjectCache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(AttrSyncError::Cache("read refused".into()))
        }
        async fn put(&self, _key: &str, _data: &[u8]) -> Result<()> {
            Err(AttrSyncError::Cache("write refused".into()))
        }
    }

    #[tokio::test]
    async fn api_success_returns_api_value_and_warms_cache() {
        let cache = MemoryCache::new();
        let value: Vec<u32> =
            fetch_with_cache(&cache, "k", || async { Ok(vec![1, 2, 3]) })
                .await
                .unwrap();
        assert_eq!(value, vec![1, 2, 3]);

        let written = cache.get("k").await.unwrap().unwrap();
        let parsed: Vec<u32> = serde_json::from_slice(&written).unwrap();
        assert_eq!(parsed, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn api_success_skips_write_when_unchanged() {
        struct CountingCache {
            inner: MemoryCache,
            writes: std::sync::atomic::AtomicUsize,
        }

        #[async_trait]
        impl ObjectCache for CountingCache {
            async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
                self.inner.get(key).await
            }
            async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
                self.writes
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                self.inner.put(key, data).await
            }
        }

        let cache = CountingCache {
            inner: MemoryCache::new(),
            writes: std::sync::atomic::AtomicUsize::new(0),
        };
        cache
            .inner
            .put("k", &serde_json::to_vec(&vec![7u32]).unwrap())
            .await
            .unwrap();

        let value: Vec<u32> = fetch_with_cache(&cache, "k", || async { Ok(vec![7]) })
            .await
            .unwrap();
        assert_eq!(value, vec![7]);
        assert_eq!(cache.writes.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn api_success_rewrites_on_change() {
        let cache = MemoryCache::new();
        cache
            .put("k", &serde_json::to_vec(&vec![1u32]).unwrap())
            .await
            .unwrap();

        let value: Vec<u32> = fetch_with_cache(&cache, "k", || async { Ok(vec![1, 2]) })
            .await
            .unwrap();
        assert_eq!(value, vec![1, 2]);

        let written: Vec<u32> =
            serde_json::from_slice(&cache.get("k").await.unwrap().unwrap()).unwrap();
        assert_eq!(written, vec![1, 2]);
    }

    #[tokio::test]
    async fn api_failure_falls_back_to_cache() {
        let cache = MemoryCache::new();
        cache
            .put("k", &serde_json::to_vec(&vec![9u32]).unwrap())
            .await
            .unwrap();

        let value: Vec<u32> = fetch_with_cache(&cache, "k", || async {
            Err(AttrSyncError::Directory("API down".into()))
        })
        .await
        .unwrap();
        assert_eq!(value, vec![9]);
    }

    #[tokio::test]
    async fn api_failure_without_cache_propagates() {
        let cache = MemoryCache::new();
        let result: Result<Vec<u32>> = fetch_with_cache(&cache, "k", || async {
            Err(AttrSyncError::Directory("API down".into()))
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("API down"));
    }

    #[tokio::test]
    async fn corrupt_cache_blob_treated_as_empty() {
        let cache = MemoryCache::new();
        cache.put("k", b"not json at all").await.unwrap();

        let result: Result<Vec<u32>> = fetch_with_cache(&cache, "k", || async {
            Err(AttrSyncError::Directory("API down".into()))
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn broken_cache_never_masks_api_success() {
        let cache = BrokenCache;
        let value: Vec<u32> = fetch_with_cache(&cache, "k", || async { Ok(vec![4]) })
            .await
            .unwrap();
        assert_eq!(value, vec![4]);
    }

    #[tokio::test]
    async fn broken_cache_and_failed_api_propagates_api_error() {
        let cache = BrokenCache;
        let result: Result<Vec<u32>> = fetch_with_cache(&cache, "k", || async {
            Err(AttrSyncError::Directory("API down".into()))
        })
        .await;
        assert!(matches!(result, Err(AttrSyncError::Directory(_))));
    }

    #[tokio::test]
    async fn custom_comparator_controls_write_back() {
        let cache = MemoryCache::new();
        cache
            .put("k", &serde_json::to_vec(&vec![1u32]).unwrap())
            .await
            .unwrap();

        // Comparator that treats everything as equal: no rewrite even though
        // the content differs.
        let value: Vec<u32> =
            fetch_with_cache_by(&cache, "k", || async { Ok(vec![2]) }, |_, _| true)
                .await
                .unwrap();
        assert_eq!(value, vec![2]);

        let cached: Vec<u32> =
            serde_json::from_slice(&cache.get("k").await.unwrap().unwrap()).unwrap();
        assert_eq!(cached, vec![1]);
    }

    #[test]
    fn content_hash_eq_detects_equality_and_difference() {
        assert!(content_hash_eq(&vec![1u32, 2], &vec![1u32, 2]));
        assert!(!content_hash_eq(&vec![1u32], &vec![2u32]));
    }
}
