//! Audit sink collaborators. The orchestrator emits one record per executed
//! action; sink failures are logged by the caller and never affect action
//! accounting.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use attrsync_core::cache::ObjectCache;
use attrsync_core::error::{AttrSyncError, Result};
use attrsync_core::models::AuditRecord;

/// Receives one record per executed sync action.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> Result<()>;
}

/// Audit sink that drops every record. Used when auditing is not configured.
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _record: &AuditRecord) -> Result<()> {
        Ok(())
    }
}

/// Persists each record as its own JSON object under a key prefix, one blob
/// per record so writes never race.
pub struct ObjectCacheAuditSink {
    cache: Arc<dyn ObjectCache>,
    prefix: String,
}

impl ObjectCacheAuditSink {
    pub fn new(cache: Arc<dyn ObjectCache>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    fn key_for(&self, record: &AuditRecord) -> String {
        format!(
            "{}/{}-{}.json",
            self.prefix,
            record.timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
            Uuid::new_v4()
        )
    }
}

#[async_trait]
impl AuditSink for ObjectCacheAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<()> {
        let data = serde_json::to_vec(record)
            .map_err(|e| AttrSyncError::Audit(format!("serialize audit record failed: {e}")))?;
        self.cache.put(&self.key_for(record), &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attrsync_core::cache::MemoryCache;
    use attrsync_core::models::{AuditRecord, SyncAction, SyncActionKind};

    fn sample_record() -> AuditRecord {
        AuditRecord::from_action(&SyncAction {
            kind: SyncActionKind::Add,
            user_id: "u1".into(),
            user_email: "u1@example.com".into(),
            group_id: "g1".into(),
            group_name: "Engineering".into(),
            reason: "attributes match the mapping rule".into(),
            attributes: None,
        })
    }

    #[tokio::test]
    async fn writes_one_blob_per_record() {
        let cache = Arc::new(MemoryCache::new());
        let sink = ObjectCacheAuditSink::new(cache.clone(), "audit");

        sink.record(&sample_record()).await.unwrap();
        sink.record(&sample_record()).await.unwrap();

        let keys = cache.keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with("audit/")));
        assert!(keys.iter().all(|k| k.ends_with(".json")));
    }

    #[tokio::test]
    async fn record_round_trips_through_blob() {
        let cache = Arc::new(MemoryCache::new());
        let sink = ObjectCacheAuditSink::new(cache.clone(), "audit");

        sink.record(&sample_record()).await.unwrap();

        let key = cache.keys().pop().unwrap();
        let blob = cache.get(&key).await.unwrap().unwrap();
        let parsed: AuditRecord = serde_json::from_slice(&blob).unwrap();
        assert_eq!(parsed.user_id, "u1");
        assert_eq!(parsed.group_name, "Engineering");
    }

    #[tokio::test]
    async fn null_sink_accepts_everything() {
        NullAuditSink.record(&sample_record()).await.unwrap();
    }
}
