//! Outbound notification collaborators.
//!
//! The orchestrator sends one payload per executed action, routed by action
//! kind, plus a run summary when anything changed or failed. Message
//! formatting beyond the structured JSON payload belongs to the receiving
//! system.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use attrsync_core::error::{AttrSyncError, Result};
use attrsync_core::models::{SyncAction, SyncActionKind, SyncRunResult};

/// Receives per-action and per-run notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_action(&self, action: &SyncAction) -> Result<()>;
    async fn notify_summary(&self, result: &SyncRunResult) -> Result<()>;
}

/// Notifier that discards everything. Used when no webhook is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify_action(&self, _action: &SyncAction) -> Result<()> {
        Ok(())
    }

    async fn notify_summary(&self, _result: &SyncRunResult) -> Result<()> {
        Ok(())
    }
}

/// Posts JSON payloads to a single webhook URL.
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier with a 30-second HTTP timeout.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("AttrSync-Webhook/1.0")
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    fn event_name(kind: SyncActionKind) -> &'static str {
        match kind {
            SyncActionKind::Add => "group_sync.member_added",
            SyncActionKind::Remove => "group_sync.member_removed",
            SyncActionKind::Warn => "group_sync.manual_member_detected",
        }
    }

    async fn post(&self, event: &str, payload: serde_json::Value) -> Result<()> {
        let resp = self
            .http
            .post(&self.url)
            .header("X-AttrSync-Event", event)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AttrSyncError::Notify(format!("webhook request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(AttrSyncError::Notify(format!(
                "webhook returned {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_action(&self, action: &SyncAction) -> Result<()> {
        let event = Self::event_name(action.kind);
        self.post(event, json!({ "event": event, "action": action }))
            .await
    }

    async fn notify_summary(&self, result: &SyncRunResult) -> Result<()> {
        self.post(
            "group_sync.run_summary",
            json!({
                "event": "group_sync.run_summary",
                "success": result.success,
                "dry_run": result.dry_run,
                "users_evaluated": result.users_evaluated,
                "groups_processed": result.groups_processed,
                "users_added": result.users_added,
                "users_removed": result.users_removed,
                "manual_assignments_detected": result.manual_assignments_detected,
                "manual_assignments_removed": result.manual_assignments_removed,
                "error_count": result.error_count(),
            }),
        )
        .await
    }
}
