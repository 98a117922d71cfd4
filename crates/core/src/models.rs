//! Domain models shared across the sync engine and its collaborators.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directory user with the attribute map the mapping rules evaluate.
///
/// Attribute keys are directory schema field names. An absent attribute is
/// never represented as an empty-string value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// A directory group as returned by the groups listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryGroup {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Snapshot of one group's current membership, consumed once per
/// reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMembershipState {
    pub group_id: String,
    pub group_name: String,
    pub members: HashSet<String>,
}

impl GroupMembershipState {
    /// An empty-membership snapshot, used when a group's membership fetch
    /// fails and the run degrades instead of aborting.
    pub fn empty(group_id: impl Into<String>, group_name: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            group_name: group_name.into(),
            members: HashSet::new(),
        }
    }
}

/// What a single corrective action does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncActionKind {
    Add,
    Remove,
    Warn,
}

/// One corrective action produced by the reconciliation engine.
///
/// Immutable once produced. `attributes` carries the matched attribute values
/// for adds, and the rule's expected attributes for remove/warn dispositions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncAction {
    pub kind: SyncActionKind,
    pub user_id: String,
    pub user_email: String,
    pub group_id: String,
    pub group_name: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
}

/// Audit operation categories, one per executed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    SyncAdd,
    SyncRemove,
    ManualDetected,
}

/// A single audit record emitted for every executed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub operation_type: AuditOperation,
    pub user_id: String,
    pub user_email: String,
    pub group_id: String,
    pub group_name: String,
    pub reason: String,
    pub matched_attributes: Option<BTreeMap<String, String>>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Derive the audit record for an executed action.
    pub fn from_action(action: &SyncAction) -> Self {
        let operation_type = match action.kind {
            SyncActionKind::Add => AuditOperation::SyncAdd,
            SyncActionKind::Remove => AuditOperation::SyncRemove,
            SyncActionKind::Warn => AuditOperation::ManualDetected,
        };
        Self {
            operation_type,
            user_id: action.user_id.clone(),
            user_email: action.user_email.clone(),
            group_id: action.group_id.clone(),
            group_name: action.group_name.clone(),
            reason: action.reason.clone(),
            matched_attributes: action.attributes.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Aggregated outcome of one reconciliation run.
///
/// `success` is true iff `errors` is empty, regardless of how many actions
/// succeeded before a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRunResult {
    pub success: bool,
    pub dry_run: bool,
    pub users_evaluated: i64,
    pub groups_processed: i64,
    pub users_added: i64,
    pub users_removed: i64,
    pub manual_assignments_detected: i64,
    pub manual_assignments_removed: i64,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncRunResult {
    /// Start a new run record with the clock captured now.
    pub fn start(dry_run: bool) -> Self {
        Self {
            success: false,
            dry_run,
            users_evaluated: 0,
            groups_processed: 0,
            users_added: 0,
            users_removed: 0,
            manual_assignments_detected: 0,
            manual_assignments_removed: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Finalize the run: stamp the end time and derive `success` from the
    /// error list.
    pub fn finish(mut self) -> Self {
        self.success = self.errors.is_empty();
        self.completed_at = Some(Utc::now());
        self
    }

    pub fn error_count(&self) -> i64 {
        self.errors.len() as i64
    }
}
