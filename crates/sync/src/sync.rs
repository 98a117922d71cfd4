//! Sync orchestrator: resolve groups, evaluate rules, fetch snapshots,
//! reconcile, and execute the resulting actions with per-action fault
//! isolation.

use std::sync::Arc;

use tracing::{error, info, warn};

use attrsync_core::cache::ObjectCache;
use attrsync_core::config::GroupSyncConfig;
use attrsync_core::fetch::fetch_with_cache;
use attrsync_core::models::{
    AuditRecord, GroupMembershipState, SyncAction, SyncActionKind, SyncRunResult,
};

use crate::audit::AuditSink;
use crate::client::DirectoryClient;
use crate::notify::Notifier;
use crate::state::SyncStateManager;

pub const GROUPS_CACHE_KEY: &str = "directory/groups.json";
pub const USERS_CACHE_KEY: &str = "directory/users.json";

fn members_cache_key(group_id: &str) -> String {
    format!("directory/members/{group_id}.json")
}

/// One-shot, re-entrant reconciliation engine. All collaborators are injected;
/// nothing here holds state across runs.
pub struct GroupSyncEngine {
    client: DirectoryClient,
    cache: Arc<dyn ObjectCache>,
    audit: Arc<dyn AuditSink>,
    notifier: Arc<dyn Notifier>,
    config: GroupSyncConfig,
}

impl GroupSyncEngine {
    pub fn new(
        client: DirectoryClient,
        cache: Arc<dyn ObjectCache>,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn Notifier>,
        config: GroupSyncConfig,
    ) -> Self {
        Self {
            client,
            cache,
            audit,
            notifier,
            config,
        }
    }

    /// Run one reconciliation pass. With `dry_run` every action is computed
    /// and counted but nothing is executed, cached, audited, or notified.
    ///
    /// The returned result always carries the counters gathered so far, even
    /// when a stage failed; `success` is false iff the error list is
    /// non-empty.
    pub async fn perform_sync(&self, dry_run: bool) -> SyncRunResult {
        let mut result = SyncRunResult::start(dry_run);

        if !self.config.enabled {
            info!("group sync is disabled, nothing to do");
            return result.finish();
        }

        info!(dry_run, "starting group sync");

        // 1. Resolve managed group names against the directory. Without
        // groups there is nothing meaningful to reconcile.
        let groups = match fetch_with_cache(self.cache.as_ref(), GROUPS_CACHE_KEY, || {
            self.client.list_groups()
        })
        .await
        {
            Ok(groups) => groups,
            Err(e) => {
                error!(error = %e, "failed to fetch directory groups");
                result.errors.push(format!("fetch directory groups: {e}"));
                return self.finalize(result, &[]).await;
            }
        };
        let resolved = self.config.resolve_groups(&groups);

        // 2. Build the evaluator from the resolved, filtered rule set.
        let mapper = resolved.build_mapper();
        if mapper.is_empty() {
            error!("no valid mapping rules after group resolution");
            result
                .errors
                .push("no valid mapping rules after group resolution".to_string());
            return self.finalize(result, &[]).await;
        }

        // 3. Fetch the user snapshot.
        let users = match fetch_with_cache(self.cache.as_ref(), USERS_CACHE_KEY, || {
            self.client.list_users()
        })
        .await
        {
            Ok(users) => users,
            Err(e) => {
                error!(error = %e, "failed to fetch directory users");
                result.errors.push(format!("fetch directory users: {e}"));
                return self.finalize(result, &[]).await;
            }
        };
        result.users_evaluated = users.len() as i64;

        // 4. Fetch current membership per managed group. A single group's
        // failure degrades that group to an empty snapshot.
        let mut states = Vec::with_capacity(resolved.managed_group_ids.len());
        for (name, id) in &resolved.managed_group_ids {
            let key = members_cache_key(id);
            match fetch_with_cache(self.cache.as_ref(), &key, || self.client.list_member_ids(id))
                .await
            {
                Ok(member_ids) => states.push(GroupMembershipState {
                    group_id: id.clone(),
                    group_name: name.clone(),
                    members: member_ids.into_iter().collect(),
                }),
                Err(e) => {
                    warn!(
                        group = %name,
                        group_id = %id,
                        error = %e,
                        "membership fetch failed, degrading to empty snapshot"
                    );
                    states.push(GroupMembershipState::empty(id.clone(), name.clone()));
                }
            }
        }
        result.groups_processed = states.len() as i64;

        // 5. Reconcile.
        let manager = SyncStateManager::new(
            &mapper,
            resolved.managed_group_ids.values().map(String::as_str),
            resolved.manual_assignment_policy,
        );
        let actions = manager.compute_actions(&users, &states);
        result.manual_assignments_detected = actions
            .iter()
            .filter(|a| matches!(a.kind, SyncActionKind::Remove | SyncActionKind::Warn))
            .count() as i64;

        // 6. Execute each action independently; one failure never aborts the
        // batch. Audit and notification failures are logged, never counted
        // against the action.
        for action in &actions {
            if dry_run {
                info!(
                    kind = ?action.kind,
                    user = %action.user_id,
                    group = %action.group_name,
                    "dry run, action not executed"
                );
                Self::count_action(&mut result, action);
                continue;
            }

            match self.execute_action(action).await {
                Ok(()) => {
                    Self::count_action(&mut result, action);
                    if let Err(e) = self.audit.record(&AuditRecord::from_action(action)).await {
                        warn!(user = %action.user_id, error = %e, "audit write failed");
                    }
                    if let Err(e) = self.notifier.notify_action(action).await {
                        warn!(user = %action.user_id, error = %e, "action notification failed");
                    }
                }
                Err(e) => {
                    error!(
                        kind = ?action.kind,
                        user = %action.user_id,
                        group = %action.group_name,
                        error = %e,
                        "action failed, continuing with remaining actions"
                    );
                    result.errors.push(format!(
                        "{:?} {} in {}: {e}",
                        action.kind, action.user_id, action.group_name
                    ));
                }
            }
        }

        // 7. Keep the groups cache warm with the fresh snapshot.
        if !dry_run {
            match serde_json::to_vec(&groups) {
                Ok(data) => {
                    if let Err(e) = self.cache.put(GROUPS_CACHE_KEY, &data).await {
                        warn!(error = %e, "groups cache refresh failed");
                    }
                }
                Err(e) => warn!(error = %e, "groups snapshot not serializable for cache"),
            }
        }

        self.finalize(result, &actions).await
    }

    /// Perform the directory call for one action. Warn actions touch nothing.
    async fn execute_action(&self, action: &SyncAction) -> attrsync_core::error::Result<()> {
        match action.kind {
            SyncActionKind::Add => {
                self.client
                    .insert_member(&action.group_id, &action.user_id)
                    .await
            }
            SyncActionKind::Remove => {
                self.client
                    .remove_member(&action.group_id, &action.user_id)
                    .await
            }
            SyncActionKind::Warn => Ok(()),
        }
    }

    fn count_action(result: &mut SyncRunResult, action: &SyncAction) {
        match action.kind {
            SyncActionKind::Add => result.users_added += 1,
            SyncActionKind::Remove => {
                result.users_removed += 1;
                result.manual_assignments_removed += 1;
            }
            SyncActionKind::Warn => {}
        }
    }

    /// Finalize and send the run summary when anything changed or failed, so
    /// no-op runs stay quiet.
    async fn finalize(&self, result: SyncRunResult, actions: &[SyncAction]) -> SyncRunResult {
        let result = result.finish();

        if !result.dry_run && (!actions.is_empty() || !result.errors.is_empty()) {
            if let Err(e) = self.notifier.notify_summary(&result).await {
                warn!(error = %e, "summary notification failed");
            }
        }

        info!(
            success = result.success,
            dry_run = result.dry_run,
            users_evaluated = result.users_evaluated,
            groups_processed = result.groups_processed,
            users_added = result.users_added,
            users_removed = result.users_removed,
            manual_assignments_detected = result.manual_assignments_detected,
            manual_assignments_removed = result.manual_assignments_removed,
            error_count = result.error_count(),
            "group sync finished"
        );
        result
    }
}
