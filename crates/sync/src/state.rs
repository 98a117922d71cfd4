//! Reconciliation engine: diff desired membership against current membership
//! and emit the minimal corrective action list.
//!
//! Desired membership is a pure function of (rules, user snapshot). The
//! engine holds no state across runs; applying every emitted action exactly
//! once makes the next run a no-op.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use attrsync_core::config::ManualAssignmentPolicy;
use attrsync_core::models::{GroupMembershipState, SyncAction, SyncActionKind, UserInfo};
use attrsync_core::rules::AttributeMapper;

/// Per-run reconciliation state machine.
pub struct SyncStateManager<'a> {
    mapper: &'a AttributeMapper,
    managed_group_ids: HashSet<&'a str>,
    policy: ManualAssignmentPolicy,
}

impl<'a> SyncStateManager<'a> {
    pub fn new(
        mapper: &'a AttributeMapper,
        managed_group_ids: impl IntoIterator<Item = &'a str>,
        policy: ManualAssignmentPolicy,
    ) -> Self {
        Self {
            mapper,
            managed_group_ids: managed_group_ids.into_iter().collect(),
            policy,
        }
    }

    /// Compute the action list for the given snapshots.
    ///
    /// Groups are visited in `states` order and users in `users` order, with
    /// manual members sorted by ID, so the output is stable for a given
    /// input. Membership state for a group outside the managed set never
    /// generates actions.
    pub fn compute_actions(
        &self,
        users: &[UserInfo],
        states: &[GroupMembershipState],
    ) -> Vec<SyncAction> {
        let users_by_id: HashMap<&str, &UserInfo> =
            users.iter().map(|u| (u.id.as_str(), u)).collect();
        let targets: Vec<HashSet<String>> = users
            .iter()
            .map(|u| self.mapper.target_groups_for_user(&u.attributes))
            .collect();

        let mut actions = Vec::new();

        for state in states {
            if !self.managed_group_ids.contains(state.group_id.as_str()) {
                warn!(
                    group_id = %state.group_id,
                    group_name = %state.group_name,
                    "membership state for unmanaged group, skipping"
                );
                continue;
            }

            let rule = self.mapper.rule_for_group(&state.group_id);

            let mut desired: HashSet<&str> = HashSet::new();
            for (user, user_targets) in users.iter().zip(&targets) {
                if !user_targets.contains(&state.group_id) {
                    continue;
                }
                desired.insert(user.id.as_str());
                if state.members.contains(&user.id) {
                    continue;
                }
                let matched = rule.map(|r| r.matched_attributes(&user.attributes));
                actions.push(SyncAction {
                    kind: SyncActionKind::Add,
                    user_id: user.id.clone(),
                    user_email: user.email.clone(),
                    group_id: state.group_id.clone(),
                    group_name: state.group_name.clone(),
                    reason: format!(
                        "attributes match the mapping rule for group \"{}\"",
                        state.group_name
                    ),
                    attributes: matched,
                });
            }

            let mut manual: Vec<&str> = state
                .members
                .iter()
                .map(String::as_str)
                .filter(|id| !desired.contains(id))
                .collect();
            manual.sort_unstable();

            for member_id in manual {
                let email = users_by_id
                    .get(member_id)
                    .map(|u| u.email.clone())
                    .unwrap_or_default();
                let expected = rule.map(|r| r.expected_attributes());
                let (kind, reason) = match self.policy {
                    ManualAssignmentPolicy::Remove => (
                        SyncActionKind::Remove,
                        format!(
                            "member does not match the mapping rule for group \"{}\" (policy: remove)",
                            state.group_name
                        ),
                    ),
                    ManualAssignmentPolicy::Warn => (
                        SyncActionKind::Warn,
                        format!(
                            "member does not match the mapping rule for group \"{}\" (policy: warn)",
                            state.group_name
                        ),
                    ),
                };
                actions.push(SyncAction {
                    kind,
                    user_id: member_id.to_string(),
                    user_email: email,
                    group_id: state.group_id.clone(),
                    group_name: state.group_name.clone(),
                    reason,
                    attributes: expected,
                });
            }
        }

        debug!(count = actions.len(), "computed reconciliation actions");
        actions
    }
}
