//! TOML-based configuration for AttrSync.
//!
//! Validation aggregates every violation it finds into a single
//! [`AttrSyncError::Config`], and runs before any directory call is made.
//! Group-name resolution happens once per run against a directory snapshot;
//! unresolvable names are logged and omitted rather than treated as fatal.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AttrSyncError, Result};
use crate::models::DirectoryGroup;
use crate::rules::{AttributeCondition, AttributeMapper, AttributeMappingRule};

/// Top-level AttrSync configuration, deserialized from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttrSyncConfig {
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub group_sync: GroupSyncConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Directory API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub customer_id: String,
    /// Bearer token for the directory API. May instead come from the
    /// `ATTRSYNC_DIRECTORY_TOKEN` environment variable at run time.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// API base URL override (for testing or private endpoints).
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Blob cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

fn default_cache_dir() -> String {
    "/var/lib/attrsync/cache".into()
}

/// Disposition of group members that do not match the group's mapping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ManualAssignmentPolicy {
    #[default]
    Warn,
    Remove,
}

/// One declarative mapping rule as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRuleConfig {
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Attribute-based group sync settings.
///
/// `managed_group_ids` starts empty and is populated exclusively by
/// [`resolve_groups`](Self::resolve_groups); everything else is immutable
/// from load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub managed_groups: Vec<String>,
    #[serde(default)]
    pub rules: Vec<MappingRuleConfig>,
    #[serde(default)]
    pub manual_assignment_policy: ManualAssignmentPolicy,
    /// Passed through to the external trigger; never interpreted here.
    #[serde(default = "default_sync_schedule")]
    pub sync_schedule: String,
    #[serde(skip)]
    pub managed_group_ids: BTreeMap<String, String>,
}

impl Default for GroupSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            managed_groups: Vec::new(),
            rules: Vec::new(),
            manual_assignment_policy: ManualAssignmentPolicy::Warn,
            sync_schedule: default_sync_schedule(),
            managed_group_ids: BTreeMap::new(),
        }
    }
}

fn default_sync_schedule() -> String {
    "0 * * * *".into()
}

/// Outbound notification settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl GroupSyncConfig {
    /// Resolve managed group names against a directory snapshot, returning a
    /// new configuration with `managed_group_ids` populated.
    ///
    /// Matching is case-insensitive on the group name. A name with no
    /// directory counterpart is logged and omitted; callers must treat the
    /// omission as "no rule active for that group this run".
    pub fn resolve_groups(&self, groups: &[DirectoryGroup]) -> Self {
        let mut resolved = self.clone();
        resolved.managed_group_ids = BTreeMap::new();
        for name in &self.managed_groups {
            let hit = groups
                .iter()
                .find(|g| g.name.to_lowercase() == name.to_lowercase());
            match hit {
                Some(group) => {
                    resolved
                        .managed_group_ids
                        .insert(name.clone(), group.id.clone());
                }
                None => {
                    warn!(group = %name, "managed group not found in directory, skipping this run");
                }
            }
        }
        resolved
    }

    /// Rules whose group resolved to a directory ID. A rule referencing a
    /// group that no longer exists degrades to "skipped" instead of failing
    /// the sync.
    pub fn valid_rules(&self) -> Vec<&MappingRuleConfig> {
        self.rules
            .iter()
            .filter(|r| {
                let known = self.managed_group_ids.contains_key(&r.group_name);
                if !known {
                    warn!(group = %r.group_name, "rule references unresolved group, skipping");
                }
                known
            })
            .collect()
    }

    /// Build the evaluator from the resolved, filtered rule set.
    pub fn build_mapper(&self) -> AttributeMapper {
        let mut mapper = AttributeMapper::new();
        for rule in self.valid_rules() {
            let group_id = &self.managed_group_ids[&rule.group_name];
            let conditions = rule
                .attributes
                .iter()
                .map(|(k, v)| AttributeCondition::new(k.clone(), v.clone()))
                .collect();
            mapper.register(AttributeMappingRule::new(
                rule.group_name.clone(),
                group_id.clone(),
                conditions,
            ));
        }
        mapper
    }
}

impl AttrSyncConfig {
    /// Load configuration from a TOML file at the given path. A structurally
    /// malformed file fails closed with a configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AttrSyncError::config(format!("failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Validate the configuration, aggregating every violation found.
    ///
    /// When group sync is disabled all other validation is skipped. This is
    /// the cheapest fail-fast point: it runs before any directory call.
    pub fn validate(&self) -> Result<()> {
        if !self.group_sync.enabled {
            return Ok(());
        }

        let mut violations = Vec::new();

        if self.directory.customer_id.is_empty() {
            violations.push("directory.customer_id must not be empty".to_string());
        }
        if self.cache.dir.is_empty() {
            violations.push("cache.dir must not be empty".to_string());
        }
        if self.group_sync.managed_groups.is_empty() {
            violations.push("group_sync.managed_groups must not be empty".to_string());
        }
        if self.group_sync.rules.is_empty() {
            violations.push("group_sync.rules must not be empty".to_string());
        }

        for (i, rule) in self.group_sync.rules.iter().enumerate() {
            if rule.group_name.is_empty() {
                violations.push(format!("group_sync.rules[{i}] is missing group_name"));
            }
            if rule.attributes.is_empty() {
                violations.push(format!(
                    "group_sync.rules[{i}] ({}) has no attributes",
                    display_name(&rule.group_name)
                ));
            }
            if !rule.group_name.is_empty()
                && !self.group_sync.managed_groups.contains(&rule.group_name)
            {
                violations.push(format!(
                    "group_sync.rules[{i}] references \"{}\" which is not in managed_groups",
                    rule.group_name
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(AttrSyncError::Config(violations))
        }
    }

    /// Generate a sensible default configuration.
    pub fn generate_default() -> Self {
        Self {
            directory: DirectoryConfig {
                customer_id: "my_customer".into(),
                auth_token: None,
                base_url: None,
            },
            cache: CacheConfig::default(),
            group_sync: GroupSyncConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "<unnamed>"
    } else {
        name
    }
}
