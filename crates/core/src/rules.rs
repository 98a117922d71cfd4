//! Attribute-to-group mapping rules and their evaluation.
//!
//! Rule evaluation is pure: a malformed condition simply never matches, and
//! no evaluation path can fail.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

/// One `attribute == value` requirement, matched case-insensitively on both
/// the attribute key and the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeCondition {
    attribute: String,
    expected: String,
}

impl AttributeCondition {
    pub fn new(attribute: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            expected: expected.into(),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Whether the user's attribute map satisfies this condition. A missing
    /// attribute never matches; a condition with an empty attribute name
    /// never matches anyone.
    pub fn matches(&self, attrs: &HashMap<String, String>) -> bool {
        match self.lookup(attrs) {
            Some(value) => value.to_lowercase() == self.expected.to_lowercase(),
            None => false,
        }
    }

    /// Case-insensitive attribute lookup. An exact-case key takes priority
    /// over differently-cased duplicates; among those, the lexicographically
    /// smallest key wins, so the result never depends on map iteration order.
    pub fn lookup<'a>(&self, attrs: &'a HashMap<String, String>) -> Option<&'a str> {
        if self.attribute.is_empty() {
            return None;
        }
        if let Some(value) = attrs.get(&self.attribute) {
            return Some(value);
        }
        let wanted = self.attribute.to_lowercase();
        attrs
            .iter()
            .filter(|(k, _)| k.to_lowercase() == wanted)
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, v)| v.as_str())
    }
}

/// A mapping rule: a user belongs in `group_id` iff every condition matches.
///
/// Immutable once constructed. A rule with zero conditions never matches.
#[derive(Debug, Clone)]
pub struct AttributeMappingRule {
    group_name: String,
    group_id: String,
    conditions: Vec<AttributeCondition>,
}

impl AttributeMappingRule {
    pub fn new(
        group_name: impl Into<String>,
        group_id: impl Into<String>,
        conditions: Vec<AttributeCondition>,
    ) -> Self {
        Self {
            group_name: group_name.into(),
            group_id: group_id.into(),
            conditions,
        }
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn conditions(&self) -> &[AttributeCondition] {
        &self.conditions
    }

    /// Conjunction of all conditions. Every condition is evaluated so that
    /// each miss can be traced, even though the boolean result could
    /// short-circuit.
    pub fn matches(&self, attrs: &HashMap<String, String>) -> bool {
        if self.conditions.is_empty() {
            return false;
        }
        let mut all_matched = true;
        for condition in &self.conditions {
            if !condition.matches(attrs) {
                debug!(
                    group = %self.group_name,
                    attribute = %condition.attribute(),
                    expected = %condition.expected(),
                    actual = condition.lookup(attrs).unwrap_or("<absent>"),
                    "condition not satisfied"
                );
                all_matched = false;
            }
        }
        all_matched
    }

    /// The user's actual values for every condition attribute that matched.
    /// Sorted map so audit payloads serialize deterministically.
    pub fn matched_attributes(&self, attrs: &HashMap<String, String>) -> BTreeMap<String, String> {
        self.conditions
            .iter()
            .filter(|c| c.matches(attrs))
            .filter_map(|c| {
                c.lookup(attrs)
                    .map(|v| (c.attribute().to_string(), v.to_string()))
            })
            .collect()
    }

    /// The attribute values this rule expects, keyed by attribute name.
    pub fn expected_attributes(&self) -> BTreeMap<String, String> {
        self.conditions
            .iter()
            .map(|c| (c.attribute().to_string(), c.expected().to_string()))
            .collect()
    }
}

/// Registry of mapping rules, queried per user during reconciliation.
#[derive(Debug, Clone, Default)]
pub struct AttributeMapper {
    rules: Vec<AttributeMappingRule>,
    by_group: HashMap<String, usize>,
}

impl AttributeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. When two rules carry the same group ID, the
    /// last-registered rule wins for [`rule_for_group`](Self::rule_for_group);
    /// earlier rules are shadowed, not merged.
    pub fn register(&mut self, rule: AttributeMappingRule) {
        self.by_group
            .insert(rule.group_id().to_string(), self.rules.len());
        self.rules.push(rule);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[AttributeMappingRule] {
        &self.rules
    }

    /// Union of group IDs whose rules match the given attribute map.
    pub fn target_groups_for_user(&self, attrs: &HashMap<String, String>) -> HashSet<String> {
        self.rules
            .iter()
            .filter(|r| r.matches(attrs))
            .map(|r| r.group_id().to_string())
            .collect()
    }

    /// The rule governing a group, if one was registered for it.
    pub fn rule_for_group(&self, group_id: &str) -> Option<&AttributeMappingRule> {
        self.by_group.get(group_id).map(|&i| &self.rules[i])
    }
}
