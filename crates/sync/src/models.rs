//! Google Admin Directory API request/response structs and their conversion
//! into domain models.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use attrsync_core::models::{DirectoryGroup, UserInfo};

/// A directory user account with custom schema attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub primary_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_schemas: Option<HashMap<String, HashMap<String, serde_json::Value>>>,
}

impl ApiUser {
    /// Flatten the account into the attribute map the rule evaluator
    /// consumes. Custom schema fields are keyed by field name (schemas are
    /// walked in sorted order so duplicate field names resolve
    /// deterministically); `orgUnitPath` is exposed as a plain attribute.
    /// Non-scalar fields are skipped, so an absent attribute stays absent.
    pub fn into_user_info(self) -> Option<UserInfo> {
        let id = self.id?;
        let mut attributes = HashMap::new();
        if let Some(path) = self.org_unit_path {
            attributes.insert("orgUnitPath".to_string(), path);
        }
        if let Some(schemas) = self.custom_schemas {
            let mut schema_names: Vec<&String> = schemas.keys().collect();
            schema_names.sort();
            for schema in schema_names {
                for (field, value) in &schemas[schema] {
                    if let Some(scalar) = scalar_to_string(value) {
                        attributes.insert(field.clone(), scalar);
                    }
                }
            }
        }
        Some(UserInfo {
            id,
            email: self.primary_email,
            attributes,
        })
    }
}

fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Paginated user listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUserList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<ApiUser>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A directory group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGroup {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<ApiGroup> for DirectoryGroup {
    fn from(g: ApiGroup) -> Self {
        DirectoryGroup {
            id: g.id,
            name: g.name,
            email: g.email,
        }
    }
}

/// Paginated group listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGroupList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<ApiGroup>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A group membership entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMember {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Paginated member listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMemberList {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<ApiMember>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}
