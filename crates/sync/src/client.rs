//! Typed reqwest wrapper for the Google Admin Directory API.

use reqwest::StatusCode;
use tracing::debug;

use attrsync_core::error::{AttrSyncError, Result};
use attrsync_core::models::{DirectoryGroup, UserInfo};

use crate::models::{ApiGroupList, ApiMember, ApiMemberList, ApiUserList};

const GOOGLE_ADMIN_API_BASE: &str = "https://admin.googleapis.com";
const PAGE_SIZE: u32 = 200;

/// HTTP client for directory read and membership write operations.
pub struct DirectoryClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: String,
    customer_id: String,
}

impl DirectoryClient {
    /// Create a new client with the given auth token and customer ID.
    pub fn new(auth_token: &str, customer_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: GOOGLE_ADMIN_API_BASE.to_string(),
            auth_token: auth_token.to_string(),
            customer_id: customer_id.to_string(),
        }
    }

    /// Override the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    fn users_url(&self) -> String {
        format!("{}/admin/directory/v1/users", self.base_url)
    }

    fn groups_url(&self) -> String {
        format!("{}/admin/directory/v1/groups", self.base_url)
    }

    fn members_url(&self, group_id: &str) -> String {
        format!(
            "{}/admin/directory/v1/groups/{}/members",
            self.base_url, group_id
        )
    }

    fn member_url(&self, group_id: &str, member_key: &str) -> String {
        format!(
            "{}/admin/directory/v1/groups/{}/members/{}",
            self.base_url, group_id, member_key
        )
    }

    /// List every user in the customer's directory, with custom schema
    /// attributes, following pagination to the end.
    pub async fn list_users(&self) -> Result<Vec<UserInfo>> {
        let mut users = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .http
                .get(self.users_url())
                .bearer_auth(&self.auth_token)
                .query(&[
                    ("customer", self.customer_id.as_str()),
                    ("projection", "full"),
                ])
                .query(&[("maxResults", PAGE_SIZE)]);
            if let Some(ref token) = page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| AttrSyncError::Directory(format!("list users request failed: {e}")))?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(AttrSyncError::Directory(format!(
                    "list users failed ({status}): {body}"
                )));
            }

            let page = resp
                .json::<ApiUserList>()
                .await
                .map_err(|e| AttrSyncError::Directory(format!("list users parse failed: {e}")))?;
            for api_user in page.users.unwrap_or_default() {
                if let Some(user) = api_user.into_user_info() {
                    users.push(user);
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = users.len(), "listed directory users");
        Ok(users)
    }

    /// List every group in the customer's directory.
    pub async fn list_groups(&self) -> Result<Vec<DirectoryGroup>> {
        let mut groups = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .http
                .get(self.groups_url())
                .bearer_auth(&self.auth_token)
                .query(&[("customer", self.customer_id.as_str())])
                .query(&[("maxResults", PAGE_SIZE)]);
            if let Some(ref token) = page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| AttrSyncError::Directory(format!("list groups request failed: {e}")))?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(AttrSyncError::Directory(format!(
                    "list groups failed ({status}): {body}"
                )));
            }

            let page = resp
                .json::<ApiGroupList>()
                .await
                .map_err(|e| AttrSyncError::Directory(format!("list groups parse failed: {e}")))?;
            groups.extend(page.groups.unwrap_or_default().into_iter().map(Into::into));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = groups.len(), "listed directory groups");
        Ok(groups)
    }

    /// List the user IDs currently in a group, following pagination. Member
    /// entries without an ID fall back to their email.
    pub async fn list_member_ids(&self, group_id: &str) -> Result<Vec<String>> {
        let mut member_ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .http
                .get(self.members_url(group_id))
                .bearer_auth(&self.auth_token)
                .query(&[("maxResults", PAGE_SIZE)]);
            if let Some(ref token) = page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req.send().await.map_err(|e| {
                AttrSyncError::Directory(format!("list members request failed: {e}"))
            })?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(AttrSyncError::Directory(format!(
                    "list members of {group_id} failed ({status}): {body}"
                )));
            }

            let page = resp
                .json::<ApiMemberList>()
                .await
                .map_err(|e| AttrSyncError::Directory(format!("list members parse failed: {e}")))?;
            for member in page.members.unwrap_or_default() {
                if let Some(key) = member.id.or(member.email) {
                    member_ids.push(key);
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(member_ids)
    }

    /// Add a user to a group. A 409 is treated as already a member;
    /// re-running after a partial failure must stay idempotent.
    pub async fn insert_member(&self, group_id: &str, user_id: &str) -> Result<()> {
        let member = ApiMember {
            id: Some(user_id.to_string()),
            email: None,
            role: Some("MEMBER".to_string()),
        };
        let resp = self
            .http
            .post(self.members_url(group_id))
            .bearer_auth(&self.auth_token)
            .json(&member)
            .send()
            .await
            .map_err(|e| AttrSyncError::Directory(format!("insert member request failed: {e}")))?;

        if resp.status() == StatusCode::CONFLICT {
            debug!(group_id, user_id, "member already present");
            return Ok(());
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AttrSyncError::Directory(format!(
                "add {user_id} to {group_id} failed ({status}): {body}"
            )));
        }
        Ok(())
    }

    /// Remove a member from a group. A 404 is treated as already removed;
    /// re-running after a partial failure must stay idempotent.
    pub async fn remove_member(&self, group_id: &str, member_key: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.member_url(group_id, member_key))
            .bearer_auth(&self.auth_token)
            .send()
            .await
            .map_err(|e| AttrSyncError::Directory(format!("remove member request failed: {e}")))?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(group_id, member_key, "member already absent");
            return Ok(());
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AttrSyncError::Directory(format!(
                "remove {member_key} from {group_id} failed ({status}): {body}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, DirectoryClient) {
        let server = MockServer::start().await;
        let client = DirectoryClient::new("test-token", "C12345").with_base_url(&server.uri());
        (server, client)
    }

    #[tokio::test]
    async fn list_groups_success() {
        let (server, client) = setup().await;

        let response_body = serde_json::json!({
            "groups": [
                {"id": "g1", "name": "Engineering", "email": "eng@example.com"},
                {"id": "g2", "name": "Sales"}
            ]
        });

        Mock::given(method("GET"))
            .and(path("/admin/directory/v1/groups"))
            .and(query_param("customer", "C12345"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let groups = client.list_groups().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, "g1");
        assert_eq!(groups[1].name, "Sales");
    }

    #[tokio::test]
    async fn list_groups_follows_pagination() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/admin/directory/v1/groups"))
            .and(query_param("pageToken", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "groups": [{"id": "g2", "name": "Sales"}]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/admin/directory/v1/groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "groups": [{"id": "g1", "name": "Engineering"}],
                "nextPageToken": "page2"
            })))
            .mount(&server)
            .await;

        let groups = client.list_groups().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, "g1");
        assert_eq!(groups[1].id, "g2");
    }

    #[tokio::test]
    async fn list_groups_server_error() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/admin/directory/v1/groups"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let err = client.list_groups().await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn list_users_flattens_attributes() {
        let (server, client) = setup().await;

        let response_body = serde_json::json!({
            "users": [
                {
                    "id": "u1",
                    "primaryEmail": "u1@example.com",
                    "orgUnitPath": "/Engineering",
                    "customSchemas": {
                        "employment": {"department": "Engineering"}
                    }
                },
                {
                    "primaryEmail": "no-id@example.com"
                }
            ]
        });

        Mock::given(method("GET"))
            .and(path("/admin/directory/v1/users"))
            .and(query_param("customer", "C12345"))
            .and(query_param("projection", "full"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let users = client.list_users().await.unwrap();
        // the entry without an id is dropped
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "u1");
        assert_eq!(users[0].attributes.get("department").unwrap(), "Engineering");
    }

    #[tokio::test]
    async fn list_member_ids_prefers_id_over_email() {
        let (server, client) = setup().await;

        let response_body = serde_json::json!({
            "members": [
                {"id": "u1", "email": "u1@example.com", "role": "MEMBER"},
                {"email": "external@example.org", "role": "MEMBER"}
            ]
        });

        Mock::given(method("GET"))
            .and(path("/admin/directory/v1/groups/g1/members"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&response_body))
            .mount(&server)
            .await;

        let ids = client.list_member_ids("g1").await.unwrap();
        assert_eq!(ids, vec!["u1".to_string(), "external@example.org".to_string()]);
    }

    #[tokio::test]
    async fn list_member_ids_empty_group() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/admin/directory/v1/groups/g1/members"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let ids = client.list_member_ids("g1").await.unwrap();
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn insert_member_success() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/admin/directory/v1/groups/g1/members"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "u1", "role": "MEMBER"
            })))
            .mount(&server)
            .await;

        client.insert_member("g1", "u1").await.unwrap();
    }

    #[tokio::test]
    async fn insert_member_409_is_idempotent() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/admin/directory/v1/groups/g1/members"))
            .respond_with(ResponseTemplate::new(409).set_body_string("Member already exists"))
            .mount(&server)
            .await;

        client.insert_member("g1", "u1").await.unwrap();
    }

    #[tokio::test]
    async fn insert_member_server_error() {
        let (server, client) = setup().await;

        Mock::given(method("POST"))
            .and(path("/admin/directory/v1/groups/g1/members"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let err = client.insert_member("g1", "u1").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn remove_member_success() {
        let (server, client) = setup().await;

        Mock::given(method("DELETE"))
            .and(path("/admin/directory/v1/groups/g1/members/u2"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        client.remove_member("g1", "u2").await.unwrap();
    }

    #[tokio::test]
    async fn remove_member_404_is_idempotent() {
        let (server, client) = setup().await;

        Mock::given(method("DELETE"))
            .and(path("/admin/directory/v1/groups/g1/members/u2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        client.remove_member("g1", "u2").await.unwrap();
    }

    #[tokio::test]
    async fn remove_member_server_error() {
        let (server, client) = setup().await;

        Mock::given(method("DELETE"))
            .and(path("/admin/directory/v1/groups/g1/members/u2"))
            .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
            .mount(&server)
            .await;

        let err = client.remove_member("g1", "u2").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
