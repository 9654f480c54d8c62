//! HTTP backend.
//!
//! Blocking calls over `ureq` with the `PRIVATE-TOKEN` header. List endpoints
//! are offset-paginated; the next page number comes back in `X-Next-Page`,
//! empty on the last page.

use crate::backend::Api;
use crate::error::{Error, Result};
use crate::types::{
    Badge, BadgeOptions, GroupMember, ListOptions, MemberOptions, Milestone, ProtectBranchOptions,
    ProtectedBranch, Release, ReleaseLink, ReleaseLinkOptions, ReleaseOptions,
    UpdateProtectedBranchOptions, UpdateReleaseOptions, User, Variable, VariableOptions,
};
use log::debug;
use reconcile::{Cursor, Page};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://gitlab.com/api/v4";

const USER_AGENT: &str = concat!("labstate/", env!("CARGO_PKG_VERSION"));

/// HTTP backend.
///
/// # Example
///
/// ```no_run
/// use labapi::backend::{Api, HttpApi};
/// use std::time::Duration;
///
/// let api = HttpApi::new("https://gitlab.example.com/api/v4", Some("glpat-xxxx".into()),
///     Duration::from_secs(30));
/// let me = api.current_user().unwrap();
/// println!("signed in as {}", me.username);
/// ```
pub struct HttpApi {
    /// HTTP agent for requests.
    agent: Agent,
    /// API base URL, without a trailing slash.
    base_url: String,
    token: Option<String>,
}

impl HttpApi {
    /// Create a backend for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path);
        debug!("GET {url}");
        let mut request = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        let mut response = check(request.call()?)?;
        Ok(response.body_mut().read_json()?)
    }

    fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &ListOptions,
    ) -> Result<Page<T>> {
        let url = self.url(path);
        let page = options.page.to_string();
        let per_page = options.per_page.to_string();
        debug!("GET {url} page={page} per_page={per_page}");

        let mut request = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .query("page", &page)
            .query("per_page", &per_page);
        if let Some(token) = &self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }

        let mut response = check(request.call()?)?;
        let next = next_page(&response);
        let items: Vec<T> = response.body_mut().read_json()?;
        Ok(Page::new(items, next))
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        debug!("POST {url}");
        let mut request = self.agent.post(&url).header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }
        let mut response = check(request.send_json(body)?)?;
        Ok(response.body_mut().read_json()?)
    }

    fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        debug!("PUT {url}");
        let mut request = self.agent.put(&url).header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        let mut response = check(request.send_json(body)?)?;
        Ok(response.body_mut().read_json()?)
    }

    fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        debug!("PATCH {url}");
        let mut request = self.agent.patch(&url).header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }
        let mut response = check(request.send_json(body)?)?;
        Ok(response.body_mut().read_json()?)
    }

    fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<()> {
        let url = self.url(path);
        debug!("DELETE {url}");
        let mut request = self.agent.delete(&url).header("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            request = request.header("PRIVATE-TOKEN", token);
        }
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        check(request.call()?)?;
        Ok(())
    }
}

/// Escape one path segment (`group/project` becomes `group%2Fproject`).
fn seg(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Turn a non-2xx response into an error carrying the remote's message.
fn check(mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(Error::http(error_message(status, &body), Some(status)))
}

/// The API reports errors as `{"message": ...}` or `{"error": ...}`; the
/// message may be a string or a field-to-errors object.
fn error_message(status: u16, body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|v| v.get("message").or_else(|| v.get("error")));
    match detail {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None if body.trim().is_empty() => format!("HTTP {status}"),
        None => body.trim().to_string(),
    }
}

fn next_page(response: &Response<Body>) -> Option<Cursor> {
    response
        .headers()
        .get("x-next-page")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u32>().ok())
        .map(Cursor::Page)
}

fn scope_filter(environment_scope: &str) -> [(&'static str, &str); 1] {
    [("filter[environment_scope]", environment_scope)]
}

impl Api for HttpApi {
    fn create_project_badge(&self, project: &str, options: &BadgeOptions) -> Result<Badge> {
        self.post(&format!("/projects/{}/badges", seg(project)), options)
    }

    fn get_project_badge(&self, project: &str, badge_id: i64) -> Result<Badge> {
        self.get(
            &format!("/projects/{}/badges/{}", seg(project), badge_id),
            &[],
        )
    }

    fn edit_project_badge(
        &self,
        project: &str,
        badge_id: i64,
        options: &BadgeOptions,
    ) -> Result<Badge> {
        self.put(
            &format!("/projects/{}/badges/{}", seg(project), badge_id),
            &[],
            options,
        )
    }

    fn delete_project_badge(&self, project: &str, badge_id: i64) -> Result<()> {
        self.delete(
            &format!("/projects/{}/badges/{}", seg(project), badge_id),
            &[],
        )
    }

    fn add_group_member(&self, group: &str, options: &MemberOptions) -> Result<GroupMember> {
        self.post(&format!("/groups/{}/members", seg(group)), options)
    }

    fn get_group_member(&self, group: &str, user_id: i64) -> Result<GroupMember> {
        self.get(&format!("/groups/{}/members/{}", seg(group), user_id), &[])
    }

    fn edit_group_member(
        &self,
        group: &str,
        user_id: i64,
        options: &MemberOptions,
    ) -> Result<GroupMember> {
        self.put(
            &format!("/groups/{}/members/{}", seg(group), user_id),
            &[],
            options,
        )
    }

    fn remove_group_member(&self, group: &str, user_id: i64) -> Result<()> {
        self.delete(&format!("/groups/{}/members/{}", seg(group), user_id), &[])
    }

    fn protect_branch(
        &self,
        project: &str,
        options: &ProtectBranchOptions,
    ) -> Result<ProtectedBranch> {
        self.post(
            &format!("/projects/{}/protected_branches", seg(project)),
            options,
        )
    }

    fn get_protected_branch(&self, project: &str, branch: &str) -> Result<ProtectedBranch> {
        self.get(
            &format!(
                "/projects/{}/protected_branches/{}",
                seg(project),
                seg(branch)
            ),
            &[],
        )
    }

    fn update_protected_branch(
        &self,
        project: &str,
        branch: &str,
        options: &UpdateProtectedBranchOptions,
    ) -> Result<ProtectedBranch> {
        self.patch(
            &format!(
                "/projects/{}/protected_branches/{}",
                seg(project),
                seg(branch)
            ),
            options,
        )
    }

    fn unprotect_branch(&self, project: &str, branch: &str) -> Result<()> {
        self.delete(
            &format!(
                "/projects/{}/protected_branches/{}",
                seg(project),
                seg(branch)
            ),
            &[],
        )
    }

    fn create_release(&self, project: &str, options: &ReleaseOptions) -> Result<Release> {
        self.post(&format!("/projects/{}/releases", seg(project)), options)
    }

    fn get_release(&self, project: &str, tag_name: &str) -> Result<Release> {
        self.get(
            &format!("/projects/{}/releases/{}", seg(project), seg(tag_name)),
            &[],
        )
    }

    fn update_release(
        &self,
        project: &str,
        tag_name: &str,
        options: &UpdateReleaseOptions,
    ) -> Result<Release> {
        self.put(
            &format!("/projects/{}/releases/{}", seg(project), seg(tag_name)),
            &[],
            options,
        )
    }

    fn delete_release(&self, project: &str, tag_name: &str) -> Result<()> {
        self.delete(
            &format!("/projects/{}/releases/{}", seg(project), seg(tag_name)),
            &[],
        )
    }

    fn create_release_link(
        &self,
        project: &str,
        tag_name: &str,
        options: &ReleaseLinkOptions,
    ) -> Result<ReleaseLink> {
        self.post(
            &format!(
                "/projects/{}/releases/{}/assets/links",
                seg(project),
                seg(tag_name)
            ),
            options,
        )
    }

    fn get_release_link(
        &self,
        project: &str,
        tag_name: &str,
        link_id: i64,
    ) -> Result<ReleaseLink> {
        self.get(
            &format!(
                "/projects/{}/releases/{}/assets/links/{}",
                seg(project),
                seg(tag_name),
                link_id
            ),
            &[],
        )
    }

    fn update_release_link(
        &self,
        project: &str,
        tag_name: &str,
        link_id: i64,
        options: &ReleaseLinkOptions,
    ) -> Result<ReleaseLink> {
        self.put(
            &format!(
                "/projects/{}/releases/{}/assets/links/{}",
                seg(project),
                seg(tag_name),
                link_id
            ),
            &[],
            options,
        )
    }

    fn delete_release_link(&self, project: &str, tag_name: &str, link_id: i64) -> Result<()> {
        self.delete(
            &format!(
                "/projects/{}/releases/{}/assets/links/{}",
                seg(project),
                seg(tag_name),
                link_id
            ),
            &[],
        )
    }

    fn list_release_links(
        &self,
        project: &str,
        tag_name: &str,
        options: &ListOptions,
    ) -> Result<Page<ReleaseLink>> {
        self.get_page(
            &format!(
                "/projects/{}/releases/{}/assets/links",
                seg(project),
                seg(tag_name)
            ),
            options,
        )
    }

    fn create_group_variable(&self, group: &str, options: &VariableOptions) -> Result<Variable> {
        self.post(&format!("/groups/{}/variables", seg(group)), options)
    }

    fn get_group_variable(
        &self,
        group: &str,
        key: &str,
        environment_scope: &str,
    ) -> Result<Variable> {
        self.get(
            &format!("/groups/{}/variables/{}", seg(group), seg(key)),
            &scope_filter(environment_scope),
        )
    }

    fn update_group_variable(
        &self,
        group: &str,
        key: &str,
        environment_scope: &str,
        options: &VariableOptions,
    ) -> Result<Variable> {
        self.put(
            &format!("/groups/{}/variables/{}", seg(group), seg(key)),
            &scope_filter(environment_scope),
            options,
        )
    }

    fn remove_group_variable(
        &self,
        group: &str,
        key: &str,
        environment_scope: &str,
    ) -> Result<()> {
        self.delete(
            &format!("/groups/{}/variables/{}", seg(group), seg(key)),
            &scope_filter(environment_scope),
        )
    }

    fn list_group_variables(&self, group: &str, options: &ListOptions) -> Result<Page<Variable>> {
        self.get_page(&format!("/groups/{}/variables", seg(group)), options)
    }

    fn list_project_milestones(
        &self,
        project: &str,
        options: &ListOptions,
    ) -> Result<Page<Milestone>> {
        self.get_page(&format!("/projects/{}/milestones", seg(project)), options)
    }

    fn current_user(&self) -> Result<User> {
        self.get("/user", &[])
    }
}
