//! Request and response payloads for the managed endpoints.

use reconcile::AccessGrant;
use serde::{Deserialize, Serialize};

/// Page selection for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl ListOptions {
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

// =============================================================================
// Project badges
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub link_url: String,
    pub image_url: String,
    #[serde(default)]
    pub rendered_link_url: String,
    #[serde(default)]
    pub rendered_image_url: String,
    /// `project` or `group`.
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BadgeOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

// =============================================================================
// Group members
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// User id.
    pub id: i64,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub state: String,
    pub access_level: i64,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemberOptions {
    /// Required when adding, ignored when editing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub access_level: i64,
    /// `YYYY-MM-DD`. Omitted keeps the current expiry on edit; an empty
    /// string clears it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

// =============================================================================
// Protected branches
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedBranch {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub push_access_levels: Vec<BranchAccess>,
    #[serde(default)]
    pub merge_access_levels: Vec<BranchAccess>,
    #[serde(default)]
    pub unprotect_access_levels: Vec<BranchAccess>,
    #[serde(default)]
    pub allow_force_push: bool,
    #[serde(default)]
    pub code_owner_approval_required: bool,
}

/// One push, merge or unprotect rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchAccess {
    pub id: i64,
    pub access_level: i64,
    #[serde(default)]
    pub access_level_description: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
}

impl From<&BranchAccess> for AccessGrant {
    fn from(access: &BranchAccess) -> Self {
        Self {
            access_level: access.access_level,
            access_level_description: access.access_level_description.clone(),
            user_id: access.user_id.unwrap_or(0),
            group_id: access.group_id.unwrap_or(0),
        }
    }
}

/// An entry of `allowed_to_push` / `allowed_to_merge` / `allowed_to_unprotect`.
///
/// With `id` set and `destroy` true it removes an existing rule; without an
/// `id` it adds one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllowedTo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_level: Option<i64>,
    #[serde(rename = "_destroy", skip_serializing_if = "Option::is_none")]
    pub destroy: Option<bool>,
}

impl AllowedTo {
    #[must_use]
    pub fn level(access_level: i64) -> Self {
        Self {
            access_level: Some(access_level),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn group(group_id: i64) -> Self {
        Self {
            group_id: Some(group_id),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn remove(id: i64) -> Self {
        Self {
            id: Some(id),
            destroy: Some(true),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProtectBranchOptions {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_access_level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_access_level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unprotect_access_level: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_force_push: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_owner_approval_required: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_to_push: Vec<AllowedTo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_to_merge: Vec<AllowedTo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateProtectedBranchOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_force_push: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_owner_approval_required: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_to_push: Vec<AllowedTo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_to_merge: Vec<AllowedTo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_to_unprotect: Vec<AllowedTo>,
}

// =============================================================================
// Releases and release links
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub released_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseOptions {
    pub tag_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Commit or branch to tag when the tag does not exist yet.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReleaseOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLink {
    pub id: i64,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub direct_asset_url: String,
    #[serde(default)]
    pub link_type: String,
    #[serde(default)]
    pub external: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseLinkOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
}

// =============================================================================
// Group variables
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    pub value: String,
    #[serde(default = "default_variable_type")]
    pub variable_type: String,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub masked: bool,
    #[serde(default)]
    pub raw: bool,
    #[serde(default = "default_environment_scope")]
    pub environment_scope: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_variable_type() -> String {
    "env_var".to_string()
}

fn default_environment_scope() -> String {
    "*".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariableOptions {
    /// Required when creating, ignored when updating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// Milestones and users
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: i64,
    pub iid: i64,
    #[serde(default)]
    pub project_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub expired: Option<bool>,
    #[serde(default)]
    pub web_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub public_email: Option<String>,
    #[serde(default)]
    pub namespace_id: Option<i64>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub web_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_access_into_grant() {
        let access: BranchAccess = serde_json::from_str(
            r#"{"id": 7, "access_level": 40, "access_level_description": "Maintainers",
                "user_id": null, "group_id": 12}"#,
        )
        .unwrap();
        let grant = AccessGrant::from(&access);
        assert_eq!(grant.user_id, 0);
        assert_eq!(grant.group_id, 12);
    }

    #[test]
    fn test_allowed_to_serialization() {
        let json = serde_json::to_value(AllowedTo::remove(9)).unwrap();
        assert_eq!(json, serde_json::json!({"id": 9, "_destroy": true}));

        let json = serde_json::to_value(AllowedTo::level(30)).unwrap();
        assert_eq!(json, serde_json::json!({"access_level": 30}));
    }

    #[test]
    fn test_release_options_ref_field() {
        let options = ReleaseOptions {
            tag_name: "v1.0.0".to_string(),
            git_ref: Some("main".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(options).unwrap();
        assert_eq!(json["ref"], "main");
        assert!(json.get("name").is_none());
    }

    #[test]
    fn test_variable_defaults() {
        let variable: Variable = serde_json::from_str(r#"{"key": "A", "value": "1"}"#).unwrap();
        assert_eq!(variable.variable_type, "env_var");
        assert_eq!(variable.environment_scope, "*");
    }
}
