//! API trait and implementations.
//!
//! [`Api`] has one function per remote call a managed kind needs.
//! [`http::HttpApi`] talks to a real server; [`mock::MockApi`] keeps
//! everything in memory for tests.
//!
//! # Testing
//!
//! ```
//! use labapi::backend::{Api, MockApi};
//! use labapi::BadgeOptions;
//!
//! let api = MockApi::new();
//! let badge = api
//!     .create_project_badge(
//!         "42",
//!         &BadgeOptions {
//!             name: Some("coverage".to_string()),
//!             link_url: Some("https://example.com".to_string()),
//!             image_url: Some("https://example.com/badge.svg".to_string()),
//!         },
//!     )
//!     .unwrap();
//! assert_eq!(api.get_project_badge("42", badge.id).unwrap(), badge);
//! ```

pub mod http;
pub mod mock;

pub use http::HttpApi;
pub use mock::MockApi;

use crate::error::Result;
use crate::types::{
    Badge, BadgeOptions, GroupMember, ListOptions, MemberOptions, Milestone, ProtectBranchOptions,
    ProtectedBranch, Release, ReleaseLink, ReleaseLinkOptions, ReleaseOptions,
    UpdateProtectedBranchOptions, UpdateReleaseOptions, User, Variable, VariableOptions,
};
use reconcile::Page;

/// Remote calls used by the managed kinds.
///
/// `project` and `group` accept a numeric id or a full path; implementations
/// escape them. Every "get" fails with a 404 [`crate::Error::HttpError`] when
/// the object does not exist.
pub trait Api: Send + Sync {
    // Project badges
    fn create_project_badge(&self, project: &str, options: &BadgeOptions) -> Result<Badge>;
    fn get_project_badge(&self, project: &str, badge_id: i64) -> Result<Badge>;
    fn edit_project_badge(
        &self,
        project: &str,
        badge_id: i64,
        options: &BadgeOptions,
    ) -> Result<Badge>;
    fn delete_project_badge(&self, project: &str, badge_id: i64) -> Result<()>;

    // Group members
    fn add_group_member(&self, group: &str, options: &MemberOptions) -> Result<GroupMember>;
    fn get_group_member(&self, group: &str, user_id: i64) -> Result<GroupMember>;
    fn edit_group_member(
        &self,
        group: &str,
        user_id: i64,
        options: &MemberOptions,
    ) -> Result<GroupMember>;
    fn remove_group_member(&self, group: &str, user_id: i64) -> Result<()>;

    // Protected branches
    fn protect_branch(
        &self,
        project: &str,
        options: &ProtectBranchOptions,
    ) -> Result<ProtectedBranch>;
    fn get_protected_branch(&self, project: &str, branch: &str) -> Result<ProtectedBranch>;
    fn update_protected_branch(
        &self,
        project: &str,
        branch: &str,
        options: &UpdateProtectedBranchOptions,
    ) -> Result<ProtectedBranch>;
    fn unprotect_branch(&self, project: &str, branch: &str) -> Result<()>;

    // Releases
    fn create_release(&self, project: &str, options: &ReleaseOptions) -> Result<Release>;
    fn get_release(&self, project: &str, tag_name: &str) -> Result<Release>;
    fn update_release(
        &self,
        project: &str,
        tag_name: &str,
        options: &UpdateReleaseOptions,
    ) -> Result<Release>;
    fn delete_release(&self, project: &str, tag_name: &str) -> Result<()>;

    // Release links
    fn create_release_link(
        &self,
        project: &str,
        tag_name: &str,
        options: &ReleaseLinkOptions,
    ) -> Result<ReleaseLink>;
    fn get_release_link(&self, project: &str, tag_name: &str, link_id: i64)
    -> Result<ReleaseLink>;
    fn update_release_link(
        &self,
        project: &str,
        tag_name: &str,
        link_id: i64,
        options: &ReleaseLinkOptions,
    ) -> Result<ReleaseLink>;
    fn delete_release_link(&self, project: &str, tag_name: &str, link_id: i64) -> Result<()>;
    fn list_release_links(
        &self,
        project: &str,
        tag_name: &str,
        options: &ListOptions,
    ) -> Result<Page<ReleaseLink>>;

    // Group variables
    fn create_group_variable(&self, group: &str, options: &VariableOptions) -> Result<Variable>;
    fn get_group_variable(&self, group: &str, key: &str, environment_scope: &str)
    -> Result<Variable>;
    fn update_group_variable(
        &self,
        group: &str,
        key: &str,
        environment_scope: &str,
        options: &VariableOptions,
    ) -> Result<Variable>;
    fn remove_group_variable(&self, group: &str, key: &str, environment_scope: &str)
    -> Result<()>;
    fn list_group_variables(&self, group: &str, options: &ListOptions) -> Result<Page<Variable>>;

    // Read-only
    fn list_project_milestones(
        &self,
        project: &str,
        options: &ListOptions,
    ) -> Result<Page<Milestone>>;
    fn current_user(&self) -> Result<User>;
}
