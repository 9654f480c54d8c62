//! In-memory backend for tests.
//!
//! Mirrors the remote's observable behavior closely enough for reconciliation
//! tests: 404 for missing objects, 409/400 for conflicts and validation
//! failures, offset pagination with a next-page cursor, and optionally a few
//! stale not-found reads right after each mutation.

use crate::backend::Api;
use crate::error::{Error, Result};
use crate::types::{
    AllowedTo, Badge, BadgeOptions, BranchAccess, GroupMember, ListOptions, MemberOptions,
    Milestone, ProtectBranchOptions, ProtectedBranch, Release, ReleaseLink, ReleaseLinkOptions,
    ReleaseOptions, UpdateProtectedBranchOptions, UpdateReleaseOptions, User, Variable,
    VariableOptions,
};
use reconcile::{AccessLevel, Cursor, Page, WireEnum};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    users: BTreeMap<i64, (String, String)>,
    groups: BTreeMap<i64, String>,
    badges: BTreeMap<(String, i64), Badge>,
    members: BTreeMap<(String, i64), GroupMember>,
    branches: BTreeMap<(String, String), ProtectedBranch>,
    releases: BTreeMap<(String, String), Release>,
    /// Links per release, in creation order.
    links: BTreeMap<(String, String), Vec<ReleaseLink>>,
    /// Variables per group, in creation order.
    variables: BTreeMap<String, Vec<Variable>>,
    milestones: BTreeMap<String, Vec<Milestone>>,
    current_user: Option<User>,
    list_calls: HashMap<&'static str, usize>,
    stale_reads: usize,
    stale_remaining: usize,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Called after every successful mutation.
    fn mutated(&mut self) {
        self.stale_remaining = self.stale_reads;
    }

    /// Called at the start of every single-object read.
    fn stale(&mut self, what: &str) -> Result<()> {
        if self.stale_remaining > 0 {
            self.stale_remaining -= 1;
            return Err(Error::not_found(what));
        }
        Ok(())
    }

    fn count_list(&mut self, endpoint: &'static str) {
        *self.list_calls.entry(endpoint).or_default() += 1;
    }

    fn describe(&self, access: &AllowedTo) -> Result<BranchAccess> {
        let (access_level, description) = match (access.user_id, access.group_id) {
            (Some(user_id), _) => {
                let (_, name) = self
                    .users
                    .get(&user_id)
                    .ok_or_else(|| Error::not_found("User"))?;
                (access.access_level.unwrap_or(40), name.clone())
            }
            (None, Some(group_id)) => {
                let name = self
                    .groups
                    .get(&group_id)
                    .ok_or_else(|| Error::not_found("Group"))?;
                (access.access_level.unwrap_or(40), name.clone())
            }
            (None, None) => {
                let code = access
                    .access_level
                    .ok_or_else(|| Error::rejected(400, "access_level is missing"))?;
                let level = AccessLevel::from_code(code)
                    .map_err(|_| Error::rejected(400, "access_level does not have a valid value"))?;
                (code, level.description().to_string())
            }
        };
        Ok(BranchAccess {
            id: 0,
            access_level,
            access_level_description: description,
            user_id: access.user_id,
            group_id: access.group_id,
        })
    }
}

fn page_of<T: Clone>(items: &[T], options: &ListOptions) -> Page<T> {
    let per_page = options.per_page.max(1) as usize;
    let page = options.page.max(1) as usize;
    let start = (page - 1) * per_page;
    let end = (start + per_page).min(items.len());
    let slice = if start < items.len() {
        items[start..end].to_vec()
    } else {
        Vec::new()
    };
    let next = (end < items.len()).then(|| Cursor::Page(options.page.max(1) + 1));
    Page::new(slice, next)
}

/// Mock backend for testing without network access.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<State>>,
}

impl MockApi {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user that can be added to groups and named in grants.
    pub fn add_user(&self, id: i64, username: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .users
            .insert(id, (username.to_string(), name.to_string()));
    }

    /// Register a group that can be named in grants.
    pub fn add_group(&self, id: i64, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.groups.insert(id, name.to_string());
    }

    /// Add a milestone; iids are assigned per project in insertion order.
    pub fn add_milestone(&self, project: &str, title: &str, description: &str) -> Milestone {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let iid = state.milestones.get(project).map_or(0, Vec::len) as i64 + 1;
        let milestone = Milestone {
            id,
            iid,
            project_id: project.parse().unwrap_or_default(),
            title: title.to_string(),
            description: description.to_string(),
            state: "active".to_string(),
            start_date: None,
            due_date: None,
            expired: Some(false),
            web_url: format!("https://gitlab.example.com/{project}/-/milestones/{iid}"),
        };
        state
            .milestones
            .entry(project.to_string())
            .or_default()
            .push(milestone.clone());
        milestone
    }

    /// Store a protected branch as-is, bypassing validation.
    pub fn insert_protected_branch(&self, project: &str, branch: ProtectedBranch) {
        let mut state = self.state.lock().unwrap();
        state
            .branches
            .insert((project.to_string(), branch.name.clone()), branch);
    }

    /// Set the user returned by [`Api::current_user`].
    pub fn set_current_user(&self, user: User) {
        self.state.lock().unwrap().current_user = Some(user);
    }

    /// Make the next `reads` single-object reads after each mutation 404.
    pub fn set_stale_reads(&self, reads: usize) {
        let mut state = self.state.lock().unwrap();
        state.stale_reads = reads;
        state.stale_remaining = 0;
    }

    /// Number of page fetches made against a list endpoint.
    pub fn list_calls(&self, endpoint: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.list_calls.get(endpoint).copied().unwrap_or(0)
    }
}

impl Api for MockApi {
    fn create_project_badge(&self, project: &str, options: &BadgeOptions) -> Result<Badge> {
        let link_url = options.link_url.clone().unwrap_or_default();
        let image_url = options.image_url.clone().unwrap_or_default();
        if link_url.is_empty() || image_url.is_empty() {
            return Err(Error::rejected(400, "link_url, image_url are missing"));
        }
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let badge = Badge {
            id,
            name: options.name.clone().unwrap_or_default(),
            rendered_link_url: link_url.replace("%{project_path}", project),
            rendered_image_url: image_url.replace("%{project_path}", project),
            link_url,
            image_url,
            kind: "project".to_string(),
        };
        state
            .badges
            .insert((project.to_string(), id), badge.clone());
        state.mutated();
        Ok(badge)
    }

    fn get_project_badge(&self, project: &str, badge_id: i64) -> Result<Badge> {
        let mut state = self.state.lock().unwrap();
        state.stale("Badge")?;
        state
            .badges
            .get(&(project.to_string(), badge_id))
            .cloned()
            .ok_or_else(|| Error::not_found("Badge"))
    }

    fn edit_project_badge(
        &self,
        project: &str,
        badge_id: i64,
        options: &BadgeOptions,
    ) -> Result<Badge> {
        let mut state = self.state.lock().unwrap();
        let badge = state
            .badges
            .get_mut(&(project.to_string(), badge_id))
            .ok_or_else(|| Error::not_found("Badge"))?;
        if let Some(name) = &options.name {
            badge.name = name.clone();
        }
        if let Some(link_url) = &options.link_url {
            badge.link_url = link_url.clone();
            badge.rendered_link_url = link_url.replace("%{project_path}", project);
        }
        if let Some(image_url) = &options.image_url {
            badge.image_url = image_url.clone();
            badge.rendered_image_url = image_url.replace("%{project_path}", project);
        }
        let badge = badge.clone();
        state.mutated();
        Ok(badge)
    }

    fn delete_project_badge(&self, project: &str, badge_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .badges
            .remove(&(project.to_string(), badge_id))
            .ok_or_else(|| Error::not_found("Badge"))?;
        state.mutated();
        Ok(())
    }

    fn add_group_member(&self, group: &str, options: &MemberOptions) -> Result<GroupMember> {
        let user_id = options
            .user_id
            .ok_or_else(|| Error::rejected(400, "user_id is missing"))?;
        AccessLevel::from_code(options.access_level)
            .map_err(|_| Error::rejected(400, "access_level does not have a valid value"))?;

        let mut state = self.state.lock().unwrap();
        let (username, name) = state
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| Error::not_found("User"))?;
        let key = (group.to_string(), user_id);
        if state.members.contains_key(&key) {
            return Err(Error::rejected(409, "Member already exists"));
        }
        let member = GroupMember {
            id: user_id,
            username,
            name,
            state: "active".to_string(),
            access_level: options.access_level,
            expires_at: options.expires_at.clone().filter(|date| !date.is_empty()),
        };
        state.members.insert(key, member.clone());
        state.mutated();
        Ok(member)
    }

    fn get_group_member(&self, group: &str, user_id: i64) -> Result<GroupMember> {
        let mut state = self.state.lock().unwrap();
        state.stale("Member")?;
        state
            .members
            .get(&(group.to_string(), user_id))
            .cloned()
            .ok_or_else(|| Error::not_found("Member"))
    }

    fn edit_group_member(
        &self,
        group: &str,
        user_id: i64,
        options: &MemberOptions,
    ) -> Result<GroupMember> {
        AccessLevel::from_code(options.access_level)
            .map_err(|_| Error::rejected(400, "access_level does not have a valid value"))?;
        let mut state = self.state.lock().unwrap();
        let member = state
            .members
            .get_mut(&(group.to_string(), user_id))
            .ok_or_else(|| Error::not_found("Member"))?;
        member.access_level = options.access_level;
        if let Some(date) = &options.expires_at {
            member.expires_at = (!date.is_empty()).then(|| date.clone());
        }
        let member = member.clone();
        state.mutated();
        Ok(member)
    }

    fn remove_group_member(&self, group: &str, user_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .members
            .remove(&(group.to_string(), user_id))
            .ok_or_else(|| Error::not_found("Member"))?;
        state.mutated();
        Ok(())
    }

    fn protect_branch(
        &self,
        project: &str,
        options: &ProtectBranchOptions,
    ) -> Result<ProtectedBranch> {
        let mut state = self.state.lock().unwrap();
        let key = (project.to_string(), options.name.clone());
        if state.branches.contains_key(&key) {
            return Err(Error::rejected(
                409,
                format!("Protected branch '{}' already exists", options.name),
            ));
        }

        let mut rules = |level: Option<i64>, extra: &[AllowedTo]| -> Result<Vec<BranchAccess>> {
            let mut out = Vec::new();
            let role = AllowedTo::level(level.unwrap_or(AccessLevel::Maintainer.code()));
            for access in std::iter::once(&role).chain(extra) {
                let mut rule = state.describe(access)?;
                rule.id = state.next_id();
                out.push(rule);
            }
            Ok(out)
        };
        let push = rules(options.push_access_level, &options.allowed_to_push)?;
        let merge = rules(options.merge_access_level, &options.allowed_to_merge)?;
        let unprotect = rules(options.unprotect_access_level, &[])?;

        let id = state.next_id();
        let branch = ProtectedBranch {
            id,
            name: options.name.clone(),
            push_access_levels: push,
            merge_access_levels: merge,
            unprotect_access_levels: unprotect,
            allow_force_push: options.allow_force_push.unwrap_or(false),
            code_owner_approval_required: options.code_owner_approval_required.unwrap_or(false),
        };
        state.branches.insert(key, branch.clone());
        state.mutated();
        Ok(branch)
    }

    fn get_protected_branch(&self, project: &str, branch: &str) -> Result<ProtectedBranch> {
        let mut state = self.state.lock().unwrap();
        state.stale("Protected Branch")?;
        state
            .branches
            .get(&(project.to_string(), branch.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found("Protected Branch"))
    }

    fn update_protected_branch(
        &self,
        project: &str,
        branch: &str,
        options: &UpdateProtectedBranchOptions,
    ) -> Result<ProtectedBranch> {
        let mut state = self.state.lock().unwrap();
        let key = (project.to_string(), branch.to_string());
        let mut updated = state
            .branches
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found("Protected Branch"))?;

        if let Some(allow) = options.allow_force_push {
            updated.allow_force_push = allow;
        }
        if let Some(required) = options.code_owner_approval_required {
            updated.code_owner_approval_required = required;
        }
        for (rules, changes) in [
            (&mut updated.push_access_levels, &options.allowed_to_push),
            (&mut updated.merge_access_levels, &options.allowed_to_merge),
            (&mut updated.unprotect_access_levels, &options.allowed_to_unprotect),
        ] {
            for change in changes {
                match (change.id, change.destroy) {
                    (Some(id), Some(true)) => {
                        let before = rules.len();
                        rules.retain(|r| r.id != id);
                        if rules.len() == before {
                            return Err(Error::not_found("Access Level"));
                        }
                    }
                    (Some(_), _) => {
                        return Err(Error::rejected(400, "editing rules in place is not supported"));
                    }
                    (None, _) => {
                        let mut rule = state.describe(change)?;
                        rule.id = state.next_id();
                        rules.push(rule);
                    }
                }
            }
        }

        state.branches.insert(key, updated.clone());
        state.mutated();
        Ok(updated)
    }

    fn unprotect_branch(&self, project: &str, branch: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .branches
            .remove(&(project.to_string(), branch.to_string()))
            .ok_or_else(|| Error::not_found("Protected Branch"))?;
        state.mutated();
        Ok(())
    }

    fn create_release(&self, project: &str, options: &ReleaseOptions) -> Result<Release> {
        if options.tag_name.is_empty() {
            return Err(Error::rejected(400, "tag_name is missing"));
        }
        let mut state = self.state.lock().unwrap();
        let key = (project.to_string(), options.tag_name.clone());
        if state.releases.contains_key(&key) {
            return Err(Error::rejected(409, "Release already exists"));
        }
        let release = Release {
            tag_name: options.tag_name.clone(),
            name: options
                .name
                .clone()
                .unwrap_or_else(|| options.tag_name.clone()),
            description: options.description.clone().unwrap_or_default(),
            created_at: Some("2026-01-01T00:00:00Z".to_string()),
            released_at: options
                .released_at
                .clone()
                .or_else(|| Some("2026-01-01T00:00:00Z".to_string())),
        };
        state.releases.insert(key.clone(), release.clone());
        state.links.insert(key, Vec::new());
        state.mutated();
        Ok(release)
    }

    fn get_release(&self, project: &str, tag_name: &str) -> Result<Release> {
        let mut state = self.state.lock().unwrap();
        state.stale("Release")?;
        state
            .releases
            .get(&(project.to_string(), tag_name.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found("Release"))
    }

    fn update_release(
        &self,
        project: &str,
        tag_name: &str,
        options: &UpdateReleaseOptions,
    ) -> Result<Release> {
        let mut state = self.state.lock().unwrap();
        let release = state
            .releases
            .get_mut(&(project.to_string(), tag_name.to_string()))
            .ok_or_else(|| Error::not_found("Release"))?;
        if let Some(name) = &options.name {
            release.name = name.clone();
        }
        if let Some(description) = &options.description {
            release.description = description.clone();
        }
        if let Some(released_at) = &options.released_at {
            release.released_at = Some(released_at.clone());
        }
        let release = release.clone();
        state.mutated();
        Ok(release)
    }

    fn delete_release(&self, project: &str, tag_name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let key = (project.to_string(), tag_name.to_string());
        state
            .releases
            .remove(&key)
            .ok_or_else(|| Error::not_found("Release"))?;
        state.links.remove(&key);
        state.mutated();
        Ok(())
    }

    fn create_release_link(
        &self,
        project: &str,
        tag_name: &str,
        options: &ReleaseLinkOptions,
    ) -> Result<ReleaseLink> {
        let name = options.name.clone().unwrap_or_default();
        let url = options.url.clone().unwrap_or_default();
        if name.is_empty() || url.is_empty() {
            return Err(Error::rejected(400, "name, url are missing"));
        }
        let mut state = self.state.lock().unwrap();
        let key = (project.to_string(), tag_name.to_string());
        if !state.releases.contains_key(&key) {
            return Err(Error::not_found("Release"));
        }
        if state.links[&key].iter().any(|l| l.name == name) {
            return Err(Error::rejected(400, "name has already been taken"));
        }
        let id = state.next_id();
        let direct_asset_url = match &options.filepath {
            Some(path) => format!(
                "https://gitlab.example.com/{project}/-/releases/{tag_name}/downloads{path}"
            ),
            None => url.clone(),
        };
        let link = ReleaseLink {
            id,
            name,
            url,
            direct_asset_url,
            link_type: options.link_type.clone().unwrap_or_else(|| "other".to_string()),
            external: true,
        };
        if let Some(links) = state.links.get_mut(&key) {
            links.push(link.clone());
        }
        state.mutated();
        Ok(link)
    }

    fn get_release_link(
        &self,
        project: &str,
        tag_name: &str,
        link_id: i64,
    ) -> Result<ReleaseLink> {
        let mut state = self.state.lock().unwrap();
        state.stale("Link")?;
        state
            .links
            .get(&(project.to_string(), tag_name.to_string()))
            .and_then(|links| links.iter().find(|l| l.id == link_id))
            .cloned()
            .ok_or_else(|| Error::not_found("Link"))
    }

    fn update_release_link(
        &self,
        project: &str,
        tag_name: &str,
        link_id: i64,
        options: &ReleaseLinkOptions,
    ) -> Result<ReleaseLink> {
        let mut state = self.state.lock().unwrap();
        let link = state
            .links
            .get_mut(&(project.to_string(), tag_name.to_string()))
            .and_then(|links| links.iter_mut().find(|l| l.id == link_id))
            .ok_or_else(|| Error::not_found("Link"))?;
        if let Some(name) = &options.name {
            link.name = name.clone();
        }
        if let Some(url) = &options.url {
            link.url = url.clone();
            if options.filepath.is_none() {
                link.direct_asset_url = url.clone();
            }
        }
        if let Some(path) = &options.filepath {
            link.direct_asset_url =
                format!("https://gitlab.example.com/{project}/-/releases/{tag_name}/downloads{path}");
        }
        if let Some(link_type) = &options.link_type {
            link.link_type = link_type.clone();
        }
        let link = link.clone();
        state.mutated();
        Ok(link)
    }

    fn delete_release_link(&self, project: &str, tag_name: &str, link_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let links = state
            .links
            .get_mut(&(project.to_string(), tag_name.to_string()))
            .ok_or_else(|| Error::not_found("Release"))?;
        let before = links.len();
        links.retain(|l| l.id != link_id);
        if links.len() == before {
            return Err(Error::not_found("Link"));
        }
        state.mutated();
        Ok(())
    }

    fn list_release_links(
        &self,
        project: &str,
        tag_name: &str,
        options: &ListOptions,
    ) -> Result<Page<ReleaseLink>> {
        let mut state = self.state.lock().unwrap();
        state.count_list("release_links");
        let links = state
            .links
            .get(&(project.to_string(), tag_name.to_string()))
            .ok_or_else(|| Error::not_found("Release"))?;
        Ok(page_of(links, options))
    }

    fn create_group_variable(&self, group: &str, options: &VariableOptions) -> Result<Variable> {
        let key = options.key.clone().unwrap_or_default();
        if key.is_empty() {
            return Err(Error::rejected(400, "key is missing"));
        }
        let scope = options
            .environment_scope
            .clone()
            .unwrap_or_else(|| "*".to_string());
        let mut state = self.state.lock().unwrap();
        let variables = state.variables.entry(group.to_string()).or_default();
        if variables
            .iter()
            .any(|v| v.key == key && v.environment_scope == scope)
        {
            return Err(Error::rejected(
                400,
                format!("{key} has already been taken"),
            ));
        }
        let variable = Variable {
            key,
            value: options.value.clone().unwrap_or_default(),
            variable_type: options
                .variable_type
                .clone()
                .unwrap_or_else(|| "env_var".to_string()),
            protected: options.protected.unwrap_or(false),
            masked: options.masked.unwrap_or(false),
            raw: options.raw.unwrap_or(false),
            environment_scope: scope,
            description: options.description.clone(),
        };
        variables.push(variable.clone());
        state.mutated();
        Ok(variable)
    }

    fn get_group_variable(
        &self,
        group: &str,
        key: &str,
        environment_scope: &str,
    ) -> Result<Variable> {
        let mut state = self.state.lock().unwrap();
        state.stale("Variable")?;
        state
            .variables
            .get(group)
            .and_then(|vars| {
                vars.iter()
                    .find(|v| v.key == key && v.environment_scope == environment_scope)
            })
            .cloned()
            .ok_or_else(|| Error::not_found("Variable"))
    }

    fn update_group_variable(
        &self,
        group: &str,
        key: &str,
        environment_scope: &str,
        options: &VariableOptions,
    ) -> Result<Variable> {
        let mut state = self.state.lock().unwrap();
        let variable = state
            .variables
            .get_mut(group)
            .and_then(|vars| {
                vars.iter_mut()
                    .find(|v| v.key == key && v.environment_scope == environment_scope)
            })
            .ok_or_else(|| Error::not_found("Variable"))?;
        if let Some(value) = &options.value {
            variable.value = value.clone();
        }
        if let Some(variable_type) = &options.variable_type {
            variable.variable_type = variable_type.clone();
        }
        if let Some(protected) = options.protected {
            variable.protected = protected;
        }
        if let Some(masked) = options.masked {
            variable.masked = masked;
        }
        if let Some(raw) = options.raw {
            variable.raw = raw;
        }
        if let Some(description) = &options.description {
            variable.description = Some(description.clone());
        }
        let variable = variable.clone();
        state.mutated();
        Ok(variable)
    }

    fn remove_group_variable(
        &self,
        group: &str,
        key: &str,
        environment_scope: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let variables = state
            .variables
            .get_mut(group)
            .ok_or_else(|| Error::not_found("Variable"))?;
        let before = variables.len();
        variables.retain(|v| !(v.key == key && v.environment_scope == environment_scope));
        if variables.len() == before {
            return Err(Error::not_found("Variable"));
        }
        state.mutated();
        Ok(())
    }

    fn list_group_variables(&self, group: &str, options: &ListOptions) -> Result<Page<Variable>> {
        let mut state = self.state.lock().unwrap();
        state.count_list("group_variables");
        let variables = state.variables.get(group).cloned().unwrap_or_default();
        Ok(page_of(&variables, options))
    }

    fn list_project_milestones(
        &self,
        project: &str,
        options: &ListOptions,
    ) -> Result<Page<Milestone>> {
        let mut state = self.state.lock().unwrap();
        state.count_list("milestones");
        // Newest first, like the remote.
        let mut milestones = state.milestones.get(project).cloned().unwrap_or_default();
        milestones.reverse();
        Ok(page_of(&milestones, options))
    }

    fn current_user(&self) -> Result<User> {
        let state = self.state.lock().unwrap();
        state
            .current_user
            .clone()
            .ok_or_else(|| Error::rejected(401, "401 Unauthorized"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn badge_options(name: &str) -> BadgeOptions {
        BadgeOptions {
            name: Some(name.to_string()),
            link_url: Some("https://example.com/%{project_path}".to_string()),
            image_url: Some("https://example.com/badge.svg".to_string()),
        }
    }

    #[test]
    fn test_badge_lifecycle() {
        let api = MockApi::new();
        let badge = api.create_project_badge("42", &badge_options("ci")).unwrap();
        assert_eq!(badge.rendered_link_url, "https://example.com/42");

        let edited = api
            .edit_project_badge(
                "42",
                badge.id,
                &BadgeOptions {
                    name: Some("coverage".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(edited.name, "coverage");
        assert_eq!(edited.link_url, badge.link_url);

        api.delete_project_badge("42", badge.id).unwrap();
        assert!(api.get_project_badge("42", badge.id).unwrap_err().is_not_found());
        assert!(api.delete_project_badge("42", badge.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_badge_validation() {
        let api = MockApi::new();
        let err = api
            .create_project_badge("42", &BadgeOptions::default())
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_member_conflict_and_unknown_user() {
        let api = MockApi::new();
        api.add_user(7, "jdoe", "Jane Doe");
        let options = MemberOptions {
            user_id: Some(7),
            access_level: 30,
            expires_at: None,
        };
        api.add_group_member("12", &options).unwrap();
        assert_eq!(api.add_group_member("12", &options).unwrap_err().status(), Some(409));

        let missing = MemberOptions {
            user_id: Some(8),
            ..options
        };
        assert!(api.add_group_member("12", &missing).unwrap_err().is_not_found());
    }

    #[test]
    fn test_member_expiry_kept_unless_cleared() {
        let api = MockApi::new();
        api.add_user(7, "jdoe", "Jane Doe");
        api.add_group_member(
            "12",
            &MemberOptions {
                user_id: Some(7),
                access_level: 30,
                expires_at: Some("2030-01-01".to_string()),
            },
        )
        .unwrap();

        let mut edit = MemberOptions {
            user_id: None,
            access_level: 40,
            expires_at: None,
        };
        let member = api.edit_group_member("12", 7, &edit).unwrap();
        assert_eq!(member.expires_at.as_deref(), Some("2030-01-01"));

        edit.expires_at = Some(String::new());
        let member = api.edit_group_member("12", 7, &edit).unwrap();
        assert_eq!(member.expires_at, None);
    }

    #[test]
    fn test_protect_branch_describes_rules() {
        let api = MockApi::new();
        api.add_user(7, "jdoe", "Jane Doe");
        let branch = api
            .protect_branch(
                "42",
                &ProtectBranchOptions {
                    name: "main".to_string(),
                    push_access_level: Some(30),
                    allowed_to_push: vec![AllowedTo::user(7)],
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(branch.push_access_levels.len(), 2);
        assert_eq!(
            branch.push_access_levels[0].access_level_description,
            "Developers + Maintainers"
        );
        assert_eq!(branch.push_access_levels[1].access_level_description, "Jane Doe");
        assert_eq!(branch.merge_access_levels[0].access_level, 40);

        let err = api
            .protect_branch(
                "42",
                &ProtectBranchOptions {
                    name: "main".to_string(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn test_update_protected_branch_rules() {
        let api = MockApi::new();
        let branch = api
            .protect_branch(
                "42",
                &ProtectBranchOptions {
                    name: "main".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        let old = branch.push_access_levels[0].id;

        let updated = api
            .update_protected_branch(
                "42",
                "main",
                &UpdateProtectedBranchOptions {
                    allow_force_push: Some(true),
                    allowed_to_push: vec![AllowedTo::remove(old), AllowedTo::level(0)],
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.allow_force_push);
        assert_eq!(updated.push_access_levels.len(), 1);
        assert_eq!(updated.push_access_levels[0].access_level, 0);
    }

    #[test]
    fn test_release_links_paginate_in_creation_order() {
        let api = MockApi::new();
        api.create_release(
            "42",
            &ReleaseOptions {
                tag_name: "v1.0.0".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        for i in 0..5 {
            api.create_release_link(
                "42",
                "v1.0.0",
                &ReleaseLinkOptions {
                    name: Some(format!("asset-{i}")),
                    url: Some(format!("https://example.com/{i}")),
                    ..Default::default()
                },
            )
            .unwrap();
        }

        let first = api
            .list_release_links("42", "v1.0.0", &ListOptions::new(1, 2))
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next, Some(Cursor::Page(2)));
        let last = api
            .list_release_links("42", "v1.0.0", &ListOptions::new(3, 2))
            .unwrap();
        assert_eq!(last.items[0].name, "asset-4");
        assert_eq!(last.next, None);
        assert_eq!(api.list_calls("release_links"), 2);
    }

    #[test]
    fn test_stale_reads_after_mutation() {
        let api = MockApi::new();
        api.set_stale_reads(2);
        let badge = api.create_project_badge("42", &badge_options("ci")).unwrap();

        assert!(api.get_project_badge("42", badge.id).is_err());
        assert!(api.get_project_badge("42", badge.id).is_err());
        assert!(api.get_project_badge("42", badge.id).is_ok());
    }

    #[test]
    fn test_variables_scoped_by_environment() {
        let api = MockApi::new();
        for scope in ["*", "production"] {
            api.create_group_variable(
                "12",
                &VariableOptions {
                    key: Some("TOKEN".to_string()),
                    value: Some(format!("value-{scope}")),
                    environment_scope: Some(scope.to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        let prod = api.get_group_variable("12", "TOKEN", "production").unwrap();
        assert_eq!(prod.value, "value-production");

        api.remove_group_variable("12", "TOKEN", "*").unwrap();
        assert!(api.get_group_variable("12", "TOKEN", "*").unwrap_err().is_not_found());
        assert!(api.get_group_variable("12", "TOKEN", "production").is_ok());
    }

    #[test]
    fn test_current_user_unauthenticated() {
        let api = MockApi::new();
        assert_eq!(api.current_user().unwrap_err().status(), Some(401));
    }
}
