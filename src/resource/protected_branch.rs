//! `gitlab_project_protected_branch`, addressed `<project>:<branch>`.
//!
//! Push, merge and unprotect rules come back as access grants attached to a
//! role, a user or a group. Observed state keeps them flattened, together with
//! the remote rule ids the update call needs to remove stale rules.

use crate::client::{Client, read_error};
use labapi::{
    AllowedTo, BranchAccess, ProtectBranchOptions, ProtectedBranch, UpdateProtectedBranchOptions,
};
use reconcile::{
    AccessGrant, AccessLevel, CallResult, CancelToken, CompositeKey, DataSource, FlatGrant,
    IdFormat, IdPart, ManagedKind, PROTECTED_REF_LEVELS, Result, UnknownCodePolicy, WireEnum,
    flatten_grants,
};
use serde::{Deserialize, Serialize};

pub const KIND: &str = "gitlab_project_protected_branch";
pub const ID_FORMAT: IdFormat = IdFormat::new(&["project", "branch"]);

fn maintainer() -> AccessLevel {
    AccessLevel::Maintainer
}

/// A user or group granted access in addition to the role level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalSpec {
    UserId(i64),
    GroupId(i64),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtectedBranchSpec {
    pub project: String,
    pub branch: String,
    #[serde(default = "maintainer")]
    pub push_access_level: AccessLevel,
    #[serde(default = "maintainer")]
    pub merge_access_level: AccessLevel,
    /// Left as the remote chose when unset.
    #[serde(default)]
    pub unprotect_access_level: Option<AccessLevel>,
    #[serde(default)]
    pub allow_force_push: bool,
    #[serde(default)]
    pub code_owner_approval_required: bool,
    #[serde(default)]
    pub allowed_to_push: Vec<PrincipalSpec>,
    #[serde(default)]
    pub allowed_to_merge: Vec<PrincipalSpec>,
}

impl ProtectedBranchSpec {
    fn validate(&self) -> Result<()> {
        self.push_access_level.ensure_one_of(PROTECTED_REF_LEVELS)?;
        self.merge_access_level.ensure_one_of(PROTECTED_REF_LEVELS)?;
        if let Some(level) = self.unprotect_access_level {
            level.ensure_one_of(PROTECTED_REF_LEVELS)?;
        }
        Ok(())
    }
}

/// One remote rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRule {
    pub id: i64,
    #[serde(flatten)]
    pub grant: FlatGrant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedBranchState {
    pub project: String,
    pub branch: String,
    pub push_access_levels: Vec<BranchRule>,
    pub merge_access_levels: Vec<BranchRule>,
    pub unprotect_access_levels: Vec<BranchRule>,
    pub allow_force_push: bool,
    pub code_owner_approval_required: bool,
}

fn rules(access: &[BranchAccess], policy: UnknownCodePolicy) -> Result<Vec<BranchRule>> {
    let grants: Vec<AccessGrant> = access.iter().map(AccessGrant::from).collect();
    let flat = flatten_grants(&grants, policy)?;
    Ok(access
        .iter()
        .zip(flat)
        .map(|(rule, grant)| BranchRule { id: rule.id, grant })
        .collect())
}

impl ProtectedBranchState {
    fn from_branch(project: &str, branch: ProtectedBranch) -> Result<Self> {
        let policy = UnknownCodePolicy::Strict;
        Ok(Self {
            project: project.to_string(),
            push_access_levels: rules(&branch.push_access_levels, policy)?,
            merge_access_levels: rules(&branch.merge_access_levels, policy)?,
            unprotect_access_levels: rules(&branch.unprotect_access_levels, policy)?,
            branch: branch.name,
            allow_force_push: branch.allow_force_push,
            code_owner_approval_required: branch.code_owner_approval_required,
        })
    }
}

/// What a rule grants access to, ignoring its remote id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Role(AccessLevel),
    User(i64),
    Group(i64),
}

impl Target {
    fn of(rule: &BranchRule) -> Result<Self> {
        match (rule.grant.user_id, rule.grant.group_id) {
            (Some(id), _) => Ok(Self::User(id)),
            (None, Some(id)) => Ok(Self::Group(id)),
            (None, None) => AccessLevel::from_name(&rule.grant.access_level).map(Self::Role),
        }
    }

    fn allowed_to(self) -> AllowedTo {
        match self {
            Self::Role(level) => AllowedTo::level(level.code()),
            Self::User(id) => AllowedTo::user(id),
            Self::Group(id) => AllowedTo::group(id),
        }
    }
}

impl From<PrincipalSpec> for Target {
    fn from(principal: PrincipalSpec) -> Self {
        match principal {
            PrincipalSpec::UserId(id) => Self::User(id),
            PrincipalSpec::GroupId(id) => Self::Group(id),
        }
    }
}

fn targets(level: AccessLevel, principals: &[PrincipalSpec]) -> Vec<Target> {
    std::iter::once(Target::Role(level))
        .chain(principals.iter().copied().map(Target::from))
        .collect()
}

/// Removals for rules nobody wants any more, then additions for missing ones.
fn rule_changes(current: &[BranchRule], wanted: &[Target]) -> Result<Vec<AllowedTo>> {
    let mut kept = Vec::new();
    let mut changes = Vec::new();
    for rule in current {
        let target = Target::of(rule)?;
        if wanted.contains(&target) && !kept.contains(&target) {
            kept.push(target);
        } else {
            changes.push(AllowedTo::remove(rule.id));
        }
    }
    for target in wanted {
        if !kept.contains(target) {
            kept.push(*target);
            changes.push(target.allowed_to());
        }
    }
    Ok(changes)
}

fn grants_of(rules: &[BranchRule]) -> Vec<&FlatGrant> {
    rules.iter().map(|rule| &rule.grant).collect()
}

pub struct ProtectedBranches {
    client: Client,
}

impl ProtectedBranches {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ManagedKind for ProtectedBranches {
    type Desired = ProtectedBranchSpec;
    type Observed = ProtectedBranchState;
    type Change = UpdateProtectedBranchOptions;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn id_format(&self) -> IdFormat {
        ID_FORMAT
    }

    fn label(&self, desired: &ProtectedBranchSpec) -> String {
        format!("{}:{}", desired.project, desired.branch)
    }

    fn create(
        &self,
        desired: &ProtectedBranchSpec,
        _cancel: &CancelToken,
    ) -> CallResult<ProtectedBranchState> {
        desired.validate()?;
        let principals = |list: &[PrincipalSpec]| -> Vec<AllowedTo> {
            list.iter()
                .map(|p| Target::from(*p).allowed_to())
                .collect()
        };
        let options = ProtectBranchOptions {
            name: desired.branch.clone(),
            push_access_level: Some(desired.push_access_level.code()),
            merge_access_level: Some(desired.merge_access_level.code()),
            unprotect_access_level: desired.unprotect_access_level.map(AccessLevel::code),
            allow_force_push: Some(desired.allow_force_push),
            code_owner_approval_required: Some(desired.code_owner_approval_required),
            allowed_to_push: principals(&desired.allowed_to_push),
            allowed_to_merge: principals(&desired.allowed_to_merge),
        };
        let branch = self
            .client
            .api()
            .protect_branch(&desired.project, &options)?;
        Ok(ProtectedBranchState::from_branch(&desired.project, branch)?)
    }

    fn key_of(&self, observed: &ProtectedBranchState) -> Vec<IdPart> {
        vec![(&observed.project).into(), (&observed.branch).into()]
    }

    fn fetch(&self, key: &CompositeKey, _cancel: &CancelToken) -> CallResult<ProtectedBranchState> {
        let project = key.str(0)?;
        let branch = self.client.api().get_protected_branch(project, key.str(1)?)?;
        Ok(ProtectedBranchState::from_branch(project, branch)?)
    }

    fn diff(
        &self,
        observed: &ProtectedBranchState,
        desired: &ProtectedBranchSpec,
    ) -> Result<Vec<UpdateProtectedBranchOptions>> {
        super::ensure_unchanged(KIND, "project", &observed.project, &desired.project)?;
        super::ensure_unchanged(KIND, "branch", &observed.branch, &desired.branch)?;
        desired.validate()?;

        let mut update = UpdateProtectedBranchOptions {
            allowed_to_push: rule_changes(
                &observed.push_access_levels,
                &targets(desired.push_access_level, &desired.allowed_to_push),
            )?,
            allowed_to_merge: rule_changes(
                &observed.merge_access_levels,
                &targets(desired.merge_access_level, &desired.allowed_to_merge),
            )?,
            ..Default::default()
        };
        if let Some(level) = desired.unprotect_access_level {
            update.allowed_to_unprotect = rule_changes(
                &observed.unprotect_access_levels,
                &[Target::Role(level)],
            )?;
        }
        if observed.allow_force_push != desired.allow_force_push {
            update.allow_force_push = Some(desired.allow_force_push);
        }
        if observed.code_owner_approval_required != desired.code_owner_approval_required {
            update.code_owner_approval_required = Some(desired.code_owner_approval_required);
        }

        if update == UpdateProtectedBranchOptions::default() {
            return Ok(Vec::new());
        }
        Ok(vec![update])
    }

    fn apply(&self, key: &CompositeKey, change: &UpdateProtectedBranchOptions) -> CallResult<()> {
        self.client
            .api()
            .update_protected_branch(key.str(0)?, key.str(1)?, change)?;
        Ok(())
    }

    fn remove(&self, key: &CompositeKey) -> CallResult<()> {
        self.client
            .api()
            .unprotect_branch(key.str(0)?, key.str(1)?)?;
        Ok(())
    }

    fn matches_tracked(
        &self,
        tracked: &ProtectedBranchState,
        current: &ProtectedBranchState,
    ) -> bool {
        grants_of(&tracked.push_access_levels) == grants_of(&current.push_access_levels)
            && grants_of(&tracked.merge_access_levels) == grants_of(&current.merge_access_levels)
            && grants_of(&tracked.unprotect_access_levels)
                == grants_of(&current.unprotect_access_levels)
    }
}

// =============================================================================
// Data source
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BranchQuery {
    pub project: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchProtection {
    pub id: i64,
    pub project: String,
    pub branch: String,
    pub push_access_levels: Vec<FlatGrant>,
    pub merge_access_levels: Vec<FlatGrant>,
    pub allow_force_push: bool,
    pub code_owner_approval_required: bool,
}

/// Read-only lookup of one protected branch.
///
/// Unlike the resource, unknown level codes are passed through as numbers so
/// that a newer server does not break plain reads.
pub struct ProtectedBranchLookup {
    client: Client,
}

impl ProtectedBranchLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl DataSource for ProtectedBranchLookup {
    type Query = BranchQuery;
    type Output = BranchProtection;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn read(&self, query: &BranchQuery, cancel: &CancelToken) -> Result<BranchProtection> {
        let key = format!("{}:{}", query.project, query.branch);
        cancel.check(format!("read {KIND} {key}"))?;
        let branch = self
            .client
            .api()
            .get_protected_branch(&query.project, &query.branch)
            .map_err(|err| read_error(KIND, &key, err))?;

        let flatten = |access: &[BranchAccess]| {
            let grants: Vec<AccessGrant> = access.iter().map(AccessGrant::from).collect();
            flatten_grants(&grants, UnknownCodePolicy::PassThrough)
        };
        Ok(BranchProtection {
            id: branch.id,
            project: query.project.clone(),
            push_access_levels: flatten(&branch.push_access_levels)?,
            merge_access_levels: flatten(&branch.merge_access_levels)?,
            branch: branch.name,
            allow_force_push: branch.allow_force_push,
            code_owner_approval_required: branch.code_owner_approval_required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::tests::client;
    use labapi::{Api, MockApi};
    use reconcile::{Error, ErrorCategory, Reconciler, confirm_absent, ensure_absent};

    fn spec() -> ProtectedBranchSpec {
        ProtectedBranchSpec {
            project: "42".to_string(),
            branch: "main".to_string(),
            push_access_level: AccessLevel::Maintainer,
            merge_access_level: AccessLevel::Developer,
            unprotect_access_level: None,
            allow_force_push: false,
            code_owner_approval_required: false,
            allowed_to_push: vec![PrincipalSpec::UserId(7)],
            allowed_to_merge: vec![PrincipalSpec::GroupId(12)],
        }
    }

    fn setup() -> (MockApi, Reconciler<ProtectedBranches>) {
        let api = MockApi::new();
        api.add_user(7, "jdoe", "Jane Doe");
        api.add_group(12, "Release Managers");
        let r = Reconciler::new(ProtectedBranches::new(client(&api)));
        (api, r)
    }

    #[test]
    fn test_create_flattens_grants() {
        let (_api, r) = setup();
        let created = r.create(&spec(), &CancelToken::new()).unwrap();
        assert_eq!(created.id().as_str(), "42:main");

        let push = &created.state().push_access_levels;
        assert_eq!(push.len(), 2);
        assert_eq!(push[0].grant.access_level, "maintainer");
        assert_eq!(push[0].grant.access_level_description, "Maintainers");
        assert_eq!(push[1].grant.user_id, Some(7));
        assert_eq!(push[1].grant.group_id, None);
        assert_eq!(push[1].grant.access_level_description, "Jane Doe");

        let merge = &created.state().merge_access_levels;
        assert_eq!(merge[0].grant.access_level_description, "Developers + Maintainers");
        assert_eq!(merge[1].grant.group_id, Some(12));
        assert_eq!(merge[1].grant.access_level_description, "Release Managers");
    }

    #[test]
    fn test_rejects_levels_outside_protected_set() {
        let (_api, r) = setup();
        let mut desired = spec();
        desired.push_access_level = AccessLevel::Guest;
        let err = r.create(&desired, &CancelToken::new()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Schema);
    }

    #[test]
    fn test_update_swaps_rules_in_one_call() {
        let (api, r) = setup();
        let cancel = CancelToken::new();
        let created = r.create(&spec(), &cancel).unwrap();

        let mut desired = spec();
        desired.push_access_level = AccessLevel::NoOne;
        desired.allowed_to_push.clear();
        desired.allow_force_push = true;
        let updated = r.update(created.id(), &desired, &cancel).unwrap();
        assert_eq!(updated.changes, 1);

        let state = updated.observation.state();
        assert!(state.allow_force_push);
        assert_eq!(state.push_access_levels.len(), 1);
        assert_eq!(state.push_access_levels[0].grant.access_level, "no one");
        assert_eq!(state.merge_access_levels, created.state().merge_access_levels);

        let remote = api.get_protected_branch("42", "main").unwrap();
        assert_eq!(remote.push_access_levels[0].access_level, 0);
    }

    #[test]
    fn test_update_in_sync_issues_no_calls() {
        let (_api, r) = setup();
        let cancel = CancelToken::new();
        let created = r.create(&spec(), &cancel).unwrap();
        assert_eq!(r.update(created.id(), &spec(), &cancel).unwrap().changes, 0);
    }

    #[test]
    fn test_unknown_code_strict_in_resource_passthrough_in_data_source() {
        let (api, r) = setup();
        api.insert_protected_branch(
            "42",
            ProtectedBranch {
                id: 900,
                name: "legacy".to_string(),
                push_access_levels: vec![BranchAccess {
                    id: 901,
                    access_level: 99,
                    access_level_description: "Custom".to_string(),
                    user_id: None,
                    group_id: None,
                }],
                merge_access_levels: Vec::new(),
                unprotect_access_levels: Vec::new(),
                allow_force_push: false,
                code_owner_approval_required: false,
            },
        );

        let err = r.import("42:legacy", &CancelToken::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownEnumValue { .. }));

        let lookup = ProtectedBranchLookup::new(client(&api));
        let out = DataSource::read(
            &lookup,
            &BranchQuery {
                project: "42".to_string(),
                branch: "legacy".to_string(),
            },
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(out.id, 900);
        assert_eq!(out.push_access_levels[0].access_level, "99");
        assert_eq!(out.push_access_levels[0].access_level_description, "Custom");
    }

    #[test]
    fn test_data_source_missing_branch_is_an_error() {
        let (api, _r) = setup();
        let lookup = ProtectedBranchLookup::new(client(&api));
        let err = DataSource::read(
            &lookup,
            &BranchQuery {
                project: "42".to_string(),
                branch: "nope".to_string(),
            },
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("42:nope"));
    }

    #[test]
    fn test_destroy_confirmed_by_verifier() {
        let (_api, r) = setup();
        let cancel = CancelToken::new();
        let created = r.create(&spec(), &cancel).unwrap();

        assert!(ensure_absent(&r, &created, &cancel).is_err());
        r.delete(created.id(), None, &cancel).unwrap();
        assert!(confirm_absent(&r, &created, &cancel).unwrap());
    }
}
