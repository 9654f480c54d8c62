//! `gitlab_group_variable`, addressed `<group>:<key>:<environment_scope>`.
//!
//! The environment scope is free-form (`*`, `review/*`, `prod:eu`) and is the
//! last identifier component, so it may contain the separator.

use crate::client::Client;
use labapi::{Variable, VariableOptions};
use reconcile::{CallResult, CancelToken, CompositeKey, IdFormat, IdPart, ManagedKind, Result};
use serde::{Deserialize, Serialize};

pub const KIND: &str = "gitlab_group_variable";
pub const ID_FORMAT: IdFormat = IdFormat::new(&["group", "key", "environment_scope"]);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    #[default]
    EnvVar,
    File,
}

impl VariableType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EnvVar => "env_var",
            Self::File => "file",
        }
    }
}

fn any_scope() -> String {
    "*".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupVariableSpec {
    pub group: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub variable_type: VariableType,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub masked: bool,
    #[serde(default)]
    pub raw: bool,
    #[serde(default = "any_scope")]
    pub environment_scope: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVariableState {
    pub group: String,
    pub key: String,
    pub value: String,
    pub variable_type: String,
    pub protected: bool,
    pub masked: bool,
    pub raw: bool,
    pub environment_scope: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl GroupVariableState {
    pub(crate) fn from_variable(group: &str, variable: Variable) -> Self {
        Self {
            group: group.to_string(),
            key: variable.key,
            value: variable.value,
            variable_type: variable.variable_type,
            protected: variable.protected,
            masked: variable.masked,
            raw: variable.raw,
            environment_scope: variable.environment_scope,
            description: variable.description,
        }
    }
}

pub struct GroupVariables {
    client: Client,
}

impl GroupVariables {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ManagedKind for GroupVariables {
    type Desired = GroupVariableSpec;
    type Observed = GroupVariableState;
    type Change = VariableOptions;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn id_format(&self) -> IdFormat {
        ID_FORMAT
    }

    fn label(&self, desired: &GroupVariableSpec) -> String {
        format!(
            "{}:{}:{}",
            desired.group, desired.key, desired.environment_scope
        )
    }

    fn create(
        &self,
        desired: &GroupVariableSpec,
        _cancel: &CancelToken,
    ) -> CallResult<GroupVariableState> {
        let options = VariableOptions {
            key: Some(desired.key.clone()),
            value: Some(desired.value.clone()),
            variable_type: Some(desired.variable_type.as_str().to_string()),
            protected: Some(desired.protected),
            masked: Some(desired.masked),
            raw: Some(desired.raw),
            environment_scope: Some(desired.environment_scope.clone()),
            description: desired.description.clone(),
        };
        let variable = self
            .client
            .api()
            .create_group_variable(&desired.group, &options)?;
        Ok(GroupVariableState::from_variable(&desired.group, variable))
    }

    fn key_of(&self, observed: &GroupVariableState) -> Vec<IdPart> {
        vec![
            (&observed.group).into(),
            (&observed.key).into(),
            (&observed.environment_scope).into(),
        ]
    }

    fn fetch(&self, key: &CompositeKey, _cancel: &CancelToken) -> CallResult<GroupVariableState> {
        let group = key.str(0)?;
        let variable = self
            .client
            .api()
            .get_group_variable(group, key.str(1)?, key.str(2)?)?;
        Ok(GroupVariableState::from_variable(group, variable))
    }

    fn diff(
        &self,
        observed: &GroupVariableState,
        desired: &GroupVariableSpec,
    ) -> Result<Vec<VariableOptions>> {
        super::ensure_unchanged(KIND, "group", &observed.group, &desired.group)?;
        super::ensure_unchanged(KIND, "key", &observed.key, &desired.key)?;
        super::ensure_unchanged(
            KIND,
            "environment_scope",
            &observed.environment_scope,
            &desired.environment_scope,
        )?;

        let mut edit = VariableOptions::default();
        if desired.value != observed.value {
            edit.value = Some(desired.value.clone());
        }
        if desired.variable_type.as_str() != observed.variable_type {
            edit.variable_type = Some(desired.variable_type.as_str().to_string());
        }
        if desired.protected != observed.protected {
            edit.protected = Some(desired.protected);
        }
        if desired.masked != observed.masked {
            edit.masked = Some(desired.masked);
        }
        if desired.raw != observed.raw {
            edit.raw = Some(desired.raw);
        }
        if desired.description.is_some() && desired.description != observed.description {
            edit.description = desired.description.clone();
        }
        if edit == VariableOptions::default() {
            return Ok(Vec::new());
        }
        Ok(vec![edit])
    }

    fn apply(&self, key: &CompositeKey, change: &VariableOptions) -> CallResult<()> {
        self.client
            .api()
            .update_group_variable(key.str(0)?, key.str(1)?, key.str(2)?, change)?;
        Ok(())
    }

    fn remove(&self, key: &CompositeKey) -> CallResult<()> {
        self.client
            .api()
            .remove_group_variable(key.str(0)?, key.str(1)?, key.str(2)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::tests::client;
    use labapi::{Api, MockApi};
    use reconcile::{ErrorCategory, ReadMode, Reconciler, RemoteObjectRef};

    fn spec(scope: &str, value: &str) -> GroupVariableSpec {
        GroupVariableSpec {
            group: "12".to_string(),
            key: "DEPLOY_TOKEN".to_string(),
            value: value.to_string(),
            variable_type: VariableType::EnvVar,
            protected: true,
            masked: false,
            raw: false,
            environment_scope: scope.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_scope_with_separator_round_trips() {
        let api = MockApi::new();
        let r = Reconciler::new(GroupVariables::new(client(&api)));
        let cancel = CancelToken::new();

        let created = r.create(&spec("prod:eu", "s3cret"), &cancel).unwrap();
        assert_eq!(created.id().as_str(), "12:DEPLOY_TOKEN:prod:eu");

        let read = r
            .read(created.id(), ReadMode::Refresh, &cancel)
            .unwrap()
            .unwrap();
        assert_eq!(read.state().environment_scope, "prod:eu");
        assert_eq!(read.state().value, "s3cret");
    }

    #[test]
    fn test_scopes_are_distinct_objects() {
        let api = MockApi::new();
        let r = Reconciler::new(GroupVariables::new(client(&api)));
        let cancel = CancelToken::new();

        let any = r.create(&spec("*", "a"), &cancel).unwrap();
        let prod = r.create(&spec("production", "b"), &cancel).unwrap();
        assert_ne!(any.id(), prod.id());

        r.delete(any.id(), Some(&any), &cancel).unwrap();
        assert!(r.read(any.id(), ReadMode::Refresh, &cancel).unwrap().is_none());
        assert!(r.read(prod.id(), ReadMode::Refresh, &cancel).unwrap().is_some());
    }

    #[test]
    fn test_update_value_and_type() {
        let api = MockApi::new();
        let r = Reconciler::new(GroupVariables::new(client(&api)));
        let cancel = CancelToken::new();
        let created = r.create(&spec("*", "old"), &cancel).unwrap();

        let mut desired = spec("*", "new");
        desired.variable_type = VariableType::File;
        let updated = r.update(created.id(), &desired, &cancel).unwrap();
        assert_eq!(updated.changes, 1);
        assert_eq!(updated.observation.state().value, "new");
        assert_eq!(updated.observation.state().variable_type, "file");
        assert!(updated.observation.state().protected);
    }

    #[test]
    fn test_duplicate_key_and_scope_rejected() {
        let api = MockApi::new();
        let r = Reconciler::new(GroupVariables::new(client(&api)));
        let cancel = CancelToken::new();
        r.create(&spec("*", "a"), &cancel).unwrap();
        let err = r.create(&spec("*", "b"), &cancel).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Rejected);
    }

    #[test]
    fn test_two_part_identifier_is_malformed() {
        let api = MockApi::new();
        let r = Reconciler::new(GroupVariables::new(client(&api)));
        let err = r
            .read(
                &RemoteObjectRef::new("12:DEPLOY_TOKEN"),
                ReadMode::Refresh,
                &CancelToken::new(),
            )
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Identifier);
        assert!(api.get_group_variable("12", "DEPLOY_TOKEN", "*").is_err());
    }
}
