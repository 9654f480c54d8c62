//! `gitlab_group_variables`: the CI/CD variables of a group, optionally
//! narrowed to one environment scope.

use crate::client::{Client, fetch_page};
use crate::resource::group_variable::GroupVariableState;
use reconcile::{CancelToken, DataSource, Result, collect_all};
use serde::{Deserialize, Serialize};

pub const KIND: &str = "gitlab_group_variables";

#[derive(Debug, Clone, Deserialize)]
pub struct GroupVariablesQuery {
    pub group: String,
    /// Exact scope to keep; every scope when unset.
    #[serde(default)]
    pub environment_scope: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupVariableList {
    pub group: String,
    pub variables: Vec<GroupVariableState>,
}

pub struct GroupVariablesLookup {
    client: Client,
}

impl GroupVariablesLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl DataSource for GroupVariablesLookup {
    type Query = GroupVariablesQuery;
    type Output = GroupVariableList;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn read(&self, query: &GroupVariablesQuery, cancel: &CancelToken) -> Result<GroupVariableList> {
        let group = query.group.as_str();
        let variables = collect_all(cancel, |cursor| {
            fetch_page(&self.client, KIND, group, cursor, |options| {
                self.client.api().list_group_variables(group, options)
            })
        })?;

        // The listing endpoint has no scope filter.
        let variables = variables
            .into_iter()
            .filter(|v| {
                query
                    .environment_scope
                    .as_ref()
                    .is_none_or(|scope| *scope == v.environment_scope)
            })
            .map(|v| GroupVariableState::from_variable(group, v))
            .collect();
        Ok(GroupVariableList {
            group: query.group.clone(),
            variables,
        })
    }
}
