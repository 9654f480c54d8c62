//! `gitlab_project_milestones`: every milestone of a project.

use crate::client::{Client, fetch_page};
use labapi::Milestone;
use reconcile::{CancelToken, DataSource, Result, collect_all};
use serde::{Deserialize, Serialize};

pub const KIND: &str = "gitlab_project_milestones";

#[derive(Debug, Clone, Deserialize)]
pub struct MilestonesQuery {
    pub project: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectMilestones {
    pub project: String,
    /// In the order the remote listed them.
    pub milestones: Vec<Milestone>,
}

pub struct ProjectMilestonesLookup {
    client: Client,
}

impl ProjectMilestonesLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl DataSource for ProjectMilestonesLookup {
    type Query = MilestonesQuery;
    type Output = ProjectMilestones;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn read(&self, query: &MilestonesQuery, cancel: &CancelToken) -> Result<ProjectMilestones> {
        let project = query.project.as_str();
        let milestones = collect_all(cancel, |cursor| {
            fetch_page(&self.client, KIND, project, cursor, |options| {
                self.client.api().list_project_milestones(project, options)
            })
        })?;
        log::debug!("{KIND} {project}: {} milestones", milestones.len());
        Ok(ProjectMilestones {
            project: query.project.clone(),
            milestones,
        })
    }
}
