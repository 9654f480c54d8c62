//! `gitlab_project_release_link`, addressed `<project>:<tag_name>:<link_id>`.

use crate::client::Client;
use labapi::{ReleaseLink, ReleaseLinkOptions};
use reconcile::{CallResult, CancelToken, CompositeKey, IdFormat, IdPart, ManagedKind, Result};
use serde::{Deserialize, Serialize};

pub const KIND: &str = "gitlab_project_release_link";
pub const ID_FORMAT: IdFormat = IdFormat::new(&["project", "tag_name", "link_id"]);

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseLinkSpec {
    pub project: String,
    pub tag_name: String,
    pub name: String,
    pub url: String,
    /// Path for a direct asset URL, starting with `/`.
    #[serde(default)]
    pub filepath: Option<String>,
    /// `other`, `runbook`, `image` or `package`.
    #[serde(default)]
    pub link_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseLinkState {
    pub project: String,
    pub tag_name: String,
    pub link_id: i64,
    pub name: String,
    pub url: String,
    pub direct_asset_url: String,
    pub link_type: String,
}

impl ReleaseLinkState {
    fn from_link(project: &str, tag_name: &str, link: ReleaseLink) -> Self {
        Self {
            project: project.to_string(),
            tag_name: tag_name.to_string(),
            link_id: link.id,
            name: link.name,
            url: link.url,
            direct_asset_url: link.direct_asset_url,
            link_type: link.link_type,
        }
    }
}

pub struct ReleaseLinks {
    client: Client,
}

impl ReleaseLinks {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ManagedKind for ReleaseLinks {
    type Desired = ReleaseLinkSpec;
    type Observed = ReleaseLinkState;
    type Change = ReleaseLinkOptions;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn id_format(&self) -> IdFormat {
        ID_FORMAT
    }

    fn label(&self, desired: &ReleaseLinkSpec) -> String {
        format!("{}:{} {}", desired.project, desired.tag_name, desired.name)
    }

    fn create(
        &self,
        desired: &ReleaseLinkSpec,
        _cancel: &CancelToken,
    ) -> CallResult<ReleaseLinkState> {
        let options = ReleaseLinkOptions {
            name: Some(desired.name.clone()),
            url: Some(desired.url.clone()),
            filepath: desired.filepath.clone(),
            link_type: desired.link_type.clone(),
        };
        let link = self.client.api().create_release_link(
            &desired.project,
            &desired.tag_name,
            &options,
        )?;
        Ok(ReleaseLinkState::from_link(
            &desired.project,
            &desired.tag_name,
            link,
        ))
    }

    fn key_of(&self, observed: &ReleaseLinkState) -> Vec<IdPart> {
        vec![
            (&observed.project).into(),
            (&observed.tag_name).into(),
            observed.link_id.into(),
        ]
    }

    fn fetch(&self, key: &CompositeKey, _cancel: &CancelToken) -> CallResult<ReleaseLinkState> {
        let (project, tag_name) = (key.str(0)?, key.str(1)?);
        let link = self
            .client
            .api()
            .get_release_link(project, tag_name, key.int(2)?)?;
        Ok(ReleaseLinkState::from_link(project, tag_name, link))
    }

    fn diff(
        &self,
        observed: &ReleaseLinkState,
        desired: &ReleaseLinkSpec,
    ) -> Result<Vec<ReleaseLinkOptions>> {
        super::ensure_unchanged(KIND, "project", &observed.project, &desired.project)?;
        super::ensure_unchanged(KIND, "tag_name", &observed.tag_name, &desired.tag_name)?;

        let mut edit = ReleaseLinkOptions::default();
        if desired.name != observed.name {
            edit.name = Some(desired.name.clone());
        }
        if desired.url != observed.url {
            edit.url = Some(desired.url.clone());
        }
        if let Some(path) = &desired.filepath
            && !observed.direct_asset_url.ends_with(path.as_str())
        {
            edit.filepath = Some(path.clone());
        }
        if let Some(link_type) = desired
            .link_type
            .as_ref()
            .filter(|t| **t != observed.link_type)
        {
            edit.link_type = Some(link_type.clone());
        }
        if edit == ReleaseLinkOptions::default() {
            return Ok(Vec::new());
        }
        Ok(vec![edit])
    }

    fn apply(&self, key: &CompositeKey, change: &ReleaseLinkOptions) -> CallResult<()> {
        self.client
            .api()
            .update_release_link(key.str(0)?, key.str(1)?, key.int(2)?, change)?;
        Ok(())
    }

    fn remove(&self, key: &CompositeKey) -> CallResult<()> {
        self.client
            .api()
            .delete_release_link(key.str(0)?, key.str(1)?, key.int(2)?)?;
        Ok(())
    }

    fn matches_tracked(&self, tracked: &ReleaseLinkState, current: &ReleaseLinkState) -> bool {
        tracked.url == current.url && tracked.name == current.name
    }
}
