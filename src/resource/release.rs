//! `gitlab_project_release`, addressed `<project>:<tag_name>`.
//!
//! Observed state includes every asset link of the release, read through the
//! paginated collector and ordered by creation.

use crate::client::{Client, fetch_page};
use chrono::DateTime;
use labapi::{Release, ReleaseLink, ReleaseOptions, UpdateReleaseOptions};
use reconcile::{
    CallResult, CancelToken, CompositeKey, Error, IdFormat, IdPart, ManagedKind, Result,
    collect_all,
};
use serde::{Deserialize, Serialize};

pub const KIND: &str = "gitlab_project_release";
pub const ID_FORMAT: IdFormat = IdFormat::new(&["project", "tag_name"]);

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseSpec {
    pub project: String,
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Commit or branch to create the tag from when it does not exist yet.
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    /// RFC 3339 timestamp.
    #[serde(default)]
    pub released_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLink {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub link_type: String,
}

impl From<ReleaseLink> for AssetLink {
    fn from(link: ReleaseLink) -> Self {
        Self {
            id: link.id,
            name: link.name,
            url: link.url,
            link_type: link.link_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseState {
    pub project: String,
    pub tag_name: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub released_at: Option<String>,
    #[serde(default)]
    pub links: Vec<AssetLink>,
}

impl ReleaseState {
    fn from_release(project: &str, release: Release, links: Vec<AssetLink>) -> Self {
        Self {
            project: project.to_string(),
            tag_name: release.tag_name,
            name: release.name,
            description: release.description,
            released_at: release.released_at,
            links,
        }
    }
}

fn validate_released_at(released_at: Option<&str>) -> Result<()> {
    if let Some(ts) = released_at {
        DateTime::parse_from_rfc3339(ts).map_err(|e| {
            Error::document(KIND, format!("released_at {ts:?} is not an RFC 3339 timestamp: {e}"))
        })?;
    }
    Ok(())
}

pub struct Releases {
    client: Client,
}

impl Releases {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// All asset links of a release, oldest first.
    fn links(&self, project: &str, tag_name: &str, cancel: &CancelToken) -> Result<Vec<AssetLink>> {
        let key = format!("{project}:{tag_name}");
        let mut links = collect_all(cancel, |cursor| {
            fetch_page(&self.client, KIND, &key, cursor, |options| {
                self.client
                    .api()
                    .list_release_links(project, tag_name, options)
            })
        })?;
        // Ids are assigned in creation order.
        links.sort_by_key(|link| link.id);
        Ok(links.into_iter().map(AssetLink::from).collect())
    }

    fn state(
        &self,
        project: &str,
        release: Release,
        cancel: &CancelToken,
    ) -> Result<ReleaseState> {
        let links = self.links(project, &release.tag_name, cancel)?;
        Ok(ReleaseState::from_release(project, release, links))
    }
}

impl ManagedKind for Releases {
    type Desired = ReleaseSpec;
    type Observed = ReleaseState;
    type Change = UpdateReleaseOptions;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn id_format(&self) -> IdFormat {
        ID_FORMAT
    }

    fn label(&self, desired: &ReleaseSpec) -> String {
        format!("{}:{}", desired.project, desired.tag_name)
    }

    fn create(&self, desired: &ReleaseSpec, _cancel: &CancelToken) -> CallResult<ReleaseState> {
        validate_released_at(desired.released_at.as_deref())?;
        let options = ReleaseOptions {
            tag_name: desired.tag_name.clone(),
            name: desired.name.clone(),
            description: desired.description.clone(),
            git_ref: desired.git_ref.clone(),
            released_at: desired.released_at.clone(),
        };
        let release = self.client.api().create_release(&desired.project, &options)?;
        // A new release has no asset links yet; Read lists them.
        Ok(ReleaseState::from_release(&desired.project, release, Vec::new()))
    }

    fn key_of(&self, observed: &ReleaseState) -> Vec<IdPart> {
        vec![(&observed.project).into(), (&observed.tag_name).into()]
    }

    fn fetch(&self, key: &CompositeKey, cancel: &CancelToken) -> CallResult<ReleaseState> {
        let project = key.str(0)?;
        let release = self.client.api().get_release(project, key.str(1)?)?;
        Ok(self.state(project, release, cancel)?)
    }

    fn diff(
        &self,
        observed: &ReleaseState,
        desired: &ReleaseSpec,
    ) -> Result<Vec<UpdateReleaseOptions>> {
        super::ensure_unchanged(KIND, "project", &observed.project, &desired.project)?;
        super::ensure_unchanged(KIND, "tag_name", &observed.tag_name, &desired.tag_name)?;
        validate_released_at(desired.released_at.as_deref())?;

        let changed = |want: &Option<String>, have: &str| {
            want.as_ref().filter(|w| w.as_str() != have).cloned()
        };
        let update = UpdateReleaseOptions {
            name: changed(&desired.name, &observed.name),
            description: changed(&desired.description, &observed.description),
            released_at: changed(
                &desired.released_at,
                observed.released_at.as_deref().unwrap_or_default(),
            ),
        };
        if update == UpdateReleaseOptions::default() {
            return Ok(Vec::new());
        }
        Ok(vec![update])
    }

    fn apply(&self, key: &CompositeKey, change: &UpdateReleaseOptions) -> CallResult<()> {
        self.client
            .api()
            .update_release(key.str(0)?, key.str(1)?, change)?;
        Ok(())
    }

    fn remove(&self, key: &CompositeKey) -> CallResult<()> {
        self.client.api().delete_release(key.str(0)?, key.str(1)?)?;
        Ok(())
    }
}
