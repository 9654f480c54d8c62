//! `gitlab_project_badge`, addressed `<project>:<badge_id>`.

use crate::client::Client;
use labapi::{Badge, BadgeOptions};
use reconcile::{
    CallResult, CancelToken, CompositeKey, IdFormat, IdPart, ManagedKind, Result,
};
use serde::{Deserialize, Serialize};

pub const KIND: &str = "gitlab_project_badge";
pub const ID_FORMAT: IdFormat = IdFormat::new(&["project", "badge_id"]);

#[derive(Debug, Clone, Deserialize)]
pub struct BadgeSpec {
    /// Project id or full path.
    pub project: String,
    #[serde(default)]
    pub name: Option<String>,
    pub link_url: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeState {
    pub project: String,
    pub badge_id: i64,
    pub name: String,
    pub link_url: String,
    pub image_url: String,
    pub rendered_link_url: String,
    pub rendered_image_url: String,
}

impl BadgeState {
    fn from_badge(project: &str, badge: Badge) -> Self {
        Self {
            project: project.to_string(),
            badge_id: badge.id,
            name: badge.name,
            link_url: badge.link_url,
            image_url: badge.image_url,
            rendered_link_url: badge.rendered_link_url,
            rendered_image_url: badge.rendered_image_url,
        }
    }
}

pub struct ProjectBadges {
    client: Client,
}

impl ProjectBadges {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ManagedKind for ProjectBadges {
    type Desired = BadgeSpec;
    type Observed = BadgeState;
    type Change = BadgeOptions;

    fn kind(&self) -> &'static str {
        KIND
    }

    fn id_format(&self) -> IdFormat {
        ID_FORMAT
    }

    fn label(&self, desired: &BadgeSpec) -> String {
        format!("{} {}", desired.project, desired.link_url)
    }

    fn create(&self, desired: &BadgeSpec, _cancel: &CancelToken) -> CallResult<BadgeState> {
        let options = BadgeOptions {
            name: desired.name.clone(),
            link_url: Some(desired.link_url.clone()),
            image_url: Some(desired.image_url.clone()),
        };
        let badge = self
            .client
            .api()
            .create_project_badge(&desired.project, &options)?;
        Ok(BadgeState::from_badge(&desired.project, badge))
    }

    fn key_of(&self, observed: &BadgeState) -> Vec<IdPart> {
        vec![(&observed.project).into(), observed.badge_id.into()]
    }

    fn fetch(&self, key: &CompositeKey, _cancel: &CancelToken) -> CallResult<BadgeState> {
        let project = key.str(0)?;
        let badge = self.client.api().get_project_badge(project, key.int(1)?)?;
        Ok(BadgeState::from_badge(project, badge))
    }

    fn diff(&self, observed: &BadgeState, desired: &BadgeSpec) -> Result<Vec<BadgeOptions>> {
        super::ensure_unchanged(KIND, "project", &observed.project, &desired.project)?;

        let mut edit = BadgeOptions::default();
        if let Some(name) = desired.name.as_ref().filter(|n| **n != observed.name) {
            edit.name = Some(name.clone());
        }
        if desired.link_url != observed.link_url {
            edit.link_url = Some(desired.link_url.clone());
        }
        if desired.image_url != observed.image_url {
            edit.image_url = Some(desired.image_url.clone());
        }
        if edit == BadgeOptions::default() {
            return Ok(Vec::new());
        }
        Ok(vec![edit])
    }

    fn apply(&self, key: &CompositeKey, change: &BadgeOptions) -> CallResult<()> {
        self.client
            .api()
            .edit_project_badge(key.str(0)?, key.int(1)?, change)?;
        Ok(())
    }

    fn remove(&self, key: &CompositeKey) -> CallResult<()> {
        self.client
            .api()
            .delete_project_badge(key.str(0)?, key.int(1)?)?;
        Ok(())
    }

    fn matches_tracked(&self, tracked: &BadgeState, current: &BadgeState) -> bool {
        tracked.link_url == current.link_url && tracked.image_url == current.image_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::tests::{client, client_with_read_retry};
    use labapi::{Api, MockApi};
    use reconcile::{Deleted, ErrorCategory, ReadMode, Reconciler, RemoteObjectRef, confirm_absent};

    fn spec(link_url: &str) -> BadgeSpec {
        BadgeSpec {
            project: "42".to_string(),
            name: Some("coverage".to_string()),
            link_url: link_url.to_string(),
            image_url: "https://example.com/badge.svg".to_string(),
        }
    }

    fn badges(api: &MockApi) -> Reconciler<ProjectBadges> {
        let client = client(api);
        Reconciler::new(ProjectBadges::new(client.clone())).with_read_retry(client.read_retry().clone())
    }

    #[test]
    fn test_create_and_read() {
        let api = MockApi::new();
        let r = badges(&api);
        let cancel = CancelToken::new();

        let created = r.create(&spec("https://example.com/%{project_path}"), &cancel).unwrap();
        assert_eq!(created.id().as_str(), format!("42:{}", created.state().badge_id));
        assert_eq!(created.state().rendered_link_url, "https://example.com/42");

        let read = r.read(created.id(), ReadMode::Refresh, &cancel).unwrap().unwrap();
        assert_eq!(read, created);
    }

    #[test]
    fn test_import_by_text() {
        let api = MockApi::new();
        let r = badges(&api);
        let cancel = CancelToken::new();
        let badge = api
            .create_project_badge(
                "42",
                &BadgeOptions {
                    name: Some("ci".to_string()),
                    link_url: Some("https://ci.example.com".to_string()),
                    image_url: Some("https://ci.example.com/badge.svg".to_string()),
                },
            )
            .unwrap();

        let imported = r.import(&format!("42:{}", badge.id), &cancel).unwrap();
        assert_eq!(imported.state().name, "ci");

        let err = r.import("42", &cancel).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Identifier);
        let err = r.import("42:badge-7", &cancel).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Identifier);
        let err = r.import("42:9999", &cancel).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_edits_changed_fields_only() {
        let api = MockApi::new();
        let r = badges(&api);
        let cancel = CancelToken::new();
        let created = r.create(&spec("https://example.com/a"), &cancel).unwrap();

        let unchanged = r.update(created.id(), &spec("https://example.com/a"), &cancel).unwrap();
        assert_eq!(unchanged.changes, 0);

        let updated = r.update(created.id(), &spec("https://example.com/b"), &cancel).unwrap();
        assert_eq!(updated.changes, 1);
        assert_eq!(updated.observation.state().link_url, "https://example.com/b");
        assert_eq!(updated.observation.state().name, "coverage");
    }

    #[test]
    fn test_update_rejects_project_move() {
        let api = MockApi::new();
        let r = badges(&api);
        let cancel = CancelToken::new();
        let created = r.create(&spec("https://example.com/a"), &cancel).unwrap();

        let mut moved = spec("https://example.com/a");
        moved.project = "43".to_string();
        let err = r.update(created.id(), &moved, &cancel).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Document);
    }

    #[test]
    fn test_create_rejected_by_remote() {
        let api = MockApi::new();
        let r = badges(&api);
        let err = r.create(&spec(""), &CancelToken::new()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Rejected);
    }

    #[test]
    fn test_delete_then_verify() {
        let api = MockApi::new();
        let r = badges(&api);
        let cancel = CancelToken::new();
        let created = r.create(&spec("https://example.com/a"), &cancel).unwrap();

        assert!(!confirm_absent(&r, &created, &cancel).unwrap());
        assert_eq!(r.delete(created.id(), Some(&created), &cancel).unwrap(), Deleted::Removed);
        assert!(confirm_absent(&r, &created, &cancel).unwrap());
        assert_eq!(
            r.delete(created.id(), Some(&created), &cancel).unwrap(),
            Deleted::AlreadyGone
        );

        let never = RemoteObjectRef::new("42:9999");
        let err = r.delete(&never, None, &cancel).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Convergence);
    }

    #[test]
    fn test_update_waits_for_stale_reads() {
        let api = MockApi::new();
        let client = client_with_read_retry(&api, 4);
        let r = Reconciler::new(ProjectBadges::new(client.clone()))
            .with_read_retry(client.read_retry().clone());
        let cancel = CancelToken::new();
        let created = r.create(&spec("https://example.com/old"), &cancel).unwrap();

        // The next two reads after the edit report the badge as missing.
        api.set_stale_reads(2);
        let updated = r.update(created.id(), &spec("https://example.com/new"), &cancel).unwrap();
        assert_eq!(updated.changes, 1);
        assert_eq!(updated.observation.state().link_url, "https://example.com/new");
    }

    #[test]
    fn test_update_gives_up_after_max_attempts() {
        let api = MockApi::new();
        let client = client_with_read_retry(&api, 2);
        let r = Reconciler::new(ProjectBadges::new(client.clone()))
            .with_read_retry(client.read_retry().clone());
        let cancel = CancelToken::new();
        let created = r.create(&spec("https://example.com/old"), &cancel).unwrap();

        api.set_stale_reads(3);
        let err = r
            .update(created.id(), &spec("https://example.com/new"), &cancel)
            .unwrap_err();
        assert!(err.is_not_found());
        // The edit itself went through.
        api.set_stale_reads(0);
        assert_eq!(
            api.get_project_badge("42", created.state().badge_id).unwrap().link_url,
            "https://example.com/new"
        );
    }
}
