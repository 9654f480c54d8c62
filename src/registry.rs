//! The built-in kind table.

use crate::client::Client;
use crate::data::{current_user, group_variables, milestones};
use crate::resource::{
    group_membership, group_variable, project_badge, protected_branch, release, release_link,
};
use reconcile::{Handler, KindClass, KindDescriptor, KindEntry, Reconciler, Registry};

/// Wrap a managed kind in a reconciler that uses the client's read backoff.
macro_rules! resource {
    ($client:expr, $kind:expr) => {
        Handler::resource(Reconciler::new($kind).with_read_retry($client.read_retry().clone()))
    };
}

fn build_project_badge(client: &Client) -> Handler {
    resource!(client, project_badge::ProjectBadges::new(client.clone()))
}

fn build_group_membership(client: &Client) -> Handler {
    resource!(client, group_membership::GroupMemberships::new(client.clone()))
}

fn build_protected_branch(client: &Client) -> Handler {
    resource!(client, protected_branch::ProtectedBranches::new(client.clone()))
}

fn build_release(client: &Client) -> Handler {
    resource!(client, release::Releases::new(client.clone()))
}

fn build_release_link(client: &Client) -> Handler {
    resource!(client, release_link::ReleaseLinks::new(client.clone()))
}

fn build_group_variable(client: &Client) -> Handler {
    resource!(client, group_variable::GroupVariables::new(client.clone()))
}

fn build_protected_branch_lookup(client: &Client) -> Handler {
    Handler::data_source(protected_branch::ProtectedBranchLookup::new(client.clone()))
}

fn build_milestones_lookup(client: &Client) -> Handler {
    Handler::data_source(milestones::ProjectMilestonesLookup::new(client.clone()))
}

fn build_group_variables_lookup(client: &Client) -> Handler {
    Handler::data_source(group_variables::GroupVariablesLookup::new(client.clone()))
}

fn build_current_user_lookup(client: &Client) -> Handler {
    Handler::data_source(current_user::CurrentUserLookup::new(client.clone()))
}

static KINDS: &[KindEntry<Client>] = &[
    KindEntry {
        descriptor: KindDescriptor {
            name: project_badge::KIND,
            class: KindClass::Resource,
            id_format: Some(project_badge::ID_FORMAT),
            summary: "Badge shown on a project's overview page",
        },
        build: build_project_badge,
    },
    KindEntry {
        descriptor: KindDescriptor {
            name: group_membership::KIND,
            class: KindClass::Resource,
            id_format: Some(group_membership::ID_FORMAT),
            summary: "A user's membership and role in a group",
        },
        build: build_group_membership,
    },
    KindEntry {
        descriptor: KindDescriptor {
            name: protected_branch::KIND,
            class: KindClass::Resource,
            id_format: Some(protected_branch::ID_FORMAT),
            summary: "Push, merge and unprotect rules for a branch",
        },
        build: build_protected_branch,
    },
    KindEntry {
        descriptor: KindDescriptor {
            name: release::KIND,
            class: KindClass::Resource,
            id_format: Some(release::ID_FORMAT),
            summary: "Release attached to a tag",
        },
        build: build_release,
    },
    KindEntry {
        descriptor: KindDescriptor {
            name: release_link::KIND,
            class: KindClass::Resource,
            id_format: Some(release_link::ID_FORMAT),
            summary: "Asset link of a release",
        },
        build: build_release_link,
    },
    KindEntry {
        descriptor: KindDescriptor {
            name: group_variable::KIND,
            class: KindClass::Resource,
            id_format: Some(group_variable::ID_FORMAT),
            summary: "CI/CD variable of a group, per environment scope",
        },
        build: build_group_variable,
    },
    KindEntry {
        descriptor: KindDescriptor {
            name: protected_branch::KIND,
            class: KindClass::DataSource,
            id_format: None,
            summary: "Protection rules of one branch, grants flattened",
        },
        build: build_protected_branch_lookup,
    },
    KindEntry {
        descriptor: KindDescriptor {
            name: milestones::KIND,
            class: KindClass::DataSource,
            id_format: None,
            summary: "Every milestone of a project",
        },
        build: build_milestones_lookup,
    },
    KindEntry {
        descriptor: KindDescriptor {
            name: group_variables::KIND,
            class: KindClass::DataSource,
            id_format: None,
            summary: "CI/CD variables of a group",
        },
        build: build_group_variables_lookup,
    },
    KindEntry {
        descriptor: KindDescriptor {
            name: current_user::KIND,
            class: KindClass::DataSource,
            id_format: None,
            summary: "The account the token belongs to",
        },
        build: build_current_user_lookup,
    },
];

/// Registry of every kind this provider ships.
pub fn builtin() -> reconcile::Result<Registry<Client>> {
    Registry::from_table(KINDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::tests::client;
    use labapi::MockApi;
    use reconcile::{CancelToken, ReadMode, RemoteObjectRef};
    use serde_json::json;

    #[test]
    fn test_builtin_table_is_consistent() {
        let registry = builtin().unwrap();
        assert_eq!(registry.len(), KINDS.len());

        let client = client(&MockApi::new());
        for descriptor in registry.descriptors() {
            let handler = registry
                .instantiate(descriptor.class, descriptor.name, &client)
                .unwrap();
            assert_eq!(handler.kind(), descriptor.name);
            match descriptor.class {
                KindClass::Resource => {
                    let resource = handler.as_resource().unwrap();
                    assert_eq!(Some(resource.id_format()), descriptor.id_format);
                    assert!(descriptor.arity() >= 2);
                }
                KindClass::DataSource => {
                    assert!(handler.as_data_source().is_some());
                    assert_eq!(descriptor.arity(), 0);
                }
            }
        }
    }

    #[test]
    fn test_protected_branch_is_both_classes() {
        let registry = builtin().unwrap();
        assert!(registry.contains(KindClass::Resource, protected_branch::KIND));
        assert!(registry.contains(KindClass::DataSource, protected_branch::KIND));
        assert!(!registry.contains(KindClass::DataSource, release::KIND));
    }

    #[test]
    fn test_erased_round_trip_through_registry() {
        let api = MockApi::new();
        let registry = builtin().unwrap();
        let handler = registry
            .instantiate(KindClass::Resource, project_badge::KIND, &client(&api))
            .unwrap();
        let badges = handler.as_resource().unwrap();
        let cancel = CancelToken::new();

        let created = badges
            .create(
                &json!({
                    "project": "42",
                    "link_url": "https://example.com/%{project_path}",
                    "image_url": "https://example.com/badge.svg",
                }),
                &cancel,
            )
            .unwrap();
        assert!(created.id.as_str().starts_with("42:"));
        assert_eq!(created.state["rendered_link_url"], "https://example.com/42");

        let missing = badges
            .read(&RemoteObjectRef::new("42:999"), ReadMode::Refresh, &cancel)
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_data_source_document_error() {
        let registry = builtin().unwrap();
        let handler = registry
            .instantiate(
                KindClass::DataSource,
                milestones::KIND,
                &client(&MockApi::new()),
            )
            .unwrap();
        let err = handler
            .as_data_source()
            .unwrap()
            .read(&json!({ "group": "12" }), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.category(), reconcile::ErrorCategory::Document);
    }
}
