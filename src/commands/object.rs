//! Single-object commands: read, import and verify.

use anyhow::{Context as _, Result, bail};
use reconcile::{
    CancelToken, ErasedResource, KindClass, ReadMode, Registry, RemoteObjectRef, TrackedObject,
};
use serde_json::Value;
use std::fs;

use crate::Context;
use crate::cli::{ObjectArgs, VerifyArgs};
use crate::client::Client;
use crate::ui;

pub fn read(ctx: &Context, args: &ObjectArgs) -> Result<()> {
    let client = ctx.client();
    match read_object(&ctx.registry, &client, &args.kind, &args.id, &ctx.cancel)? {
        Some(tracked) => print_tracked(&tracked),
        None => {
            ui::warn(&format!(
                "{} {} no longer exists; drop it from state",
                args.kind, args.id
            ));
            Ok(())
        }
    }
}

pub fn import(ctx: &Context, args: &ObjectArgs) -> Result<()> {
    let client = ctx.client();
    let tracked = import_object(&ctx.registry, &client, &args.kind, &args.id, &ctx.cancel)?;
    if !ctx.quiet {
        ui::success(&format!("Imported {} {}", args.kind, tracked.id));
    }
    print_tracked(&tracked)
}

pub fn verify(ctx: &Context, args: &VerifyArgs) -> Result<()> {
    let tracked = json_arg(&args.tracked)?;
    let client = ctx.client();
    let gone = verify_object(
        &ctx.registry,
        &client,
        &args.object.kind,
        &args.object.id,
        &tracked,
        &ctx.cancel,
    )?;
    if !gone {
        bail!(
            "{} {} still exists after destroy",
            args.object.kind,
            args.object.id
        );
    }
    ui::success(&format!("{} {} is gone", args.object.kind, args.object.id));
    Ok(())
}

/// Refresh-mode read: `None` when the object is gone.
pub fn read_object(
    registry: &Registry<Client>,
    client: &Client,
    kind: &str,
    id: &str,
    cancel: &CancelToken,
) -> Result<Option<TrackedObject>> {
    with_resource(registry, client, kind, |resource| {
        resource.read(&RemoteObjectRef::new(id), ReadMode::Refresh, cancel)
    })
}

/// Import-mode read: a missing object is an error.
pub fn import_object(
    registry: &Registry<Client>,
    client: &Client,
    kind: &str,
    id: &str,
    cancel: &CancelToken,
) -> Result<TrackedObject> {
    let tracked = with_resource(registry, client, kind, |resource| {
        resource.read(&RemoteObjectRef::new(id), ReadMode::Lookup, cancel)
    })?;
    tracked.with_context(|| format!("{kind} {id} not found"))
}

/// `true` when the object is gone, `false` when it still matches `tracked`.
pub fn verify_object(
    registry: &Registry<Client>,
    client: &Client,
    kind: &str,
    id: &str,
    tracked: &Value,
    cancel: &CancelToken,
) -> Result<bool> {
    with_resource(registry, client, kind, |resource| {
        resource.confirm_absent(&RemoteObjectRef::new(id), tracked, cancel)
    })
}

fn with_resource<T>(
    registry: &Registry<Client>,
    client: &Client,
    kind: &str,
    f: impl FnOnce(&dyn ErasedResource) -> reconcile::Result<T>,
) -> Result<T> {
    let handler = registry.instantiate(KindClass::Resource, kind, client)?;
    let Some(resource) = handler.as_resource() else {
        bail!("{kind} is not a managed resource kind");
    };
    Ok(f(resource)?)
}

/// Inline JSON, or `@path` to read it from a file.
pub fn json_arg(arg: &str) -> Result<Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => {
            let path = shellexpand::tilde(path);
            fs::read_to_string(path.as_ref()).with_context(|| format!("Could not read {path}"))?
        }
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("Invalid JSON")
}

fn print_tracked(tracked: &TrackedObject) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(tracked)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use crate::resource::tests::client;
    use labapi::{Api, BadgeOptions, MockApi};
    use reconcile::{Error, ErrorCategory};
    use serde_json::json;
    use tempfile::TempDir;

    fn badge(api: &MockApi) -> String {
        let badge = api
            .create_project_badge(
                "42",
                &BadgeOptions {
                    name: Some("pipeline".to_string()),
                    link_url: Some("https://example.com/l".to_string()),
                    image_url: Some("https://example.com/i.svg".to_string()),
                },
            )
            .unwrap();
        format!("42:{}", badge.id)
    }

    #[test]
    fn test_read_then_gone() {
        let api = MockApi::new();
        let registry = registry::builtin().unwrap();
        let client = client(&api);
        let cancel = CancelToken::new();
        let id = badge(&api);

        let tracked = read_object(&registry, &client, "gitlab_project_badge", &id, &cancel)
            .unwrap()
            .unwrap();
        assert_eq!(tracked.state["name"], "pipeline");

        let badge_id = tracked.state["badge_id"].as_i64().unwrap();
        api.delete_project_badge("42", badge_id).unwrap();
        assert!(
            read_object(&registry, &client, "gitlab_project_badge", &id, &cancel)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_import_missing_is_error() {
        let api = MockApi::new();
        let registry = registry::builtin().unwrap();
        let err = import_object(
            &registry,
            &client(&api),
            "gitlab_project_badge",
            "42:404",
            &CancelToken::new(),
        )
        .unwrap_err();
        let core = err.downcast_ref::<Error>().unwrap();
        assert_eq!(core.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_unknown_kind() {
        let registry = registry::builtin().unwrap();
        let err = read_object(
            &registry,
            &client(&MockApi::new()),
            "gitlab_project_nope",
            "1:2",
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown resource kind"));
    }

    #[test]
    fn test_verify_after_delete() {
        let api = MockApi::new();
        let registry = registry::builtin().unwrap();
        let client = client(&api);
        let cancel = CancelToken::new();
        let id = badge(&api);
        let tracked = read_object(&registry, &client, "gitlab_project_badge", &id, &cancel)
            .unwrap()
            .unwrap();

        assert!(
            !verify_object(
                &registry,
                &client,
                "gitlab_project_badge",
                &id,
                &tracked.state,
                &cancel
            )
            .unwrap()
        );

        let badge_id = tracked.state["badge_id"].as_i64().unwrap();
        api.delete_project_badge("42", badge_id).unwrap();
        assert!(
            verify_object(
                &registry,
                &client,
                "gitlab_project_badge",
                &id,
                &tracked.state,
                &cancel
            )
            .unwrap()
        );
    }

    #[test]
    fn test_json_arg_inline_and_file() {
        assert_eq!(json_arg(r#"{"a": 1}"#).unwrap(), json!({"a": 1}));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"project": "42"}"#).unwrap();
        let value = json_arg(&format!("@{}", path.display())).unwrap();
        assert_eq!(value["project"], "42");

        assert!(json_arg("not json").is_err());
    }
}
