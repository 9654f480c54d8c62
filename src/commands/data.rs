use anyhow::{Result, bail};
use reconcile::{CancelToken, KindClass, Registry};
use serde_json::Value;

use crate::Context;
use crate::cli::DataArgs;
use crate::client::Client;
use crate::commands::object::json_arg;

pub fn run(ctx: &Context, args: &DataArgs) -> Result<()> {
    let query = json_arg(&args.query)?;
    let output = query_data_source(&ctx.registry, &ctx.client(), &args.kind, &query, &ctx.cancel)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Run one data-source read.
pub fn query_data_source(
    registry: &Registry<Client>,
    client: &Client,
    kind: &str,
    query: &Value,
    cancel: &CancelToken,
) -> Result<Value> {
    let handler = registry.instantiate(KindClass::DataSource, kind, client)?;
    let Some(source) = handler.as_data_source() else {
        bail!("{kind} is not a data source");
    };
    Ok(source.read(query, cancel)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use crate::resource::tests::client;
    use labapi::MockApi;
    use serde_json::json;

    #[test]
    fn test_milestones_query() {
        let api = MockApi::new();
        api.add_milestone("42", "v1.0", "");
        api.add_milestone("42", "v1.1", "");
        let registry = registry::builtin().unwrap();

        let out = query_data_source(
            &registry,
            &client(&api),
            "gitlab_project_milestones",
            &json!({ "project": "42" }),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(out["milestones"][0]["title"], "v1.1");
        assert_eq!(out["milestones"][1]["title"], "v1.0");
    }

    #[test]
    fn test_resource_kind_is_not_a_data_source() {
        let registry = registry::builtin().unwrap();
        let err = query_data_source(
            &registry,
            &client(&MockApi::new()),
            "gitlab_project_release",
            &json!({}),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown data source kind"));
    }
}
