use anyhow::{Context as _, Result, bail};
use reconcile::{
    ApplyResult, CancelToken, Document, ExecuteOptions, ExecuteReport, ExecutionPlan, PlannedOp,
    ProgressCallback, Registry, execute,
};
use std::fs;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::client::Client;
use crate::ui;

/// Prints each op as the executor reports it.
struct TerminalProgress {
    quiet: bool,
}

impl ProgressCallback for TerminalProgress {
    fn on_start(&mut self, total: usize, dry_run: bool) {
        if !self.quiet {
            ui::info(&format!("{total} object(s) in plan"));
        }
        if dry_run {
            ui::warn("Dry run - no changes will be made");
        }
    }

    fn on_complete(&mut self, op: &PlannedOp, result: &ApplyResult) {
        if self.quiet && result.is_success() {
            return;
        }
        ui::op_result(op, result);
    }
}

pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    ui::header("Applying Document");

    let text = fs::read_to_string(&args.document)
        .with_context(|| format!("Could not read {}", args.document.display()))?;
    let plan = plan_document(&text, &ctx.registry)?.filter_by_kind(args.kind.as_deref());
    if plan.is_empty() {
        ui::success("Nothing to apply");
        return Ok(());
    }
    if ctx.verbose > 0 {
        for op in &plan.ops {
            ui::dim(&op.to_string());
        }
    }

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: args.jobs,
    };
    let mut progress = TerminalProgress { quiet: ctx.quiet };
    let report = apply_plan(plan, &ctx.registry, &ctx.client(), &opts, &ctx.cancel, &mut progress)?;

    ui::summary(&report.summary);
    for outcome in &report.outcomes {
        if let ApplyResult::Created { id } = &outcome.result {
            ui::kv(outcome.op.kind, id.as_str());
        }
    }

    if !report.summary.is_success() {
        bail!("{} object(s) failed", report.summary.failed);
    }
    Ok(())
}

/// Parse a TOML document and validate it into a plan.
pub fn plan_document(text: &str, registry: &Registry<Client>) -> Result<ExecutionPlan> {
    let document: Document = toml::from_str(text).context("Invalid document")?;
    Ok(ExecutionPlan::from_document(&document, registry)?)
}

/// Execute a validated plan.
pub fn apply_plan<P: ProgressCallback>(
    plan: ExecutionPlan,
    registry: &Registry<Client>,
    client: &Client,
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    progress: &mut P,
) -> Result<ExecuteReport> {
    Ok(execute(plan, registry, client, opts, cancel, progress)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use crate::resource::tests::client;
    use labapi::{Api, MockApi};
    use reconcile::{Action, DocumentEntry, Ensure, ErrorCategory, NoProgress};
    use serde_json::Value;

    const DOCUMENT: &str = r#"
[[object]]
kind = "gitlab_project_badge"
[object.desired]
project = "42"
name = "coverage"
link_url = "https://example.com/%{project_path}/coverage"
image_url = "https://example.com/coverage.svg"

[[object]]
kind = "gitlab_group_membership"
[object.desired]
group_id = "12"
user_id = 7
access_level = "developer"

[[object]]
kind = "gitlab_group_variable"
[object.desired]
group = "12"
key = "DEPLOY_TOKEN"
value = "s3cret"
environment_scope = "prod:eu"
"#;

    const BADGE: &str = r#"
[[object]]
kind = "gitlab_project_badge"
[object.desired]
project = "42"
link_url = "https://example.com/pipelines"
image_url = "https://example.com/pipeline.svg"
"#;

    #[test]
    fn test_plan_document() {
        let registry = registry::builtin().unwrap();
        let plan = plan_document(DOCUMENT, &registry).unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan.ops.iter().all(|op| op.action == Action::Create));
        assert_eq!(plan.ops[1].kind, "gitlab_group_membership");
    }

    #[test]
    fn test_apply_creates_everything() {
        let api = MockApi::new();
        api.add_user(7, "jdoe", "Jane Doe");
        let registry = registry::builtin().unwrap();
        let plan = plan_document(DOCUMENT, &registry).unwrap();

        let report = apply_plan(
            plan,
            &registry,
            &client(&api),
            &ExecuteOptions {
                dry_run: false,
                jobs: 2,
            },
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(report.summary.created, 3);
        assert!(report.summary.is_success());
        assert_eq!(api.get_group_member("12", 7).unwrap().access_level, 30);
        assert_eq!(
            report.outcomes[2].tracked.as_ref().unwrap().id.as_str(),
            "12:DEPLOY_TOKEN:prod:eu"
        );
    }

    #[test]
    fn test_dry_run_makes_no_calls() {
        let api = MockApi::new();
        let registry = registry::builtin().unwrap();
        let plan = plan_document(DOCUMENT, &registry).unwrap();

        let report = apply_plan(
            plan,
            &registry,
            &client(&api),
            &ExecuteOptions {
                dry_run: true,
                jobs: 1,
            },
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(report.summary.skipped, 3);
        assert!(api.get_group_member("12", 7).is_err());
    }

    #[test]
    fn test_data_source_in_document_is_rejected() {
        let registry = registry::builtin().unwrap();
        let err = plan_document(
            r#"
[[object]]
kind = "gitlab_current_user"
"#,
            &registry,
        )
        .unwrap_err();
        let core = err.downcast_ref::<reconcile::Error>().unwrap();
        assert_eq!(core.category(), ErrorCategory::Document);
    }

    #[test]
    fn test_same_object_twice_is_rejected() {
        let registry = registry::builtin().unwrap();
        let err = plan_document(
            r#"
[[object]]
kind = "gitlab_project_badge"
id = "42:7"

[[object]]
kind = "gitlab_project_badge"
id = "42:7"
ensure = "absent"
"#,
            &registry,
        )
        .unwrap_err();
        assert!(err.to_string().contains("appears more than once"));
    }

    #[test]
    fn test_failures_are_counted() {
        let api = MockApi::new();
        let registry = registry::builtin().unwrap();
        // No user 7, so the membership fails while the others succeed.
        let plan = plan_document(DOCUMENT, &registry).unwrap();
        let report = apply_plan(
            plan,
            &registry,
            &client(&api),
            &ExecuteOptions::default(),
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(report.summary.created, 2);
        assert_eq!(report.summary.failed, 1);
        assert!(matches!(
            report.outcomes[1].result,
            ApplyResult::Failed { .. }
        ));
    }

    #[test]
    fn test_absent_with_tracked_state_applies_twice() {
        let api = MockApi::new();
        let registry = registry::builtin().unwrap();
        let created = apply_plan(
            plan_document(BADGE, &registry).unwrap(),
            &registry,
            &client(&api),
            &ExecuteOptions::default(),
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap();
        let tracked = created.outcomes[0].tracked.clone().unwrap();
        let badge_id = tracked.state["badge_id"].as_i64().unwrap();

        let absent = Document {
            objects: vec![DocumentEntry {
                kind: "gitlab_project_badge".to_string(),
                id: Some(tracked.id.clone()),
                ensure: Ensure::Absent,
                desired: Value::Null,
                tracked: Some(tracked.state),
            }],
        };
        let results: Vec<ApplyResult> = (0..2)
            .map(|_| {
                let plan = ExecutionPlan::from_document(&absent, &registry).unwrap();
                let report = apply_plan(
                    plan,
                    &registry,
                    &client(&api),
                    &ExecuteOptions::default(),
                    &CancelToken::new(),
                    &mut NoProgress,
                )
                .unwrap();
                report.outcomes[0].result.clone()
            })
            .collect();

        assert_eq!(results, vec![ApplyResult::Removed, ApplyResult::NoChange]);
        assert!(api.get_project_badge("42", badge_id).unwrap_err().is_not_found());
    }
}
