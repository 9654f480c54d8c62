//! Execution engine - applies a plan with parallelism
//!
//! Ops in a validated plan address distinct objects, so they run on a rayon
//! pool without coordination. Results are reported in plan order.

use crate::cancel::CancelToken;
use crate::erased::{ErasedResource, Handler, TrackedObject};
use crate::error::{Error, Result};
use crate::plan::{Action, ExecutionPlan, PlannedOp};
use crate::reconciler::Deleted;
use crate::registry::{KindClass, Registry};
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// Progress callback for execution
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called once before any op runs
    fn on_start(&mut self, total: usize, dry_run: bool);

    /// Called for each op, in plan order, after all ops finished
    fn on_complete(&mut self, op: &PlannedOp, result: &ApplyResult);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_start(&mut self, _total: usize, _dry_run: bool) {}
    fn on_complete(&mut self, _op: &PlannedOp, _result: &ApplyResult) {}
}

/// Outcome of one op.
#[derive(Debug, Clone)]
pub struct OpOutcome {
    pub op: PlannedOp,
    pub result: ApplyResult,
    /// Object state after the op, for creates and updates.
    pub tracked: Option<TrackedObject>,
}

/// Summary plus per-op outcomes, in plan order.
#[derive(Debug, Clone, Default)]
pub struct ExecuteReport {
    pub summary: ExecuteSummary,
    pub outcomes: Vec<OpOutcome>,
}

/// Execute `plan`, constructing each kind it references from `client`.
pub fn execute<C, P>(
    plan: ExecutionPlan,
    registry: &Registry<C>,
    client: &C,
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    progress: &mut P,
) -> Result<ExecuteReport>
where
    C: ?Sized + 'static,
    P: ProgressCallback,
{
    if plan.is_empty() {
        return Ok(ExecuteReport::default());
    }

    let mut handlers: BTreeMap<&'static str, Handler> = BTreeMap::new();
    for kind in plan.kinds() {
        handlers.insert(kind, registry.instantiate(KindClass::Resource, kind, client)?);
    }
    reject_duplicate_creates(&plan, &handlers)?;

    progress.on_start(plan.len(), opts.dry_run);

    let results: Vec<(ApplyResult, Option<TrackedObject>)> = if opts.dry_run {
        plan.ops
            .iter()
            .map(|_| {
                (
                    ApplyResult::Skipped {
                        reason: "dry run".to_string(),
                    },
                    None,
                )
            })
            .collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.jobs.max(1))
            .build()?;

        pool.install(|| {
            plan.ops
                .par_iter()
                .map(|op| match handlers.get(op.kind).and_then(Handler::as_resource) {
                    Some(resource) => apply_op(resource, op, cancel),
                    None => (
                        ApplyResult::Failed {
                            error: format!("{} is not a managed resource kind", op.kind),
                        },
                        None,
                    ),
                })
                .collect()
        })
    };

    let mut report = ExecuteReport::default();
    for (op, (result, tracked)) in plan.ops.into_iter().zip(results) {
        progress.on_complete(&op, &result);
        report.summary.add_result(&result);
        report.outcomes.push(OpOutcome {
            op,
            result,
            tracked,
        });
    }

    Ok(report)
}

/// Fail when two create ops would make the same object.
///
/// Planning only sees identifiers; creates have none, so their natural keys
/// are compared here once the kinds are constructed. Entries whose desired
/// state does not parse are left for `apply_op` to report.
fn reject_duplicate_creates(
    plan: &ExecutionPlan,
    handlers: &BTreeMap<&'static str, Handler>,
) -> Result<()> {
    let mut seen: HashMap<(&'static str, String), usize> = HashMap::new();
    for op in plan.ops.iter().filter(|op| op.action == Action::Create) {
        let Some(resource) = handlers.get(op.kind).and_then(Handler::as_resource) else {
            continue;
        };
        let Ok(label) = resource.label(&op.desired) else {
            continue;
        };
        if let Some(first) = seen.insert((op.kind, label.clone()), op.index) {
            return Err(Error::document(
                op.kind,
                format!(
                    "objects {first} and {} both create {label}",
                    op.index
                ),
            ));
        }
    }
    Ok(())
}

/// Apply a single op
fn apply_op(
    resource: &dyn ErasedResource,
    op: &PlannedOp,
    cancel: &CancelToken,
) -> (ApplyResult, Option<TrackedObject>) {
    debug!("applying {op}");
    let outcome = match &op.action {
        Action::Create => resource.create(&op.desired, cancel).map(|tracked| {
            (
                ApplyResult::Created {
                    id: tracked.id.clone(),
                },
                Some(tracked),
            )
        }),
        Action::Update(id) => {
            resource
                .update(id, &op.desired, cancel)
                .map(|(tracked, calls)| {
                    let result = if calls == 0 {
                        ApplyResult::NoChange
                    } else {
                        ApplyResult::Modified { calls }
                    };
                    (result, Some(tracked))
                })
        }
        Action::Delete(id) => resource.delete(id, op.tracked.as_ref(), cancel).map(|deleted| {
            let result = match deleted {
                Deleted::Removed => ApplyResult::Removed,
                Deleted::AlreadyGone => ApplyResult::NoChange,
            };
            (result, None)
        }),
    };

    outcome.unwrap_or_else(|e| {
        warn!("{op} failed: {e}");
        (
            ApplyResult::Failed {
                error: e.to_string(),
            },
            None,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::RemoteObjectRef;
    use crate::plan::tests::TABLE;
    use crate::plan::{Document, DocumentEntry, Ensure};
    use serde_json::json;

    struct Recording(Vec<String>);

    impl ProgressCallback for Recording {
        fn on_start(&mut self, total: usize, _dry_run: bool) {
            self.0.push(format!("start {total}"));
        }
        fn on_complete(&mut self, op: &PlannedOp, _result: &ApplyResult) {
            self.0.push(op.to_string());
        }
    }

    fn create(name: &str) -> DocumentEntry {
        DocumentEntry {
            kind: "test_label".to_string(),
            id: None,
            ensure: Ensure::Present,
            desired: json!({"project": "42", "name": name, "color": "#ff0000"}),
            tracked: None,
        }
    }

    fn plan(objects: Vec<DocumentEntry>) -> ExecutionPlan {
        let registry = Registry::from_table(TABLE).unwrap();
        ExecutionPlan::from_document(&Document { objects }, &registry).unwrap()
    }

    #[test]
    fn test_execute_empty_plan() {
        let registry = Registry::from_table(TABLE).unwrap();
        let report = execute(
            ExecutionPlan::default(),
            &registry,
            &(),
            &ExecuteOptions::default(),
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(report.summary.total(), 0);
    }

    #[test]
    fn test_execute_creates_in_parallel() {
        let registry = Registry::from_table(TABLE).unwrap();
        let names = ["a", "b", "c", "d", "e"];
        let mut progress = Recording(Vec::new());
        let report = execute(
            plan(names.iter().map(|n| create(n)).collect()),
            &registry,
            &(),
            &ExecuteOptions {
                dry_run: false,
                jobs: 3,
            },
            &CancelToken::new(),
            &mut progress,
        )
        .unwrap();

        assert_eq!(report.summary.created, 5);
        assert!(report.summary.is_success());
        assert_eq!(progress.0[0], "start 5");
        assert_eq!(progress.0[1], "create test_label (object 1)");
        assert_eq!(progress.0[5], "create test_label (object 5)");

        let mut ids: Vec<&str> = report
            .outcomes
            .iter()
            .map(|o| o.tracked.as_ref().unwrap().id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_execute_dry_run() {
        let registry = Registry::from_table(TABLE).unwrap();
        let report = execute(
            plan(vec![create("a")]),
            &registry,
            &(),
            &ExecuteOptions {
                dry_run: true,
                jobs: 1,
            },
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.summary.total_changes(), 0);
    }

    #[test]
    fn test_failures_do_not_stop_other_ops() {
        let registry = Registry::from_table(TABLE).unwrap();
        let missing = DocumentEntry {
            kind: "test_label".to_string(),
            id: Some(RemoteObjectRef::new("42:99")),
            ensure: Ensure::Absent,
            desired: json!(null),
            tracked: None,
        };
        let report = execute(
            plan(vec![create("a"), missing]),
            &registry,
            &(),
            &ExecuteOptions::default(),
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap();

        assert_eq!(report.summary.created, 1);
        assert_eq!(report.summary.failed, 1);
        let ApplyResult::Failed { error } = &report.outcomes[1].result else {
            panic!("expected failure");
        };
        assert!(error.contains("first contact"));
    }

    #[test]
    fn test_cancelled_ops_fail() {
        let registry = Registry::from_table(TABLE).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = execute(
            plan(vec![create("a"), create("b")]),
            &registry,
            &(),
            &ExecuteOptions::default(),
            &cancel,
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(report.summary.failed, 2);
    }

    #[test]
    fn test_duplicate_creates_rejected() {
        let registry = Registry::from_table(TABLE).unwrap();
        let err = execute(
            plan(vec![create("a"), create("b"), create("a")]),
            &registry,
            &(),
            &ExecuteOptions::default(),
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Document);
        assert!(err.to_string().contains("objects 1 and 3 both create 42/a"));
    }

    #[test]
    fn test_tracked_delete_of_gone_object_is_no_change() {
        let registry = Registry::from_table(TABLE).unwrap();
        let gone = DocumentEntry {
            kind: "test_label".to_string(),
            id: Some(RemoteObjectRef::new("42:99")),
            ensure: Ensure::Absent,
            desired: json!(null),
            tracked: Some(json!({
                "project": "42",
                "id": 99,
                "name": "bug",
                "color": "#ff0000"
            })),
        };
        let report = execute(
            plan(vec![gone]),
            &registry,
            &(),
            &ExecuteOptions::default(),
            &CancelToken::new(),
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(report.outcomes[0].result, ApplyResult::NoChange);
        assert!(report.summary.is_success());
    }
}
