//! Execution engine - runs a plan one service at a time

use super::planner::{ExecutionPlan, Step};
use crate::service::ServiceName;
use anyhow::Result;
use declarative::RunSummary;

/// Execute every step of the plan in order.
///
/// A reconciler error fails only its own service; the rest still run.
/// Changes a failing reconciler applied before the error stay applied and
/// are reported alongside it.
pub fn execute<F>(plan: &ExecutionPlan, summary: &mut RunSummary, mut reconcile: F)
where
    F: FnMut(ServiceName, &mut Vec<String>) -> Result<()>,
{
    let total = plan.steps().len();
    for (index, step) in plan.steps().iter().enumerate() {
        let name = step.service().as_str();
        log::debug!("[{}/{total}] {name}", index + 1);

        match step {
            Step::Skip { reason, .. } => summary.record_skip(name, reason),
            Step::Reconcile(service) => {
                summary.mark_in_progress(name);
                let mut applied = Vec::new();
                let result = reconcile(*service, &mut applied);
                for change in &applied {
                    summary.record_change(name, change);
                }
                match result {
                    Ok(()) => summary.mark_success(name, Vec::new()),
                    Err(e) => summary.mark_failed(name, &format!("{e:#}")),
                }
            }
        }
    }
}
