use std::collections::HashMap;

use crate::domain::workflow::task::TaskState;
use crate::domain::workflow::task_store::TaskKey;
use crate::domain::workflow::workflow::Workflow;

/// Splits a workflow deadline into per-task sub-deadlines.
///
/// Runs three passes over the DAG: earliest start times in topological order,
/// latest completion times in reverse topological order, then sub-deadlines.
/// Each pass is memoized in a map keyed by task.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeadlinePartitioner;

impl DeadlinePartitioner {
    pub fn new() -> Self {
        DeadlinePartitioner
    }

    /// Slack of the absolute deadline over the critical path, never negative.
    ///
    /// Measured from time zero, so a late arrival inflates it; the clamp to
    /// the latest completion time in `partition` bounds the result.
    pub fn workflow_slack(workflow: &Workflow) -> f64 {
        (workflow.deadline - workflow.critical_path_length()).max(0.0)
    }

    pub fn earliest_start_times(&self, workflow: &Workflow) -> HashMap<TaskKey, f64> {
        let mut est: HashMap<TaskKey, f64> = HashMap::with_capacity(workflow.tasks.len());

        for &key in workflow.topological_order() {
            let task = &workflow.tasks[key];
            let value = if task.predecessors.is_empty() {
                workflow.arrival_time
            } else {
                task.predecessors
                    .iter()
                    .map(|pred| {
                        let pred_task = &workflow.tasks[*pred];
                        est[pred] + pred_task.estimated_execution_time() + pred_task.data_transfer_time_to(key)
                    })
                    .fold(f64::NEG_INFINITY, f64::max)
            };
            est.insert(key, value);
        }

        est
    }

    pub fn latest_completion_times(&self, workflow: &Workflow) -> HashMap<TaskKey, f64> {
        let mut lct: HashMap<TaskKey, f64> = HashMap::with_capacity(workflow.tasks.len());

        for &key in workflow.topological_order().iter().rev() {
            let task = &workflow.tasks[key];
            let value = if task.successors.is_empty() {
                workflow.deadline
            } else {
                task.successors
                    .iter()
                    .map(|succ| lct[succ] - workflow.tasks[*succ].estimated_execution_time() - task.data_transfer_time_to(*succ))
                    .fold(f64::INFINITY, f64::min)
            };
            lct.insert(key, value);
        }

        lct
    }

    /// Writes EST, LCT, sub-deadline and priority onto every task and resets
    /// its state to `Pending`.
    pub fn partition(&self, workflow: &mut Workflow) {
        let est = self.earliest_start_times(workflow);
        let lct = self.latest_completion_times(workflow);
        let slack = Self::workflow_slack(workflow);
        let total_execution_time = workflow.total_execution_time();

        for key in workflow.tasks.keys().to_vec() {
            let task = &mut workflow.tasks[key];
            let estimated = task.estimated_execution_time();
            let weight = if total_execution_time > 0.0 { estimated / total_execution_time } else { 0.0 };

            task.earliest_start_time = est[&key];
            task.latest_completion_time = lct[&key];
            task.sub_deadline = (est[&key] + estimated + slack * weight).min(lct[&key]);
            task.priority = task.earliest_start_time;
            task.state = TaskState::Pending;
        }

        log::debug!(
            "Partitioned deadline {:.2} of workflow {}: slack {:.2}, critical path {:.2}",
            workflow.deadline,
            workflow.name,
            slack,
            workflow.critical_path_length()
        );
    }
}
