use std::collections::HashMap;

use serde::Serialize;

use crate::domain::utils::id::TaskName;
use crate::domain::vm::vm_pool::VmKey;
use crate::domain::workflow::task_store::TaskKey;
use crate::domain::workflow::workflow::WorkflowKey;

/// Address of a task across all submitted workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskRef {
    pub workflow: WorkflowKey,
    pub task: TaskKey,
}

impl TaskRef {
    pub fn new(workflow: WorkflowKey, task: TaskKey) -> Self {
        TaskRef { workflow, task }
    }
}

/// Scheduling lifecycle of a task inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    /// Waiting for predecessors.
    Pending,
    /// Sitting in the ready queue.
    Queued,
    /// Dispatched to a VM, completion not yet reached by the clock.
    Running,
    Completed,
}

/// A single job of a workflow.
///
/// Static attributes are set at load time. Timing fields are written by the
/// deadline partitioner and by feedback processing. Placement, cost and energy
/// are written once, at dispatch.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: TaskName,
    pub mean_execution_time: f64,
    pub variance_execution_time: f64,

    /// Transfer time of this task's output to any successor.
    pub data_transfer_time: f64,
    /// Successor-specific transfer times, overriding `data_transfer_time`.
    pub transfer_times: HashMap<TaskKey, f64>,

    /// Keys into the owning workflow's `TaskStore`.
    pub predecessors: Vec<TaskKey>,
    pub successors: Vec<TaskKey>,

    pub state: TaskState,
    pub earliest_start_time: f64,
    pub latest_completion_time: f64,
    pub sub_deadline: f64,
    pub priority: f64,
    pub placement_attempts: u32,

    pub assigned_vm: Option<VmKey>,
    pub start_time: f64,
    pub execution_time: f64,
    pub completion_time: Option<f64>,
    pub cost: f64,
    pub energy: f64,
}

impl Task {
    pub fn new(name: impl Into<String>, mean_execution_time: f64, variance_execution_time: f64, data_transfer_time: f64) -> Self {
        Task {
            name: TaskName::new(name),
            mean_execution_time,
            variance_execution_time,
            data_transfer_time,
            transfer_times: HashMap::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            state: TaskState::Pending,
            earliest_start_time: 0.0,
            latest_completion_time: 0.0,
            sub_deadline: 0.0,
            priority: 0.0,
            placement_attempts: 0,
            assigned_vm: None,
            start_time: 0.0,
            execution_time: 0.0,
            completion_time: None,
            cost: 0.0,
            energy: 0.0,
        }
    }

    /// Mean plus one standard deviation.
    pub fn estimated_execution_time(&self) -> f64 {
        self.mean_execution_time + self.variance_execution_time.sqrt()
    }

    pub fn data_transfer_time_to(&self, successor: TaskKey) -> f64 {
        self.transfer_times.get(&successor).copied().unwrap_or(self.data_transfer_time)
    }

    /// A task counts as dispatched once it holds a positive completion time.
    pub fn is_dispatched(&self) -> bool {
        self.completion_time.is_some_and(|t| t > 0.0)
    }

    /// Commits the placement. Only the first call has an effect.
    ///
    /// # Returns
    /// `false` if the task had already been dispatched.
    pub fn record_dispatch(&mut self, vm: VmKey, start_time: f64, execution_time: f64, cost: f64, energy: f64) -> bool {
        if self.assigned_vm.is_some() {
            log::error!("Task {} was already dispatched; ignoring second placement.", self.name);
            return false;
        }

        self.assigned_vm = Some(vm);
        self.start_time = start_time;
        self.execution_time = execution_time;
        self.completion_time = Some(start_time + execution_time);
        self.cost = cost;
        self.energy = energy;
        self.state = TaskState::Running;
        true
    }

    /// Time past the sub-deadline, zero when on time or not yet dispatched.
    pub fn delay(&self) -> f64 {
        match self.completion_time {
            Some(completion) => (completion - self.sub_deadline).max(0.0),
            None => 0.0,
        }
    }

    pub fn violates_sub_deadline(&self) -> bool {
        self.delay() > 0.0
    }
}
