use std::cell::OnceCell;
use std::collections::{HashMap, VecDeque};

use slotmap::new_key_type;

use crate::api::workflow_dto::{TaskDto, WorkflowDto};
use crate::domain::config::SimulationConfig;
use crate::domain::utils::id::{TaskName, WorkflowName};
use crate::domain::workflow::task::{Task, TaskState};
use crate::domain::workflow::task_store::{TaskKey, TaskStore};
use crate::error::ConversionError;

new_key_type! {
    pub struct WorkflowKey;
}

/// A workflow: a DAG of tasks with an arrival time and an absolute deadline.
///
/// The graph is fixed once built. Structural aggregates (topological order,
/// critical path, total estimated work) are computed on first use and cached
/// until the structure changes through `add_task` or `add_dependency`.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: WorkflowName,
    pub arrival_time: f64,
    pub deadline: f64,
    pub tasks: TaskStore,

    topological_order: OnceCell<Vec<TaskKey>>,
    critical_path_length: OnceCell<f64>,
    total_execution_time: OnceCell<f64>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, arrival_time: f64, deadline: f64) -> Self {
        Workflow {
            name: WorkflowName::new(name),
            arrival_time,
            deadline,
            tasks: TaskStore::new(),
            topological_order: OnceCell::new(),
            critical_path_length: OnceCell::new(),
            total_execution_time: OnceCell::new(),
        }
    }

    /// Constructs a complete Workflow graph from a WorkflowDto.
    ///
    /// Transfer times in bytes are converted with the configured bandwidth, and a
    /// missing deadline is derived from the critical path and the configured
    /// deadline multiplier.
    pub fn from_dto(dto: WorkflowDto, config: &SimulationConfig) -> Result<Self, ConversionError> {
        if dto.tasks.is_empty() {
            return Err(ConversionError::EmptyWorkflow(dto.id));
        }

        // Phase 0: Create the base workflow, the deadline is fixed in Phase 4
        let mut workflow = Workflow::new(dto.id.clone(), dto.arrival_time, 0.0);

        // Phase 1: Create all tasks
        for task_dto in &dto.tasks {
            let task = Self::build_task(task_dto, config)?;
            workflow.add_task(task)?;
        }

        // Phase 2: Connect parents to children
        for task_dto in &dto.tasks {
            let child = workflow.key_for(&task_dto.id)?;
            for parent_id in &task_dto.parents {
                let parent = workflow.key_for(parent_id)?;
                workflow.add_dependency(parent, child)?;
            }
        }

        // Phase 3: Per-successor transfer times
        for task_dto in &dto.tasks {
            let source = workflow.key_for(&task_dto.id)?;
            for (child_id, transfer_time) in &task_dto.transfer_times {
                let child = workflow.key_for(child_id)?;
                if !transfer_time.is_finite() || *transfer_time < 0.0 {
                    return Err(ConversionError::InvalidTaskAttribute {
                        task: task_dto.id.clone(),
                        reason: format!("transfer time to '{}' is {}", child_id, transfer_time),
                    });
                }
                if !workflow.tasks[source].successors.contains(&child) {
                    log::warn!("Workflow {}: task '{}' lists a transfer time to '{}', which is not a child. Ignored.", dto.id, task_dto.id, child_id);
                    continue;
                }
                workflow.tasks[source].transfer_times.insert(child, *transfer_time);
            }
        }

        // Phase 4: Validate the DAG and fix the deadline
        workflow.validate()?;
        workflow.deadline = match dto.deadline {
            Some(deadline) => deadline,
            None => workflow.arrival_time + config.deadline_multiplier * workflow.critical_path_length(),
        };

        log::debug!(
            "Built workflow {} with {} tasks, arrival {:.2}, deadline {:.2}, critical path {:.2}",
            workflow.name,
            workflow.tasks.len(),
            workflow.arrival_time,
            workflow.deadline,
            workflow.critical_path_length()
        );

        Ok(workflow)
    }

    fn build_task(dto: &TaskDto, config: &SimulationConfig) -> Result<Task, ConversionError> {
        let invalid = |reason: String| ConversionError::InvalidTaskAttribute { task: dto.id.clone(), reason };

        if !dto.runtime.is_finite() || dto.runtime < 0.0 {
            return Err(invalid(format!("runtime is {}", dto.runtime)));
        }
        if !dto.variance.is_finite() || dto.variance < 0.0 {
            return Err(invalid(format!("variance is {}", dto.variance)));
        }

        let data_transfer_time = match (dto.data_transfer_time, dto.output_size) {
            (Some(seconds), _) => seconds,
            (None, Some(bytes)) => config.transfer_time_for_bytes(bytes),
            (None, None) => 0.0,
        };
        if !data_transfer_time.is_finite() || data_transfer_time < 0.0 {
            return Err(invalid(format!("data transfer time is {}", data_transfer_time)));
        }

        Ok(Task::new(dto.id.clone(), dto.runtime, dto.variance, data_transfer_time))
    }

    fn key_for(&self, task_id: &str) -> Result<TaskKey, ConversionError> {
        self.tasks
            .key_for_name(&TaskName::new(task_id))
            .ok_or_else(|| ConversionError::UnknownTask { workflow: self.name.to_string(), task: task_id.to_string() })
    }

    fn invalidate_structure(&mut self) {
        self.topological_order = OnceCell::new();
        self.critical_path_length = OnceCell::new();
        self.total_execution_time = OnceCell::new();
    }

    pub fn add_task(&mut self, task: Task) -> Result<TaskKey, ConversionError> {
        let task_name = task.name.to_string();
        let key = self.tasks.add(task).ok_or_else(|| ConversionError::DuplicateTask { workflow: self.name.to_string(), task: task_name })?;
        self.invalidate_structure();
        Ok(key)
    }

    /// Adds the edge `parent -> child`. Duplicate edges are ignored.
    pub fn add_dependency(&mut self, parent: TaskKey, child: TaskKey) -> Result<(), ConversionError> {
        for key in [parent, child] {
            if !self.tasks.contains(key) {
                return Err(ConversionError::UnknownTask { workflow: self.name.to_string(), task: format!("{:?}", key) });
            }
        }
        if parent == child {
            return Err(ConversionError::CyclicWorkflow(self.name.to_string()));
        }
        if self.tasks[child].predecessors.contains(&parent) {
            return Ok(());
        }

        self.tasks[child].predecessors.push(parent);
        self.tasks[parent].successors.push(child);
        self.invalidate_structure();
        Ok(())
    }

    /// Checks that the workflow is a non-empty DAG.
    pub fn validate(&self) -> Result<(), ConversionError> {
        if self.tasks.is_empty() {
            return Err(ConversionError::EmptyWorkflow(self.name.to_string()));
        }
        if self.topological_order().len() != self.tasks.len() {
            return Err(ConversionError::CyclicWorkflow(self.name.to_string()));
        }
        Ok(())
    }

    pub fn predecessors(&self, key: TaskKey) -> &[TaskKey] {
        &self.tasks[key].predecessors
    }

    pub fn successors(&self, key: TaskKey) -> &[TaskKey] {
        &self.tasks[key].successors
    }

    /// Tasks without predecessors, in insertion order.
    pub fn entry_tasks(&self) -> Vec<TaskKey> {
        self.tasks.iter().filter(|(_, task)| task.predecessors.is_empty()).map(|(key, _)| key).collect()
    }

    /// Tasks without successors, in insertion order.
    pub fn exit_tasks(&self) -> Vec<TaskKey> {
        self.tasks.iter().filter(|(_, task)| task.successors.is_empty()).map(|(key, _)| key).collect()
    }

    /// The logical start of the workflow: the first task found without predecessors.
    pub fn entry_task(&self) -> Option<TaskKey> {
        self.tasks.iter().find(|(_, task)| task.predecessors.is_empty()).map(|(key, _)| key)
    }

    /// Kahn ordering seeded with entry tasks in insertion order.
    ///
    /// On a cyclic graph the order is shorter than the task count; `validate`
    /// reports that case.
    pub fn topological_order(&self) -> &[TaskKey] {
        self.topological_order.get_or_init(|| {
            let mut in_degree: HashMap<TaskKey, usize> = self.tasks.iter().map(|(key, task)| (key, task.predecessors.len())).collect();
            let mut queue: VecDeque<TaskKey> = self.tasks.keys().iter().copied().filter(|key| in_degree[key] == 0).collect();
            let mut order = Vec::with_capacity(self.tasks.len());

            while let Some(current) = queue.pop_front() {
                order.push(current);
                for successor in &self.tasks[current].successors {
                    if let Some(degree) = in_degree.get_mut(successor) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(*successor);
                        }
                    }
                }
            }
            order
        })
    }

    /// Longest path from any entry task to every task, weighted by mean execution time.
    pub fn longest_paths(&self) -> HashMap<TaskKey, f64> {
        let mut longest_path_to: HashMap<TaskKey, f64> = HashMap::with_capacity(self.tasks.len());

        for &key in self.topological_order() {
            let task = &self.tasks[key];
            let longest_predecessor = task.predecessors.iter().filter_map(|pred| longest_path_to.get(pred)).copied().fold(0.0, f64::max);
            longest_path_to.insert(key, task.mean_execution_time + longest_predecessor);
        }

        longest_path_to
    }

    /// Length of the critical path by mean execution time. Cached.
    pub fn critical_path_length(&self) -> f64 {
        *self.critical_path_length.get_or_init(|| {
            let longest_path_to = self.longest_paths();
            self.exit_tasks().iter().filter_map(|key| longest_path_to.get(key)).copied().fold(0.0, f64::max)
        })
    }

    /// Sum of mean plus one standard deviation over all tasks. Cached.
    pub fn total_execution_time(&self) -> f64 {
        *self.total_execution_time.get_or_init(|| self.tasks.iter().map(|(_, task)| task.estimated_execution_time()).sum())
    }

    /// Sum of all per-task default transfer times.
    pub fn total_data_transfer_time(&self) -> f64 {
        self.tasks.iter().map(|(_, task)| task.data_transfer_time).sum()
    }

    /// A task is ready when every predecessor has been dispatched.
    pub fn is_ready(&self, key: TaskKey) -> bool {
        self.tasks[key].predecessors.iter().all(|pred| self.tasks[*pred].is_dispatched())
    }

    /// Every task has a completion time.
    pub fn is_completed(&self) -> bool {
        self.tasks.iter().all(|(_, task)| task.is_dispatched())
    }

    /// Every task's completion has been reached by the clock.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|(_, task)| task.state == TaskState::Completed)
    }

    /// Latest completion time among dispatched tasks.
    pub fn finish_time(&self) -> Option<f64> {
        self.tasks.iter().filter_map(|(_, task)| task.completion_time).reduce(f64::max)
    }

    pub fn makespan(&self) -> f64 {
        self.finish_time().map(|finish| finish - self.arrival_time).unwrap_or(0.0)
    }

    pub fn has_deadline_violation(&self) -> bool {
        self.finish_time().is_some_and(|finish| finish > self.deadline)
    }
}
