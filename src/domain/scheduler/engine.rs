use slotmap::SlotMap;

use crate::domain::config::SimulationConfig;
use crate::domain::scheduler::deadline_partitioner::DeadlinePartitioner;
use crate::domain::scheduler::metrics::SimulationReport;
use crate::domain::scheduler::ready_queue::ReadyQueue;
use crate::domain::simulator::clock::SimulationClock;
use crate::domain::simulator::sampler::{ExecutionTimeSampler, GaussianSampler};
use crate::domain::vm::vm_pool::{DataInput, Placement, PlacementRequest, VmPool};
use crate::domain::workflow::task::{TaskRef, TaskState};
use crate::domain::workflow::workflow::{Workflow, WorkflowKey};
use crate::error::ConversionError;

/// Log a deferred task at `warn` level every this many attempts.
const DEFERRAL_WARN_INTERVAL: u32 = 100;

/// Discrete-event scheduler.
///
/// Owns the workflows, the ready queue, the VM pool and the clock. All state
/// is mutated from `run`; there is no shared or global state.
#[derive(Debug)]
pub struct SchedulingEngine {
    config: SimulationConfig,
    workflows: SlotMap<WorkflowKey, Workflow>,
    /// Submission order.
    workflow_order: Vec<WorkflowKey>,
    ready_queue: ReadyQueue,
    vm_pool: VmPool,
    clock: SimulationClock,
    partitioner: DeadlinePartitioner,
    deadlocked: bool,
}

impl SchedulingEngine {
    pub fn new(config: SimulationConfig, sampler: Box<dyn ExecutionTimeSampler>) -> Self {
        let vm_pool = VmPool::new(&config, sampler);
        SchedulingEngine {
            config,
            workflows: SlotMap::with_key(),
            workflow_order: Vec::new(),
            ready_queue: ReadyQueue::new(),
            vm_pool,
            clock: SimulationClock::new(0.0),
            partitioner: DeadlinePartitioner::new(),
            deadlocked: false,
        }
    }

    /// Engine with a Gaussian sampler seeded from the configuration.
    pub fn with_gaussian_sampler(config: SimulationConfig) -> Self {
        let sampler = GaussianSampler::new(config.seed);
        Self::new(config, Box::new(sampler))
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn vm_pool(&self) -> &VmPool {
        &self.vm_pool
    }

    pub fn workflow(&self, key: WorkflowKey) -> &Workflow {
        &self.workflows[key]
    }

    /// Workflows in submission order.
    pub fn workflows(&self) -> impl Iterator<Item = &Workflow> {
        self.workflow_order.iter().map(move |key| &self.workflows[*key])
    }

    pub fn is_deadlocked(&self) -> bool {
        self.deadlocked
    }

    /// Every task of every workflow has been dispatched.
    pub fn is_complete(&self) -> bool {
        self.workflows.values().all(Workflow::is_completed)
    }

    /// Partitions the workflow deadline and enqueues its entry tasks.
    pub fn submit_workflow(&mut self, mut workflow: Workflow) -> Result<WorkflowKey, ConversionError> {
        workflow.validate()?;
        self.partitioner.partition(&mut workflow);

        let entry_tasks = workflow.entry_tasks();
        log::info!(
            "Submitted workflow {} ({} tasks, {} entry tasks), arrival {:.2}, deadline {:.2}",
            workflow.name,
            workflow.tasks.len(),
            entry_tasks.len(),
            workflow.arrival_time,
            workflow.deadline
        );

        let key = self.workflows.insert(workflow);
        self.workflow_order.push(key);

        for task in entry_tasks {
            let entry = &mut self.workflows[key].tasks[task];
            entry.state = TaskState::Queued;
            self.ready_queue.push(TaskRef::new(key, task), entry.earliest_start_time);
        }

        Ok(key)
    }

    /// Runs the event loop until every workflow is dispatched or a deadlock is
    /// detected, drains the running tasks and releases every instance.
    pub fn run(&mut self) -> SimulationReport {
        log::info!("Simulation started with {} workflow(s), at most {} VM(s).", self.workflows.len(), self.config.max_vms);

        while !self.is_complete() {
            let next_ready = self.ready_queue.peek_time();
            let next_completion = self.vm_pool.next_completion_time();

            // Completions due no later than the next ready task are handled first,
            // so their successors are queued at their real start time.
            if let Some(completion) = next_completion.filter(|completion| next_ready.is_none_or(|ready| *completion <= ready)) {
                self.advance_clock(completion);
            } else if let Some((task, earliest_start_time)) = self.ready_queue.pop() {
                self.advance_clock(earliest_start_time);
                self.dispatch(task);
            } else {
                let pending: usize = self.workflows.values().map(|workflow| workflow.tasks.iter().filter(|(_, task)| !task.is_dispatched()).count()).sum();
                log::error!("Deadlock at {:.2}: no ready task and nothing running, {} task(s) never dispatched.", self.clock.now(), pending);
                self.deadlocked = true;
                break;
            }
        }

        while let Some(next_completion) = self.vm_pool.next_completion_time() {
            self.advance_clock(next_completion);
        }
        self.vm_pool.release_all(self.clock.now());

        log::info!("Simulation finished at {:.2} using {} VM(s).", self.clock.now(), self.vm_pool.vms_used());
        self.report()
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport::build(self.workflows(), &self.vm_pool, self.deadlocked)
    }

    /// Moves the clock, then recognizes completions and returns idle capacity.
    fn advance_clock(&mut self, time: f64) {
        self.clock.advance_to(time);
        let now = self.clock.now();

        for task in self.vm_pool.collect_completed(now) {
            self.complete_task(task);
        }
        self.vm_pool.check_idle_vms(now);
    }

    fn complete_task(&mut self, task_ref: TaskRef) {
        let workflow = &mut self.workflows[task_ref.workflow];
        let task = &mut workflow.tasks[task_ref.task];
        task.state = TaskState::Completed;
        log::debug!("Task {} of workflow {} completed at {:.2}", task.name, workflow.name, task.completion_time.unwrap_or(0.0));

        self.feedback(task_ref);
    }

    /// Replaces the estimated start of newly ready successors with the
    /// observed one. The duration allotted at partitioning,
    /// `subDeadline - (EST - estimatedExecutionTime)`, is carried over to the
    /// new start and capped by the latest completion time.
    fn feedback(&mut self, task_ref: TaskRef) {
        let workflow = &mut self.workflows[task_ref.workflow];

        for successor in workflow.successors(task_ref.task).to_vec() {
            if workflow.tasks[successor].state != TaskState::Pending || !workflow.is_ready(successor) {
                continue;
            }

            let new_earliest_start_time = workflow
                .predecessors(successor)
                .iter()
                .map(|pred| {
                    let pred_task = &workflow.tasks[*pred];
                    pred_task.completion_time.unwrap_or(0.0) + pred_task.data_transfer_time_to(successor)
                })
                .fold(f64::NEG_INFINITY, f64::max);

            let task = &mut workflow.tasks[successor];
            let allocated_duration = task.sub_deadline - (task.earliest_start_time - task.estimated_execution_time());
            let new_sub_deadline = (new_earliest_start_time + allocated_duration).min(task.latest_completion_time);

            log::debug!(
                "Feedback for task {}: EST {:.2} -> {:.2}, sub-deadline {:.2} -> {:.2}",
                task.name,
                task.earliest_start_time,
                new_earliest_start_time,
                task.sub_deadline,
                new_sub_deadline
            );

            task.earliest_start_time = new_earliest_start_time;
            task.sub_deadline = new_sub_deadline;
            task.priority = new_earliest_start_time;
            task.state = TaskState::Queued;
            self.ready_queue.push(TaskRef::new(task_ref.workflow, successor), new_earliest_start_time);
        }
    }

    fn placement_request(&self, task_ref: TaskRef) -> PlacementRequest {
        let workflow = &self.workflows[task_ref.workflow];
        let task = &workflow.tasks[task_ref.task];

        let inputs = task
            .predecessors
            .iter()
            .map(|pred| {
                let pred_task = &workflow.tasks[*pred];
                DataInput {
                    vm: pred_task.assigned_vm,
                    completion_time: pred_task.completion_time.unwrap_or(0.0),
                    transfer_time: pred_task.data_transfer_time_to(task_ref.task),
                }
            })
            .collect();

        PlacementRequest {
            task: task_ref,
            name: task.name.clone(),
            mean_execution_time: task.mean_execution_time,
            sub_deadline: task.sub_deadline,
            inputs,
        }
    }

    fn dispatch(&mut self, task_ref: TaskRef) {
        let now = self.clock.now();
        let request = self.placement_request(task_ref);

        let placement = match self.vm_pool.find_or_create_vm(&request, now) {
            Some(placement) => placement,
            None => match self.fallback_placement(task_ref, &request, now) {
                Some(placement) => placement,
                None => {
                    self.defer(task_ref);
                    return;
                }
            },
        };

        self.commit(task_ref, placement);
    }

    /// Best-effort placement once waiting cannot help: an instance is already
    /// free, or the task ran out of retries.
    fn fallback_placement(&mut self, task_ref: TaskRef, request: &PlacementRequest, now: f64) -> Option<Placement> {
        let attempts = self.workflows[task_ref.workflow].tasks[task_ref.task].placement_attempts;
        let instance_free = self.vm_pool.active_vms().iter().any(|key| self.vm_pool.vm(*key).available_time() <= now);
        let retries_exhausted = attempts >= self.config.max_placement_retries;

        if !instance_free && !retries_exhausted {
            return None;
        }

        let placement = self.vm_pool.place_best_effort(request, now)?;
        log::warn!(
            "Task {} cannot meet its sub-deadline {:.2} on any VM; placing it best-effort on {} after {} deferral(s).",
            request.name,
            request.sub_deadline,
            self.vm_pool.vm(placement.vm).name,
            attempts
        );
        Some(placement)
    }

    /// Re-enqueues the task with its earliest start pushed forward by the retry delta.
    fn defer(&mut self, task_ref: TaskRef) {
        let now = self.clock.now();
        let delta = self.config.placement_retry_delta;
        let task = &mut self.workflows[task_ref.workflow].tasks[task_ref.task];

        task.placement_attempts += 1;
        task.earliest_start_time = task.earliest_start_time.max(now) + delta;
        task.priority = task.earliest_start_time;

        if task.placement_attempts % DEFERRAL_WARN_INTERVAL == 0 {
            log::warn!("Task {} deferred {} times, now waiting until {:.2}", task.name, task.placement_attempts, task.earliest_start_time);
        } else {
            log::info!("No VM available for task {}; deferring to {:.2}", task.name, task.earliest_start_time);
        }

        self.ready_queue.push(task_ref, task.earliest_start_time);
    }

    fn commit(&mut self, task_ref: TaskRef, placement: Placement) {
        let (cost, energy) = self.vm_pool.assign(task_ref, &placement);
        let vm_name = self.vm_pool.vm(placement.vm).name.clone();

        let task = &mut self.workflows[task_ref.workflow].tasks[task_ref.task];
        task.record_dispatch(placement.vm, placement.start_time, placement.execution_time, cost, energy);

        log::info!(
            "Scheduled Task {} on VM {}: Start={:.2}, End={:.2}, Execution={:.2}, Cost=${:.4}, Energy={:.2} Ws",
            task.name,
            vm_name,
            placement.start_time,
            placement.completion_time(),
            placement.execution_time,
            cost,
            energy
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::config_dto::{SimulationConfigDto, VmTypeDto};
    use crate::domain::simulator::sampler_mock::MeanSampler;
    use crate::domain::workflow::task::Task;

    fn config(max_vms: usize) -> SimulationConfig {
        SimulationConfig::try_from(SimulationConfigDto {
            max_vms,
            normalization_factor: 1.0,
            bandwidth_mbps: 100.0,
            billing_period: 3600.0,
            variance_factor_alpha: 0.0,
            deadline_factor_beta: 1.0,
            estimation_factor_eta: 1.0,
            deadline_multiplier: None,
            placement_retry_delta: None,
            max_placement_retries: None,
            min_execution_time: None,
            seed: None,
            vm_types: vec![VmTypeDto { id: "small".to_string(), processing_capacity: 1.0, cost_per_hour: 3.6, energy_per_second: 1.0, boot_time: 0.0 }],
        })
        .unwrap()
    }

    fn engine(max_vms: usize) -> SchedulingEngine {
        SchedulingEngine::new(config(max_vms), Box::new(MeanSampler::new()))
    }

    #[test]
    fn test_chain_runs_in_order() {
        let mut workflow = Workflow::new("chain", 0.0, 100.0);
        let a = workflow.add_task(Task::new("A", 10.0, 0.0, 5.0)).unwrap();
        let b = workflow.add_task(Task::new("B", 20.0, 0.0, 0.0)).unwrap();
        workflow.add_dependency(a, b).unwrap();

        let mut engine = engine(2);
        let key = engine.submit_workflow(workflow).unwrap();
        let report = engine.run();

        let workflow = engine.workflow(key);
        assert!(workflow.is_finished());
        // B becomes ready once A's output has been transferred
        assert_eq!(workflow.tasks[b].earliest_start_time, 15.0);
        assert_eq!(workflow.tasks[b].start_time, 15.0);
        assert_eq!(workflow.tasks[b].assigned_vm, workflow.tasks[a].assigned_vm);
        assert_eq!(report.simulation_duration, 35.0);
        assert_eq!(report.vms_used, 1);
        assert!(!report.deadlocked);
    }

    #[test]
    fn test_feedback_carries_allocated_duration() {
        let mut workflow = Workflow::new("chain", 0.0, 100.0);
        // A has a standard deviation of 2, so B is estimated to start at 12
        let a = workflow.add_task(Task::new("A", 10.0, 4.0, 0.0)).unwrap();
        let b = workflow.add_task(Task::new("B", 20.0, 0.0, 0.0)).unwrap();
        workflow.add_dependency(a, b).unwrap();

        let mut engine = engine(1);
        let key = engine.submit_workflow(workflow).unwrap();
        let initial = engine.workflow(key).tasks[b].clone();
        assert_eq!(initial.earliest_start_time, 12.0);
        // slack 70, B's share 20/32
        assert!((initial.sub_deadline - 75.75).abs() < 1e-9);

        engine.run();
        let task = &engine.workflow(key).tasks[b];
        assert_eq!(task.earliest_start_time, 10.0);
        // 75.75 - (12 - 20) = 83.75 allocated, from the observed start at 10
        assert!((task.sub_deadline - 93.75).abs() < 1e-9);
        assert!(task.sub_deadline <= task.latest_completion_time);
        assert_eq!(task.state, TaskState::Completed);
    }

    #[test]
    fn test_feedback_sub_deadline_is_capped_by_lct() {
        let mut workflow = Workflow::new("tight", 0.0, 40.0);
        let a = workflow.add_task(Task::new("A", 10.0, 0.0, 0.0)).unwrap();
        let b = workflow.add_task(Task::new("B", 20.0, 0.0, 0.0)).unwrap();
        workflow.add_dependency(a, b).unwrap();

        let mut engine = engine(1);
        let key = engine.submit_workflow(workflow).unwrap();
        engine.run();

        // the carried duration, 2 * 20 + 20/30 * 10, would end past the deadline of 40
        let task = &engine.workflow(key).tasks[b];
        assert_eq!(task.sub_deadline, 40.0);
        assert_eq!(task.latest_completion_time, 40.0);
    }

    #[test]
    fn test_completion_before_later_arrival_is_handled_first() {
        let mut first = Workflow::new("first", 0.0, 60.0);
        let a = first.add_task(Task::new("A", 10.0, 0.0, 0.0)).unwrap();
        let b = first.add_task(Task::new("B", 10.0, 0.0, 0.0)).unwrap();
        first.add_dependency(a, b).unwrap();
        let mut second = Workflow::new("second", 100.0, 200.0);
        second.add_task(Task::new("C", 10.0, 0.0, 0.0)).unwrap();

        let mut engine = engine(2);
        let key = engine.submit_workflow(first).unwrap();
        engine.submit_workflow(second).unwrap();
        let report = engine.run();

        let task = &engine.workflow(key).tasks[b];
        assert_eq!(task.start_time, 10.0);
        assert_eq!(task.completion_time, Some(20.0));
        assert!(report.workflows[0].deadline_met);
        assert!(report.workflows[1].deadline_met);
    }

    #[test]
    fn test_empty_queue_with_nothing_running_is_a_deadlock() {
        let mut workflow = Workflow::new("stuck", 0.0, 100.0);
        workflow.add_task(Task::new("A", 10.0, 0.0, 0.0)).unwrap();

        let mut engine = engine(1);
        engine.submit_workflow(workflow).unwrap();
        engine.ready_queue = ReadyQueue::new();

        let report = engine.run();
        assert!(engine.is_deadlocked());
        assert!(report.deadlocked);
        assert_eq!(report.vms_used, 0);
        assert!(!report.workflows[0].deadline_met);
    }

    #[test]
    fn test_submit_rejects_cycle() {
        let mut workflow = Workflow::new("cycle", 0.0, 100.0);
        let a = workflow.add_task(Task::new("A", 1.0, 0.0, 0.0)).unwrap();
        let b = workflow.add_task(Task::new("B", 1.0, 0.0, 0.0)).unwrap();
        workflow.add_dependency(a, b).unwrap();
        workflow.add_dependency(b, a).unwrap();

        assert!(matches!(engine(1).submit_workflow(workflow), Err(ConversionError::CyclicWorkflow(_))));
    }

    #[test]
    fn test_late_arrival_starts_at_arrival() {
        let mut workflow = Workflow::new("late", 50.0, 200.0);
        let a = workflow.add_task(Task::new("A", 10.0, 0.0, 0.0)).unwrap();

        let mut engine = engine(1);
        let key = engine.submit_workflow(workflow).unwrap();
        engine.run();

        let task = &engine.workflow(key).tasks[a];
        assert_eq!(task.start_time, 50.0);
        assert_eq!(engine.vm_pool().vm(task.assigned_vm.unwrap()).lease_start_time, 50.0);
    }

    #[test]
    fn test_report_aggregates() {
        let mut workflow = Workflow::new("pair", 0.0, 100.0);
        workflow.add_task(Task::new("A", 10.0, 0.0, 1.5)).unwrap();
        workflow.add_task(Task::new("B", 30.0, 0.0, 0.5)).unwrap();

        let mut engine = engine(2);
        engine.submit_workflow(workflow).unwrap();
        let report = engine.run();

        assert_eq!(report.total_data_transfer_time, 2.0);
        assert!((report.total_cost - 0.04).abs() < 1e-12);
        assert_eq!(report.total_energy, 40.0);
        assert_eq!(report.deadline_violation_probability, 0.0);
        assert!(report.resource_utilization > 0.0 && report.resource_utilization <= 1.0);
        assert_eq!(report.tasks().count(), 2);
    }
}
