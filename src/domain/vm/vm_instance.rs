use serde::Serialize;

use crate::domain::utils::id::VmName;
use crate::domain::vm::vm_type::VmType;
use crate::domain::workflow::task::TaskRef;

/// Lease lifecycle of a VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VmState {
    /// Leased (possibly still booting), nothing assigned yet.
    Leased,
    /// At least one running task.
    Serving,
    /// Still leased, no running task.
    Idle,
    /// Terminal.
    Released,
}

/// A task committed to an instance together with its predicted window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningTask {
    pub task: TaskRef,
    pub start_time: f64,
    pub completion_time: f64,
}

/// One leased machine. Owned by the `VmPool`; tasks refer to it by `VmKey`.
#[derive(Debug, Clone)]
pub struct VmInstance {
    pub name: VmName,
    pub vm_type: VmType,
    pub state: VmState,
    pub billing_period: f64,

    pub lease_start_time: f64,
    pub lease_end_time: Option<f64>,
    /// Next billing boundary at which the instance is considered for release.
    pub next_billing_check: f64,

    pub running_tasks: Vec<RunningTask>,
    pub completed_tasks: Vec<TaskRef>,

    pub total_active_time: f64,
    pub total_idle_time: f64,
    pub cost: f64,
    pub energy: f64,

    /// Completion of the latest task committed so far, or the boot end.
    busy_until: f64,
}

impl VmInstance {
    pub fn new(name: impl Into<String>, vm_type: VmType, lease_start_time: f64, billing_period: f64) -> Self {
        let ready_time = lease_start_time + vm_type.boot_time;
        VmInstance {
            name: VmName::new(name),
            vm_type,
            state: VmState::Leased,
            billing_period,
            lease_start_time,
            lease_end_time: None,
            next_billing_check: lease_start_time + billing_period,
            running_tasks: Vec::new(),
            completed_tasks: Vec::new(),
            total_active_time: 0.0,
            total_idle_time: 0.0,
            cost: 0.0,
            energy: 0.0,
            busy_until: ready_time,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state != VmState::Released
    }

    /// Earliest time a new task could start on this instance.
    pub fn available_time(&self) -> f64 {
        self.busy_until
    }

    pub fn has_running_tasks(&self) -> bool {
        !self.running_tasks.is_empty()
    }

    /// Time left in the billing period that contains `time`.
    pub fn remaining_billing_time(&self, time: f64) -> f64 {
        let elapsed = (time - self.lease_start_time).max(0.0);
        self.billing_period - (elapsed % self.billing_period)
    }

    /// Commits `task` to this instance and accrues its cost and energy.
    ///
    /// Idle time accrues for the gap between the previous commitment (or the
    /// end of boot) and `start_time`.
    ///
    /// # Returns
    /// The `(cost, energy)` charged for the task.
    pub fn assign_task(&mut self, task: TaskRef, start_time: f64, execution_time: f64) -> (f64, f64) {
        let completion_time = start_time + execution_time;
        let cost = self.vm_type.cost_for_duration(execution_time);
        let energy = self.vm_type.energy_for_duration(execution_time);

        self.total_idle_time += (start_time - self.busy_until).max(0.0);
        self.total_active_time += execution_time;
        self.cost += cost;
        self.energy += energy;
        self.busy_until = self.busy_until.max(completion_time);

        self.running_tasks.push(RunningTask { task, start_time, completion_time });
        self.state = VmState::Serving;

        (cost, energy)
    }

    /// Moves every running task whose completion time is at or before `now`
    /// into the completed set.
    pub fn collect_completed(&mut self, now: f64) -> Vec<RunningTask> {
        let (finished, still_running): (Vec<RunningTask>, Vec<RunningTask>) =
            self.running_tasks.drain(..).partition(|running| running.completion_time <= now);
        self.running_tasks = still_running;

        self.completed_tasks.extend(finished.iter().map(|running| running.task));
        if self.running_tasks.is_empty() && self.state == VmState::Serving {
            self.state = VmState::Idle;
        }
        finished
    }

    pub fn next_completion_time(&self) -> Option<f64> {
        self.running_tasks.iter().map(|running| running.completion_time).reduce(f64::min)
    }

    pub fn advance_billing_check(&mut self) {
        self.next_billing_check += self.billing_period;
    }

    pub fn release(&mut self, time: f64) {
        self.lease_end_time = Some(time);
        self.state = VmState::Released;
    }

    /// Lease duration for released instances, zero otherwise.
    pub fn lease_duration(&self) -> f64 {
        self.lease_end_time.map(|end| (end - self.lease_start_time).max(0.0)).unwrap_or(0.0)
    }

    /// Completion time of the last committed task, if any.
    pub fn last_completion_time(&self) -> Option<f64> {
        if self.running_tasks.is_empty() && self.completed_tasks.is_empty() { None } else { Some(self.busy_until) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::task_store::TaskKey;
    use crate::domain::workflow::workflow::WorkflowKey;
    use slotmap::SlotMap;

    fn task_refs(n: usize) -> Vec<TaskRef> {
        let mut workflows: SlotMap<WorkflowKey, ()> = SlotMap::with_key();
        let mut tasks: SlotMap<TaskKey, ()> = SlotMap::with_key();
        let workflow = workflows.insert(());
        (0..n).map(|_| TaskRef::new(workflow, tasks.insert(()))).collect()
    }

    fn instance() -> VmInstance {
        VmInstance::new("vm-1", VmType::new("small", 1.0, 3.6, 2.0, 10.0), 100.0, 3600.0)
    }

    #[test]
    fn test_new_instance_waits_for_boot() {
        let vm = instance();
        assert_eq!(vm.state, VmState::Leased);
        assert_eq!(vm.available_time(), 110.0);
        assert_eq!(vm.next_billing_check, 3700.0);
        assert_eq!(vm.last_completion_time(), None);
    }

    #[test]
    fn test_assign_accrues_cost_energy_and_idle_gap() {
        let refs = task_refs(2);
        let mut vm = instance();

        let (cost, energy) = vm.assign_task(refs[0], 120.0, 100.0);
        assert!((cost - 0.1).abs() < 1e-12);
        assert_eq!(energy, 200.0);
        assert_eq!(vm.total_idle_time, 10.0);
        assert_eq!(vm.state, VmState::Serving);
        assert_eq!(vm.available_time(), 220.0);

        vm.assign_task(refs[1], 250.0, 50.0);
        assert_eq!(vm.total_idle_time, 40.0);
        assert_eq!(vm.total_active_time, 150.0);
        assert!((vm.cost - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_collect_completed_moves_finished_tasks() {
        let refs = task_refs(2);
        let mut vm = instance();
        vm.assign_task(refs[0], 110.0, 10.0);
        vm.assign_task(refs[1], 120.0, 10.0);

        assert_eq!(vm.next_completion_time(), Some(120.0));
        let finished = vm.collect_completed(125.0);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].task, refs[0]);
        assert_eq!(vm.state, VmState::Serving);

        vm.collect_completed(130.0);
        assert!(!vm.has_running_tasks());
        assert_eq!(vm.completed_tasks, refs);
        assert_eq!(vm.state, VmState::Idle);
    }

    #[test]
    fn test_remaining_billing_time() {
        let vm = instance();
        assert_eq!(vm.remaining_billing_time(100.0), 3600.0);
        assert_eq!(vm.remaining_billing_time(1100.0), 2600.0);
        assert_eq!(vm.remaining_billing_time(3800.0), 3500.0);
    }

    #[test]
    fn test_release_records_lease_end() {
        let mut vm = instance();
        assert_eq!(vm.lease_duration(), 0.0);
        vm.release(500.0);
        assert!(!vm.is_active());
        assert_eq!(vm.lease_duration(), 400.0);
    }
}
