use slotmap::{SlotMap, new_key_type};

use crate::domain::config::SimulationConfig;
use crate::domain::simulator::sampler::ExecutionTimeSampler;
use crate::domain::utils::id::TaskName;
use crate::domain::vm::vm_instance::VmInstance;
use crate::domain::vm::vm_type::VmType;
use crate::domain::workflow::task::TaskRef;

new_key_type! {
    pub struct VmKey;
}

/// Output of one predecessor, as seen by a task waiting for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataInput {
    pub vm: Option<VmKey>,
    pub completion_time: f64,
    pub transfer_time: f64,
}

/// Everything the pool needs to know about a task to place it.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub task: TaskRef,
    pub name: TaskName,
    pub mean_execution_time: f64,
    pub sub_deadline: f64,
    pub inputs: Vec<DataInput>,
}

impl PlacementRequest {
    /// Time at which all inputs are present on `vm`. Outputs produced on the
    /// same instance need no transfer.
    pub fn data_ready_time(&self, vm: Option<VmKey>, now: f64) -> f64 {
        self.inputs
            .iter()
            .map(|input| if vm.is_some() && input.vm == vm { input.completion_time } else { input.completion_time + input.transfer_time })
            .fold(now, f64::max)
    }
}

/// A placement decision: where, when, and for how long.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub vm: VmKey,
    pub start_time: f64,
    pub execution_time: f64,
}

impl Placement {
    pub fn completion_time(&self) -> f64 {
        self.start_time + self.execution_time
    }
}

/// Owns the VM type catalog and every instance ever leased.
///
/// Active instances are tracked separately from the all-time arena; released
/// instances stay in the arena for reporting.
#[derive(Debug)]
pub struct VmPool {
    vm_types: Vec<VmType>,
    vms: SlotMap<VmKey, VmInstance>,
    /// All instances in creation order.
    order: Vec<VmKey>,
    active: Vec<VmKey>,

    max_vms: usize,
    billing_period: f64,
    normalization_factor: f64,
    variance_factor_alpha: f64,
    min_execution_time: f64,

    sampler: Box<dyn ExecutionTimeSampler>,
    vm_counter: usize,
}

impl VmPool {
    pub fn new(config: &SimulationConfig, sampler: Box<dyn ExecutionTimeSampler>) -> Self {
        VmPool {
            vm_types: config.vm_types.clone(),
            vms: SlotMap::with_key(),
            order: Vec::new(),
            active: Vec::new(),
            max_vms: config.max_vms,
            billing_period: config.billing_period,
            normalization_factor: config.normalization_factor,
            variance_factor_alpha: config.variance_factor_alpha,
            min_execution_time: config.min_execution_time,
            sampler,
            vm_counter: 0,
        }
    }

    pub fn vm(&self, key: VmKey) -> &VmInstance {
        &self.vms[key]
    }

    pub fn get(&self, key: VmKey) -> Option<&VmInstance> {
        self.vms.get(key)
    }

    /// Every instance ever leased, in creation order.
    pub fn all_vms(&self) -> impl Iterator<Item = (VmKey, &VmInstance)> {
        self.order.iter().map(move |key| (*key, &self.vms[*key]))
    }

    pub fn active_vms(&self) -> &[VmKey] {
        &self.active
    }

    /// Number of instances leased over the whole run.
    pub fn vms_used(&self) -> usize {
        self.vm_counter
    }

    /// Expected runtime of a task on a machine type, without jitter.
    pub fn mean_execution_time_on(&self, mean_execution_time: f64, vm_type: &VmType) -> f64 {
        (mean_execution_time / vm_type.processing_capacity) * self.normalization_factor
    }

    /// Jittered runtime of a task on a machine type, floored at the minimum execution time.
    pub fn predicted_execution_time(&mut self, mean_execution_time: f64, vm_type: &VmType) -> f64 {
        let mean_on_vm = self.mean_execution_time_on(mean_execution_time, vm_type);
        let std_dev = mean_on_vm * self.variance_factor_alpha;
        self.sampler.sample(mean_on_vm, std_dev).max(self.min_execution_time)
    }

    /// Start time of `request` on an existing instance: never before `now`,
    /// the inputs, or the instance becoming free.
    pub fn predicted_start_time(&self, request: &PlacementRequest, vm: VmKey, now: f64) -> f64 {
        let data_ready = request.data_ready_time(Some(vm), now);
        data_ready.max(self.vms[vm].available_time())
    }

    /// Picks an active instance for the task or leases a new one.
    ///
    /// # Returns
    /// `None` when no active instance meets the sub-deadline and the
    /// instance cap is reached.
    pub fn find_or_create_vm(&mut self, request: &PlacementRequest, now: f64) -> Option<Placement> {
        if let Some(placement) = self.find_suitable_vm(request, now) {
            log::debug!("Found suitable existing VM {} for task {}", self.vms[placement.vm].name, request.name);
            return Some(placement);
        }

        if self.active.len() >= self.max_vms {
            log::debug!("Cannot create new VM for task {}: maximum of {} active VMs reached.", request.name, self.max_vms);
            return None;
        }

        let vm_type = self.select_vm_type_for_new_lease(request, now)?.clone();
        let key = self.lease_vm(vm_type, now);

        let vm_type = self.vms[key].vm_type.clone();
        let execution_time = self.predicted_execution_time(request.mean_execution_time, &vm_type);
        let start_time = self.predicted_start_time(request, key, now);
        Some(Placement { vm: key, start_time, execution_time })
    }

    /// Among active instances that meet the sub-deadline, the one with the
    /// least cost growth. Ties go to the instance with less idle time.
    pub fn find_suitable_vm(&mut self, request: &PlacementRequest, now: f64) -> Option<Placement> {
        let mut best: Option<(Placement, f64)> = None;

        for key in self.active.clone() {
            let vm_type = self.vms[key].vm_type.clone();
            let start_time = self.predicted_start_time(request, key, now);
            let execution_time = self.predicted_execution_time(request.mean_execution_time, &vm_type);

            if start_time + execution_time > request.sub_deadline {
                continue;
            }

            let vm = &self.vms[key];
            let remaining_billing_time = vm.remaining_billing_time(start_time);
            let cost_growth = vm.vm_type.cost_for_duration((execution_time - remaining_billing_time).max(0.0));

            let is_better = match &best {
                None => true,
                Some((current, current_growth)) => {
                    cost_growth < *current_growth
                        || (cost_growth == *current_growth && vm.total_idle_time < self.vms[current.vm].total_idle_time)
                }
            };
            if is_better {
                best = Some((Placement { vm: key, start_time, execution_time }, cost_growth));
            }
        }

        best.map(|(placement, _)| placement)
    }

    /// Cheapest type that can finish the task alone before its sub-deadline,
    /// or the fastest type when none can.
    pub fn select_vm_type_for_new_lease(&self, request: &PlacementRequest, now: f64) -> Option<&VmType> {
        let data_ready = request.data_ready_time(None, now);
        let mut best: Option<(&VmType, f64)> = None;

        for vm_type in &self.vm_types {
            let execution_time = self.mean_execution_time_on(request.mean_execution_time, vm_type);
            let completion_time = data_ready.max(now + vm_type.boot_time) + execution_time;
            if completion_time > request.sub_deadline {
                continue;
            }

            let billed_periods = ((vm_type.boot_time + execution_time) / self.billing_period).ceil();
            let cost = billed_periods * (vm_type.cost_per_hour / 3600.0) * self.billing_period;

            if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                best = Some((vm_type, cost));
            }
        }

        match best {
            Some((vm_type, _)) => Some(vm_type),
            None => {
                let fastest = self.fastest_vm_type();
                if let Some(vm_type) = fastest {
                    log::debug!("No VM type meets sub-deadline {:.2} of task {}; using fastest type {}.", request.sub_deadline, request.name, vm_type.id);
                }
                fastest
            }
        }
    }

    /// Highest processing capacity, first in catalog order on ties.
    pub fn fastest_vm_type(&self) -> Option<&VmType> {
        self.vm_types.iter().fold(None, |fastest: Option<&VmType>, vm_type| match fastest {
            Some(current) if current.processing_capacity >= vm_type.processing_capacity => Some(current),
            _ => Some(vm_type),
        })
    }

    fn lease_vm(&mut self, vm_type: VmType, now: f64) -> VmKey {
        self.vm_counter += 1;
        let name = format!("vm-{}", self.vm_counter);
        log::info!("Created new VM {} (Type: {}) at time {:.2}. Booting for {:.2}s.", name, vm_type.id, now, vm_type.boot_time);

        let key = self.vms.insert(VmInstance::new(name, vm_type, now, self.billing_period));
        self.order.push(key);
        self.active.push(key);
        key
    }

    /// Fallback placement once retries are exhausted: the active instance that
    /// frees up first, regardless of the sub-deadline.
    pub fn place_best_effort(&mut self, request: &PlacementRequest, now: f64) -> Option<Placement> {
        let key = self
            .active
            .iter()
            .copied()
            .map(|key| (key, self.predicted_start_time(request, key, now)))
            .reduce(|best, candidate| if candidate.1 < best.1 { candidate } else { best })
            .map(|(key, _)| key)?;

        let vm_type = self.vms[key].vm_type.clone();
        let execution_time = self.predicted_execution_time(request.mean_execution_time, &vm_type);
        let start_time = self.predicted_start_time(request, key, now);
        Some(Placement { vm: key, start_time, execution_time })
    }

    /// Commits a placement to its instance.
    ///
    /// # Returns
    /// The `(cost, energy)` charged for the task.
    pub fn assign(&mut self, task: TaskRef, placement: &Placement) -> (f64, f64) {
        self.vms[placement.vm].assign_task(task, placement.start_time, placement.execution_time)
    }

    /// Earliest completion among running tasks on active instances.
    pub fn next_completion_time(&self) -> Option<f64> {
        self.active.iter().filter_map(|key| self.vms[*key].next_completion_time()).reduce(f64::min)
    }

    /// Marks every task finished by `now` as completed on its instance.
    pub fn collect_completed(&mut self, now: f64) -> Vec<TaskRef> {
        let mut completed = Vec::new();
        for key in &self.active {
            completed.extend(self.vms[*key].collect_completed(now).into_iter().map(|running| running.task));
        }
        completed
    }

    pub fn release_vm(&mut self, key: VmKey, now: f64) {
        let Some(vm) = self.vms.get_mut(key) else {
            return;
        };
        if !vm.is_active() {
            return;
        }
        vm.release(now);
        self.active.retain(|active| *active != key);
        log::info!("Released VM {} at time {:.2}", vm.name, now);
    }

    /// Releases instances whose billing checkpoint has passed without running
    /// work; busy instances get one more billing period.
    ///
    /// # Returns
    /// The released instances.
    pub fn check_idle_vms(&mut self, now: f64) -> Vec<VmKey> {
        let mut released = Vec::new();

        for key in self.active.clone() {
            let vm = &mut self.vms[key];
            if now < vm.next_billing_check {
                continue;
            }

            if vm.has_running_tasks() {
                log::debug!("VM {} still busy at {:.2} (checkpoint {:.2}); keeping it for another billing period.", vm.name, now, vm.next_billing_check);
                vm.advance_billing_check();
            } else {
                log::info!("Releasing idle VM {} at {:.2} (billing checkpoint {:.2}).", vm.name, now, vm.next_billing_check);
                self.release_vm(key, now);
                released.push(key);
            }
        }

        released
    }

    /// Releases every remaining instance once its last task has finished.
    pub fn release_all(&mut self, now: f64) {
        for key in self.active.clone() {
            let release_time = self.vms[key].last_completion_time().map_or(now, |last| last.max(now));
            self.vms[key].collect_completed(release_time);
            self.release_vm(key, release_time);
        }
    }
}
