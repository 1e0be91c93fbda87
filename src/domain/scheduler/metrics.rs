use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::domain::vm::vm_pool::VmPool;
use crate::domain::workflow::workflow::Workflow;
use crate::error::Result;

/// Final state of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub workflow: String,
    pub task: String,
    pub earliest_start_time: f64,
    pub latest_completion_time: f64,
    pub sub_deadline: f64,
    pub start_time: f64,
    pub execution_time: f64,
    pub completion_time: f64,
    pub vm: Option<String>,
    pub cost: f64,
    pub energy: f64,
    pub delay: f64,
    pub deadline_violated: bool,
}

/// Final state of one leased instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmReport {
    pub vm: String,
    pub vm_type: String,
    pub processing_capacity: f64,
    pub lease_start_time: f64,
    pub lease_end_time: Option<f64>,
    pub lease_duration: f64,
    pub active_time: f64,
    pub idle_time: f64,
    pub cost: f64,
    pub energy: f64,
    pub tasks_executed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    pub workflow: String,
    pub arrival_time: f64,
    pub deadline: f64,
    pub critical_path_length: f64,
    pub finish_time: f64,
    pub makespan: f64,
    pub deadline_met: bool,
    pub cost: f64,
    pub energy: f64,
    pub tasks: Vec<TaskReport>,
}

/// Outcome of a simulation run, handed to the reporting layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub workflows: Vec<WorkflowReport>,
    pub vms: Vec<VmReport>,

    /// Latest task completion over all workflows.
    pub simulation_duration: f64,
    /// Largest workflow makespan.
    pub makespan: f64,
    pub total_cost: f64,
    pub total_energy: f64,
    /// Total task execution time over total lease time.
    pub resource_utilization: f64,
    pub average_task_delay: f64,
    pub deadline_violation_probability: f64,
    pub average_vm_idle_time: f64,
    pub total_data_transfer_time: f64,
    pub vms_used: usize,
    /// The loop stopped with work left and nothing ready or running.
    pub deadlocked: bool,
}

impl SimulationReport {
    pub fn build<'a>(workflows: impl IntoIterator<Item = &'a Workflow>, vm_pool: &VmPool, deadlocked: bool) -> Self {
        let workflows: Vec<&Workflow> = workflows.into_iter().collect();
        let workflow_reports: Vec<WorkflowReport> = workflows.iter().map(|workflow| Self::workflow_report(workflow, vm_pool)).collect();

        let vms: Vec<VmReport> = vm_pool
            .all_vms()
            .map(|(_, vm)| VmReport {
                vm: vm.name.to_string(),
                vm_type: vm.vm_type.id.to_string(),
                processing_capacity: vm.vm_type.processing_capacity,
                lease_start_time: vm.lease_start_time,
                lease_end_time: vm.lease_end_time,
                lease_duration: vm.lease_duration(),
                active_time: vm.total_active_time,
                idle_time: vm.total_idle_time,
                cost: vm.cost,
                energy: vm.energy,
                tasks_executed: vm.completed_tasks.len() + vm.running_tasks.len(),
            })
            .collect();

        let tasks = || workflow_reports.iter().flat_map(|workflow| workflow.tasks.iter());
        let dispatched = || tasks().filter(|task| task.vm.is_some());

        let dispatched_count = dispatched().count();
        let total_execution_time: f64 = dispatched().map(|task| task.execution_time).sum();
        let total_lease_time: f64 = vms.iter().map(|vm| vm.lease_duration).sum();
        let violated_workflows = workflow_reports.iter().filter(|workflow| !workflow.deadline_met).count();

        SimulationReport {
            simulation_duration: dispatched().map(|task| task.completion_time).fold(0.0, f64::max),
            makespan: workflow_reports.iter().map(|workflow| workflow.makespan).fold(0.0, f64::max),
            total_cost: workflow_reports.iter().map(|workflow| workflow.cost).sum(),
            total_energy: workflow_reports.iter().map(|workflow| workflow.energy).sum(),
            resource_utilization: ratio(total_execution_time, total_lease_time),
            average_task_delay: ratio(dispatched().map(|task| task.delay).sum(), dispatched_count as f64),
            deadline_violation_probability: ratio(violated_workflows as f64, workflow_reports.len() as f64),
            average_vm_idle_time: ratio(vms.iter().map(|vm| vm.idle_time).sum(), vms.len() as f64),
            total_data_transfer_time: workflows.iter().map(|workflow| workflow.total_data_transfer_time()).sum(),
            vms_used: vm_pool.vms_used(),
            deadlocked,
            workflows: workflow_reports,
            vms,
        }
    }

    fn workflow_report(workflow: &Workflow, vm_pool: &VmPool) -> WorkflowReport {
        let tasks: Vec<TaskReport> = workflow
            .tasks
            .iter()
            .map(|(_, task)| TaskReport {
                workflow: workflow.name.to_string(),
                task: task.name.to_string(),
                earliest_start_time: task.earliest_start_time,
                latest_completion_time: task.latest_completion_time,
                sub_deadline: task.sub_deadline,
                start_time: task.start_time,
                execution_time: task.execution_time,
                completion_time: task.completion_time.unwrap_or(0.0),
                vm: task.assigned_vm.and_then(|key| vm_pool.get(key)).map(|vm| vm.name.to_string()),
                cost: task.cost,
                energy: task.energy,
                delay: task.delay(),
                deadline_violated: task.violates_sub_deadline(),
            })
            .collect();

        WorkflowReport {
            workflow: workflow.name.to_string(),
            arrival_time: workflow.arrival_time,
            deadline: workflow.deadline,
            critical_path_length: workflow.critical_path_length(),
            finish_time: workflow.finish_time().unwrap_or(workflow.arrival_time),
            makespan: workflow.makespan(),
            deadline_met: workflow.is_completed() && !workflow.has_deadline_violation(),
            cost: tasks.iter().map(|task| task.cost).sum(),
            energy: tasks.iter().map(|task| task.energy).sum(),
            tasks,
        }
    }

    /// All task rows, workflow by workflow.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskReport> {
        self.workflows.iter().flat_map(|workflow| workflow.tasks.iter())
    }

    pub fn task(&self, workflow: &str, task: &str) -> Option<&TaskReport> {
        self.tasks().find(|row| row.workflow == workflow && row.task == task)
    }

    pub fn workflow(&self, workflow: &str) -> Option<&WorkflowReport> {
        self.workflows.iter().find(|row| row.workflow == workflow)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Logs the per-workflow, per-task, per-VM and aggregate sections.
    pub fn print_summary(&self) {
        log::info!("=== Comprehensive Simulation Summary ===");
        log::info!("Simulation Duration: {:.2} sec", self.simulation_duration);
        log::info!("Total VM Rental Cost: ${:.4}", self.total_cost);
        log::info!("Total Energy Consumption: {:.2} Ws", self.total_energy);
        log::info!("Resource Utilization Efficiency: {:.2}%", self.resource_utilization * 100.0);
        log::info!("Deadline Violation Probability: {:.2}%", self.deadline_violation_probability * 100.0);
        if self.deadlocked {
            log::error!("Simulation halted on a deadlock; the figures cover dispatched tasks only.");
        }

        log::info!("Workflow Details:");
        for workflow in &self.workflows {
            log::info!("  Workflow: {}", workflow.workflow);
            log::info!("    Arrival Time: {:.2} sec", workflow.arrival_time);
            log::info!("    Deadline: {:.2} sec", workflow.deadline);
            log::info!("    Makespan: {:.2} sec", workflow.makespan);
            log::info!("    Status: {}", if workflow.deadline_met { "Met" } else { "Violated" });
            log::info!("    Tasks:");
            for task in &workflow.tasks {
                log::info!(
                    "      Task {}: Sub-Deadline={:.2} sec, Start={:.2} sec, End={:.2} sec, Execution={:.2} sec, VM={}, Cost=${:.4}, Energy={:.2} Ws",
                    task.task,
                    task.sub_deadline,
                    task.start_time,
                    task.completion_time,
                    task.execution_time,
                    task.vm.as_deref().unwrap_or("None"),
                    task.cost,
                    task.energy
                );
            }
        }

        log::info!("VM Usage Details:");
        for vm in &self.vms {
            log::info!(
                "  VM {} ({}): Capacity={:.2}, Lease={:.2} sec, Active Time={:.2} sec, Idle Time={:.2} sec, Energy={:.2} Ws, Cost=${:.4}",
                vm.vm,
                vm.vm_type,
                vm.processing_capacity,
                vm.lease_duration,
                vm.active_time,
                vm.idle_time,
                vm.energy,
                vm.cost
            );
        }

        log::info!("Advanced Performance Metrics:");
        log::info!("  Average Task Execution Delay: {:.2} sec", self.average_task_delay);
        log::info!("  Average VM Idle Time: {:.2} sec", self.average_vm_idle_time);
        log::info!("  Total Data Transfer Time: {:.2} sec", self.total_data_transfer_time);
        log::info!("  Number of VMs Used: {}", self.vms_used);
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 { numerator / denominator } else { 0.0 }
}
