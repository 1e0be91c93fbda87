use log::Level;
use logtest::Logger;

use nosf_workflow_sim::{
    api::config_dto::{SimulationConfigDto, VmTypeDto},
    domain::{
        config::SimulationConfig,
        scheduler::engine::SchedulingEngine,
        simulator::sampler_mock::MeanSampler,
        workflow::{task::Task, workflow::Workflow},
    },
};

fn config() -> SimulationConfig {
    SimulationConfig::try_from(SimulationConfigDto {
        max_vms: 1,
        normalization_factor: 1.0,
        bandwidth_mbps: 100.0,
        billing_period: 3600.0,
        variance_factor_alpha: 0.0,
        deadline_factor_beta: 1.0,
        estimation_factor_eta: 1.0,
        deadline_multiplier: None,
        placement_retry_delta: Some(2.0),
        max_placement_retries: None,
        min_execution_time: None,
        seed: None,
        vm_types: vec![VmTypeDto { id: "std".to_string(), processing_capacity: 1.0, cost_per_hour: 1.0, energy_per_second: 1.0, boot_time: 0.0 }],
    })
    .unwrap()
}

// Single test per binary: the captured logger is process-wide.
#[test]
fn test_deferrals_and_best_effort_placement_are_logged() {
    let mut logger = Logger::start();

    let mut workflow = Workflow::new("Pair", 0.0, 10.0);
    workflow.add_task(Task::new("first", 10.0, 0.0, 0.0)).unwrap();
    workflow.add_task(Task::new("second", 10.0, 0.0, 0.0)).unwrap();

    let mut engine = SchedulingEngine::new(config(), Box::new(MeanSampler::new()));
    engine.submit_workflow(workflow).unwrap();
    let report = engine.run();
    assert!(!report.deadlocked);

    let mut messages: Vec<(Level, String)> = Vec::new();
    while let Some(record) = logger.pop() {
        messages.push((record.level(), record.args().to_string()));
    }

    let deferrals: Vec<&String> = messages.iter().filter(|(_, text)| text.starts_with("No VM available for task second")).map(|(_, text)| text).collect();
    assert_eq!(deferrals.len(), 5);
    assert!(deferrals[0].ends_with("deferring to 2.00"));

    assert!(messages.iter().any(|(level, text)| *level == Level::Warn && text.contains("placing it best-effort on vm-1 after 5 deferral(s)")));
    assert!(messages.iter().any(|(level, text)| *level == Level::Info && text.starts_with("Created new VM vm-1")));
    assert!(messages.iter().any(|(_, text)| text.starts_with("Scheduled Task second on VM vm-1: Start=10.00, End=20.00")));
}
