use std::path::Path;

use crate::api::config_dto::SimulationConfigDto;
use crate::api::workflow_dto::WorkflowDto;
use crate::domain::config::SimulationConfig;
use crate::domain::scheduler::engine::SchedulingEngine;
use crate::domain::scheduler::metrics::SimulationReport;
use crate::domain::simulator::sampler::{ExecutionTimeSampler, GaussianSampler};
use crate::domain::workflow::workflow::Workflow;
use crate::error::{Error, Result};
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Reads and validates a simulation configuration file.
pub fn load_config(file_path: impl AsRef<Path>) -> Result<SimulationConfig> {
    let dto: SimulationConfigDto = parse_json_file(file_path.as_ref())?;
    let config = SimulationConfig::try_from(dto).map_err(Error::ConfigurationError)?;
    log::info!("Loaded configuration '{}' with {} VM type(s).", file_path.as_ref().display(), config.vm_types.len());
    Ok(config)
}

/// Reads a workflow file and builds its task graph.
pub fn load_workflow(file_path: impl AsRef<Path>, config: &SimulationConfig) -> Result<Workflow> {
    let dto: WorkflowDto = parse_json_file(file_path.as_ref())?;
    Workflow::from_dto(dto, config).map_err(Error::WorkflowConstructionError)
}

/// Submits every workflow to a fresh engine and runs it to completion.
pub fn run_simulation(config: SimulationConfig, workflows: Vec<Workflow>, sampler: Box<dyn ExecutionTimeSampler>) -> Result<SimulationReport> {
    let mut engine = SchedulingEngine::new(config, sampler);
    for workflow in workflows {
        engine.submit_workflow(workflow).map_err(Error::WorkflowConstructionError)?;
    }
    Ok(engine.run())
}

/// Loads a configuration and workflow files, runs the simulation and logs the summary.
///
/// `seed` overrides the seed given in the configuration file.
pub fn run_simulation_from_files<P: AsRef<Path>>(config_path: P, workflow_paths: &[P], seed: Option<u64>) -> Result<SimulationReport> {
    logger::init();
    log::info!("Logger initialized. Starting simulation setup.");

    let mut config = load_config(config_path)?;
    if seed.is_some() {
        config.seed = seed;
    }

    let workflows = workflow_paths.iter().map(|path| load_workflow(path, &config)).collect::<Result<Vec<_>>>()?;
    log::info!("Loaded {} workflow(s).", workflows.len());

    let sampler = GaussianSampler::new(config.seed);
    let report = run_simulation(config, workflows, Box::new(sampler))?;
    report.print_summary();

    Ok(report)
}
