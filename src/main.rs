use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use nosf_workflow_sim::domain::utils::statistics;
use nosf_workflow_sim::run_simulation_from_files;

#[derive(Parser, Debug)]
#[command(name = "nosf-sim")]
#[command(about = "Simulate deadline-constrained workflow scheduling on leased VMs", long_about = None)]
struct Args {
    /// Simulation configuration (JSON)
    #[arg(short, long, default_value = "data/simulation_config.json")]
    config: PathBuf,

    /// Workflow description (JSON); repeat for several workflows
    #[arg(short, long = "workflow", required = true, num_args = 1..)]
    workflows: Vec<PathBuf>,

    /// Seed for the execution-time sampler, overrides the configuration
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write the full report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write one CSV row per task
    #[arg(long)]
    task_csv: Option<PathBuf>,

    /// Write one CSV row per leased VM
    #[arg(long)]
    vm_csv: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let report = run_simulation_from_files(&args.config, &args.workflows.iter().collect::<Vec<&PathBuf>>(), args.seed)
        .with_context(|| format!("simulation with config '{}' failed", args.config.display()))?;

    if let Some(path) = &args.report {
        report.write_json(path).with_context(|| format!("cannot write report to '{}'", path.display()))?;
        log::info!("Report written to '{}'.", path.display());
    }
    if let Some(path) = &args.task_csv {
        statistics::write_task_csv(&report, path).with_context(|| format!("cannot write task rows to '{}'", path.display()))?;
        log::info!("Task statistics written to '{}'.", path.display());
    }
    if let Some(path) = &args.vm_csv {
        statistics::write_vm_csv(&report, path).with_context(|| format!("cannot write VM rows to '{}'", path.display()))?;
        log::info!("VM statistics written to '{}'.", path.display());
    }

    if report.deadlocked {
        anyhow::bail!("simulation stopped on a deadlock");
    }
    Ok(())
}
