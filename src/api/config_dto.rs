use serde::{Deserialize, Serialize};

/// Raw simulation configuration as found in the JSON config file.
///
/// Validation happens in `SimulationConfig::try_from`.
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfigDto {
    #[serde(rename = "maxVMs")]
    pub max_vms: usize,
    pub normalization_factor: f64,
    pub bandwidth_mbps: f64,
    pub billing_period: f64,
    pub variance_factor_alpha: f64,
    pub deadline_factor_beta: f64,
    pub estimation_factor_eta: f64,

    #[serde(default)]
    pub deadline_multiplier: Option<f64>,
    #[serde(default)]
    pub placement_retry_delta: Option<f64>,
    #[serde(default)]
    pub max_placement_retries: Option<u32>,
    #[serde(default)]
    pub min_execution_time: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,

    pub vm_types: Vec<VmTypeDto>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmTypeDto {
    pub id: String,
    pub processing_capacity: f64,
    pub cost_per_hour: f64,
    pub energy_per_second: f64,
    pub boot_time: f64,
}
