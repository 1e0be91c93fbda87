use std::collections::HashSet;

use crate::api::config_dto::SimulationConfigDto;
use crate::domain::vm::vm_type::VmType;
use crate::error::ConversionError;

pub const DEFAULT_DEADLINE_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_PLACEMENT_RETRY_DELTA: f64 = 1.0;
pub const DEFAULT_MAX_PLACEMENT_RETRIES: u32 = 1000;
pub const DEFAULT_MIN_EXECUTION_TIME: f64 = 0.1;

/// Validated simulation settings, owned by the engine and passed down explicitly.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub max_vms: usize,
    /// Workload-to-seconds scaling applied after dividing by VM capacity.
    pub normalization_factor: f64,
    pub bandwidth_mbps: f64,
    /// Seconds per billable unit.
    pub billing_period: f64,
    /// Jitter ratio: standard deviation of a sampled runtime relative to its mean.
    pub variance_factor_alpha: f64,
    /// Reserved slack-distribution knob, carried but not used by the heuristic.
    pub deadline_factor_beta: f64,
    /// Reserved safety-margin multiplier, carried but not used by the heuristic.
    pub estimation_factor_eta: f64,
    pub deadline_multiplier: f64,
    pub placement_retry_delta: f64,
    pub max_placement_retries: u32,
    pub min_execution_time: f64,
    pub seed: Option<u64>,
    pub vm_types: Vec<VmType>,
}

impl SimulationConfig {
    /// Time needed to move `bytes` over the configured link.
    pub fn transfer_time_for_bytes(&self, bytes: f64) -> f64 {
        (bytes * 8.0) / (self.bandwidth_mbps * 1_000_000.0)
    }
}

fn require_positive(name: &str, value: f64) -> Result<f64, ConversionError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConversionError::InvalidConfiguration(format!("{} must be a positive number, got {}", name, value)))
    }
}

fn require_non_negative(name: &str, value: f64) -> Result<f64, ConversionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConversionError::InvalidConfiguration(format!("{} must be a non-negative number, got {}", name, value)))
    }
}

impl TryFrom<SimulationConfigDto> for SimulationConfig {
    type Error = ConversionError;

    fn try_from(dto: SimulationConfigDto) -> Result<Self, Self::Error> {
        if dto.max_vms == 0 {
            return Err(ConversionError::InvalidConfiguration("maxVMs must be at least 1".to_string()));
        }
        if dto.vm_types.is_empty() {
            return Err(ConversionError::EmptyVmCatalog);
        }

        let mut seen = HashSet::new();
        let mut vm_types = Vec::with_capacity(dto.vm_types.len());
        for vm_type_dto in dto.vm_types {
            if !seen.insert(vm_type_dto.id.clone()) {
                return Err(ConversionError::DuplicateVmType(vm_type_dto.id));
            }
            vm_types.push(VmType::try_from(vm_type_dto)?);
        }

        let max_placement_retries = dto.max_placement_retries.unwrap_or(DEFAULT_MAX_PLACEMENT_RETRIES);

        Ok(SimulationConfig {
            max_vms: dto.max_vms,
            normalization_factor: require_positive("normalizationFactor", dto.normalization_factor)?,
            bandwidth_mbps: require_positive("bandwidthMbps", dto.bandwidth_mbps)?,
            billing_period: require_positive("billingPeriod", dto.billing_period)?,
            variance_factor_alpha: require_non_negative("varianceFactorAlpha", dto.variance_factor_alpha)?,
            deadline_factor_beta: require_non_negative("deadlineFactorBeta", dto.deadline_factor_beta)?,
            estimation_factor_eta: require_non_negative("estimationFactorEta", dto.estimation_factor_eta)?,
            deadline_multiplier: require_positive("deadlineMultiplier", dto.deadline_multiplier.unwrap_or(DEFAULT_DEADLINE_MULTIPLIER))?,
            placement_retry_delta: require_positive("placementRetryDelta", dto.placement_retry_delta.unwrap_or(DEFAULT_PLACEMENT_RETRY_DELTA))?,
            max_placement_retries,
            min_execution_time: require_positive("minExecutionTime", dto.min_execution_time.unwrap_or(DEFAULT_MIN_EXECUTION_TIME))?,
            seed: dto.seed,
            vm_types,
        })
    }
}
