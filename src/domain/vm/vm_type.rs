use serde::Serialize;

use crate::api::config_dto::VmTypeDto;
use crate::domain::utils::id::VmTypeId;
use crate::error::ConversionError;

/// Catalog entry describing a leasable machine flavour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VmType {
    pub id: VmTypeId,
    /// Throughput units; task runtimes are divided by this value.
    pub processing_capacity: f64,
    pub cost_per_hour: f64,
    pub energy_per_second: f64,
    pub boot_time: f64,
}

impl VmType {
    pub fn new(id: impl Into<String>, processing_capacity: f64, cost_per_hour: f64, energy_per_second: f64, boot_time: f64) -> Self {
        VmType { id: VmTypeId::new(id), processing_capacity, cost_per_hour, energy_per_second, boot_time }
    }

    pub fn cost_for_duration(&self, duration: f64) -> f64 {
        (duration / 3600.0) * self.cost_per_hour
    }

    pub fn energy_for_duration(&self, duration: f64) -> f64 {
        duration * self.energy_per_second
    }
}

impl TryFrom<VmTypeDto> for VmType {
    type Error = ConversionError;

    fn try_from(dto: VmTypeDto) -> Result<Self, Self::Error> {
        if !(dto.processing_capacity > 0.0) {
            return Err(ConversionError::InvalidConfiguration(format!(
                "VM type '{}' needs a positive processingCapacity, got {}",
                dto.id, dto.processing_capacity
            )));
        }

        for (name, value) in [("costPerHour", dto.cost_per_hour), ("energyPerSecond", dto.energy_per_second), ("bootTime", dto.boot_time)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConversionError::InvalidConfiguration(format!("VM type '{}' has invalid {}: {}", dto.id, name, value)));
            }
        }

        Ok(VmType::new(dto.id, dto.processing_capacity, dto.cost_per_hour, dto.energy_per_second, dto.boot_time))
    }
}
