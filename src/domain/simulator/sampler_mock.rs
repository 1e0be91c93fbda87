use std::collections::VecDeque;

use crate::domain::simulator::sampler::ExecutionTimeSampler;

/// Deterministic sampler that always returns the requested mean.
#[derive(Debug, Clone, Default)]
pub struct MeanSampler;

impl MeanSampler {
    pub fn new() -> MeanSampler {
        MeanSampler
    }
}

impl ExecutionTimeSampler for MeanSampler {
    fn sample(&mut self, mean: f64, _std_dev: f64) -> f64 {
        mean
    }
}

/// Replays a fixed sequence of offsets (in standard deviations) around the
/// mean, then falls back to the mean once exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedSampler {
    pub offsets: VecDeque<f64>,
}

impl ScriptedSampler {
    pub fn new(offsets: impl IntoIterator<Item = f64>) -> ScriptedSampler {
        ScriptedSampler { offsets: offsets.into_iter().collect() }
    }
}

impl ExecutionTimeSampler for ScriptedSampler {
    fn sample(&mut self, mean: f64, std_dev: f64) -> f64 {
        match self.offsets.pop_front() {
            Some(offset) => mean + offset * std_dev,
            None => mean,
        }
    }
}
