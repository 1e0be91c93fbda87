pub mod clock;
pub mod sampler;
pub mod sampler_mock;
