pub mod config;
pub mod scheduler;
pub mod simulator;
pub mod utils;
pub mod vm;
pub mod workflow;
