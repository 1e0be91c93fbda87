pub mod deadline_partitioner;
pub mod engine;
pub mod metrics;
pub mod ready_queue;
