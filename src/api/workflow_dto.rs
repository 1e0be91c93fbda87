use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDto {
    pub id: String,

    #[serde(default)]
    pub arrival_time: f64,

    /// Absolute deadline. Derived from the critical path when absent.
    #[serde(default)]
    pub deadline: Option<f64>,

    pub tasks: Vec<TaskDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    pub id: String,

    /// Mean execution time in seconds on a reference machine.
    pub runtime: f64,

    #[serde(default)]
    pub variance: f64,

    /// Explicit transfer time to every successor, wins over `output_size`.
    #[serde(default)]
    pub data_transfer_time: Option<f64>,

    /// Output size in bytes, converted with the configured bandwidth.
    #[serde(default)]
    pub output_size: Option<f64>,

    /// Ids of the tasks this task depends on.
    #[serde(default)]
    pub parents: Vec<String>,

    /// Per-successor transfer times keyed by child id.
    #[serde(default)]
    pub transfer_times: HashMap<String, f64>,
}
