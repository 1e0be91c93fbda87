use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON input: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Failed to write CSV report: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid simulation configuration: {0}")]
    ConfigurationError(ConversionError),

    #[error("Failed to build workflow: {0}")]
    WorkflowConstructionError(ConversionError),
}

/// Errors raised while turning DTOs into validated domain objects.
#[derive(Debug, Error, PartialEq)]
pub enum ConversionError {
    #[error("invalid configuration value: {0}")]
    InvalidConfiguration(String),

    #[error("the VM type catalog is empty")]
    EmptyVmCatalog,

    #[error("duplicate VM type '{0}'")]
    DuplicateVmType(String),

    #[error("workflow '{0}' contains no tasks")]
    EmptyWorkflow(String),

    #[error("workflow '{workflow}' defines task '{task}' more than once")]
    DuplicateTask { workflow: String, task: String },

    #[error("workflow '{workflow}' references unknown task '{task}'")]
    UnknownTask { workflow: String, task: String },

    #[error("task '{task}' has an invalid attribute: {reason}")]
    InvalidTaskAttribute { task: String, reason: String },

    #[error("workflow '{0}' contains a dependency cycle")]
    CyclicWorkflow(String),
}

pub type Result<T> = std::result::Result<T, Error>;
