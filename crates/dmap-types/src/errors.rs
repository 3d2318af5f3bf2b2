use thiserror::Error;

use crate::variable::VariableId;

/// Main error type for the dmap system
#[derive(Error, Debug)]
pub enum DmapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Partition {partition} failed: {source} ({cancelled} sibling partitions cancelled)")]
    PartitionExecution {
        partition: usize,
        #[source]
        source: PartitionError,
        cancelled: usize,
    },

    #[error("No feasible assignment found in any of {partitions} partitions")]
    NoFeasibleResult { partitions: usize },

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DmapError {
    /// `true` for errors detected before any partition was dispatched.
    pub fn is_config(&self) -> bool {
        matches!(self, DmapError::Config(_))
    }
}

/// Invalid run configuration. Always detected before dispatch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    #[error("{name} must be at least 1, got {value}")]
    InvalidBudget { name: &'static str, value: usize },

    #[error("Unknown variable: {name}")]
    UnknownVariable { name: String },

    #[error("Variable {variable} is both a MAP target and part of the evidence")]
    EvidenceOverlap { variable: String },

    #[error("MAP target {variable} does not have a finite domain")]
    ContinuousTarget { variable: String },

    #[error("MAP target {variable} listed more than once")]
    DuplicateTarget { variable: String },

    #[error("No MAP target variables given")]
    NoTargets,

    #[error("Evidence value {value} is outside the domain of {variable}")]
    EvidenceOutOfDomain { variable: String, value: f64 },

    #[error("{0}")]
    Invalid(String),
}

/// Errors raised while building or querying a Bayesian network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Variable not found in model: {0}")]
    UnknownVariable(String),

    #[error("Variable id {0} not found in model")]
    UnknownVariableId(VariableId),

    #[error("Parent {parent} of {variable} has not been added to the model")]
    MissingParent { variable: String, parent: String },

    #[error("Variable {0} added twice")]
    DuplicateVariable(String),

    #[error("Invalid CPD for {variable}: {message}")]
    InvalidCpd { variable: String, message: String },

    #[error("CPD row for {variable} sums to {sum}, expected 1")]
    NotNormalized { variable: String, sum: f64 },

    #[error("Negative probability in CPD for {0}")]
    NegativeProbability(String),

    #[error("Standard deviation must be positive for {variable}, got {std_dev}")]
    InvalidStdDev { variable: String, std_dev: f64 },

    #[error("{variable} cannot have {parent} as a parent: only discrete parents are supported")]
    UnsupportedParent { variable: String, parent: String },

    #[error("Initialization does not fit {variable}: {message}")]
    InvalidInitialization { variable: String, message: String },

    #[error("Assignment is missing a value for {0}")]
    IncompleteAssignment(VariableId),

    #[error("Value {value} is outside the domain of variable {variable}")]
    ValueOutOfDomain { variable: VariableId, value: f64 },

    #[error("Sampling failed for {variable}: {message}")]
    Sampling { variable: VariableId, message: String },
}

/// Failure of a single partition's local optimizer run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartitionError {
    #[error("cancelled")]
    Cancelled,

    #[error("timed out after {elapsed_ms} ms (limit {limit_ms} ms)")]
    TimedOut { elapsed_ms: u64, limit_ms: u64 },

    #[error("local optimizer failed: {0}")]
    Failed(String),

    #[error("local optimizer panicked: {0}")]
    Panicked(String),

    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

impl PartitionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PartitionError::Cancelled)
    }
}

/// Result type alias for dmap operations
pub type DmapResult<T> = Result<T, DmapError>;

/// Macro for creating runtime errors
#[macro_export]
macro_rules! runtime_error {
    ($($arg:tt)*) => {
        $crate::DmapError::Runtime(format!($($arg)*))
    };
}
