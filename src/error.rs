use thiserror::Error;

/// Per-activity failures. These are recorded inline in the batch report and
/// never abort the batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    #[error("Activity type or ID required")]
    MissingIdentifier,
    #[error("Parameters required")]
    MissingParameters,
    #[error("Invalid activity: {0}")]
    MalformedActivity(String),
    #[error("could not convert parameter '{key}' to a number: {value}")]
    NotNumeric { key: String, value: String },
    #[error("parameter '{key}' must be a unit string")]
    InvalidUnit { key: String },
    #[error("parameter '{key}' must be non-negative, got {value}")]
    NegativeQuantity { key: String, value: f64 },
    #[error("parameter '{key}' must be a finite number")]
    NonFiniteQuantity { key: String },
    #[error("emission estimate is not a finite number")]
    NonFiniteEstimate,
}

impl EstimateError {
    /// Validation errors are rejected before any computation runs.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EstimateError::MissingIdentifier
                | EstimateError::MissingParameters
                | EstimateError::MalformedActivity(_)
        )
    }
}

/// Whole-call failures at the invocation boundary. No report is produced.
#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("API key required")]
    MissingCredential,
    #[error("No activities provided")]
    NoActivities,
    #[error("Error processing input: {0}")]
    MalformedInput(#[from] serde_json::Error),
    #[error("failed to encode report: {0}")]
    Encode(serde_json::Error),
}

/// Failure reported by an emission-factor data source. Always recoverable:
/// the static tables take over.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("data source returned an invalid factor for {activity_id}: {factor}")]
    InvalidFactor { activity_id: String, factor: f64 },
    #[error("data source quoted {activity_id} per unknown unit '{unit}'")]
    UnknownUnit { activity_id: String, unit: String },
}

/// Invalid engine configuration read from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a month number 1-12, got '{value}'")]
    InvalidMonth { var: &'static str, value: String },
    #[error("{var} must be a boolean flag, got '{value}'")]
    InvalidFlag { var: &'static str, value: String },
    #[error("failed to read factor table {path}: {source}")]
    FactorFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse factor table {path}: {source}")]
    FactorParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
