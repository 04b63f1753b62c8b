//! Error types for the metric aggregator crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AggregatorError>;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(#[from] regex::Error),
    #[error("Invalid substring filter: {0}")]
    InvalidSubstring(String),
    #[error("Unknown aggregation function: {0}")]
    UnknownFunction(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid datapoint: {0}")]
    InvalidDatapoint(String),
    #[error("Aggregator has been shut down")]
    Stopped,
}

impl AggregatorError {
    /// Returns true for errors raised while building an aggregator.
    ///
    /// These are the only unrecoverable errors: the instance is never started.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            AggregatorError::InvalidRegex(_)
                | AggregatorError::InvalidSubstring(_)
                | AggregatorError::UnknownFunction(_)
                | AggregatorError::InvalidConfig(_)
                | AggregatorError::YamlError(_)
        )
    }
}
