//! Error types for load scenarios.

use thiserror::Error;

/// The achieved request rate fell below the rate a scenario must sustain.
///
/// This is the only way a [`Maintained`](crate::scenario::Maintained) signal fails. It carries
/// both the configured target and the rate observed by the monitor for diagnostics.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("request rate too low: expected {target} requests/s, measured {actual} requests/s")]
pub struct RequestRateTooLow {
    /// The requests per second the scenario was configured to sustain.
    pub target: f64,
    /// The requests per second measured over the most recent window.
    pub actual: f64,
}

/// Errors returned synchronously by scenario operations.
///
/// These are usage errors: they indicate the caller drove the scenario lifecycle incorrectly
/// and are never produced by the load itself.
#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    /// `start` was called on a scenario that has already been started.
    #[error("scenario has already been started")]
    AlreadyStarted,

    /// `stop` was called on a scenario that is not running.
    #[error("scenario is not running")]
    NotRunning,

    /// The scenario was constructed with parameters it cannot run with.
    #[error("invalid scenario configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for scenario operations.
pub type Result<T, E = ScenarioError> = std::result::Result<T, E>;
