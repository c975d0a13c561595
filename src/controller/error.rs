//! Error types for the fleet and binding controllers

use std::time::Duration;

use thiserror::Error;

use crate::release::ReleaseError;
use crate::remote::RemoteError;

/// Error variants are named with the `Error` suffix where they wrap a plain message.
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Transient error (will retry): {0}")]
    TransientError(String),

    #[error("Release error: {0}")]
    Release(ReleaseError),

    #[error("Workload cluster error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Invalid version: {0}")]
    Version(String),

    #[error("found {count} bindings for fleet {fleet} and cluster {cluster}, expected at most one")]
    MultipleBindings {
        fleet: String,
        cluster: String,
        count: usize,
    },
}

impl From<ReleaseError> for Error {
    fn from(error: ReleaseError) -> Self {
        match error {
            ReleaseError::Version { .. } => Error::Version(error.to_string()),
            other => Error::Release(other),
        }
    }
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(e) => kube_error_retryable(e),
            Error::Remote(RemoteError::Kube(e)) => kube_error_retryable(e),
            Error::Remote(RemoteError::Kubeconfig(_)) => false,
            // Cluster API writes the secret shortly after the cluster appears
            Error::Remote(_) => true,
            Error::Release(ReleaseError::Values(_)) => false,
            Error::Release(_) => true,
            Error::TransientError(_) => true,
            Error::NotFound(_) => true,
            Error::InvalidConfig(_) => false,
            Error::SerializationError(_) => false,
            Error::MissingObjectKey(_) => false,
            Error::Version(_) => false,
            Error::MultipleBindings { .. } => false,
        }
    }

    /// True for a Kubernetes 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KubeError(kube::Error::Api(e)) if e.code == 404)
    }

    /// True when a create hit an existing object
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Error::KubeError(kube::Error::Api(e)) if e.code == 409 && e.reason == "AlreadyExists"
        )
    }
}

/// 4xx errors other than 409 Conflict and 429 TooManyRequests are not retried
fn kube_error_retryable(error: &kube::Error) -> bool {
    match error {
        kube::Error::Api(api_err) => {
            let code = api_err.code;
            if (400..500).contains(&code) {
                return code == 409 || code == 429;
            }
            true
        }
        _ => true,
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Exponential backoff configuration
#[derive(Clone, Debug)]
pub struct BackoffConfig {
    /// Initial delay for first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for each subsequent retry
    pub multiplier: f64,
    /// Random jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Calculate the backoff delay for a given retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_delay_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        let jitter_range = base_delay_secs * self.jitter;
        let jitter = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
        let delay_with_jitter = (base_delay_secs + jitter).max(0.0);

        let capped_delay = delay_with_jitter.min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(capped_delay)
    }

    /// Get the delay for an error; non-retryable errors wait the maximum delay
    pub fn delay_for_error(&self, error: &Error, attempt: u32) -> Duration {
        if error.is_retryable() {
            self.delay_for_attempt(attempt)
        } else {
            self.max_delay
        }
    }
}

/// Consecutive error tracking for one object
#[derive(Clone, Debug, Default)]
pub struct ErrorContext {
    /// Number of consecutive errors
    pub consecutive_errors: u32,
    /// Last error message
    pub last_error: Option<String>,
}

impl ErrorContext {
    /// Record an error
    pub fn record_error(&mut self, error: &Error) {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.last_error = Some(error.to_string());
    }

    /// Reset error tracking (called on successful reconciliation)
    pub fn reset(&mut self) {
        self.consecutive_errors = 0;
        self.last_error = None;
    }
}
