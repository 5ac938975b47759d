//! Error types for zonesync
//!
//! A single error enum covers the whole reconciliation flow. The variants
//! follow the run's failure taxonomy:
//!
//! - [`Error::Input`]: malformed input file (row-level problems are collected
//!   as rejected rows instead)
//! - [`Error::ZoneViolation`]: a planned change targets a name outside the zone
//! - [`Error::Backend`], [`Error::Connect`], [`Error::Timeout`]: backend failures
//! - [`Error::Config`]: missing or invalid configuration

use thiserror::Error;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for zonesync
#[derive(Error, Debug)]
pub enum Error {
    /// Input file errors (missing header, unreadable file, no valid rows)
    #[error("Input error: {0}")]
    Input(String),

    /// A planned change targets a name outside the managed zone
    #[error("Zone violation: '{fqdn}' is not within zone '{zone}'")]
    ZoneViolation {
        /// Offending name
        fqdn: String,
        /// Configured zone
        zone: String,
    },

    /// Backend operation failed
    #[error("Backend error ({backend}): {message}")]
    Backend {
        /// Backend name
        backend: String,
        /// Error message
        message: String,
    },

    /// Backend could not be reached or authenticated against
    #[error("Connect error: {0}")]
    Connect(String),

    /// A backend call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Record already exists or changed underneath us
    #[error("Conflict: {0}")]
    Conflict(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV reader errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Coarse classification used to pick a process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad configuration or input
    Setup,
    /// Zone guard rejected the plan
    ZoneViolation,
    /// Backend unreachable or failing
    Backend,
}

impl Error {
    /// Create an input error
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Create a zone violation error
    pub fn zone_violation(fqdn: impl Into<String>, zone: impl Into<String>) -> Self {
        Self::ZoneViolation {
            fqdn: fqdn.into(),
            zone: zone.into(),
        }
    }

    /// Create a backend error
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a connect error
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Whether this error originates from talking to a backend
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::Backend { .. }
                | Self::Connect(_)
                | Self::Timeout(_)
                | Self::NotFound(_)
                | Self::Conflict(_)
        )
    }

    /// Classify the error for exit status selection
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ZoneViolation { .. } => ErrorClass::ZoneViolation,
            e if e.is_backend() => ErrorClass::Backend,
            _ => ErrorClass::Setup,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
