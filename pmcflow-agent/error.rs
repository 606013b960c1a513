use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PmcError {
    #[error("Register access failed on thread {thread} at 0x{address:X}: {reason}")]
    RegisterAccess {
        thread: usize,
        address: u64,
        reason: String,
    },

    #[error("MSR operation failed: {0}")]
    MsrError(#[from] pmcflow_raw::MsrError),

    #[error("Affinity operation failed: {0}")]
    AffinityError(String),

    #[error("Configuration '{config}' is not supported: {reason}")]
    UnsupportedConfiguration { config: String, reason: String },

    #[error("Unknown configuration '{config}' for domain {domain}")]
    UnknownConfiguration { domain: String, config: String },

    #[error("Metric '{0}' divides by zero")]
    DivideByZeroMetric(String),

    #[error("Configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Prometheus error: {0}")]
    PrometheusError(#[from] prometheus::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),
}

impl PmcError {
    /// True for failures that only invalidate the current tick
    pub fn is_transient(&self) -> bool {
        matches!(self, PmcError::RegisterAccess { .. } | PmcError::MsrError(_))
    }
}

pub type Result<T> = std::result::Result<T, PmcError>;
