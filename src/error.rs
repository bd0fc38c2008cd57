//! Error types for the anti-bruteforce service.

use thiserror::Error;

/// Main error type for service operations.
///
/// The rate limiting path itself never produces one of these; they originate
/// from the list repositories, input validation, configuration and transport.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Storage failures from the list repositories
    #[error("Repository error: {0}")]
    Repository(#[from] sqlx::Error),

    /// A stored network already covers the submitted one
    #[error("IP already exists")]
    Duplicate,

    /// No stored network matches the submitted one
    #[error("IP doesn't exist")]
    NotExists,

    /// Malformed IPv4 network
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// Neither `whitelist` nor `blacklist`
    #[error("Unknown kind of list: {0}")]
    UnknownListKind(String),

    /// A bucket reset needs a login, an IP, or both
    #[error("Bucket key requires a login or an IP")]
    InvalidBucketKey,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// gRPC transport errors
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for GuardError {
    fn from(err: config::ConfigError) -> Self {
        GuardError::Config(err.to_string())
    }
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, GuardError>;
