// Error types for the privileged route service and its client

use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Per-request failures. The `Display` text is exactly what goes on the wire.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    #[error("Format error")]
    Format,

    #[error("No routes for that DN")]
    NoRoutes,

    #[error("No such user known")]
    UnknownUser,

    #[error("An error occured while trying to add the routes.")]
    Process,
}

/// Why an inbound message was rejected. Logged, never sent to the caller.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("key {0:?} contains non-alphanumeric characters")]
    InvalidKey(String),

    #[error("unrecognized key {0:?}")]
    UnknownKey(String),

    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("message exceeds {0} bytes")]
    TooLong(usize),
}

impl From<DecodeError> for RouteError {
    fn from(_: DecodeError) -> Self {
        RouteError::Format
    }
}

/// Failure of a single `ip route replace` invocation.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    ExitStatus {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{command} did not finish within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

impl From<InstallError> for RouteError {
    fn from(_: InstallError) -> Self {
        RouteError::Process
    }
}

/// Startup and client-side errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid network {network:?}: {reason}")]
    InvalidNetwork { network: String, reason: String },

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
