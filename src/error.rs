//! Error types for the OpenVZ configuration layer

use std::path::PathBuf;
use thiserror::Error;

/// Domain tag attached to every report sent to an [`ErrorSink`].
pub const ERROR_DOMAIN: &str = "openvz";

/// Validation failures raised while turning a domain document into a definition.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("incorrect root element: expected <domain>, found <{0}>")]
    InvalidRoot(String),

    #[error("invalid domain type attribute: {0:?}")]
    InvalidType(Option<String>),

    #[error("invalid domain name: {0}")]
    InvalidName(String),

    #[error("VPS ID {0} is reserved (must be an integer greater than {limit})", limit = crate::models::RESERVED_ID_LIMIT)]
    ReservedId(i64),

    #[error("malformed uuid element: {0}")]
    MalformedUuid(String),

    #[error("failed to generate UUID: {0}")]
    UuidGenerationFailed(#[source] std::io::Error),

    #[error("there should be exactly one filesystem tag, found {0}")]
    BadFilesystemCount(usize),

    #[error("unknown filesystem type attribute: {0:?}")]
    BadFilesystemType(Option<String>),

    #[error("interface #{index}: {reason}")]
    Interface { index: usize, reason: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("domain definition rejected: {0}")]
    Parse(#[from] ParseError),

    #[error("an active OpenVZ VM already uses name '{0}'")]
    NameInUse(String),

    #[error("VM not found: {0}")]
    InstanceNotFound(String),

    #[error("Invalid state: VM is {current}, expected {expected}")]
    InvalidState { current: String, expected: String },

    #[error("no OpenVZ configuration directory found (tried {0:?})")]
    NoConfigDir(Vec<PathBuf>),

    #[error("line in {path:?} exceeds {limit} bytes")]
    LineTooLong { path: PathBuf, limit: usize },

    #[error("UUID in config file of VPS {vpsid} malformed: {value:?}")]
    MalformedUuid { vpsid: i32, value: String },

    #[error("failed to parse vzlist output: {0:?}")]
    MalformedStatus(String),

    #[error("failed to generate UUID: {0}")]
    UuidGeneration(#[source] std::io::Error),

    #[error("vzlist failed: {0}")]
    Command(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used when reporting to an [`ErrorSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed or contradictory input; never retried.
    Validation,
    /// Config file or directory missing, unreadable or unwritable.
    Io,
    /// A name is already held by an active instance.
    IdentityConflict,
    NotFound,
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCode::Validation => write!(f, "validation"),
            ErrorCode::Io => write!(f, "io"),
            ErrorCode::IdentityConflict => write!(f, "identity-conflict"),
            ErrorCode::NotFound => write!(f, "not-found"),
            ErrorCode::Internal => write!(f, "internal"),
        }
    }
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Parse(ParseError::UuidGenerationFailed(_)) => ErrorCode::Internal,
            Error::Parse(_)
            | Error::MalformedUuid { .. }
            | Error::MalformedStatus(_)
            | Error::Config(_)
            | Error::Json(_) => ErrorCode::Validation,
            Error::NameInUse(_) => ErrorCode::IdentityConflict,
            Error::InstanceNotFound(_) => ErrorCode::NotFound,
            Error::NoConfigDir(_) | Error::LineTooLong { .. } | Error::Io(_) => ErrorCode::Io,
            Error::InvalidState { .. } | Error::UuidGeneration(_) | Error::Command(_) => {
                ErrorCode::Internal
            }
        }
    }

    /// Check if the error is an identity conflict on an active name
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::NameInUse(_))
    }
}

/// Receives a human-readable report for every failed operation.
pub trait ErrorSink: Send + Sync {
    fn report(&self, domain: &str, code: ErrorCode, message: &str);
}

/// Default sink: forwards reports to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, domain: &str, code: ErrorCode, message: &str) {
        tracing::error!(domain, code = %code, "{}", message);
    }
}
