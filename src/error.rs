use std::{error, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::Issue;

/// The fixed error taxonomy that crosses the transport boundary.
///
/// Serialized as the wire strings `UNAUTHORIZED`, `FORBIDDEN`, `INVALID_INPUT`
/// and `INTERNAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    InvalidInput,
    Internal,
}

/// The structured error the client observes.
///
/// Errors of this type pass to the client verbatim. Anything else that fails
/// inside the request lifecycle is logged host-side and masked to
/// `INTERNAL` before serialization (see [`ExecError`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Value>,
}

impl Error {
    pub const fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
            issues: None,
        }
    }

    pub const fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized)
    }

    pub const fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: Some(message.into()),
            issues: None,
        }
    }

    /// An `INVALID_INPUT` error carrying the validator's issue list. Unlike
    /// every other failure these are intentionally detailed so the caller can
    /// fix its request.
    pub fn invalid_input(issues: Vec<Issue>) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: None,
            issues: Some(serde_json::to_value(issues).unwrap_or_default()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ripc::Error {{ code: {:?}, message: {:?} }}",
            self.code, self.message
        )
    }
}

impl error::Error for Error {}

/// Everything that can go wrong while executing one request.
///
/// This type never crosses the wire. The [`From<ExecError>`] conversion into
/// [`Error`] is the masking boundary: structured resolver errors pass through
/// verbatim, input validation surfaces its issues, and the rest collapses to
/// a generic `INTERNAL`.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExecError {
    #[error("no procedure found at path '{0}'")]
    ProcedureNotFound(String),
    #[error("input validation failed with {} issue(s)", .0.len())]
    InputValidation(Vec<Issue>),
    #[error("output validation failed with {} issue(s)", .0.len())]
    OutputValidation(Vec<Issue>),
    #[error("next() called multiple times")]
    NextCalledMultipleTimes,
    #[error("error creating request context: {0}")]
    ContextFactory(Error),
    #[error("resolver error: {0}")]
    Resolver(#[from] Error),
    #[error("unexpected error: {0}")]
    Unexpected(#[source] Box<dyn error::Error + Send + Sync>),
}

impl ExecError {
    /// Wrap an arbitrary error that is not part of the wire taxonomy. It will
    /// be masked to `INTERNAL` at the transport boundary.
    pub fn unexpected(err: impl error::Error + Send + Sync + 'static) -> Self {
        Self::Unexpected(Box::new(err))
    }
}

impl From<Box<dyn error::Error + Send + Sync>> for ExecError {
    fn from(err: Box<dyn error::Error + Send + Sync>) -> Self {
        Self::Unexpected(err)
    }
}

impl From<ExecError> for Error {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Resolver(err) | ExecError::ContextFactory(err) => err,
            ExecError::InputValidation(issues) => Error::invalid_input(issues),
            ExecError::ProcedureNotFound(_)
            | ExecError::OutputValidation(_)
            | ExecError::NextCalledMultipleTimes
            | ExecError::Unexpected(_) => Error::internal("Internal server error"),
        }
    }
}
