//! Shared error type across faultprobe crates.

use thiserror::Error;

/// Stable error codes surfaced by the configuration surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed configuration input.
    Parse,
    /// Well-formed value outside the allowed range.
    OutOfRange,
    /// Attribute name not known to the attribute tree.
    UnknownAttribute,
    /// No probe point registered under that name.
    UnknownProbe,
    /// Configuration surface could not be created.
    Unavailable,
    /// Internal failure (I/O while loading configuration).
    Internal,
}

impl ErrorCode {
    /// String representation used in responses and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Parse => "PARSE",
            ErrorCode::OutOfRange => "OUT_OF_RANGE",
            ErrorCode::UnknownAttribute => "UNKNOWN_ATTRIBUTE",
            ErrorCode::UnknownProbe => "UNKNOWN_PROBE",
            ErrorCode::Unavailable => "UNAVAILABLE",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, FaultError>;

/// Unified error type used by core and control.
///
/// None of these are produced by the decision path itself; evaluation has no
/// error channel beyond its boolean verdict.
#[derive(Debug, Error)]
pub enum FaultError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("{field} out of range: {msg}")]
    OutOfRange { field: &'static str, msg: String },
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
    #[error("unknown probe: {0}")]
    UnknownProbe(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl FaultError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            FaultError::Parse(_) => ErrorCode::Parse,
            FaultError::OutOfRange { .. } => ErrorCode::OutOfRange,
            FaultError::UnknownAttribute(_) => ErrorCode::UnknownAttribute,
            FaultError::UnknownProbe(_) => ErrorCode::UnknownProbe,
            FaultError::Unavailable(_) => ErrorCode::Unavailable,
            FaultError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub(crate) fn out_of_range(field: &'static str, msg: impl Into<String>) -> Self {
        FaultError::OutOfRange { field, msg: msg.into() }
    }
}
