//! Unified error codes for the customer store
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Customer errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so they serialize the same
/// way for every caller (UI shell, maintenance binary, logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 4xxx: Customer ====================
    /// Customer not found
    CustomerNotFound = 4001,
    /// Mobile number does not match the accepted pattern
    CustomerInvalidMobile = 4002,
    /// Customer id migration failed (retryable)
    MigrationFailed = 4003,
    /// Another migration run holds the lock
    MigrationInProgress = 4004,
    /// Pagination cursor could not be decoded
    InvalidCursor = 4005,

    // ==================== 9xxx: System ====================
    /// Database error
    DatabaseError = 9002,
    /// Backend temporarily unavailable (network/timeout, retry later)
    BackendUnavailable = 9004,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Whether a caller may reasonably retry the same operation
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::MigrationFailed
                | ErrorCode::MigrationInProgress
                | ErrorCode::DatabaseError
                | ErrorCode::BackendUnavailable
        )
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::InvalidRequest => "Invalid request",

            // Customer
            ErrorCode::CustomerNotFound => "Customer not found",
            ErrorCode::CustomerInvalidMobile => "Invalid mobile number format",
            ErrorCode::MigrationFailed => "Customer id migration failed",
            ErrorCode::MigrationInProgress => "Customer id migration already in progress",
            ErrorCode::InvalidCursor => "Invalid pagination cursor",

            // System
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::BackendUnavailable => "Backend temporarily unavailable",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            5 => Ok(ErrorCode::InvalidRequest),

            // Customer
            4001 => Ok(ErrorCode::CustomerNotFound),
            4002 => Ok(ErrorCode::CustomerInvalidMobile),
            4003 => Ok(ErrorCode::MigrationFailed),
            4004 => Ok(ErrorCode::MigrationInProgress),
            4005 => Ok(ErrorCode::InvalidCursor),

            // System
            9002 => Ok(ErrorCode::DatabaseError),
            9004 => Ok(ErrorCode::BackendUnavailable),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
