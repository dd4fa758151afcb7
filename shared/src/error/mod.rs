//! Unified error system for the customer store
//!
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`AppError`]: Rich error type with codes, messages, and details
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 4xxx: Customer errors
//! - 9xxx: System errors
//!
//! # Outcomes
//!
//! Store operations surface three distinct outcomes to callers:
//! `Ok(Some(v))` on success, `Ok(None)` when nothing was found, and
//! `Err(AppError)` when the operation failed. Validation failures carry
//! [`ErrorCode::ValidationFailed`] and never reach the backend.
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! let err = AppError::validation("Name is required").with_detail("field", "name");
//! assert_eq!(err.code, ErrorCode::ValidationFailed);
//! assert!(!err.is_retryable());
//! ```

mod codes;
mod types;

pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{AppError, AppResult};
