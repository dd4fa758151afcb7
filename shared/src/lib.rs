//! Shared types for the customer store
//!
//! Domain models, the unified error type and small utilities used by the
//! store crate and by any caller that talks to it.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use error::{AppError, AppResult, ErrorCode};
pub use serde::{Deserialize, Serialize};
