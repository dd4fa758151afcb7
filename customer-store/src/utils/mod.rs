//! 工具模块
//!
//! - [`logger`] - 日志初始化与日志文件清理
//! - [`AppError`] - 应用错误类型 (from shared::error)

pub mod logger;

pub use shared::error::{AppError, AppResult, ErrorCode};
