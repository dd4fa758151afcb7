//! 核心模块 - 配置
//!
//! - [`Config`] - 存储、缓存、搜索、迁移和日志配置

pub mod config;

pub use config::{BackendKind, Config};
