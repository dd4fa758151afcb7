//! Customer Store - 客户记录存储
//!
//! # 架构概述
//!
//! - **文档后端** (`db::backend`): redb 持久化 / 内存实现，支持有序范围查询和原子事务
//! - **客户仓库** (`db::repository`): CRUD、游标分页、名称前缀搜索、软删除
//! - **ID 迁移** (`db::id_migration`): 旧格式 `CUST_…` 批量改写为顺序编号 `CUST00042`
//! - **查询缓存** (`cache`): 列表/详情缓存，变更时失效
//! - **搜索** (`search`): 防抖搜索状态
//! - **目录服务** (`services`): 面向调用方的统一入口
//!
//! # 模块结构
//!
//! ```text
//! customer-store/src/
//! ├── core/          # 配置
//! ├── db/            # 后端、仓库、迁移
//! ├── cache/         # 查询缓存
//! ├── search/        # 防抖搜索
//! ├── services/      # CustomerDirectory
//! └── utils/         # 日志
//! ```

pub mod cache;
pub mod core;
pub mod db;
pub mod search;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use core::{BackendKind, Config};
pub use db::DbService;
pub use db::id_migration::{IdMigration, MigrationReport};
pub use db::repository::{CustomerPage, CustomerRepository, PageCursor};
pub use search::SearchQuery;
pub use services::{CustomerDirectory, DirectoryPage};
pub use utils::{AppError, AppResult, ErrorCode};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

/// Load `.env`, read the configuration and initialize logging
pub fn setup_environment() -> anyhow::Result<Config> {
    if let Err(e) = dotenv::dotenv()
        && !e.not_found()
    {
        eprintln!("Failed to load .env: {e}");
    }

    let config = Config::from_env();
    init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())?;
    Ok(config)
}
