use crate::search::DEFAULT_DEBOUNCE;
use std::str::FromStr;
use std::time::Duration;

/// 存储后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded redb file at `STORE_PATH`
    Redb,
    /// Process-local, lost on exit
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redb" => Ok(Self::Redb),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{other}' (expected redb|memory)")),
        }
    }
}

/// 客户存储配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | STORE_BACKEND | redb | 存储后端 (redb \| memory) |
/// | STORE_PATH | data/customers.redb | redb 数据文件 |
/// | PAGE_SIZE | 20 | 列表每页条数 |
/// | QUERY_STALE_MS | 60000 | 查询缓存过期时间(毫秒) |
/// | QUERY_RETRIES | 2 | 读取失败重试次数 |
/// | SEARCH_DEBOUNCE_MS | 500 | 搜索防抖(毫秒) |
/// | MIGRATE_ON_STARTUP | false | 启动时执行 ID 迁移 |
/// | MIGRATION_LOCK_TTL_MS | 300000 | 迁移锁过期时间(毫秒) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 日志格式 |
/// | LOG_DIR | - | 日志文件目录 (不设置则仅输出到控制台) |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// STORE_BACKEND=memory MIGRATE_ON_STARTUP=true cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendKind,
    pub store_path: String,
    pub page_size: usize,
    pub query_stale_ms: u64,
    pub query_retries: u32,
    pub search_debounce_ms: u64,
    pub migrate_on_startup: bool,
    pub migration_lock_ttl_ms: u64,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 未设置或无法解析的变量使用默认值
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parse_key<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }
        let backend = match lookup("STORE_BACKEND") {
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                tracing::warn!("{e}, falling back to redb");
                BackendKind::Redb
            }),
            None => BackendKind::Redb,
        };

        Self {
            backend,
            store_path: lookup("STORE_PATH").unwrap_or_else(|| "data/customers.redb".into()),
            page_size: parse_key(&lookup, "PAGE_SIZE").unwrap_or(20),
            query_stale_ms: parse_key(&lookup, "QUERY_STALE_MS").unwrap_or(60_000),
            query_retries: parse_key(&lookup, "QUERY_RETRIES").unwrap_or(2),
            search_debounce_ms: parse_key(&lookup, "SEARCH_DEBOUNCE_MS")
                .unwrap_or(DEFAULT_DEBOUNCE.as_millis() as u64),
            migrate_on_startup: parse_key(&lookup, "MIGRATE_ON_STARTUP").unwrap_or(false),
            migration_lock_ttl_ms: parse_key(&lookup, "MIGRATION_LOCK_TTL_MS").unwrap_or(300_000),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_json: parse_key(&lookup, "LOG_JSON").unwrap_or(false),
            log_dir: lookup("LOG_DIR").filter(|d| !d.is_empty()),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".into()),
        }
    }

    /// In-memory store with default tuning, for tests and demos
    pub fn in_memory() -> Self {
        let mut config = Self::from_lookup(|_| None);
        config.backend = BackendKind::Memory;
        config
    }

    pub fn query_stale(&self) -> Duration {
        Duration::from_millis(self.query_stale_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn migration_lock_ttl(&self) -> Duration {
        Duration::from_millis(self.migration_lock_ttl_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.backend, BackendKind::Redb);
        assert_eq!(config.page_size, 20);
        assert_eq!(config.query_stale(), Duration::from_secs(60));
        assert_eq!(config.query_retries, 2);
        assert_eq!(config.search_debounce(), Duration::from_millis(500));
        assert!(!config.migrate_on_startup);
        assert_eq!(config.migration_lock_ttl(), Duration::from_secs(300));
        assert!(config.log_dir.is_none());
        assert_eq!(config.environment, "development");
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = Config::from_lookup(lookup(&[
            ("STORE_BACKEND", "Memory"),
            ("PAGE_SIZE", "50"),
            ("QUERY_RETRIES", "many"),
            ("MIGRATE_ON_STARTUP", "true"),
            ("LOG_DIR", ""),
            ("ENVIRONMENT", "production"),
        ]));
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.query_retries, 2);
        assert!(config.migrate_on_startup);
        assert!(config.log_dir.is_none());
        assert_eq!(config.environment, "production");
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("redb".parse::<BackendKind>(), Ok(BackendKind::Redb));
        assert_eq!(" MEM ".parse::<BackendKind>(), Ok(BackendKind::Memory));
        assert!("sqlite".parse::<BackendKind>().is_err());
        assert_eq!(
            Config::from_lookup(lookup(&[("STORE_BACKEND", "sqlite")])).backend,
            BackendKind::Redb
        );
    }
}
