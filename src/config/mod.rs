use std::env;
use std::time::Duration;

use thiserror::Error;

/// 默认缓存过期时间，7天
const DEFAULT_EXPIRY_SECS: u64 = 7 * 24 * 3600;
/// 默认空值缓存过期时间，1分钟
const DEFAULT_NOT_FOUND_EXPIRY_SECS: u64 = 60;
/// 过期时间随机偏移比例
const DEFAULT_EXPIRY_DEVIATION: f64 = 0.05;
/// 缓存过期时间上限，一年
const MAX_EXPIRY_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("缺少环境变量: {0}")]
    Missing(#[from] env::VarError),

    #[error("非法的表名: {0}")]
    InvalidTable(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub users_table: String,
    pub max_connections: u32,
    pub cache: CacheOptions,
}

/// 缓存策略参数
#[derive(Debug, Clone, PartialEq)]
pub struct CacheOptions {
    /// 正常记录的缓存时间
    pub expiry: Duration,
    /// 空值标记的缓存时间，None 表示不缓存空值
    pub not_found_expiry: Option<Duration>,
    /// 过期时间的随机偏移比例，0 表示不偏移
    pub expiry_deviation: f64,
    /// 单条数据库语句的超时时间
    pub query_timeout: Duration,
    /// 单次缓存操作的超时时间
    pub cache_timeout: Duration,
    /// 命中率统计日志的输出间隔
    pub stat_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(DEFAULT_EXPIRY_SECS),
            not_found_expiry: Some(Duration::from_secs(DEFAULT_NOT_FOUND_EXPIRY_SECS)),
            expiry_deviation: DEFAULT_EXPIRY_DEVIATION,
            query_timeout: Duration::from_secs(3),
            cache_timeout: Duration::from_millis(500),
            stat_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        // 表名会直接拼进 SQL
        let users_table = env::var("USERS_TABLE").unwrap_or_else(|_| "users".into());
        if !is_table_name(&users_table) {
            return Err(ConfigError::InvalidTable(users_table));
        }

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            users_table,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            cache: CacheOptions::from_lookup(|name| env::var(name).ok()),
        })
    }
}

/// 表名只允许 `name` 或 `schema.name`，每段由字母、数字、下划线组成且不以数字开头
fn is_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

impl CacheOptions {
    /// 从键值来源读取缓存参数，缺失或无法解析的值使用默认值
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let number = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());
        let millis = |name: &str| number(name).map(Duration::from_millis);

        let not_found_expiry = match number("CACHE_NOT_FOUND_EXPIRY_SECS") {
            // 0 关闭空值缓存
            Some(0) => None,
            Some(s) if s <= MAX_EXPIRY_SECS => Some(Duration::from_secs(s)),
            _ => defaults.not_found_expiry,
        };

        let expiry_deviation = lookup("CACHE_EXPIRY_DEVIATION")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|d| (0.0..1.0).contains(d))
            .unwrap_or(defaults.expiry_deviation);

        Self {
            expiry: number("CACHE_EXPIRY_SECS")
                .filter(|s| (1..=MAX_EXPIRY_SECS).contains(s))
                .map(Duration::from_secs)
                .unwrap_or(defaults.expiry),
            not_found_expiry,
            expiry_deviation,
            query_timeout: millis("QUERY_TIMEOUT_MS").unwrap_or(defaults.query_timeout),
            cache_timeout: millis("CACHE_TIMEOUT_MS").unwrap_or(defaults.cache_timeout),
            stat_interval: number("CACHE_STAT_INTERVAL_SECS")
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.stat_interval),
        }
    }
}
