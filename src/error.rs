use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// 用户模型对调用方暴露的错误
#[derive(Debug, Error)]
pub enum ModelError {
    /// 没有匹配的行，调用方不应重试
    #[error("用户不存在")]
    NotFound,

    /// 数据库访问失败，瞬时错误可由调用方重试
    #[error("数据库访问失败: {0}")]
    Storage(#[from] StorageError),

    /// 数据已写入数据库，但缓存失效失败，缓存中可能残留旧数据
    #[error("数据已写入但缓存失效失败, key: {key}: {source}")]
    Invalidation {
        key: String,
        #[source]
        source: CacheError,
    },

    /// 调用方取消了操作
    #[error("操作已取消")]
    Cancelled,
}

impl ModelError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound)
    }

    /// 写入成功但缓存可能是脏的
    pub fn is_stale_cache_risk(&self) -> bool {
        matches!(self, ModelError::Invalidation { .. })
    }
}

/// 数据库错误
///
/// 合并后的查询结果要分发给所有等待者，所以这里必须可以 Clone。
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error(transparent)]
    Sql(Arc<sqlx::Error>),

    #[error("数据库语句执行超时 ({0:?})")]
    Timeout(Duration),
}

impl StorageError {
    /// 唯一键、外键等约束冲突，重试没有意义
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            StorageError::Sql(err) => match err.as_ref() {
                sqlx::Error::Database(db) => !matches!(db.kind(), sqlx::error::ErrorKind::Other),
                _ => false,
            },
            StorageError::Timeout(_) => false,
        }
    }

    /// 语句可能已经在数据库执行，只是没有拿到结果
    ///
    /// 数据库明确返回的错误和拿不到连接的错误都说明语句没有生效。
    pub fn is_outcome_unknown(&self) -> bool {
        match self {
            StorageError::Sql(err) => matches!(
                err.as_ref(),
                sqlx::Error::Io(_) | sqlx::Error::Protocol(_) | sqlx::Error::WorkerCrashed
            ),
            StorageError::Timeout(_) => true,
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Sql(Arc::new(err))
    }
}

/// 缓存错误，读路径上只记录日志，不会返回给调用方
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    #[error("缓存数据编解码失败: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("缓存操作超时 ({0:?})")]
    Timeout(Duration),
}
