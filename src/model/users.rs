// 带缓存的用户模型
// 读：先查缓存，未命中时合并并发查询回源数据库并回写缓存
// 写：先写数据库，成功后删除缓存，由下一次读重新加载

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::keys::user_keys;
use crate::cache::models::user::CachedUser;
use crate::cache::operations::{CacheStore, UserCacheOperations};
use crate::cache::stat::CacheStat;
use crate::config::CacheOptions;
use crate::database::models::user::UserEntity;
use crate::database::operations::user::UserStore;
use crate::error::{CacheError, ModelError, StorageError};
use crate::utils::{FlightTicket, SingleFlight};

/// 合并查询的结果，会分发给同一 key 上的所有等待者
type Fetched = Result<Option<UserEntity>, StorageError>;

/// 用户模型对外接口
#[async_trait]
pub trait UsersModel: Send + Sync {
    /// 插入用户，返回受影响行数。不会写入缓存
    async fn insert(
        &self,
        cancel: &CancellationToken,
        user: &UserEntity,
    ) -> Result<u64, ModelError>;

    /// 按主键查询用户
    async fn find_one(&self, cancel: &CancellationToken, id: i64) -> Result<UserEntity, ModelError>;

    /// 更新用户，成功后删除缓存
    async fn update(&self, cancel: &CancellationToken, user: &UserEntity) -> Result<(), ModelError>;

    /// 删除用户，成功后删除缓存
    async fn delete(&self, cancel: &CancellationToken, id: i64) -> Result<(), ModelError>;
}

pub struct DefaultUsersModel {
    store: Arc<dyn UserStore>,
    cache: UserCacheOperations,
    flight: SingleFlight<Fetched>,
    stat: Arc<CacheStat>,
    not_found_expiry: Option<Duration>,
    query_timeout: Duration,
}

impl DefaultUsersModel {
    pub fn new(
        store: Arc<dyn UserStore>,
        cache_store: Arc<dyn CacheStore>,
        options: &CacheOptions,
    ) -> Self {
        Self {
            store,
            cache: UserCacheOperations::new(cache_store, options),
            flight: SingleFlight::new(),
            stat: Arc::new(CacheStat::new("users")),
            not_found_expiry: options.not_found_expiry,
            query_timeout: options.query_timeout,
        }
    }

    /// 命中率统计，可交给 CacheStat::spawn_reporter 定期输出
    pub fn stat(&self) -> Arc<CacheStat> {
        Arc::clone(&self.stat)
    }

    /// 查缓存，任何缓存错误都当作未命中处理
    async fn lookup(&self, id: i64) -> Option<CachedUser> {
        match self.cache.get_cached_user(id).await {
            Ok(entry) => entry,
            Err(CacheError::Codec(e)) => {
                tracing::warn!("Discarding undecodable cache entry for user {}: {}", id, e);
                if let Err(e) = self.cache.remove_user_from_cache(id).await {
                    tracing::warn!("Failed to remove bad cache entry for user {}: {}", id, e);
                }
                None
            }
            Err(e) => {
                tracing::warn!("Cache read failed for user {}, falling back to db: {}", id, e);
                None
            }
        }
    }

    /// 合并查询中唯一真正访问数据库的一方
    async fn load(&self, id: i64, ticket: FlightTicket) -> Fetched {
        // 并发的上一轮查询可能刚写完缓存
        if let Some(entry) = self.lookup(id).await {
            return Ok(match entry {
                CachedUser::Present(user) => Some(user),
                CachedUser::Absent => None,
            });
        }

        let fetched = self.bounded(self.store.find_by_id(id)).await;
        // 票据只能挡住检查之前完成的写，检查和回写之间仍有一个很小的窗口，
        // 写在这个窗口内删除缓存时，旧值会被回写并保留到过期
        match &fetched {
            Ok(Some(user)) => {
                if ticket.is_current() {
                    if let Err(e) = self.cache.cache_user(user).await {
                        tracing::warn!("Failed to cache user {}: {}", id, e);
                    }
                }
            }
            Ok(None) => {
                if let (Some(ttl), true) = (self.not_found_expiry, ticket.is_current()) {
                    if let Err(e) = self.cache.cache_not_found(id, ttl).await {
                        tracing::warn!("Failed to cache not-found marker for user {}: {}", id, e);
                    }
                }
            }
            Err(e) => {
                self.stat.incr_db_fails();
                tracing::error!("Failed to query user {}: {}", id, e);
            }
        }
        fetched
    }

    /// 给数据库调用加上超时
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(self.query_timeout)),
        }
    }

    /// 执行写操作，调用方取消时放弃等待
    ///
    /// 语句发出后被取消、超时或连接中断时，数据库可能已经提交，
    /// 这时仍然删除缓存，再把原始错误返回给调用方。
    async fn write<T, F>(
        &self,
        cancel: &CancellationToken,
        id: i64,
        fut: F,
    ) -> Result<T, ModelError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        if cancel.is_cancelled() {
            return Err(ModelError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ModelError::Cancelled),
            result = self.bounded(fut) => result.map_err(ModelError::from),
        };

        let outcome_unknown = match &result {
            Err(ModelError::Cancelled) => true,
            Err(ModelError::Storage(e)) => e.is_outcome_unknown(),
            _ => false,
        };
        if outcome_unknown {
            tracing::warn!("Write for user {} may have been applied, evicting cache", id);
            // 删除失败时 invalidate 已经记录日志，这里只返回原始错误
            let _ = self.invalidate(id).await;
        }
        result
    }

    /// 写成功后删除缓存，删除失败单独上报
    async fn invalidate(&self, id: i64) -> Result<(), ModelError> {
        let key = user_keys::user_id_key(id);
        // 执行中的查询可能读到的是写之前的数据
        self.flight.forget(&key);

        match self.cache.remove_user_from_cache(id).await {
            Ok(()) => Ok(()),
            Err(source) => {
                tracing::error!(
                    "User {} written to db but cache invalidation failed, cache may be stale: {}",
                    id,
                    source
                );
                Err(ModelError::Invalidation { key, source })
            }
        }
    }
}

#[async_trait]
impl UsersModel for DefaultUsersModel {
    async fn insert(
        &self,
        cancel: &CancellationToken,
        user: &UserEntity,
    ) -> Result<u64, ModelError> {
        let rows = self.write(cancel, user.id, self.store.insert(user)).await?;
        tracing::debug!("Inserted user {}", user.id);

        // 插入前可能缓存过空值标记
        self.invalidate(user.id).await?;
        Ok(rows)
    }

    async fn find_one(&self, cancel: &CancellationToken, id: i64) -> Result<UserEntity, ModelError> {
        if cancel.is_cancelled() {
            return Err(ModelError::Cancelled);
        }
        self.stat.incr_total();

        if let Some(entry) = self.lookup(id).await {
            self.stat.incr_hit();
            return entry.into_result();
        }
        self.stat.incr_miss();

        let key = user_keys::user_id_key(id);
        let flight = self.flight.work(&key, |ticket| self.load(id, ticket));
        let (fetched, shared) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ModelError::Cancelled),
            outcome = flight => outcome,
        };
        if shared {
            tracing::debug!("Shared db query result for user {}", id);
        }

        match fetched? {
            Some(user) => Ok(user),
            None => Err(ModelError::NotFound),
        }
    }

    async fn update(&self, cancel: &CancellationToken, user: &UserEntity) -> Result<(), ModelError> {
        let rows = self.write(cancel, user.id, self.store.update(user)).await?;
        if rows == 0 {
            tracing::debug!("Update matched no row for user {}", user.id);
        }

        self.invalidate(user.id).await
    }

    async fn delete(&self, cancel: &CancellationToken, id: i64) -> Result<(), ModelError> {
        let rows = self.write(cancel, id, self.store.delete(id)).await?;
        if rows == 0 {
            tracing::debug!("Delete matched no row for user {}", id);
        }

        self.invalidate(id).await
    }
}
