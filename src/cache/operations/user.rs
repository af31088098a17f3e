use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::keys::user_keys;
use crate::cache::models::user::CachedUser;
use crate::cache::operations::store::CacheStore;
use crate::config::CacheOptions;
use crate::database::models::user::UserEntity;
use crate::error::CacheError;
use crate::utils::around_duration;

/// 用户缓存操作
pub struct UserCacheOperations {
    store: Arc<dyn CacheStore>,
    expiry: Duration,
    expiry_deviation: f64,
    timeout: Duration,
}

impl UserCacheOperations {
    /// 创建新的用户缓存操作实例
    pub fn new(store: Arc<dyn CacheStore>, options: &CacheOptions) -> Self {
        Self {
            store,
            expiry: options.expiry,
            expiry_deviation: options.expiry_deviation,
            timeout: options.cache_timeout,
        }
    }

    /// 从缓存获取用户，未命中返回 None
    ///
    /// 无法解码的值返回 Codec 错误，由调用方决定是否删除。
    pub async fn get_cached_user(&self, id: i64) -> Result<Option<CachedUser>, CacheError> {
        let key = user_keys::user_id_key(id);
        let raw = self.bounded(self.store.get(&key)).await?;

        match raw {
            Some(raw) => Ok(Some(CachedUser::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// 将用户信息写入缓存，过期时间带随机偏移
    pub async fn cache_user(&self, user: &UserEntity) -> Result<(), CacheError> {
        let key = user_keys::user_id_key(user.id);
        let json = CachedUser::Present(user.clone()).encode()?;
        let ttl = around_duration(self.expiry, self.expiry_deviation);

        self.bounded(self.store.set_ex(&key, &json, ttl)).await
    }

    /// 写入空值标记
    pub async fn cache_not_found(&self, id: i64, ttl: Duration) -> Result<(), CacheError> {
        let key = user_keys::user_id_key(id);
        let placeholder = CachedUser::Absent.encode()?;

        self.bounded(self.store.set_ex(&key, &placeholder, ttl)).await
    }

    /// 从缓存中删除用户
    pub async fn remove_user_from_cache(&self, id: i64) -> Result<(), CacheError> {
        let key = user_keys::user_id_key(id);
        self.bounded(self.store.del(&key)).await
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }
}
