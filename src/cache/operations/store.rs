use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;

/// 键值缓存存储接口，只需要 get / 带过期时间的 set / del
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn del(&self, key: &str) -> Result<(), CacheError>;
}

/// 基于 Redis 的缓存存储
pub struct RedisCache {
    redis: Arc<RedisClient>,
}

impl RedisCache {
    pub fn new(redis: Arc<RedisClient>) -> Self {
        Self { redis }
    }
}

/// Redis 过期时间按秒计，不足一秒按一秒
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let result: Option<String> = conn.get(key).await?;
        Ok(result)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, value, ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
