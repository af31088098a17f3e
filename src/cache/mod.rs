// 缓存模块
// 包含缓存键、缓存数据结构、缓存操作和命中率统计

pub mod keys;
pub mod models;
pub mod operations;
pub mod stat;

// 重新导出常用类型和函数，方便其他模块使用
pub use models::user::CachedUser;
pub use operations::{CacheStore, RedisCache, UserCacheOperations};
pub use stat::CacheStat;
