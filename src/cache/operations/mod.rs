/// 缓存操作
/// 提供缓存存储接口和用户缓存操作

// 键值存储
pub mod store;

// 用户缓存操作
pub mod user;

// 重新导出常用操作
pub use store::{CacheStore, RedisCache};
pub use user::UserCacheOperations;
