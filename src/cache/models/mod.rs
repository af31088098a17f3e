/// 缓存数据模型
/// 定义写入缓存的数据结构

// 用户缓存模型
pub mod user;

pub use user::{CachedUser, NOT_FOUND_PLACEHOLDER};
