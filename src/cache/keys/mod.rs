/// 缓存键模块
/// 提供缓存键生成函数

// 用户缓存键模块
pub mod user_keys;

pub use user_keys::{USER_ID_PREFIX, user_id_key};
