// 模型模块
// 对外只暴露带缓存的用户模型

pub mod users;

pub use users::{DefaultUsersModel, UsersModel};
