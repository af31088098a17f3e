pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod model;
pub mod utils;

pub use config::{CacheOptions, Config, ConfigError};
pub use database::{UserEntity, UserOperation, UserStore};
pub use error::{CacheError, ModelError, StorageError};
pub use model::{DefaultUsersModel, UsersModel};
