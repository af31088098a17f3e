use crate::database::models::user::UserEntity;
use crate::error::ModelError;

/// 空值占位符，表示数据库中确认不存在该用户
pub const NOT_FOUND_PLACEHOLDER: &str = "*";

/// 用户缓存数据模型
#[derive(Debug, Clone, PartialEq)]
pub enum CachedUser {
    /// 缓存中的用户记录
    Present(UserEntity),
    /// 空值标记
    Absent,
}

impl CachedUser {
    /// 编码为写入缓存的字符串
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            CachedUser::Present(user) => serde_json::to_string(user),
            CachedUser::Absent => Ok(NOT_FOUND_PLACEHOLDER.to_string()),
        }
    }

    /// 从缓存字符串解码
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        if raw == NOT_FOUND_PLACEHOLDER {
            return Ok(CachedUser::Absent);
        }
        serde_json::from_str(raw).map(CachedUser::Present)
    }

    pub fn into_result(self) -> Result<UserEntity, ModelError> {
        match self {
            CachedUser::Present(user) => Ok(user),
            CachedUser::Absent => Err(ModelError::NotFound),
        }
    }
}

impl From<Option<UserEntity>> for CachedUser {
    fn from(user: Option<UserEntity>) -> Self {
        match user {
            Some(user) => CachedUser::Present(user),
            None => CachedUser::Absent,
        }
    }
}
