/// 用户主键缓存键前缀
pub const USER_ID_PREFIX: &str = "cache:xBackend:users:id:";

/// 生成用户主键缓存键
pub fn user_id_key(id: i64) -> String {
    format!("{}{}", USER_ID_PREFIX, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed_ids() {
        assert_eq!(user_id_key(10000619), "cache:xBackend:users:id:10000619");
        assert_eq!(user_id_key(-1), "cache:xBackend:users:id:-1");
        assert_ne!(user_id_key(1), user_id_key(11));
    }
}
