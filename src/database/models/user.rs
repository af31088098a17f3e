use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 用户数据库实体，对应 users 表的一行
///
/// 可空列使用 Option，None 与空字符串、0 是不同的状态。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserEntity {
    pub id: i64,
    pub name: String,
    pub oid: Option<String>,
    pub id1: Option<String>,
    pub id2: Option<String>,
    pub balance: i64,
    pub level: i64,
    pub xp: i64,
    /// 由数据库默认值维护
    pub created_at: Option<DateTime<Utc>>,
    /// 由数据库默认值维护
    pub updated_at: Option<DateTime<Utc>>,
    pub ss_sync_at: Option<DateTime<Utc>>,
    pub avatar: Option<String>,
    /// 头像名
    pub avatar_name: Option<String>,
    pub vip_level: i64,
    pub vip_xp: i64,
    pub last_login_at: Option<DateTime<Utc>>,
    pub source: i64,
    pub fb_id: Option<i64>,
    pub fb_token: Option<String>,
    pub ext: Option<String>,
    pub money_box: i64,
    #[sqlx(rename = "break")]
    #[serde(rename = "break")]
    pub break_count: i64,
    pub inbox: Option<String>,
    pub shop: Option<String>,
    pub task: Option<String>,
    pub big_win_times: i64,
    pub jackpot_times: i64,
    pub total_win: i64,
    pub biggest_win: i64,
    pub sub_expired_at: Option<DateTime<Utc>>,
    /// 扩展字段
    pub extend: Option<String>,
    /// 背包
    pub baggage: Option<String>,
    /// 卡牌
    pub card: Option<String>,
    pub apple_id: Option<String>,
    /// 用户绑定邮箱
    pub mail: String,
}

impl UserEntity {
    /// 表的全部列，顺序与 SELECT 结果一致
    pub const FIELD_NAMES: &'static [&'static str] = &[
        "id",
        "name",
        "oid",
        "id1",
        "id2",
        "balance",
        "level",
        "xp",
        "created_at",
        "updated_at",
        "ss_sync_at",
        "avatar",
        "avatar_name",
        "vip_level",
        "vip_xp",
        "last_login_at",
        "source",
        "fb_id",
        "fb_token",
        "ext",
        "money_box",
        "\"break\"",
        "inbox",
        "shop",
        "task",
        "big_win_times",
        "jackpot_times",
        "total_win",
        "biggest_win",
        "sub_expired_at",
        "extend",
        "baggage",
        "card",
        "apple_id",
        "mail",
    ];

    /// 由数据库维护、不出现在 INSERT/UPDATE 列表里的列
    pub const AUTO_SET_FIELDS: &'static [&'static str] = &["created_at", "updated_at"];

    pub const PRIMARY_KEY: &'static str = "id";

    /// 除主键和自动维护列外可写的列
    pub fn mutable_fields() -> impl Iterator<Item = &'static str> {
        Self::FIELD_NAMES
            .iter()
            .copied()
            .filter(|f| *f != Self::PRIMARY_KEY && !Self::AUTO_SET_FIELDS.contains(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutable_fields_skip_key_and_timestamps() {
        let fields: Vec<_> = UserEntity::mutable_fields().collect();
        assert_eq!(fields.len(), UserEntity::FIELD_NAMES.len() - 3);
        assert_eq!(fields.first(), Some(&"name"));
        assert_eq!(fields.last(), Some(&"mail"));
        assert!(!fields.contains(&"created_at"));
        assert!(!fields.contains(&"updated_at"));
    }
}
