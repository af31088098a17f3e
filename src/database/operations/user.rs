// 用户表操作
// 只负责 SQL，不感知缓存

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use std::sync::Arc;

use crate::database::models::user::UserEntity;
use crate::error::StorageError;

/// 用户表的存储访问接口
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 插入一行，返回受影响行数
    async fn insert(&self, user: &UserEntity) -> Result<u64, StorageError>;

    /// 按主键查询，没有匹配行时返回 None
    async fn find_by_id(&self, id: i64) -> Result<Option<UserEntity>, StorageError>;

    /// 按主键更新，行不存在时返回 0
    async fn update(&self, user: &UserEntity) -> Result<u64, StorageError>;

    /// 按主键删除，行不存在时返回 0
    async fn delete(&self, id: i64) -> Result<u64, StorageError>;
}

/// 基于 Postgres 的用户表操作
pub struct UserOperation {
    db: Arc<PgPool>,
    insert_sql: String,
    select_sql: String,
    update_sql: String,
    delete_sql: String,
}

impl UserOperation {
    /// 创建新的用户表操作实例，语句在这里一次性拼好
    pub fn new(db: Arc<PgPool>, table: &str) -> Self {
        let rows = UserEntity::FIELD_NAMES.join(", ");

        // INSERT 包含主键，$1 是 id
        let insert_fields: Vec<&str> = std::iter::once(UserEntity::PRIMARY_KEY)
            .chain(UserEntity::mutable_fields())
            .collect();
        let placeholders = (1..=insert_fields.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");

        // UPDATE 的主键放在最后一个占位符
        let assignments: Vec<String> = UserEntity::mutable_fields()
            .enumerate()
            .map(|(i, f)| format!("{} = ${}", f, i + 1))
            .collect();
        let key_placeholder = assignments.len() + 1;

        Self {
            db,
            insert_sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                insert_fields.join(", "),
                placeholders
            ),
            select_sql: format!(
                "SELECT {} FROM {} WHERE {} = $1 LIMIT 1",
                rows,
                table,
                UserEntity::PRIMARY_KEY
            ),
            update_sql: format!(
                "UPDATE {} SET {} WHERE {} = ${}",
                table,
                assignments.join(", "),
                UserEntity::PRIMARY_KEY,
                key_placeholder
            ),
            delete_sql: format!("DELETE FROM {} WHERE {} = $1", table, UserEntity::PRIMARY_KEY),
        }
    }

    /// 按 mutable_fields 的顺序绑定可写列
    fn bind_mutable<'q>(
        query: Query<'q, Postgres, PgArguments>,
        user: &'q UserEntity,
    ) -> Query<'q, Postgres, PgArguments> {
        query
            .bind(&user.name)
            .bind(&user.oid)
            .bind(&user.id1)
            .bind(&user.id2)
            .bind(user.balance)
            .bind(user.level)
            .bind(user.xp)
            .bind(user.ss_sync_at)
            .bind(&user.avatar)
            .bind(&user.avatar_name)
            .bind(user.vip_level)
            .bind(user.vip_xp)
            .bind(user.last_login_at)
            .bind(user.source)
            .bind(user.fb_id)
            .bind(&user.fb_token)
            .bind(&user.ext)
            .bind(user.money_box)
            .bind(user.break_count)
            .bind(&user.inbox)
            .bind(&user.shop)
            .bind(&user.task)
            .bind(user.big_win_times)
            .bind(user.jackpot_times)
            .bind(user.total_win)
            .bind(user.biggest_win)
            .bind(user.sub_expired_at)
            .bind(&user.extend)
            .bind(&user.baggage)
            .bind(&user.card)
            .bind(&user.apple_id)
            .bind(&user.mail)
    }
}

#[async_trait]
impl UserStore for UserOperation {
    async fn insert(&self, user: &UserEntity) -> Result<u64, StorageError> {
        let query = Self::bind_mutable(sqlx::query(&self.insert_sql).bind(user.id), user);

        match query.execute(&*self.db).await {
            Ok(result) => Ok(result.rows_affected()),
            Err(e) => {
                tracing::error!("Failed to insert user {}: {:?}", user.id, e);
                Err(e.into())
            }
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserEntity>, StorageError> {
        let user = sqlx::query_as::<_, UserEntity>(&self.select_sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?;

        Ok(user)
    }

    async fn update(&self, user: &UserEntity) -> Result<u64, StorageError> {
        let result = Self::bind_mutable(sqlx::query(&self.update_sql), user)
            .bind(user.id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i64) -> Result<u64, StorageError> {
        let result = sqlx::query(&self.delete_sql)
            .bind(id)
            .execute(&*self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
