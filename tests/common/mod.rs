//! 测试用的内存数据库和内存缓存
//!
//! 两者都统计访问次数，并且可以按需注入失败。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::Instant;
use user_cache::cache::CacheStore;
use user_cache::{CacheError, CacheOptions, DefaultUsersModel, StorageError, UserEntity, UserStore};

/// 内存版 users 表
#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<HashMap<i64, UserEntity>>,
    pub find_calls: AtomicUsize,
    pub write_calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    ack_delay: Mutex<Option<Duration>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn finds(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// 每次查询前等待一段时间，模拟慢查询
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// 写入生效后再等待一段时间才返回，模拟已提交但回包很慢
    pub fn set_ack_delay(&self, delay: Duration) {
        *self.ack_delay.lock() = Some(delay);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn row(&self, id: i64) -> Option<UserEntity> {
        self.rows.lock().get(&id).cloned()
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn ack(&self) {
        let delay = *self.ack_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_write(&self) -> Result<(), StorageError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, user: &UserEntity) -> Result<u64, StorageError> {
        self.check_write()?;
        {
            let mut rows = self.rows.lock();
            if rows.contains_key(&user.id) {
                return Err(sqlx::Error::Protocol(format!("duplicate key {}", user.id)).into());
            }
            // created_at / updated_at 由数据库维护
            let now = Utc::now();
            rows.insert(
                user.id,
                UserEntity {
                    created_at: Some(now),
                    updated_at: Some(now),
                    ..user.clone()
                },
            );
        }
        self.ack().await;
        Ok(1)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserEntity>, StorageError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        // 查询看到的是开始时刻的数据
        let row = self.rows.lock().get(&id).cloned();
        self.pause().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolClosed.into());
        }
        Ok(row)
    }

    async fn update(&self, user: &UserEntity) -> Result<u64, StorageError> {
        self.check_write()?;
        let affected = match self.rows.lock().get_mut(&user.id) {
            Some(row) => {
                *row = UserEntity {
                    created_at: row.created_at,
                    updated_at: Some(Utc::now()),
                    ..user.clone()
                };
                1
            }
            None => 0,
        };
        self.ack().await;
        Ok(affected)
    }

    async fn delete(&self, id: i64) -> Result<u64, StorageError> {
        self.check_write()?;
        let affected = self.rows.lock().remove(&id).map_or(0, |_| 1);
        self.ack().await;
        Ok(affected)
    }
}

/// 带过期时间的内存缓存
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    pub gets: AtomicUsize,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_del: AtomicBool,
    last_ttl: Mutex<Option<Duration>>,
}

fn unavailable() -> CacheError {
    redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")).into()
}

impl MemoryCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set(&self, fail: bool) {
        self.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn fail_del(&self, fail: bool) {
        self.fail_del.store(fail, Ordering::SeqCst);
    }

    /// 直接读取未过期的原始值
    pub fn raw(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone())
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.entries.lock().insert(
            key.to_string(),
            (value.to_string(), Instant::now() + Duration::from_secs(3600)),
        );
    }

    pub fn last_ttl(&self) -> Option<Duration> {
        *self.last_ttl.lock()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.raw(key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        *self.last_ttl.lock() = Some(ttl);
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        if self.fail_del.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.entries.lock().remove(key);
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryUserStore>,
    pub cache: Arc<MemoryCache>,
    pub model: Arc<DefaultUsersModel>,
}

pub fn options() -> CacheOptions {
    CacheOptions {
        expiry: Duration::from_secs(600),
        not_found_expiry: Some(Duration::from_secs(60)),
        expiry_deviation: 0.05,
        query_timeout: Duration::from_secs(2),
        cache_timeout: Duration::from_millis(200),
        stat_interval: Duration::from_secs(60),
    }
}

pub fn harness() -> Harness {
    harness_with(options())
}

pub fn harness_with(options: CacheOptions) -> Harness {
    let store = MemoryUserStore::new();
    let cache = MemoryCache::new();
    let model = Arc::new(DefaultUsersModel::new(
        Arc::clone(&store) as Arc<dyn UserStore>,
        Arc::clone(&cache) as Arc<dyn CacheStore>,
        &options,
    ));
    Harness {
        store,
        cache,
        model,
    }
}

/// 必填字段为零值、可空字段为空的用户
pub fn blank_user(id: i64, name: &str, mail: &str) -> UserEntity {
    UserEntity {
        id,
        name: name.to_string(),
        mail: mail.to_string(),
        ..Default::default()
    }
}

/// 填满可空字段的用户
pub fn full_user(id: i64) -> UserEntity {
    UserEntity {
        id,
        name: format!("player-{}", id),
        oid: Some("oid".into()),
        id1: Some(String::new()),
        id2: None,
        balance: 1_000,
        level: 12,
        xp: 3_400,
        ss_sync_at: Some(Utc::now()),
        avatar: Some("https://cdn.example.com/a.png".into()),
        avatar_name: Some("a.png".into()),
        vip_level: 2,
        vip_xp: 50,
        last_login_at: None,
        source: 3,
        fb_id: Some(0),
        fb_token: None,
        ext: Some("{}".into()),
        money_box: 5,
        break_count: 1,
        inbox: None,
        shop: Some("[]".into()),
        task: None,
        big_win_times: 4,
        jackpot_times: 1,
        total_win: 9_999,
        biggest_win: 500,
        sub_expired_at: None,
        extend: None,
        baggage: Some("{\"items\":[]}".into()),
        card: None,
        apple_id: None,
        mail: format!("player{}@x.com", id),
        ..Default::default()
    }
}
