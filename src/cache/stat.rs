use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 缓存命中率统计
#[derive(Debug)]
pub struct CacheStat {
    name: String,
    total: AtomicU64,
    hit: AtomicU64,
    miss: AtomicU64,
    db_fails: AtomicU64,
}

/// 某一时刻的统计值
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatSnapshot {
    pub total: u64,
    pub hit: u64,
    pub miss: u64,
    pub db_fails: u64,
}

impl StatSnapshot {
    pub fn hit_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.hit as f64 / self.total as f64
    }
}

impl CacheStat {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            total: AtomicU64::new(0),
            hit: AtomicU64::new(0),
            miss: AtomicU64::new(0),
            db_fails: AtomicU64::new(0),
        }
    }

    pub fn incr_total(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_hit(&self) {
        self.hit.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_miss(&self) {
        self.miss.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_db_fails(&self) {
        self.db_fails.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatSnapshot {
        StatSnapshot {
            total: self.total.load(Ordering::Relaxed),
            hit: self.hit.load(Ordering::Relaxed),
            miss: self.miss.load(Ordering::Relaxed),
            db_fails: self.db_fails.load(Ordering::Relaxed),
        }
    }

    /// 输出一行统计日志并清零，返回清零前的值
    pub fn report(&self, interval: Duration) -> StatSnapshot {
        let snapshot = StatSnapshot {
            total: self.total.swap(0, Ordering::Relaxed),
            hit: self.hit.swap(0, Ordering::Relaxed),
            miss: self.miss.swap(0, Ordering::Relaxed),
            db_fails: self.db_fails.swap(0, Ordering::Relaxed),
        };
        if snapshot.total == 0 {
            return snapshot;
        }

        let minutes = (interval.as_secs_f64() / 60.0).max(f64::EPSILON);
        tracing::info!(
            "dbcache({}) - qpm: {:.0}, hit_ratio: {:.1}%, hit: {}, miss: {}, db_fails: {}",
            self.name,
            snapshot.total as f64 / minutes,
            snapshot.hit_ratio() * 100.0,
            snapshot.hit,
            snapshot.miss,
            snapshot.db_fails
        );
        snapshot
    }

    /// 按固定间隔输出统计日志，直到 cancel 被触发
    pub fn spawn_reporter(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 第一次 tick 立即返回
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.report(interval);
                    }
                }
            }
            tracing::debug!("dbcache({}) reporter stopped", self.name);
        })
    }
}
