use std::sync::Arc;

use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user_cache::{
    DefaultUsersModel, ModelError, UserOperation, UsersModel, cache::RedisCache, config::Config,
};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    let ids: Vec<i64> = std::env::args()
        .skip(1)
        .filter_map(|arg| match arg.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!("Ignoring invalid user id: {}", arg);
                None
            }
        })
        .collect();
    if ids.is_empty() {
        tracing::error!("Usage: user-cache <user_id>...");
        return;
    }

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'user_cache';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    // 设置 Redis 客户端
    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");

    let model = DefaultUsersModel::new(
        Arc::new(UserOperation::new(Arc::new(pool), &config.users_table)),
        Arc::new(RedisCache::new(Arc::new(redis_client))),
        &config.cache,
    );

    // Ctrl-C 取消所有进行中的查询
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling lookups");
                cancel.cancel();
            }
        });
    }
    let reporter = model
        .stat()
        .spawn_reporter(config.cache.stat_interval, cancel.child_token());

    for id in ids {
        match model.find_one(&cancel, id).await {
            Ok(user) => tracing::info!("id: {}, name: {}", user.id, user.name),
            Err(ModelError::NotFound) => tracing::info!("User {} not found", id),
            Err(ModelError::Cancelled) => break,
            Err(e) => tracing::error!("Failed to get user {}: {}", id, e),
        }
    }

    model.stat().report(config.cache.stat_interval);
    cancel.cancel();
    let _ = reporter.await;
}
