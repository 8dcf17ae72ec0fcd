//! 主应用程序入口
//!
//! 启动博客 API 服务：HTTP 路由 + WebSocket 通知。

use std::sync::Arc;
use std::time::Duration;

use application::{
    CacheLayer, FixedWindowLimiter, NotificationHub, PostService, PostServiceDependencies,
    SystemClock,
};
use infrastructure::{create_pg_pool, PgCommentRepository, PgPostRepository, RedisKeyValueStore};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 加载并校验配置；关键变量缺失直接启动失败
    let config = config::AppConfig::from_env();
    config.validate().map_err(|err| anyhow::anyhow!(err))?;

    tracing::info!(
        "连接数据库: {}",
        config.database.url.split('@').last().unwrap_or("unknown")
    );

    // PostgreSQL 连接池 + 迁移
    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    // Redis 键值后端：缓存条目与限流计数共用
    let store = Arc::new(
        RedisKeyValueStore::connect(
            &config.redis.url,
            Duration::from_millis(config.redis.operation_timeout_ms),
        )
        .await
        .map_err(|err| anyhow::anyhow!("redis connection failed: {}", err))?,
    );

    let clock = Arc::new(SystemClock);
    let hub = NotificationHub::new();
    let cache = Arc::new(CacheLayer::new(
        store.clone(),
        Duration::from_secs(config.cache.default_ttl_seconds),
    ));
    let limiter = Arc::new(FixedWindowLimiter::new(
        store,
        clock.clone(),
        &config.rate_limit,
    ));

    let post_service = PostService::new(PostServiceDependencies {
        posts: Arc::new(PgPostRepository::new(pg_pool.clone())),
        comments: Arc::new(PgCommentRepository::new(pg_pool.clone())),
        cache,
        hub: hub.clone(),
        clock,
    });

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));

    let state = AppState::new(Arc::new(post_service), hub, limiter, jwt_service);

    // 启动 Web 服务器，ctrl-c / SIGTERM 时优雅退出
    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("博客 API 服务器启动在 http://{}", addr);
    // 注入对端地址，限流器按来源 IP 分桶
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pg_pool.close().await;
    tracing::info!("服务器已退出");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("收到退出信号，开始优雅关闭");
}
