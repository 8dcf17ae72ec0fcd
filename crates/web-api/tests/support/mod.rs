use std::sync::Arc;
use std::time::Duration;

use application::kv::memory::MemoryKeyValueStore;
use application::repository::memory::{MemoryCommentRepository, MemoryPostRepository};
use application::{
    CacheLayer, FixedWindowLimiter, NotificationHub, PostService, PostServiceDependencies,
    SystemClock,
};
use config::RateLimitConfig;
use tokio::net::TcpListener;
use uuid::Uuid;
use web_api::{router, AppState, JwtConfig, JwtService};

/// 端到端测试应用：内存仓储 + 内存键值后端 + 真实 HTTP 监听
pub struct TestApp {
    pub addr: std::net::SocketAddr,
    pub client: reqwest::Client,
    pub store: Arc<MemoryKeyValueStore>,
    jwt_service: JwtService,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_rate_limit(RateLimitConfig {
            window_seconds: 900,
            max_requests: 1000,
            fail_open: true,
        })
        .await
    }

    pub async fn spawn_with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        let store = Arc::new(MemoryKeyValueStore::new());
        let clock = Arc::new(SystemClock);
        let hub = NotificationHub::new();

        let post_service = PostService::new(PostServiceDependencies {
            posts: Arc::new(MemoryPostRepository::new()),
            comments: Arc::new(MemoryCommentRepository::new()),
            cache: Arc::new(CacheLayer::new(store.clone(), Duration::from_secs(300))),
            hub: hub.clone(),
            clock: clock.clone(),
        });

        let limiter = FixedWindowLimiter::new(store.clone(), clock, &rate_limit);

        let jwt_service = JwtService::new(JwtConfig {
            secret: "integration-test-secret-with-length".to_string(),
            expiration_hours: 24,
        });

        let state = AppState::new(
            Arc::new(post_service),
            hub,
            Arc::new(limiter),
            Arc::new(jwt_service.clone()),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");

        let app = router(state);
        tokio::spawn(async move {
            // 与生产入口一致地注入对端地址，限流按来源 IP 分桶
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
            )
            .await
            .ok();
        });

        Self {
            addr,
            client: reqwest::Client::new(),
            store,
            jwt_service,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    pub fn token_for(&self, user_id: Uuid) -> String {
        self.jwt_service.generate_token(user_id).expect("token")
    }
}
