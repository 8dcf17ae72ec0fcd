use std::sync::Arc;

use application::{FixedWindowLimiter, NotificationHub, PostService};

use crate::JwtService;

/// 共享应用状态
///
/// 所有依赖显式构造后注入，不使用全局单例。
#[derive(Clone)]
pub struct AppState {
    pub post_service: Arc<PostService>,
    pub hub: Arc<NotificationHub>,
    pub limiter: Arc<FixedWindowLimiter>,
    pub jwt_service: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        post_service: Arc<PostService>,
        hub: Arc<NotificationHub>,
        limiter: Arc<FixedWindowLimiter>,
        jwt_service: Arc<JwtService>,
    ) -> Self {
        Self {
            post_service,
            hub,
            limiter,
            jwt_service,
        }
    }
}
