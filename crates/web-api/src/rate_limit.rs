//! 限流中间件
//!
//! 挂在 `/api` 路由前，每个请求先过固定窗口限流器再进入处理器。
//! 客户端标识优先取 `X-Forwarded-For` 的第一跳，其次取对端地址。

use application::RateLimitDecision;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;

use crate::state::AppState;

const LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

fn client_key(request: &Request) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);

    match state.limiter.check(&key).await {
        RateLimitDecision::Limited {
            retry_after_seconds,
        } => {
            let body = Json(json!({
                "status": "error",
                "message": LIMIT_MESSAGE,
            }));
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_seconds.to_string())],
                body,
            )
                .into_response()
        }
        RateLimitDecision::Allowed { .. } | RateLimitDecision::Bypassed => next.run(request).await,
    }
}
