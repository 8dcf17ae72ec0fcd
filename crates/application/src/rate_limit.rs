//! 分布式固定窗口限流器
//!
//! 计数器存放在共享键值后端，多实例共用同一份额度。
//! 防止单客户端请求洪水，保护下游处理器。

use crate::clock::Clock;
use crate::kv::KeyValueStore;
use config::RateLimitConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 限流判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// 放行
    Allowed {
        /// 当前窗口剩余额度
        remaining: u32,
    },
    /// 超过窗口上限，拒绝
    Limited {
        /// 距窗口滚动的秒数
        retry_after_seconds: u64,
    },
    /// 后端不可用且策略为 fail-open，降级放行
    Bypassed,
}

impl RateLimitDecision {
    /// 本次请求是否可以继续进入处理器
    pub fn is_admitted(&self) -> bool {
        !matches!(self, RateLimitDecision::Limited { .. })
    }
}

/// 固定窗口限流器
///
/// 窗口按墙钟对齐（窗口起点 = 时间戳取整到窗口长度），非滑动窗口；
/// 客户端跨窗口边界最多可达 2 倍上限，这是已接受的近似。
pub struct FixedWindowLimiter {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
    max_requests: u32,
    fail_open: bool,
}

impl FixedWindowLimiter {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: &RateLimitConfig,
    ) -> Self {
        Self {
            store,
            clock,
            window: Duration::from_secs(config.window_seconds),
            max_requests: config.max_requests,
            fail_open: config.fail_open,
        }
    }

    /// 当前窗口的计数键：`ratelimit:<client>:<window_start>`
    fn counter_key(&self, client_key: &str, window_start: i64) -> String {
        format!("ratelimit:{}:{}", client_key, window_start)
    }

    /// 准入检查
    ///
    /// 后端原子自增后与上限比较。自增和比较之间不存在读改写竞争：
    /// 并发请求各自拿到唯一的计数值，超过上限的那一个一定被拒绝。
    pub async fn check(&self, client_key: &str) -> RateLimitDecision {
        let now = self.clock.now().timestamp();
        let window_seconds = self.window.as_secs() as i64;
        let window_start = now - now.rem_euclid(window_seconds);
        let key = self.counter_key(client_key, window_start);

        let count = match self.store.increment_with_expiry(&key, self.window).await {
            Ok(count) => count,
            Err(err) => {
                // 后端不可用：按配置选择放行或拒绝（见 DESIGN.md）
                return if self.fail_open {
                    warn!(client = %client_key, error = %err,
                        "rate limit backend unavailable, failing open");
                    RateLimitDecision::Bypassed
                } else {
                    warn!(client = %client_key, error = %err,
                        "rate limit backend unavailable, failing closed");
                    RateLimitDecision::Limited {
                        retry_after_seconds: (window_start + window_seconds - now) as u64,
                    }
                };
            }
        };

        if count <= self.max_requests as i64 {
            debug!(client = %client_key, count, "request admitted");
            RateLimitDecision::Allowed {
                remaining: self.max_requests - count as u32,
            }
        } else {
            warn!(client = %client_key, count, max = self.max_requests,
                "rate limit exceeded");
            RateLimitDecision::Limited {
                retry_after_seconds: (window_start + window_seconds - now) as u64,
            }
        }
    }
}
