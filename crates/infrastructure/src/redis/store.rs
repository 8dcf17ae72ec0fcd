//! 共享键值后端的 Redis 实现
//!
//! 缓存条目和限流计数器都存在这里，多实例之间通过它共享状态。
//! 每个操作都包在超时里，Redis 变慢时快速失败，由上层决定降级策略。

use application::{KeyValueStore, KvError, KvResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::info;

pub struct RedisKeyValueStore {
    manager: ConnectionManager,
    operation_timeout: Duration,
}

impl RedisKeyValueStore {
    /// 连接到 Redis 并验证可达性
    ///
    /// 多路复用连接只在这里建立一次，后续操作克隆句柄复用同一条连接。
    pub async fn connect(url: &str, operation_timeout: Duration) -> KvResult<Self> {
        let client = Client::open(url)
            .map_err(|e| KvError::connection(format!("invalid redis url: {}", e)))?;

        let manager = match tokio::time::timeout(operation_timeout, client.get_connection_manager())
            .await
        {
            Ok(Ok(manager)) => manager,
            Ok(Err(e)) => {
                return Err(KvError::connection(format!(
                    "failed to get redis connection: {}",
                    e
                )))
            }
            Err(_) => return Err(KvError::timeout("CONNECT")),
        };

        let store = Self {
            manager,
            operation_timeout,
        };

        // 启动时打一次 PING，尽早暴露配置错误
        let mut conn = store.connection();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| KvError::connection(format!("redis ping failed: {}", e)))?;

        info!(url, "redis key-value store connected");
        Ok(store)
    }

    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    async fn with_timeout<T>(
        &self,
        operation: &str,
        fut: impl std::future::Future<Output = Result<T, redis::RedisError>>,
    ) -> KvResult<T> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(KvError::backend(format!("{}: {}", operation, err))),
            Err(_) => Err(KvError::timeout(operation)),
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.connection();
        self.with_timeout("GET", conn.get(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        let mut conn = self.connection();
        match ttl {
            Some(ttl) => {
                self.with_timeout("SETEX", conn.set_ex(key, value, ttl.as_secs()))
                    .await
            }
            None => self.with_timeout("SET", conn.set(key, value)).await,
        }
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        let mut conn = self.connection();
        self.with_timeout("DEL", conn.del(key)).await
    }

    async fn delete_many(&self, keys: &[String]) -> KvResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection();
        self.with_timeout("DEL", conn.del(keys)).await
    }

    async fn keys(&self, pattern: &str) -> KvResult<Vec<String>> {
        let mut conn = self.connection();
        self.with_timeout("KEYS", conn.keys(pattern)).await
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> KvResult<i64> {
        let mut conn = self.connection();

        // MULTI 包裹 INCR 和 EXPIRE NX：计数和设置过期一次往返完成，
        // 并发自增方各自拿到唯一计数值，过期时间只在键新建时设置。
        let mut pipe = redis::pipe();
        pipe.atomic()
            .incr(key, 1)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs())
            .arg("NX")
            .ignore();

        let (count,): (i64,) = self.with_timeout("INCR", pipe.query_async(&mut conn)).await?;
        Ok(count)
    }
}
