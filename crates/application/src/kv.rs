//! 共享键值后端抽象
//!
//! 缓存和限流器都经由这个契约访问远端的 TTL 键值存储。
//! 后端负责过期淘汰；自增操作必须在后端侧原子完成。

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// 键值后端操作错误
#[derive(Error, Debug)]
pub enum KvError {
    /// 连接错误
    #[error("键值后端连接错误: {message}")]
    ConnectionError { message: String },

    /// 超时错误，按后端不可用处理
    #[error("操作超时: {operation}")]
    TimeoutError { operation: String },

    /// 后端命令执行错误
    #[error("后端命令错误: {message}")]
    BackendError { message: String },
}

impl KvError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::TimeoutError {
            operation: operation.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::BackendError {
            message: message.into(),
        }
    }
}

/// 键值后端结果类型
pub type KvResult<T> = Result<T, KvError>;

/// 远端键值后端契约
///
/// 所有方法都可能因网络 I/O 挂起；调用方决定失败时是降级还是拒绝。
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取键值；不存在（包括已过期）时返回 `None`
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// 写入键值；`ttl` 为 `None` 时条目持久保留直到显式删除
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()>;

    /// 删除单个键；键不存在不算错误
    async fn delete(&self, key: &str) -> KvResult<()>;

    /// 批量删除，返回实际删除数量
    async fn delete_many(&self, keys: &[String]) -> KvResult<u64>;

    /// 按 glob 模式扫描当前存在的键
    async fn keys(&self, pattern: &str) -> KvResult<Vec<String>>;

    /// 原子自增并返回自增后的值
    ///
    /// 键首次创建时设置过期时间 `ttl`。计数与过期设置必须在
    /// 后端侧作为单次原子往返完成，不允许客户端读改写。
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> KvResult<i64>;
}

/// 仅支持 `*` 通配符的 glob 匹配
///
/// 覆盖 `posts:*`、`posts:page:*` 这类失效模式即可。
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<u8> = pattern.bytes().collect();
    let text: Vec<u8> = text.bytes().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            // 回溯：让上一个 '*' 多吞一个字符
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

/// 内存实现的键值后端（用于测试）
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    struct StoredValue {
        value: String,
        expires_at: Option<Instant>,
    }

    impl StoredValue {
        fn is_expired(&self, now: Instant) -> bool {
            self.expires_at.map(|at| at <= now).unwrap_or(false)
        }
    }

    /// 内存键值后端
    ///
    /// 单把互斥锁保证自增的原子性，与真实后端的单线程命令模型一致。
    #[derive(Default)]
    pub struct MemoryKeyValueStore {
        entries: Mutex<HashMap<String, StoredValue>>,
    }

    impl MemoryKeyValueStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl KeyValueStore for MemoryKeyValueStore {
        async fn get(&self, key: &str) -> KvResult<Option<String>> {
            let now = Instant::now();
            let mut entries = self.entries.lock().expect("kv lock poisoned");

            match entries.get(key) {
                Some(stored) if stored.is_expired(now) => {
                    entries.remove(key);
                    Ok(None)
                }
                Some(stored) => Ok(Some(stored.value.clone())),
                None => Ok(None),
            }
        }

        async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
            let mut entries = self.entries.lock().expect("kv lock poisoned");
            entries.insert(
                key.to_string(),
                StoredValue {
                    value: value.to_string(),
                    expires_at: ttl.map(|ttl| Instant::now() + ttl),
                },
            );
            Ok(())
        }

        async fn delete(&self, key: &str) -> KvResult<()> {
            let mut entries = self.entries.lock().expect("kv lock poisoned");
            entries.remove(key);
            Ok(())
        }

        async fn delete_many(&self, keys: &[String]) -> KvResult<u64> {
            let mut entries = self.entries.lock().expect("kv lock poisoned");
            let mut removed = 0;
            for key in keys {
                if entries.remove(key).is_some() {
                    removed += 1;
                }
            }
            Ok(removed)
        }

        async fn keys(&self, pattern: &str) -> KvResult<Vec<String>> {
            let now = Instant::now();
            let mut entries = self.entries.lock().expect("kv lock poisoned");
            entries.retain(|_, stored| !stored.is_expired(now));

            Ok(entries
                .keys()
                .filter(|key| glob_match(pattern, key))
                .cloned()
                .collect())
        }

        async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> KvResult<i64> {
            let now = Instant::now();
            let mut entries = self.entries.lock().expect("kv lock poisoned");

            if entries
                .get(key)
                .map(|stored| stored.is_expired(now))
                .unwrap_or(false)
            {
                entries.remove(key);
            }

            match entries.get_mut(key) {
                Some(stored) => {
                    let current: i64 = stored
                        .value
                        .parse()
                        .map_err(|_| KvError::backend("counter value is not an integer"))?;
                    stored.value = (current + 1).to_string();
                    Ok(current + 1)
                }
                None => {
                    entries.insert(
                        key.to_string(),
                        StoredValue {
                            value: "1".to_string(),
                            expires_at: Some(now + ttl),
                        },
                    );
                    Ok(1)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryKeyValueStore;
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("posts:*", "posts:1"));
        assert!(glob_match("posts:*", "posts:page:1:limit:10"));
        assert!(glob_match("posts:page:*", "posts:page:2:limit:10"));
        assert!(!glob_match("posts:page:*", "posts:1"));
        assert!(!glob_match("posts:*", "users:1"));
        assert!(glob_match("posts:1", "posts:1"));
        assert!(!glob_match("posts:1", "posts:12"));
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = MemoryKeyValueStore::new();
        store.set("posts:1", "{\"id\":1}", None).await.unwrap();
        assert_eq!(
            store.get("posts:1").await.unwrap(),
            Some("{\"id\":1}".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_after_delete_returns_none() {
        let store = MemoryKeyValueStore::new();
        store.set("posts:1", "v", None).await.unwrap();
        store.delete("posts:1").await.unwrap();
        assert_eq!(store.get("posts:1").await.unwrap(), None);

        // 删除不存在的键不算错误
        store.delete("posts:1").await.unwrap();
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryKeyValueStore::new();
        store
            .set("posts:1", "v", Some(Duration::from_millis(30)))
            .await
            .unwrap();
        assert!(store.get("posts:1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.get("posts:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_pattern_scan() {
        let store = MemoryKeyValueStore::new();
        store.set("posts:1", "a", None).await.unwrap();
        store.set("posts:page:1:limit:10", "b", None).await.unwrap();
        store.set("users:1", "c", None).await.unwrap();

        let mut matched = store.keys("posts:*").await.unwrap();
        matched.sort();
        assert_eq!(matched, vec!["posts:1", "posts:page:1:limit:10"]);
    }

    #[tokio::test]
    async fn test_increment_with_expiry() {
        let store = MemoryKeyValueStore::new();
        let ttl = Duration::from_secs(60);
        assert_eq!(store.increment_with_expiry("c", ttl).await.unwrap(), 1);
        assert_eq!(store.increment_with_expiry("c", ttl).await.unwrap(), 2);
        assert_eq!(store.increment_with_expiry("c", ttl).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_expired_counter_restarts() {
        let store = MemoryKeyValueStore::new();
        let ttl = Duration::from_millis(30);
        assert_eq!(store.increment_with_expiry("c", ttl).await.unwrap(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.increment_with_expiry("c", ttl).await.unwrap(), 1);
    }
}
