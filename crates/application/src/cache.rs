//! 读穿透缓存层
//!
//! 以确定性的请求指纹为键缓存 JSON 负载。后端故障时向数据源开放
//! （读按未命中处理、写静默跳过），但结果对调用方是显式的：
//! `Bypassed` 与 `Miss` 可以区分，降级不再藏在日志副作用里。

use crate::kv::{KeyValueStore, KvError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 缓存键命名空间
///
/// 与既有部署互操作，键格式不可更改。
pub mod keys {
    use uuid::Uuid;

    /// 单篇文章：`posts:<id>`
    pub fn post_key(post_id: Uuid) -> String {
        format!("posts:{}", post_id)
    }

    /// 分页列表：`posts:page:<page>:limit:<limit>`
    pub fn page_key(page: u32, limit: u32) -> String {
        format!("posts:page:{}:limit:{}", page, limit)
    }

    /// 所有文章相关条目的失效模式
    pub const ALL_POSTS_PATTERN: &str = "posts:*";

    /// 所有分页列表条目的失效模式
    pub const PAGE_PATTERN: &str = "posts:page:*";
}

/// 缓存读取结果
///
/// `Bypassed` 表示后端不可用、本次读取绕过了缓存——对调用方来说
/// 同样要回源，但语义上与真正的未命中不同。
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    /// 命中，返回反序列化后的值
    Hit(T),
    /// 未命中
    Miss,
    /// 后端故障，降级为回源
    Bypassed,
}

/// 缓存写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    /// 已写入
    Stored,
    /// 后端故障或序列化失败，写入被跳过
    Skipped,
}

/// 读穿透缓存
pub struct CacheLayer {
    store: Arc<dyn KeyValueStore>,
    default_ttl: Duration,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn KeyValueStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    /// 默认过期时间，命中条目的脏读上界
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 读取并反序列化缓存条目
    ///
    /// 后端故障和无法解析的残留数据都不会抛给调用方。
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> CacheLookup<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "cache miss");
                return CacheLookup::Miss;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "cache get failed, bypassing cache");
                return CacheLookup::Bypassed;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key = %key, "cache hit");
                CacheLookup::Hit(value)
            }
            Err(err) => {
                // 残留的不可解析条目按未命中处理，并尽力清掉
                warn!(key = %key, error = %err, "cache entry is not valid JSON, dropping");
                if let Err(err) = self.store.delete(key).await {
                    warn!(key = %key, error = %err, "failed to drop invalid cache entry");
                }
                CacheLookup::Miss
            }
        }
    }

    /// 序列化并写入缓存条目
    ///
    /// `ttl` 为 `None` 时使用默认 TTL。写入失败绝不影响产生该值的请求。
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheWrite {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = %key, error = %err, "cache value serialization failed");
                return CacheWrite::Skipped;
            }
        };

        let ttl = ttl.or(Some(self.default_ttl));
        match self.store.set(key, &raw, ttl).await {
            Ok(()) => CacheWrite::Stored,
            Err(err) => {
                warn!(key = %key, error = %err, "cache set failed, skipping");
                CacheWrite::Skipped
            }
        }
    }

    /// 删除单个缓存条目，幂等
    pub async fn delete(&self, key: &str) {
        if let Err(err) = self.store.delete(key).await {
            warn!(key = %key, error = %err, "cache delete failed");
        }
    }

    /// 按模式批量失效
    ///
    /// 先扫描再批量删除，两步之间写入的键会被漏掉——这是可接受的
    /// 竞争，由 TTL 过期兜底。返回实际删除的条目数。
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let keys = match self.store.keys(pattern).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "cache pattern scan failed");
                return 0;
            }
        };

        if keys.is_empty() {
            return 0;
        }

        match self.store.delete_many(&keys).await {
            Ok(removed) => {
                debug!(pattern = %pattern, removed, "cache pattern invalidated");
                removed as usize
            }
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "cache pattern delete failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory::MemoryKeyValueStore;
    use crate::kv::KvResult;
    use async_trait::async_trait;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        id: u32,
        title: String,
    }

    fn cache_with_memory_store() -> (CacheLayer, Arc<MemoryKeyValueStore>) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let cache = CacheLayer::new(store.clone(), Duration::from_secs(300));
        (cache, store)
    }

    /// 任何操作都失败的后端，用于验证降级路径
    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> KvResult<Option<String>> {
            Err(KvError::connection("backend unreachable"))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl: Option<Duration>) -> KvResult<()> {
            Err(KvError::connection("backend unreachable"))
        }

        async fn delete(&self, _key: &str) -> KvResult<()> {
            Err(KvError::connection("backend unreachable"))
        }

        async fn delete_many(&self, _keys: &[String]) -> KvResult<u64> {
            Err(KvError::connection("backend unreachable"))
        }

        async fn keys(&self, _pattern: &str) -> KvResult<Vec<String>> {
            Err(KvError::connection("backend unreachable"))
        }

        async fn increment_with_expiry(&self, _key: &str, _ttl: Duration) -> KvResult<i64> {
            Err(KvError::connection("backend unreachable"))
        }
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let (cache, _) = cache_with_memory_store();
        let payload = Payload {
            id: 1,
            title: "hello".to_string(),
        };

        assert_eq!(
            cache.set_json("posts:1", &payload, None).await,
            CacheWrite::Stored
        );
        assert_eq!(
            cache.get_json::<Payload>("posts:1").await,
            CacheLookup::Hit(payload)
        );
    }

    #[tokio::test]
    async fn test_miss_after_delete() {
        let (cache, _) = cache_with_memory_store();
        let payload = Payload {
            id: 1,
            title: "hello".to_string(),
        };

        cache.set_json("posts:1", &payload, None).await;
        cache.delete("posts:1").await;
        assert_eq!(cache.get_json::<Payload>("posts:1").await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_miss_after_ttl_elapses() {
        let (cache, _) = cache_with_memory_store();
        let payload = Payload {
            id: 1,
            title: "hello".to_string(),
        };

        cache
            .set_json("posts:1", &payload, Some(Duration::from_millis(30)))
            .await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get_json::<Payload>("posts:1").await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_pattern_invalidation_scoping() {
        let (cache, store) = cache_with_memory_store();
        store.set("posts:1", "{}", None).await.unwrap();
        store.set("posts:page:1:limit:10", "{}", None).await.unwrap();
        store.set("users:1", "{}", None).await.unwrap();

        let removed = cache.invalidate_pattern(keys::ALL_POSTS_PATTERN).await;
        assert_eq!(removed, 2);

        // 不匹配的键原样保留
        assert!(store.get("users:1").await.unwrap().is_some());
        assert!(store.get("posts:1").await.unwrap().is_none());
        assert!(store.get("posts:page:1:limit:10").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backend_failure_is_bypassed_not_error() {
        let cache = CacheLayer::new(Arc::new(BrokenStore), Duration::from_secs(300));
        let payload = Payload {
            id: 1,
            title: "hello".to_string(),
        };

        assert_eq!(
            cache.get_json::<Payload>("posts:1").await,
            CacheLookup::Bypassed
        );
        assert_eq!(
            cache.set_json("posts:1", &payload, None).await,
            CacheWrite::Skipped
        );
        assert_eq!(cache.invalidate_pattern("posts:*").await, 0);
        // delete 也只记录日志，不会 panic 或返回错误
        cache.delete("posts:1").await;
    }

    #[tokio::test]
    async fn test_invalid_entry_treated_as_miss_and_dropped() {
        let (cache, store) = cache_with_memory_store();
        store.set("posts:1", "not-json", None).await.unwrap();

        assert_eq!(cache.get_json::<Payload>("posts:1").await, CacheLookup::Miss);
        assert!(store.get("posts:1").await.unwrap().is_none());
    }

    #[test]
    fn test_key_namespace() {
        let id = uuid::Uuid::nil();
        assert_eq!(keys::post_key(id), format!("posts:{}", id));
        assert_eq!(keys::page_key(2, 10), "posts:page:2:limit:10");
    }
}
