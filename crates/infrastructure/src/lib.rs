//! 基础设施层实现。
//!
//! 提供键值后端的 Redis 实现和持久化端口的 PostgreSQL 实现。

pub mod db;
pub mod redis;

pub use db::{create_pg_pool, PgCommentRepository, PgPostRepository};
pub use redis::RedisKeyValueStore;
