//! Redis 键值后端

mod store;

pub use store::RedisKeyValueStore;
