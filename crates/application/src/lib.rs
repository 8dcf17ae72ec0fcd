//! 应用层实现。
//!
//! 这里提供三个核心机制——读穿透缓存、固定窗口限流器、房间通知中心——
//! 以及围绕文章的用例服务。跨请求的一致性全部依赖共享的键值后端，
//! 进程内不持有任何权威状态。

pub mod cache;
pub mod clock;
pub mod error;
pub mod hub;
pub mod kv;
pub mod rate_limit;
pub mod repository;
pub mod services;

pub use cache::{CacheLayer, CacheLookup, CacheWrite};
pub use clock::{Clock, SystemClock};
pub use error::ApplicationError;
pub use hub::{HubError, NotificationHub};
pub use kv::{KeyValueStore, KvError, KvResult};
pub use rate_limit::{FixedWindowLimiter, RateLimitDecision};
pub use repository::{CommentRepository, PostPage, PostRepository};
pub use services::{
    AddCommentRequest, CreatePostRequest, DataSource, Pagination, PostDetail, PostListing,
    PostService, PostServiceDependencies, UpdatePostRequest,
};
