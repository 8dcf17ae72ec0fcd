//! 博客系统核心领域模型
//!
//! 包含文章、评论等核心实体，以及通知事件和错误类型定义。

pub mod entities;
pub mod errors;
pub mod events;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use events::*;
