//! 评论实体定义

use crate::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 评论实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// 评论唯一ID
    pub id: Uuid,
    /// 所属文章ID
    pub post_id: Uuid,
    /// 评论作者ID
    pub author_id: Uuid,
    /// 评论内容
    pub content: String,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// 创建新评论
    pub fn new(
        post_id: Uuid,
        author_id: Uuid,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::validation_error("content", "评论内容不能为空"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            post_id,
            author_id,
            content,
            created_at: now,
        })
    }
}
