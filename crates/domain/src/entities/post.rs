//! 文章实体定义
//!
//! 包含文章的核心信息和相关操作。

use crate::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 文章标题最大长度
const MAX_TITLE_LENGTH: usize = 255;

/// 文章作者信息
///
/// 身份由外部认证服务签发，这里只保留展示所需的字段。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// 作者唯一ID
    pub id: Uuid,
    /// 作者名称
    pub name: String,
    /// 作者邮箱
    pub email: String,
}

/// 文章实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// 文章唯一ID
    pub id: Uuid,
    /// 文章标题
    pub title: String,
    /// 文章正文内容
    pub content: String,
    /// 是否已发布
    pub published: bool,
    /// 作者ID
    pub author_id: Uuid,
    /// 文章标签名称列表
    pub tags: Vec<String>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// 创建新文章
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        published: bool,
        author_id: Uuid,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let title = title.into();
        let content = content.into();
        Self::validate_title(&title)?;
        Self::validate_content(&content)?;

        Ok(Self {
            id: Uuid::new_v4(),
            title,
            content,
            published,
            author_id,
            tags,
            created_at: now,
            updated_at: now,
        })
    }

    /// 应用一次更新
    ///
    /// 校验新的标题和内容，刷新更新时间。
    pub fn apply_update(
        &mut self,
        title: impl Into<String>,
        content: impl Into<String>,
        published: bool,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let title = title.into();
        let content = content.into();
        Self::validate_title(&title)?;
        Self::validate_content(&content)?;

        self.title = title;
        self.content = content;
        self.published = published;
        self.tags = tags;
        self.updated_at = now;
        Ok(())
    }

    /// 检查给定用户是否为文章作者
    pub fn is_authored_by(&self, user_id: Uuid) -> bool {
        self.author_id == user_id
    }

    /// 验证文章标题
    fn validate_title(title: &str) -> DomainResult<()> {
        if title.trim().is_empty() {
            return Err(DomainError::validation_error("title", "标题不能为空"));
        }
        if title.len() > MAX_TITLE_LENGTH {
            return Err(DomainError::validation_error(
                "title",
                format!("标题不能超过{}个字符", MAX_TITLE_LENGTH),
            ));
        }
        Ok(())
    }

    /// 验证文章内容
    fn validate_content(content: &str) -> DomainResult<()> {
        if content.trim().is_empty() {
            return Err(DomainError::validation_error("content", "内容不能为空"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_post() {
        let author_id = Uuid::new_v4();
        let post = Post::new(
            "Hello",
            "First post body",
            true,
            author_id,
            vec!["rust".to_string()],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(post.title, "Hello");
        assert!(post.published);
        assert!(post.is_authored_by(author_id));
        assert!(!post.is_authored_by(Uuid::new_v4()));
    }

    #[test]
    fn test_empty_title_rejected() {
        let result = Post::new("  ", "body", false, Uuid::new_v4(), vec![], Utc::now());
        assert!(matches!(
            result,
            Err(DomainError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_oversized_title_rejected() {
        let title = "x".repeat(MAX_TITLE_LENGTH + 1);
        let result = Post::new(title, "body", false, Uuid::new_v4(), vec![], Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_update_refreshes_timestamp() {
        let created = Utc::now();
        let mut post = Post::new("Hello", "body", false, Uuid::new_v4(), vec![], created).unwrap();

        let later = created + chrono::Duration::seconds(30);
        post.apply_update("Hello again", "new body", true, vec!["news".to_string()], later)
            .unwrap();

        assert_eq!(post.title, "Hello again");
        assert!(post.published);
        assert_eq!(post.updated_at, later);
        assert_eq!(post.created_at, created);
    }
}
