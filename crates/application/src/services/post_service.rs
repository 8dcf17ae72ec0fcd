//! 文章用例服务
//!
//! 读路径走读穿透缓存并标注数据来源；写路径先落库、
//! 再失效相关缓存、最后向房间广播事件。缓存失效在
//! 响应返回前完成，广播则是尽力而为。

use crate::cache::{keys, CacheLayer, CacheLookup};
use crate::clock::Clock;
use crate::error::ApplicationError;
use crate::hub::NotificationHub;
use crate::repository::{CommentRepository, PostRepository};
use domain::events::{post_room, user_room, NotificationEvent};
use domain::{Comment, DomainError, Post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// 响应数据来源，缓存命中或数据库回源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Cache,
    Database,
}

/// 分页信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    /// 总页数，向上取整
    pub pages: u32,
}

impl Pagination {
    fn new(page: u32, limit: u32, total: u64) -> Self {
        let pages = if limit == 0 {
            0
        } else {
            total.div_ceil(limit as u64) as u32
        };
        Self {
            page,
            limit,
            total,
            pages,
        }
    }
}

/// 文章列表页，整体作为一个缓存条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostListing {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
}

/// 文章详情，含评论
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub published: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostRequest {
    pub title: String,
    pub content: String,
    pub published: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AddCommentRequest {
    pub content: String,
}

/// 服务依赖集合
pub struct PostServiceDependencies {
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub cache: Arc<CacheLayer>,
    pub hub: Arc<NotificationHub>,
    pub clock: Arc<dyn Clock>,
}

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    cache: Arc<CacheLayer>,
    hub: Arc<NotificationHub>,
    clock: Arc<dyn Clock>,
}

impl PostService {
    pub fn new(deps: PostServiceDependencies) -> Self {
        Self {
            posts: deps.posts,
            comments: deps.comments,
            cache: deps.cache,
            hub: deps.hub,
            clock: deps.clock,
        }
    }

    /// 创建文章
    ///
    /// 新文章会改变所有列表页，因此失效整个 `posts:*` 命名空间。
    pub async fn create_post(
        &self,
        author_id: Uuid,
        request: CreatePostRequest,
    ) -> Result<Post, ApplicationError> {
        let post = Post::new(
            request.title,
            request.content,
            request.published,
            author_id,
            request.tags,
            self.clock.now(),
        )?;
        let post = self.posts.create(post).await?;

        self.cache.invalidate_pattern(keys::ALL_POSTS_PATTERN).await;

        info!(post_id = %post.id, %author_id, "post created");
        Ok(post)
    }

    /// 分页读取文章列表
    ///
    /// 读穿透：缓存命中直接返回，未命中回源数据库并回填。
    pub async fn get_posts(
        &self,
        page: u32,
        limit: u32,
    ) -> Result<(PostListing, DataSource), ApplicationError> {
        let key = keys::page_key(page, limit);

        match self.cache.get_json::<PostListing>(&key).await {
            CacheLookup::Hit(listing) => {
                debug!(page, limit, "post listing served from cache");
                return Ok((listing, DataSource::Cache));
            }
            CacheLookup::Miss => {}
            CacheLookup::Bypassed => {
                debug!(page, limit, "cache bypassed, reading post listing from database");
            }
        }

        let post_page = self.posts.list_page(page, limit).await?;
        let listing = PostListing {
            pagination: Pagination::new(page, limit, post_page.total),
            posts: post_page.posts,
        };
        self.cache.set_json(&key, &listing, None).await;
        Ok((listing, DataSource::Database))
    }

    /// 读取单篇文章详情
    pub async fn get_post(
        &self,
        post_id: Uuid,
    ) -> Result<(PostDetail, DataSource), ApplicationError> {
        let key = keys::post_key(post_id);

        match self.cache.get_json::<PostDetail>(&key).await {
            CacheLookup::Hit(detail) => {
                debug!(%post_id, "post detail served from cache");
                return Ok((detail, DataSource::Cache));
            }
            CacheLookup::Miss => {}
            CacheLookup::Bypassed => {
                debug!(%post_id, "cache bypassed, reading post detail from database");
            }
        }

        let post = self.require_post(post_id).await?;
        let comments = self.comments.list_for_post(post_id).await?;
        let detail = PostDetail { post, comments };
        self.cache.set_json(&key, &detail, None).await;
        Ok((detail, DataSource::Database))
    }

    /// 更新文章
    ///
    /// 仅作者可更新。失效该文章的详情缓存和全部列表页，
    /// 并向文章房间广播 `update:post`。
    pub async fn update_post(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        request: UpdatePostRequest,
    ) -> Result<Post, ApplicationError> {
        let mut post = self.require_post(post_id).await?;
        if !post.is_authored_by(user_id) {
            return Err(DomainError::permission_denied("update post").into());
        }

        post.apply_update(
            request.title,
            request.content,
            request.published,
            request.tags,
            self.clock.now(),
        )?;
        let post = self.posts.update(post).await?;

        self.cache.delete(&keys::post_key(post_id)).await;
        self.cache.invalidate_pattern(keys::PAGE_PATTERN).await;

        self.hub
            .notify(
                &post_room(post_id),
                NotificationEvent::PostUpdated { post: post.clone() },
            )
            .await;

        info!(%post_id, %user_id, "post updated");
        Ok(post)
    }

    /// 删除文章，仅作者可删
    pub async fn delete_post(
        &self,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ApplicationError> {
        let post = self.require_post(post_id).await?;
        if !post.is_authored_by(user_id) {
            return Err(DomainError::permission_denied("delete post").into());
        }

        self.posts.delete(post_id).await?;

        self.cache.delete(&keys::post_key(post_id)).await;
        self.cache.invalidate_pattern(keys::PAGE_PATTERN).await;

        info!(%post_id, %user_id, "post deleted");
        Ok(())
    }

    /// 为文章添加评论
    ///
    /// 评论改变文章详情，删除其详情缓存；列表页不含评论，保持不动。
    /// 向文章房间广播 `new:comment`。
    pub async fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        request: AddCommentRequest,
    ) -> Result<Comment, ApplicationError> {
        self.require_post(post_id).await?;

        let comment = Comment::new(post_id, author_id, request.content, self.clock.now())?;
        let comment = self.comments.create(comment).await?;

        self.cache.delete(&keys::post_key(post_id)).await;

        self.hub
            .notify(
                &post_room(post_id),
                NotificationEvent::NewComment {
                    comment: comment.clone(),
                },
            )
            .await;

        info!(%post_id, comment_id = %comment.id, "comment added");
        Ok(comment)
    }

    /// 向指定用户的个人房间推送通知，返回送达连接数
    pub async fn notify_user(&self, user_id: Uuid, payload: serde_json::Value) -> usize {
        self.hub
            .notify(
                &user_room(user_id),
                NotificationEvent::UserNotification { payload },
            )
            .await
    }

    async fn require_post(&self, post_id: Uuid) -> Result<Post, ApplicationError> {
        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| DomainError::resource_not_found("post", post_id.to_string()).into())
    }
}
