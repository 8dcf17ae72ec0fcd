//! 持久化端口
//!
//! 文章与评论的存储接口，具体实现由 infrastructure 提供。

use async_trait::async_trait;
use domain::{Comment, Post, RepositoryError};
use uuid::Uuid;

/// 一页文章及命中总数
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<Post>,
    /// 全量文章总数，用于计算总页数
    pub total: u64,
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: Post) -> Result<Post, RepositoryError>;
    async fn update(&self, post: Post) -> Result<Post, RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepositoryError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;

    // 按创建时间倒序取一页，page 从 1 开始
    async fn list_page(&self, page: u32, limit: u32) -> Result<PostPage, RepositoryError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: Comment) -> Result<Comment, RepositoryError>;
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepositoryError>;
}

/// 测试用内存实现
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryPostRepository {
        posts: Mutex<HashMap<Uuid, Post>>,
    }

    impl MemoryPostRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl PostRepository for MemoryPostRepository {
        async fn create(&self, post: Post) -> Result<Post, RepositoryError> {
            let mut posts = self.posts.lock().unwrap();
            if posts.contains_key(&post.id) {
                return Err(RepositoryError::Conflict);
            }
            posts.insert(post.id, post.clone());
            Ok(post)
        }

        async fn update(&self, post: Post) -> Result<Post, RepositoryError> {
            let mut posts = self.posts.lock().unwrap();
            if !posts.contains_key(&post.id) {
                return Err(RepositoryError::NotFound);
            }
            posts.insert(post.id, post.clone());
            Ok(post)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepositoryError> {
            Ok(self.posts.lock().unwrap().get(&id).cloned())
        }

        async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
            let mut posts = self.posts.lock().unwrap();
            posts.remove(&id).map(|_| ()).ok_or(RepositoryError::NotFound)
        }

        async fn list_page(&self, page: u32, limit: u32) -> Result<PostPage, RepositoryError> {
            let posts = self.posts.lock().unwrap();
            let total = posts.len() as u64;

            let mut ordered: Vec<Post> = posts.values().cloned().collect();
            ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            let offset = (page.saturating_sub(1) as usize) * limit as usize;
            let page_posts = ordered
                .into_iter()
                .skip(offset)
                .take(limit as usize)
                .collect();

            Ok(PostPage {
                posts: page_posts,
                total,
            })
        }
    }

    #[derive(Default)]
    pub struct MemoryCommentRepository {
        comments: Mutex<Vec<Comment>>,
    }

    impl MemoryCommentRepository {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl CommentRepository for MemoryCommentRepository {
        async fn create(&self, comment: Comment) -> Result<Comment, RepositoryError> {
            self.comments.lock().unwrap().push(comment.clone());
            Ok(comment)
        }

        async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepositoryError> {
            let comments = self.comments.lock().unwrap();
            Ok(comments
                .iter()
                .filter(|c| c.post_id == post_id)
                .cloned()
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryPostRepository;
    use super::*;
    use chrono::Utc;

    fn sample_post(title: &str, created_at: chrono::DateTime<Utc>) -> Post {
        Post::new(title, "body", true, Uuid::new_v4(), vec![], created_at).unwrap()
    }

    #[tokio::test]
    async fn test_list_page_orders_newest_first() {
        let repo = MemoryPostRepository::new();
        let base = Utc::now();
        for i in 0..3 {
            let post = sample_post(
                &format!("post-{}", i),
                base + chrono::Duration::seconds(i),
            );
            repo.create(post).await.unwrap();
        }

        let page = repo.list_page(1, 2).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.posts.len(), 2);
        assert_eq!(page.posts[0].title, "post-2");
        assert_eq!(page.posts[1].title, "post-1");

        let page2 = repo.list_page(2, 2).await.unwrap();
        assert_eq!(page2.posts.len(), 1);
        assert_eq!(page2.posts[0].title, "post-0");
    }

    #[tokio::test]
    async fn test_delete_missing_post_is_not_found() {
        let repo = MemoryPostRepository::new();
        let result = repo.delete(Uuid::new_v4()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_missing_post_is_not_found() {
        let repo = MemoryPostRepository::new();
        let post = sample_post("ghost", Utc::now());
        assert!(matches!(
            repo.update(post).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
