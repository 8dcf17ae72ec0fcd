use application::{CommentRepository, PostPage, PostRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Comment, Post, RepositoryError};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            RepositoryError::Conflict
        }
        other => RepositoryError::storage(other.to_string()),
    }
}

#[derive(Debug, FromRow)]
struct PostRecord {
    id: Uuid,
    title: String,
    content: String,
    published: bool,
    author_id: Uuid,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PostRecord> for Post {
    fn from(value: PostRecord) -> Self {
        Post {
            id: value.id,
            title: value.title,
            content: value.content,
            published: value.published,
            author_id: value.author_id,
            tags: value.tags,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CommentRecord {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRecord> for Comment {
    fn from(value: CommentRecord) -> Self {
        Comment {
            id: value.id,
            post_id: value.post_id,
            author_id: value.author_id,
            content: value.content,
            created_at: value.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn create(&self, post: Post) -> Result<Post, RepositoryError> {
        let record = sqlx::query_as::<_, PostRecord>(
            r#"
            INSERT INTO posts (id, title, content, published, author_id, tags, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, title, content, published, author_id, tags, created_at, updated_at
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.published)
        .bind(post.author_id)
        .bind(&post.tags)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.into())
    }

    async fn update(&self, post: Post) -> Result<Post, RepositoryError> {
        let record = sqlx::query_as::<_, PostRecord>(
            r#"
            UPDATE posts
            SET title = $2, content = $3, published = $4, tags = $5, updated_at = $6
            WHERE id = $1
            RETURNING id, title, content, published, author_id, tags, created_at, updated_at
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.published)
        .bind(&post.tags)
        .bind(post.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.into())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepositoryError> {
        let record = sqlx::query_as::<_, PostRecord>(
            r#"
            SELECT id, title, content, published, author_id, tags, created_at, updated_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Post::from))
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        // 评论随文章级联删除
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_page(&self, page: u32, limit: u32) -> Result<PostPage, RepositoryError> {
        let offset = (page.saturating_sub(1) as i64) * limit as i64;

        let records = sqlx::query_as::<_, PostRecord>(
            r#"
            SELECT id, title, content, published, author_id, tags, created_at, updated_at
            FROM posts
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        let total_row = sqlx::query("SELECT COUNT(*) AS count FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        let total: i64 = total_row.get("count");

        Ok(PostPage {
            posts: records.into_iter().map(Post::from).collect(),
            total: total as u64,
        })
    }
}

#[derive(Clone)]
pub struct PgCommentRepository {
    pool: PgPool,
}

impl PgCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    async fn create(&self, comment: Comment) -> Result<Comment, RepositoryError> {
        let record = sqlx::query_as::<_, CommentRecord>(
            r#"
            INSERT INTO comments (id, post_id, author_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, post_id, author_id, content, created_at
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.into())
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepositoryError> {
        let records = sqlx::query_as::<_, CommentRecord>(
            r#"
            SELECT id, post_id, author_id, content, created_at
            FROM comments
            WHERE post_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Comment::from).collect())
    }
}
