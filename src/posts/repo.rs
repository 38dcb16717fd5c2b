use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// Blog post record. `author` snapshots the username at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub author: String,
    pub title: String,
    pub body: String,
    pub created_at: OffsetDateTime,
}

impl Post {
    pub async fn list(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, user_id, author, title, body, created_at
            FROM posts
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn list_by_user(
        db: &PgPool,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, user_id, author, title, body, created_at
            FROM posts
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn get(db: &PgPool, id: i64) -> anyhow::Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, user_id, author, title, body, created_at
            FROM posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(post)
    }

    pub async fn create(
        db: &PgPool,
        user_id: i64,
        author: &str,
        title: &str,
        body: &str,
    ) -> anyhow::Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (user_id, author, title, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, author, title, body, created_at
            "#,
        )
        .bind(user_id)
        .bind(author)
        .bind(title)
        .bind(body)
        .fetch_one(db)
        .await?;
        Ok(post)
    }

    pub async fn update(db: &PgPool, id: i64, title: &str, body: &str) -> anyhow::Result<Post> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts SET title = $2, body = $3
            WHERE id = $1
            RETURNING id, user_id, author, title, body, created_at
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(body)
        .fetch_one(db)
        .await?;
        Ok(post)
    }

    pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}
