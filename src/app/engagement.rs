use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::info;

use crate::app::guard::{can_delete_comment, Outcome, OwnerRef};
use crate::domain::engagement::Comment;
use crate::domain::user::Author;
use crate::infra::db::Db;

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.text, c.created_at, \
            u.id AS author_id, u.username AS author_username, u.display_name AS author_display_name \
     FROM comments c \
     JOIN users u ON u.id = c.author_id";

fn comment_from_row(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        text: row.get("text"),
        created_at: row.get("created_at"),
        author: Author {
            id: row.get("author_id"),
            username: row.get("author_username"),
            display_name: row.get("author_display_name"),
        },
    }
}

/// Comments plus the like half of the relation toggles.
#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Adds a like. `Some(true)` if created, `Some(false)` if it already
    /// existed, `None` if the post does not exist.
    pub async fn like_post(&self, user_id: i64, post_id: i64) -> Result<Option<bool>> {
        let result = sqlx::query(
            "INSERT INTO likes (user_id, post_id) \
             SELECT $1, id FROM posts WHERE id = $2 \
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(post_id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            return Ok(Some(true));
        }
        Ok(self.post_exists(post_id).await?.then_some(false))
    }

    /// Removes a like. `Some(false)` when there was nothing to remove, `None`
    /// if the post does not exist.
    pub async fn unlike_post(&self, user_id: i64, post_id: i64) -> Result<Option<bool>> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() > 0 {
            return Ok(Some(true));
        }
        Ok(self.post_exists(post_id).await?.then_some(false))
    }

    pub async fn likes_count(&self, post_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    pub async fn has_liked(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let liked: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(liked)
    }

    /// `None` if the post does not exist.
    pub async fn comment_post(
        &self,
        author_id: i64,
        post_id: i64,
        text: String,
    ) -> Result<Option<Comment>> {
        let row = sqlx::query(
            "WITH inserted AS ( \
                INSERT INTO comments (author_id, post_id, text) \
                SELECT $1, id, $3 FROM posts WHERE id = $2 \
                RETURNING id, post_id, author_id, text, created_at \
             ) \
             SELECT c.id, c.post_id, c.text, c.created_at, \
                    u.id AS author_id, u.username AS author_username, u.display_name AS author_display_name \
             FROM inserted c \
             JOIN users u ON u.id = c.author_id",
        )
        .bind(author_id)
        .bind(post_id)
        .bind(text)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    pub async fn get_comment(&self, comment_id: i64) -> Result<Option<Comment>> {
        let row = sqlx::query(&format!("{} WHERE c.id = $1", COMMENT_SELECT))
            .bind(comment_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(comment_from_row))
    }

    /// All comments on a post, newest first.
    pub async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.post_id = $1 ORDER BY c.created_at DESC, c.id DESC",
            COMMENT_SELECT
        ))
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// Comments written by a user, newest first.
    pub async fn list_comments_by_author(&self, author_id: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.author_id = $1 ORDER BY c.created_at DESC, c.id DESC",
            COMMENT_SELECT
        ))
        .bind(author_id)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    pub async fn delete_comment(&self, comment_id: i64, actor_id: i64) -> Result<Outcome<()>> {
        let mut tx = self.db.pool().begin().await?;

        let author_id: Option<i64> =
            sqlx::query_scalar("SELECT author_id FROM comments WHERE id = $1 FOR UPDATE")
                .bind(comment_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(author_id) = author_id else {
            tx.rollback().await?;
            return Ok(Outcome::NotFound);
        };
        if !can_delete_comment(actor_id, &OwnerRef { author_id }) {
            tx.rollback().await?;
            info!(comment_id, actor_id, "comment delete denied");
            return Ok(Outcome::Forbidden);
        }

        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Outcome::Applied(()))
    }

    async fn post_exists(&self, post_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(exists)
    }
}
