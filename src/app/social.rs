use anyhow::Result;
use sqlx::Row;

use crate::domain::social_graph::Follow;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Creates the follow edge if missing. Returns whether an edge was
    /// created; following yourself is a no-op. The primary key on
    /// `(follower_id, author_id)` makes concurrent duplicates collapse into
    /// one row.
    pub async fn follow(&self, follower_id: i64, author_id: i64) -> Result<bool> {
        if follower_id == author_id {
            return Ok(false);
        }

        let result = sqlx::query(
            "INSERT INTO follows (follower_id, author_id) \
             SELECT $1, $2 \
             WHERE $1 <> $2 \
             ON CONFLICT DO NOTHING",
        )
        .bind(follower_id)
        .bind(author_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes the follow edge if present. Returns whether one was removed.
    pub async fn unfollow(&self, follower_id: i64, author_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND author_id = $2")
            .bind(follower_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, follower_id: i64, author_id: i64) -> Result<bool> {
        let following: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = $1 AND author_id = $2)",
        )
        .bind(follower_id)
        .bind(author_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(following)
    }

    pub async fn get_follow(&self, follower_id: i64, author_id: i64) -> Result<Option<Follow>> {
        let row = sqlx::query(
            "SELECT follower_id, author_id, created_at FROM follows \
             WHERE follower_id = $1 AND author_id = $2",
        )
        .bind(follower_id)
        .bind(author_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| Follow {
            follower_id: row.get("follower_id"),
            author_id: row.get("author_id"),
            created_at: row.get("created_at"),
        }))
    }
}
