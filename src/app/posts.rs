use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use tracing::info;

use crate::app::guard::{can_delete_post, can_edit_post, Outcome, OwnerRef};
use crate::domain::group::Group;
use crate::domain::post::{Post, PostDraft};
use crate::domain::user::Author;
use crate::domain::validation::FieldErrors;
use crate::infra::db::Db;

/// Post columns with author and group joined in, so a listing never needs a
/// follow-up query per row. Callers append `WHERE`/`ORDER BY`.
pub(crate) const POST_SELECT: &str = "SELECT p.id, p.text, p.image, p.video, p.created_at, p.edit_date, \
            u.id AS author_id, u.username AS author_username, u.display_name AS author_display_name, \
            g.id AS group_id, g.title AS group_title, g.slug AS group_slug, g.description AS group_description \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id";

pub(crate) fn post_from_row(row: &PgRow) -> Post {
    let group_id: Option<i64> = row.get("group_id");
    let group = group_id.map(|id| Group {
        id,
        title: row.get("group_title"),
        slug: row.get("group_slug"),
        description: row.get("group_description"),
    });

    Post {
        id: row.get("id"),
        text: row.get("text"),
        image: row.get("image"),
        video: row.get("video"),
        created_at: row.get("created_at"),
        edit_date: row.get("edit_date"),
        author: Author {
            id: row.get("author_id"),
            username: row.get("author_username"),
            display_name: row.get("author_display_name"),
        },
        group,
    }
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Creates a post owned by `author_id`. Form problems come back as a
    /// [`FieldErrors`] inside the error.
    pub async fn create_post(&self, author_id: i64, draft: PostDraft) -> Result<Post> {
        let draft = draft.normalized()?;

        let mut tx = self.db.pool().begin().await?;
        ensure_group_exists(&mut tx, draft.group_id).await?;

        let post_id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (text, image, video, author_id, group_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(&draft.text)
        .bind(&draft.image)
        .bind(&draft.video)
        .bind(author_id)
        .bind(draft.group_id)
        .fetch_one(&mut *tx)
        .await?;

        let post = fetch_post(&mut tx, post_id).await?;
        tx.commit().await?;

        Ok(post)
    }

    pub async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("{} WHERE p.id = $1", POST_SELECT))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Replaces the post's form fields and stamps `edit_date` in the same
    /// statement. The row stays locked from the ownership check to commit.
    pub async fn update_post(
        &self,
        post_id: i64,
        actor_id: i64,
        draft: PostDraft,
    ) -> Result<Outcome<Post>> {
        let mut tx = self.db.pool().begin().await?;

        let owner = match lock_owner(&mut tx, post_id).await? {
            Some(owner) => owner,
            None => {
                tx.rollback().await?;
                return Ok(Outcome::NotFound);
            }
        };
        if !can_edit_post(actor_id, &owner) {
            tx.rollback().await?;
            info!(post_id, actor_id, "post edit denied");
            return Ok(Outcome::Forbidden);
        }

        let draft = draft.normalized()?;
        ensure_group_exists(&mut tx, draft.group_id).await?;

        sqlx::query(
            "UPDATE posts \
             SET text = $2, group_id = $3, image = $4, video = $5, edit_date = now() \
             WHERE id = $1",
        )
        .bind(post_id)
        .bind(&draft.text)
        .bind(draft.group_id)
        .bind(&draft.image)
        .bind(&draft.video)
        .execute(&mut *tx)
        .await?;

        let post = fetch_post(&mut tx, post_id).await?;
        tx.commit().await?;

        Ok(Outcome::Applied(post))
    }

    /// Deletes the post; comments and likes go with it through the foreign keys.
    pub async fn delete_post(&self, post_id: i64, actor_id: i64) -> Result<Outcome<()>> {
        let mut tx = self.db.pool().begin().await?;

        let owner = match lock_owner(&mut tx, post_id).await? {
            Some(owner) => owner,
            None => {
                tx.rollback().await?;
                return Ok(Outcome::NotFound);
            }
        };
        if !can_delete_post(actor_id, &owner) {
            tx.rollback().await?;
            info!(post_id, actor_id, "post delete denied");
            return Ok(Outcome::Forbidden);
        }

        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Outcome::Applied(()))
    }
}

async fn lock_owner(tx: &mut Transaction<'_, Postgres>, post_id: i64) -> Result<Option<OwnerRef>> {
    let author_id: Option<i64> =
        sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(post_id)
            .fetch_optional(&mut **tx)
            .await?;

    Ok(author_id.map(|author_id| OwnerRef { author_id }))
}

async fn ensure_group_exists(tx: &mut Transaction<'_, Postgres>, group_id: Option<i64>) -> Result<()> {
    let Some(group_id) = group_id else {
        return Ok(());
    };

    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM groups WHERE id = $1 FOR SHARE")
        .bind(group_id)
        .fetch_optional(&mut **tx)
        .await?;

    if found.is_none() {
        let mut errors = FieldErrors::new();
        errors.add("group_id", "Select a valid choice.");
        return Err(errors.into());
    }
    Ok(())
}

async fn fetch_post(tx: &mut Transaction<'_, Postgres>, post_id: i64) -> Result<Post> {
    let row = sqlx::query(&format!("{} WHERE p.id = $1", POST_SELECT))
        .bind(post_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(post_from_row(&row))
}
