use anyhow::Result;
use serde::Deserialize;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::user::{ActivitySummary, PublicUser, User};
use crate::domain::validation::FieldErrors;
use crate::infra::db::Db;

pub(crate) fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
    }
}

pub const MAX_USERNAME_LEN: usize = 150;

/// Usernames are letters, digits and `@ . + - _`, as in the signup form.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.chars().count() <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
}

pub fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !email.contains(' ')
        }
        None => false,
    }
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

/// Profile edit form; omitted fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, display_name, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, display_name, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Public card with follower, following and post totals.
    pub async fn public_profile(&self, user: User) -> Result<PublicUser> {
        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM follows WHERE author_id = $1) AS followers_count, \
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS following_count, \
                (SELECT COUNT(*) FROM posts WHERE author_id = $1) AS posts_count",
        )
        .bind(user.id)
        .fetch_one(self.db.pool())
        .await?;

        let mut profile = PublicUser::from(user);
        profile.followers_count = row.get("followers_count");
        profile.following_count = row.get("following_count");
        profile.posts_count = row.get("posts_count");
        Ok(profile)
    }

    pub async fn activity_summary(&self, user_id: i64) -> Result<ActivitySummary> {
        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM posts WHERE author_id = $1) AS posts_count, \
                (SELECT COUNT(*) FROM comments WHERE author_id = $1) AS comments_count, \
                (SELECT COUNT(*) FROM likes WHERE user_id = $1) AS likes_count, \
                (SELECT COUNT(*) FROM follows WHERE author_id = $1) AS followers_count, \
                (SELECT COUNT(*) FROM follows WHERE follower_id = $1) AS following_count",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(ActivitySummary {
            posts_count: row.get("posts_count"),
            comments_count: row.get("comments_count"),
            likes_count: row.get("likes_count"),
            followers_count: row.get("followers_count"),
            following_count: row.get("following_count"),
        })
    }

    /// Applies the provided fields only. Taken usernames or e-mails come back
    /// as [`FieldErrors`].
    pub async fn update_profile(&self, user_id: i64, update: ProfileUpdate) -> Result<Option<User>> {
        let mut errors = FieldErrors::new();
        let username = update.username.map(|v| v.trim().to_string());
        let email = update.email.map(|v| v.trim().to_string());
        if let Some(username) = &username {
            if !is_valid_username(username) {
                errors.add("username", "Enter a valid username.");
            }
        }
        if let Some(email) = &email {
            if !is_plausible_email(email) {
                errors.add("email", "Enter a valid email address.");
            }
        }
        errors.into_result()?;

        let result = sqlx::query(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 display_name = COALESCE($3, display_name), \
                 email = COALESCE($4, email) \
             WHERE id = $1 \
             RETURNING id, username, email, display_name, created_at",
        )
        .bind(user_id)
        .bind(username)
        .bind(update.display_name)
        .bind(email)
        .fetch_optional(self.db.pool())
        .await;

        match result {
            Ok(row) => Ok(row.as_ref().map(user_from_row)),
            Err(err) => Err(unique_violation_as_field_error(err)),
        }
    }
}

/// Maps a unique-constraint violation on `users` to a field error; anything
/// else passes through.
pub(crate) fn unique_violation_as_field_error(err: sqlx::Error) -> anyhow::Error {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or_default();
            let mut errors = FieldErrors::new();
            if constraint.contains("users_username_key") {
                errors.add("username", "A user with that username already exists.");
                return errors.into();
            }
            if constraint.contains("users_email_key") {
                errors.add("email", "A user with that email already exists.");
                return errors.into();
            }
        }
    }
    err.into()
}
