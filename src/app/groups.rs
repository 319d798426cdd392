use anyhow::Result;
use sqlx::Row;

use crate::domain::group::{is_valid_slug, Group, MAX_TITLE_LEN};
use crate::domain::validation::FieldErrors;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct GroupService {
    db: Db,
}

impl GroupService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Administrative creation; end users never create or edit groups.
    pub async fn create_group(
        &self,
        title: String,
        slug: String,
        description: Option<String>,
    ) -> Result<Group> {
        let title = title.trim().to_string();
        let slug = slug.trim().to_string();

        let mut errors = FieldErrors::new();
        if title.is_empty() {
            errors.add("title", "This field is required.");
        } else if title.chars().count() > MAX_TITLE_LEN {
            errors.add("title", "Ensure this value has at most 200 characters.");
        }
        if !is_valid_slug(&slug) {
            errors.add("slug", "Enter a valid slug.");
        }
        errors.into_result()?;

        let row = sqlx::query(
            "INSERT INTO groups (title, slug, description) VALUES ($1, $2, $3) \
             ON CONFLICT (slug) DO NOTHING \
             RETURNING id, title, slug, description",
        )
        .bind(&title)
        .bind(&slug)
        .bind(description)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Group {
                id: row.get("id"),
                title: row.get("title"),
                slug: row.get("slug"),
                description: row.get("description"),
            }),
            None => {
                let mut errors = FieldErrors::new();
                errors.add("slug", "Group with this slug already exists.");
                Err(errors.into())
            }
        }
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM groups WHERE slug = $1")
            .bind(slug)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| Group {
            id: row.get("id"),
            title: row.get("title"),
            slug: row.get("slug"),
            description: row.get("description"),
        }))
    }

    /// Every group, for the post form's group choices.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query("SELECT id, title, slug, description FROM groups ORDER BY title, id")
            .fetch_all(self.db.pool())
            .await?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            groups.push(Group {
                id: row.get("id"),
                title: row.get("title"),
                slug: row.get("slug"),
                description: row.get("description"),
            });
        }

        Ok(groups)
    }
}
