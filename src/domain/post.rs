use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;

use crate::domain::group::Group;
use crate::domain::user::Author;
use crate::domain::validation::FieldErrors;

/// A post with its author and group already resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    pub image: Option<String>,
    pub video: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub edit_date: Option<OffsetDateTime>,
    pub author: Author,
    pub group: Option<Group>,
}

/// Submitted post form, shared by create and edit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostDraft {
    #[serde(default)]
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
    pub video: Option<String>,
}

pub const MAX_IMAGE_KEY_LEN: usize = 512;

impl PostDraft {
    /// Trims optional fields to `None` when blank and checks field rules.
    /// Group existence is checked by the caller against the store.
    pub fn normalized(mut self) -> Result<Self, FieldErrors> {
        self.image = self.image.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        self.video = self.video.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut errors = FieldErrors::new();
        if self.text.trim().is_empty() {
            errors.add("text", "This field is required.");
        }
        if let Some(image) = &self.image {
            if image.len() > MAX_IMAGE_KEY_LEN {
                errors.add("image", "image reference is too long");
            }
        }
        if let Some(video) = &self.video {
            if !is_http_url(video) {
                errors.add("video", "Enter a valid URL.");
            }
        }
        errors.into_result()?;
        Ok(self)
    }
}

fn is_http_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
        Err(_) => false,
    }
}
