//! Ownership rules for post and comment mutation.
//!
//! Every predicate here is pure. Services evaluate them while holding the
//! row lock of the resource they are about to change, and report the result
//! as an [`Outcome`] so the HTTP layer can decide how a denial looks.

use crate::domain::engagement::Comment;
use crate::domain::post::Post;

/// Result of a guarded mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Applied(T),
    /// The actor does not own the resource; nothing was changed.
    Forbidden,
    NotFound,
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Applied(value) => Outcome::Applied(f(value)),
            Outcome::Forbidden => Outcome::Forbidden,
            Outcome::NotFound => Outcome::NotFound,
        }
    }
}

/// Anything with a single owning author.
pub trait Owned {
    fn author_id(&self) -> i64;
}

impl Owned for Post {
    fn author_id(&self) -> i64 {
        self.author.id
    }
}

impl Owned for Comment {
    fn author_id(&self) -> i64 {
        self.author.id
    }
}

/// Author id of a row locked for update, before the full record is loaded.
#[derive(Debug, Clone, Copy)]
pub struct OwnerRef {
    pub author_id: i64,
}

impl Owned for OwnerRef {
    fn author_id(&self) -> i64 {
        self.author_id
    }
}

pub fn can_edit_post(actor_id: i64, post: &impl Owned) -> bool {
    actor_id == post.author_id()
}

pub fn can_delete_post(actor_id: i64, post: &impl Owned) -> bool {
    can_edit_post(actor_id, post)
}

pub fn can_delete_comment(actor_id: i64, comment: &impl Owned) -> bool {
    actor_id == comment.author_id()
}

pub fn can_create_comment(actor_id: Option<i64>) -> bool {
    actor_id.is_some()
}
