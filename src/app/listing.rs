//! Paginated post listings.
//!
//! Every listing shares one ordering (`created_at DESC, id DESC`), one page
//! size and one joined select, and only differs in its filter. The count and
//! the rows for a page are read from the same repeatable-read snapshot.

use anyhow::Result;
use sqlx::{Postgres, QueryBuilder};

use crate::app::groups::GroupService;
use crate::app::posts::{post_from_row, POST_SELECT};
use crate::app::users::UserService;
use crate::domain::group::Group;
use crate::domain::page::{self, Page, PAGE_SIZE};
use crate::domain::post::Post;
use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by authors the given user follows.
    FollowedBy(i64),
    /// Case-sensitive substring match on the post text.
    TextContains(String),
    LikedBy(i64),
}

impl PostFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        match self {
            PostFilter::All => {}
            PostFilter::Group(group_id) => {
                builder.push(" WHERE p.group_id = ").push_bind(*group_id);
            }
            PostFilter::Author(author_id) => {
                builder.push(" WHERE p.author_id = ").push_bind(*author_id);
            }
            PostFilter::FollowedBy(viewer_id) => {
                builder
                    .push(" WHERE p.author_id IN (SELECT author_id FROM follows WHERE follower_id = ")
                    .push_bind(*viewer_id)
                    .push(")");
            }
            PostFilter::TextContains(query) => {
                builder
                    .push(" WHERE p.text LIKE ")
                    .push_bind(format!("%{}%", escape_like_pattern(query)))
                    .push(" ESCAPE '\\'");
            }
            PostFilter::LikedBy(user_id) => {
                builder
                    .push(" WHERE EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ")
                    .push_bind(*user_id)
                    .push(")");
            }
        }
    }
}

#[derive(Clone)]
pub struct ListingService {
    db: Db,
}

impl ListingService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list_all(&self, page: i64) -> Result<Page<Post>> {
        self.fetch_page(PostFilter::All, page).await
    }

    /// `None` when the slug does not name a group.
    pub async fn list_by_group(&self, slug: &str, page: i64) -> Result<Option<(Group, Page<Post>)>> {
        let groups = GroupService::new(self.db.clone());
        let Some(group) = groups.get_by_slug(slug).await? else {
            return Ok(None);
        };

        let posts = self.fetch_page(PostFilter::Group(group.id), page).await?;
        Ok(Some((group, posts)))
    }

    /// `None` when no user has this username.
    pub async fn list_by_author(&self, username: &str, page: i64) -> Result<Option<(User, Page<Post>)>> {
        let users = UserService::new(self.db.clone());
        let Some(author) = users.get_by_username(username).await? else {
            return Ok(None);
        };

        let posts = self.fetch_page(PostFilter::Author(author.id), page).await?;
        Ok(Some((author, posts)))
    }

    pub async fn list_followed(&self, viewer_id: i64, page: i64) -> Result<Page<Post>> {
        self.fetch_page(PostFilter::FollowedBy(viewer_id), page).await
    }

    /// An empty query matches nothing rather than everything.
    pub async fn search(&self, query: &str, page: i64) -> Result<Page<Post>> {
        if query.is_empty() {
            return Ok(Page::empty(page));
        }
        self.fetch_page(PostFilter::TextContains(query.to_string()), page)
            .await
    }

    pub async fn list_liked_by(&self, user_id: i64, page: i64) -> Result<Page<Post>> {
        self.fetch_page(PostFilter::LikedBy(user_id), page).await
    }

    pub async fn fetch_page(&self, filter: PostFilter, page: i64) -> Result<Page<Post>> {
        let page = page.max(1);
        let offset = page::offset(page);

        let mut tx = self.db.pool().begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p");
        filter.push_where(&mut count);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;

        if offset >= total {
            tx.commit().await?;
            return Ok(Page::new(Vec::new(), page, total));
        }

        let mut select = QueryBuilder::<Postgres>::new(POST_SELECT);
        filter.push_where(&mut select);
        select
            .push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ")
            .push_bind(PAGE_SIZE)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = select.build().fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let posts = rows.iter().map(post_from_row).collect();
        Ok(Page::new(posts, page, total))
    }
}

fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}
