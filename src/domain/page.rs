use serde::Serialize;

/// Fixed number of posts on every listing page.
pub const PAGE_SIZE: i64 = 10;

/// One page of an ordered listing. Pages are 1-indexed; a page past the end
/// is empty rather than an error.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub num_pages: i64,
    pub total: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: i64, total: i64) -> Self {
        let num_pages = num_pages(total);
        Self {
            items,
            page,
            num_pages,
            total,
            has_next: page < num_pages,
            has_previous: page > 1 && num_pages > 0,
        }
    }

    pub fn empty(page: i64) -> Self {
        Self::new(Vec::new(), page, 0)
    }
}

pub fn num_pages(total: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        (total + PAGE_SIZE - 1) / PAGE_SIZE
    }
}

/// Row offset of `page`; pages below 1 are clamped to the first page.
pub fn offset(page: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(PAGE_SIZE)
}
