//! Pagination and filter query-string state.
//!
//! Listing pages (catalog, admin tables, insights) all accept `?page=&per_page=`
//! and answer with a [`Page`]. Pages are 1-based on the wire. Free-text
//! filters go through [`contains_pattern`].

use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait, Select, sea_query::LikeExpr,
};
use serde::{Deserialize, Serialize};

/// Largest page size a client may ask for
pub const MAX_PER_PAGE: u64 = 100;

/// Highest page number served; later pages are clamped to it so the row
/// offset always fits the database's signed 64-bit `OFFSET`
pub const MAX_PAGE: u64 = 1_000_000;

const LIKE_ESCAPE: char = '!';

/// `LIKE` pattern matching `term` anywhere in a column. Wildcards typed by the
/// user match themselves.
#[must_use]
pub fn contains_pattern(term: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

/// Raw `page` / `per_page` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    /// 1-based page number
    pub page: Option<u64>,
    /// Items per page
    pub per_page: Option<u64>,
}

/// A normalised page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    /// 1-based page number, within `1..=MAX_PAGE`
    pub page: u64,
    /// Items per page, within `1..=MAX_PER_PAGE`
    pub per_page: u64,
}

impl PageRequest {
    /// Builds a request, clamping out-of-range values.
    #[must_use]
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.clamp(1, MAX_PAGE),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Builds a request from query parameters, using `default_per_page`
    /// when the client did not specify one.
    #[must_use]
    pub fn from_params(params: PageParams, default_per_page: u64) -> Self {
        Self::new(
            params.page.unwrap_or(1),
            params.per_page.unwrap_or(default_per_page),
        )
    }

    /// Zero-based page index as used by `SeaORM`
    #[must_use]
    pub const fn index(self) -> u64 {
        self.page - 1
    }
}

/// One page of results plus the numbers a pager needs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// 1-based page number
    pub page: u64,
    /// Requested page size
    pub per_page: u64,
    /// Items across all pages
    pub total_items: u64,
    /// Number of pages (0 when there are no items)
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Assembles a page from already-fetched items.
    #[must_use]
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total_items,
            total_pages: total_items.div_ceil(request.per_page),
        }
    }

    /// Whether a later page exists
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Whether an earlier page exists
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    /// Converts every item, keeping the paging numbers.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

/// Runs `select` one page at a time.
pub async fn paginate<C, E>(
    db: &C,
    select: Select<E>,
    request: PageRequest,
) -> Result<Page<E::Model>>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: FromQueryResult + Send + Sync,
{
    let paginator = select.paginate(db, request.per_page);
    let total_items = paginator.num_items().await?;
    let items = paginator.fetch_page(request.index()).await?;
    Ok(Page::new(items, request, total_items))
}
