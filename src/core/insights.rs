//! Insights - the store blog.
//!
//! Admins draft, edit and publish posts; the public site lists only
//! published ones. `published_at` is set the first time a post goes live and
//! kept across unpublish/republish so ordering stays stable.

use crate::{
    core::{
        pagination::{Page, PageRequest, paginate},
        slug,
    },
    entities::{Post, post},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Reading speed used for the "N min read" label
pub const WORDS_PER_MINUTE: usize = 200;

const MAX_TITLE_LEN: usize = 200;

/// Fields of a new post
#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    /// Headline
    pub title: String,
    /// Listing summary
    #[serde(default)]
    pub excerpt: String,
    /// Markdown body
    pub body: String,
    /// Cover image
    #[serde(default)]
    pub cover_image_url: Option<String>,
    /// Publish immediately
    #[serde(default)]
    pub published: bool,
}

/// Partial update of a post; `None` leaves a field as is
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostUpdate {
    /// New headline (regenerates the slug)
    pub title: Option<String>,
    /// New summary
    pub excerpt: Option<String>,
    /// New body
    pub body: Option<String>,
    /// New cover image
    pub cover_image_url: Option<String>,
}

/// Listing entry with its reading time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    /// Post id
    pub id: i64,
    /// Headline
    pub title: String,
    /// URL slug
    pub slug: String,
    /// Summary
    pub excerpt: String,
    /// Cover image
    pub cover_image_url: Option<String>,
    /// First publication time
    pub published_at: Option<DateTimeUtc>,
    /// Estimated minutes to read
    pub reading_minutes: usize,
}

impl From<post::Model> for PostSummary {
    fn from(post: post::Model) -> Self {
        Self {
            reading_minutes: reading_time_minutes(&post.body),
            id: post.id,
            title: post.title,
            slug: post.slug,
            excerpt: post.excerpt,
            cover_image_url: post.cover_image_url,
            published_at: post.published_at,
        }
    }
}

/// Minutes needed to read `body` at [`WORDS_PER_MINUTE`], at least one.
#[must_use]
pub fn reading_time_minutes(body: &str) -> usize {
    let words = body.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1)
}

fn validate_title(title: &str) -> Result<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::validation("Post title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::validation(format!(
            "Post title cannot be longer than {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title)
}

fn validate_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(Error::validation("Post body cannot be empty"));
    }
    Ok(())
}

async fn unique_slug(db: &DatabaseConnection, title: &str, exclude_id: Option<i64>) -> Result<String> {
    let base = slug::slugify(title);
    let mut attempt = 1;
    loop {
        let candidate = slug::candidate(&base, attempt);
        let existing = Post::find()
            .filter(post::Column::Slug.eq(candidate.as_str()))
            .one(db)
            .await?;
        match existing {
            None => return Ok(candidate),
            Some(p) if Some(p.id) == exclude_id => return Ok(candidate),
            Some(_) => attempt += 1,
        }
    }
}

async fn find_post(db: &DatabaseConnection, post_id: i64) -> Result<post::Model> {
    Post::find_by_id(post_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Post", post_id))
}

/// Creates a post with a unique slug.
pub async fn create_post(db: &DatabaseConnection, input: NewPost) -> Result<post::Model> {
    let title = validate_title(&input.title)?.to_string();
    validate_body(&input.body)?;
    let slug = unique_slug(db, &title, None).await?;

    let now = chrono::Utc::now();
    let created = post::ActiveModel {
        title: Set(title),
        slug: Set(slug),
        excerpt: Set(input.excerpt.trim().to_string()),
        body: Set(input.body),
        cover_image_url: Set(input.cover_image_url),
        published: Set(input.published),
        published_at: Set(input.published.then_some(now)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(post_id = created.id, slug = %created.slug, published = created.published, "Post created");
    Ok(created)
}

/// Applies a partial update to a post.
pub async fn update_post(
    db: &DatabaseConnection,
    post_id: i64,
    update: PostUpdate,
) -> Result<post::Model> {
    let existing = find_post(db, post_id).await?;

    let renamed = match update.title.as_deref() {
        Some(title) => {
            let title = validate_title(title)?.to_string();
            (title != existing.title).then_some(title)
        }
        None => None,
    };
    if let Some(body) = update.body.as_deref() {
        validate_body(body)?;
    }
    let new_slug = match &renamed {
        Some(title) => Some(unique_slug(db, title, Some(post_id)).await?),
        None => None,
    };

    let mut active: post::ActiveModel = existing.into();
    if let (Some(title), Some(slug)) = (renamed, new_slug) {
        active.title = Set(title);
        active.slug = Set(slug);
    }
    if let Some(excerpt) = update.excerpt {
        active.excerpt = Set(excerpt.trim().to_string());
    }
    if let Some(body) = update.body {
        active.body = Set(body);
    }
    if let Some(url) = update.cover_image_url {
        active.cover_image_url = Set(Some(url).filter(|u| !u.trim().is_empty()));
    }
    active.updated_at = Set(chrono::Utc::now());

    let updated = active.update(db).await?;
    info!(post_id, "Post updated");
    Ok(updated)
}

/// Publishes or unpublishes a post.
pub async fn set_published(
    db: &DatabaseConnection,
    post_id: i64,
    published: bool,
) -> Result<post::Model> {
    let existing = find_post(db, post_id).await?;
    let first_publication = published && existing.published_at.is_none();

    let now = chrono::Utc::now();
    let mut active: post::ActiveModel = existing.into();
    active.published = Set(published);
    if first_publication {
        active.published_at = Set(Some(now));
    }
    active.updated_at = Set(now);

    let updated = active.update(db).await?;
    info!(post_id, published, "Post visibility changed");
    Ok(updated)
}

/// Permanently deletes a post.
pub async fn delete_post(db: &DatabaseConnection, post_id: i64) -> Result<()> {
    let result = Post::delete_by_id(post_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Post", post_id));
    }
    info!(post_id, "Post deleted");
    Ok(())
}

/// Published posts for the public blog, newest publication first.
pub async fn list_published_posts(
    db: &DatabaseConnection,
    request: PageRequest,
) -> Result<Page<PostSummary>> {
    let select = Post::find()
        .filter(post::Column::Published.eq(true))
        .order_by_desc(post::Column::PublishedAt)
        .order_by_desc(post::Column::Id);
    Ok(paginate(db, select, request).await?.map(PostSummary::from))
}

/// A published post by slug. Drafts are not found.
pub async fn get_published_post_by_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<post::Model> {
    Post::find()
        .filter(post::Column::Slug.eq(slug))
        .filter(post::Column::Published.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Post", slug))
}

/// Every post, drafts included, most recently edited first.
pub async fn list_all_posts(
    db: &DatabaseConnection,
    request: PageRequest,
) -> Result<Page<post::Model>> {
    let select = Post::find()
        .order_by_desc(post::Column::UpdatedAt)
        .order_by_desc(post::Column::Id);
    paginate(db, select, request).await
}
