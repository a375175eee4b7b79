//! Post entity - An article in the insights blog.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Blog post database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Headline
    pub title: String,
    /// URL-safe identifier derived from the title
    #[sea_orm(unique)]
    pub slug: String,
    /// Short summary for listings
    pub excerpt: String,
    /// Article body (markdown)
    #[sea_orm(column_type = "Text")]
    pub body: String,
    /// Cover image from the upload service
    pub cover_image_url: Option<String>,
    /// Visible on the public site
    pub published: bool,
    /// When the post was first published
    pub published_at: Option<DateTimeUtc>,
    /// When the post was created
    pub created_at: DateTimeUtc,
    /// When the post was last modified
    pub updated_at: DateTimeUtc,
}

/// `Post` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
