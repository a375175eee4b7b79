//! Product entity - A digital good listed in the catalog.
//!
//! Prices are stored in cents. Products are soft-deleted so that order
//! history and reviews keep pointing at a real row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product (e.g., "Landing Page Template")
    pub name: String,
    /// URL-safe identifier derived from the name
    #[sea_orm(unique)]
    pub slug: String,
    /// Long-form description
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Catalog category used for filtering
    pub category: String,
    /// Unit price in cents
    pub price_cents: i64,
    /// Public thumbnail URL from the upload service
    pub image_url: Option<String>,
    /// Public URL of the downloadable asset; only revealed to buyers
    #[serde(skip_serializing)]
    pub file_url: Option<String>,
    /// Shown on the storefront landing section
    pub is_featured: bool,
    /// Soft delete flag - if true, product is hidden but data is preserved
    pub is_deleted: bool,
    /// Number of units sold through completed checkouts
    pub sales_count: i64,
    /// When the product was created
    pub created_at: DateTimeUtc,
    /// When the product was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Order lines referencing this product
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    /// Reviews of this product
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
