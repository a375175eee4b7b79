//! Catalog business logic - products, search, categories.
//!
//! This module provides functions for creating, retrieving, updating, and managing the
//! digital products sold in the store. Storefront reads only ever see active
//! (non-deleted) products; admin writes validate their input before touching the
//! database. Prices are integer cents.

use crate::{
    config::settings::ProductSeed,
    core::{
        pagination::{Page, PageRequest, contains_pattern, paginate},
        slug,
    },
    entities::{Product, product},
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, QuerySelect, Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;

const MAX_NAME_LEN: usize = 120;
/// Highest accepted unit price, in cents
pub const MAX_PRICE_CENTS: i64 = 100_000_000;
const MIN_SUGGESTION_CHARS: usize = 2;

/// Fields of a product being created from the admin console
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    /// Display name
    pub name: String,
    /// Long description
    #[serde(default)]
    pub description: String,
    /// Category
    pub category: String,
    /// Unit price in cents
    pub price_cents: i64,
    /// Thumbnail URL
    #[serde(default)]
    pub image_url: Option<String>,
    /// Downloadable asset URL
    #[serde(default)]
    pub file_url: Option<String>,
    /// Show in the featured strip
    #[serde(default)]
    pub is_featured: bool,
}

/// Partial product update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    /// New name (regenerates the slug)
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category: Option<String>,
    /// New price in cents
    pub price_cents: Option<i64>,
    /// New thumbnail URL
    pub image_url: Option<String>,
    /// New asset URL
    pub file_url: Option<String>,
}

/// Sort order for catalog listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    /// Most recently added first
    #[default]
    Newest,
    /// Cheapest first
    PriceAsc,
    /// Most expensive first
    PriceDesc,
    /// Best sellers first
    Popular,
    /// Alphabetical
    Name,
}

/// Catalog filter as carried in the query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Free-text search over name and description
    pub q: Option<String>,
    /// Exact category
    pub category: Option<String>,
    /// Lowest price in cents, inclusive
    pub min_price: Option<i64>,
    /// Highest price in cents, inclusive
    pub max_price: Option<i64>,
    /// Sort order
    #[serde(default)]
    pub sort: ProductSort,
}

/// A compact search-box suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSuggestion {
    /// Product id
    pub id: i64,
    /// Product name
    pub name: String,
    /// Product slug for linking
    pub slug: String,
    /// Unit price in cents
    pub price_cents: i64,
}

fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn validate_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("Product name cannot be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(Error::validation(format!(
            "Product name cannot be longer than {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_category(category: &str) -> Result<()> {
    if category.trim().is_empty() {
        return Err(Error::validation("Product category cannot be empty"));
    }
    Ok(())
}

fn validate_price(price_cents: i64) -> Result<()> {
    if price_cents < 0 {
        return Err(Error::validation("Price cannot be negative"));
    }
    if price_cents > MAX_PRICE_CENTS {
        return Err(Error::validation(format!(
            "Price cannot exceed {MAX_PRICE_CENTS} cents"
        )));
    }
    Ok(())
}

/// Finds a free slug for `name`, ignoring the product `exclude_id` (used when
/// renaming). Deleted products still own their slug.
async fn unique_slug(db: &DatabaseConnection, name: &str, exclude_id: Option<i64>) -> Result<String> {
    let base = slug::slugify(name);
    let mut attempt = 1;
    loop {
        let candidate = slug::candidate(&base, attempt);
        let existing = Product::find()
            .filter(product::Column::Slug.eq(candidate.as_str()))
            .one(db)
            .await?;
        match existing {
            None => return Ok(candidate),
            Some(p) if Some(p.id) == exclude_id => return Ok(candidate),
            Some(_) => attempt += 1,
        }
    }
}

/// Retrieves a product by id, whether or not it is deleted.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_product_by_id(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves an active product by id, failing with `NotFound` when it is
/// missing or deleted.
pub async fn get_active_product(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<product::Model> {
    match get_product_by_id(db, product_id).await? {
        Some(p) if !p.is_deleted => Ok(p),
        _ => Err(Error::not_found("Product", product_id)),
    }
}

/// Finds an active product by its slug.
pub async fn get_product_by_slug(
    db: &DatabaseConnection,
    slug: &str,
) -> Result<Option<product::Model>> {
    Product::find()
        .filter(product::Column::Slug.eq(slug))
        .filter(product::Column::IsDeleted.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a new product after validating its fields and allocating a slug.
///
/// # Errors
/// Returns an error if:
/// - The name or category is empty, or the name is too long
/// - The price is negative
/// - The database insert operation fails
pub async fn create_product(db: &DatabaseConnection, input: NewProduct) -> Result<product::Model> {
    validate_name(&input.name)?;
    validate_category(&input.category)?;
    validate_price(input.price_cents)?;

    let name = input.name.trim().to_string();
    let slug = unique_slug(db, &name, None).await?;
    let now = chrono::Utc::now();

    let product = product::ActiveModel {
        name: Set(name),
        slug: Set(slug),
        description: Set(input.description.trim().to_string()),
        category: Set(input.category.trim().to_string()),
        price_cents: Set(input.price_cents),
        image_url: Set(input.image_url),
        file_url: Set(input.file_url),
        is_featured: Set(input.is_featured),
        is_deleted: Set(false),
        sales_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created = product.insert(db).await?;
    info!(product_id = created.id, slug = %created.slug, "Product created");
    Ok(created)
}

/// Applies a partial update to an active product.
///
/// # Errors
/// Returns an error if:
/// - Any provided field fails validation
/// - The product does not exist or is deleted
/// - The database update operation fails
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: i64,
    update: ProductUpdate,
) -> Result<product::Model> {
    if let Some(name) = &update.name {
        validate_name(name)?;
    }
    if let Some(category) = &update.category {
        validate_category(category)?;
    }
    if let Some(price) = update.price_cents {
        validate_price(price)?;
    }

    let existing = get_active_product(db, product_id).await?;
    let renamed = update
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| *n != existing.name)
        .map(str::to_string);
    let new_slug = match &renamed {
        Some(name) => Some(unique_slug(db, name, Some(product_id)).await?),
        None => None,
    };

    let mut product: product::ActiveModel = existing.into();
    if let (Some(name), Some(slug)) = (renamed, new_slug) {
        product.name = Set(name);
        product.slug = Set(slug);
    }
    if let Some(description) = update.description {
        product.description = Set(description.trim().to_string());
    }
    if let Some(category) = update.category {
        product.category = Set(category.trim().to_string());
    }
    if let Some(price) = update.price_cents {
        product.price_cents = Set(price);
    }
    if let Some(image_url) = update.image_url {
        product.image_url = Set(Some(image_url));
    }
    if let Some(file_url) = update.file_url {
        product.file_url = Set(Some(file_url));
    }
    product.updated_at = Set(chrono::Utc::now());

    product.update(db).await.map_err(Into::into)
}

/// Marks a product as featured or not.
pub async fn set_featured(
    db: &DatabaseConnection,
    product_id: i64,
    featured: bool,
) -> Result<product::Model> {
    let mut product: product::ActiveModel = get_active_product(db, product_id).await?.into();
    product.is_featured = Set(featured);
    product.updated_at = Set(chrono::Utc::now());
    product.update(db).await.map_err(Into::into)
}

/// Soft deletes a product, preserving order history and reviews.
///
/// # Errors
/// Returns an error if:
/// - The product does not exist or is already deleted
/// - The database update operation fails
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<product::Model> {
    let mut product: product::ActiveModel = get_active_product(db, product_id).await?.into();
    product.is_deleted = Set(true);
    product.is_featured = Set(false);
    product.updated_at = Set(chrono::Utc::now());

    let deleted = product.update(db).await?;
    info!(product_id, "Product soft-deleted");
    Ok(deleted)
}

/// Lists active products matching `filter`, one page at a time.
pub async fn list_products(
    db: &DatabaseConnection,
    filter: &ProductFilter,
    request: PageRequest,
) -> Result<Page<product::Model>> {
    let mut select = Product::find().filter(product::Column::IsDeleted.eq(false));

    if let Some(term) = non_blank(filter.q.as_ref()) {
        select = select.filter(
            Condition::any()
                .add(product::Column::Name.like(contains_pattern(term)))
                .add(product::Column::Description.like(contains_pattern(term))),
        );
    }
    if let Some(category) = non_blank(filter.category.as_ref()) {
        select = select.filter(product::Column::Category.eq(category));
    }
    if let Some(min) = filter.min_price {
        select = select.filter(product::Column::PriceCents.gte(min));
    }
    if let Some(max) = filter.max_price {
        select = select.filter(product::Column::PriceCents.lte(max));
    }

    select = match filter.sort {
        ProductSort::Newest => select
            .order_by_desc(product::Column::CreatedAt)
            .order_by_desc(product::Column::Id),
        ProductSort::PriceAsc => select
            .order_by_asc(product::Column::PriceCents)
            .order_by_asc(product::Column::Id),
        ProductSort::PriceDesc => select
            .order_by_desc(product::Column::PriceCents)
            .order_by_asc(product::Column::Id),
        ProductSort::Popular => select
            .order_by_desc(product::Column::SalesCount)
            .order_by_asc(product::Column::Id),
        ProductSort::Name => select
            .order_by_asc(product::Column::Name)
            .order_by_asc(product::Column::Id),
    };

    paginate(db, select, request).await
}

/// Distinct categories of active products, alphabetical.
pub async fn list_categories(db: &DatabaseConnection) -> Result<Vec<String>> {
    Product::find()
        .select_only()
        .column(product::Column::Category)
        .distinct()
        .filter(product::Column::IsDeleted.eq(false))
        .order_by_asc(product::Column::Category)
        .into_tuple::<String>()
        .all(db)
        .await
        .map_err(Into::into)
}

/// Featured active products, most recently touched first.
pub async fn featured_products(
    db: &DatabaseConnection,
    limit: u64,
) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .filter(product::Column::IsFeatured.eq(true))
        .order_by_desc(product::Column::UpdatedAt)
        .order_by_desc(product::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Suggestions for the search box.
///
/// The client debounces keystrokes; this answers each settled term. Terms
/// shorter than two characters get no suggestions.
pub async fn search_suggestions(
    db: &DatabaseConnection,
    term: &str,
    limit: u64,
) -> Result<Vec<ProductSuggestion>> {
    let term = term.trim();
    if term.chars().count() < MIN_SUGGESTION_CHARS {
        return Ok(Vec::new());
    }

    let products = Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .filter(product::Column::Name.like(contains_pattern(term)))
        .order_by_asc(product::Column::Name)
        .limit(limit)
        .all(db)
        .await?;

    Ok(products
        .into_iter()
        .map(|p| ProductSuggestion {
            id: p.id,
            name: p.name,
            slug: p.slug,
            price_cents: p.price_cents,
        })
        .collect())
}

/// Inserts the configured seed products when the catalog is empty.
///
/// Returns how many products were inserted.
pub async fn seed_products(db: &DatabaseConnection, seeds: &[ProductSeed]) -> Result<usize> {
    if seeds.is_empty() || Product::find().count(db).await? > 0 {
        return Ok(0);
    }

    for seed in seeds {
        create_product(
            db,
            NewProduct {
                name: seed.name.clone(),
                description: seed.description.clone(),
                category: seed.category.clone(),
                price_cents: seed.price_cents,
                image_url: seed.image_url.clone(),
                file_url: seed.file_url.clone(),
                is_featured: seed.featured,
            },
        )
        .await?;
    }

    info!("Seeded {} products", seeds.len());
    Ok(seeds.len())
}
