//! Product reviews - only buyers may review, once per product.

use crate::{
    core::{catalog, orders},
    entities::{Review, User, review, user},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use serde::Serialize;
use tracing::info;

/// Longest accepted comment, in characters
pub const MAX_COMMENT_LEN: usize = 1000;

/// A review with its author's display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewView {
    /// The review
    #[serde(flatten)]
    pub review: review::Model,
    /// Author display name
    pub author_name: Option<String>,
}

/// Aggregate rating of a product
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    /// Number of reviews
    pub count: u64,
    /// Mean rating, 0.0 when there are no reviews
    pub average: f64,
}

fn validate_review(rating: i32, comment: &str) -> Result<()> {
    if !(1..=5).contains(&rating) {
        return Err(Error::validation("Rating must be between 1 and 5"));
    }
    let comment = comment.trim();
    if comment.is_empty() {
        return Err(Error::validation("Review comment cannot be empty"));
    }
    if comment.chars().count() > MAX_COMMENT_LEN {
        return Err(Error::validation(format!(
            "Review comment cannot be longer than {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(())
}

/// Creates a review for a product the user has bought.
///
/// # Errors
/// Returns an error if:
/// - The rating is outside 1..=5 or the comment is empty or too long
/// - The product does not exist or is deleted
/// - The user has no paid order containing the product
/// - The user already reviewed the product
pub async fn create_review(
    db: &DatabaseConnection,
    author: &user::Model,
    product_id: i64,
    rating: i32,
    comment: &str,
) -> Result<review::Model> {
    validate_review(rating, comment)?;
    catalog::get_active_product(db, product_id).await?;

    if !orders::has_purchased(db, author.id, product_id).await? {
        return Err(Error::validation(
            "You can only review products you have purchased",
        ));
    }

    let existing = Review::find()
        .filter(review::Column::UserId.eq(author.id))
        .filter(review::Column::ProductId.eq(product_id))
        .count(db)
        .await?;
    if existing > 0 {
        return Err(Error::Conflict {
            message: "You have already reviewed this product".to_string(),
        });
    }

    let created = review::ActiveModel {
        user_id: Set(author.id),
        product_id: Set(product_id),
        rating: Set(rating),
        comment: Set(comment.trim().to_string()),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(review_id = created.id, product_id, rating, "Review created");
    Ok(created)
}

/// Reviews of a product, newest first.
pub async fn list_reviews_for_product(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Vec<ReviewView>> {
    let rows = Review::find()
        .filter(review::Column::ProductId.eq(product_id))
        .find_also_related(User)
        .order_by_desc(review::Column::CreatedAt)
        .order_by_desc(review::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(review, author)| ReviewView {
            review,
            author_name: author.map(|u| u.name),
        })
        .collect())
}

/// Review count and mean rating of a product.
pub async fn rating_summary(db: &DatabaseConnection, product_id: i64) -> Result<RatingSummary> {
    let ratings: Vec<i32> = Review::find()
        .select_only()
        .column(review::Column::Rating)
        .filter(review::Column::ProductId.eq(product_id))
        .into_tuple()
        .all(db)
        .await?;

    let count = u32::try_from(ratings.len())?;
    let average = if count == 0 {
        0.0
    } else {
        f64::from(ratings.iter().sum::<i32>()) / f64::from(count)
    };
    let count = u64::from(count);
    Ok(RatingSummary { count, average })
}

/// Deletes a review. Only its author or an admin may do so.
pub async fn delete_review(
    db: &DatabaseConnection,
    actor: &user::Model,
    review_id: i64,
) -> Result<()> {
    let review = Review::find_by_id(review_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Review", review_id))?;

    if review.user_id != actor.id && !actor.is_admin() {
        return Err(Error::Forbidden);
    }

    review.delete(db).await?;
    info!(review_id, actor_id = actor.id, "Review deleted");
    Ok(())
}
