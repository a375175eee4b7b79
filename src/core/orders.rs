//! Order business logic - history, admin management, downloads, dashboard.
//!
//! Orders are created by [`crate::core::checkout`]; this module reads them and
//! moves them through the rest of their lifecycle.

use crate::{
    core::{
        checkout,
        pagination::{Page, PageRequest, contains_pattern, paginate},
    },
    entities::{
        Order, OrderItem, OrderStatus, Product, RequestStatus, ServiceRequest, User, order,
        order_item, product, service_request, user,
    },
    errors::{Error, Result},
};
use sea_orm::{Condition, Iterable, QueryOrder, QuerySelect, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// An order together with its lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWithItems {
    /// The order
    #[serde(flatten)]
    pub order: order::Model,
    /// Its lines
    pub items: Vec<order_item::Model>,
}

/// Admin order table filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    /// Only orders in this state
    pub status: Option<OrderStatus>,
    /// Email fragment, or an exact order id
    pub q: Option<String>,
}

/// A purchased asset the buyer may download
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadLink {
    /// Product id
    pub product_id: i64,
    /// Product name at purchase time
    pub name: String,
    /// Asset URL
    pub url: String,
}

/// Headline numbers for the admin dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    /// Money received from paid and fulfilled orders, in cents
    pub revenue_cents: i64,
    /// Order count per status
    pub orders_by_status: BTreeMap<String, u64>,
    /// Active products
    pub product_count: u64,
    /// Registered users
    pub user_count: u64,
    /// Service requests not yet completed or cancelled
    pub open_service_requests: u64,
}

/// Whether an order may move from `from` to `to`.
#[must_use]
pub const fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    matches!(
        (from, to),
        (OrderStatus::Pending, OrderStatus::Paid | OrderStatus::Cancelled)
            | (OrderStatus::Paid, OrderStatus::Fulfilled | OrderStatus::Refunded)
            | (OrderStatus::Fulfilled, OrderStatus::Refunded)
    )
}

/// Loads an order and its lines.
///
/// # Errors
/// Returns `NotFound` if the order does not exist.
pub async fn get_order_with_items(db: &DatabaseConnection, order_id: i64) -> Result<OrderWithItems> {
    let order = Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))?;
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await?;
    Ok(OrderWithItems { order, items })
}

/// Loads an order the viewer may see: their own, or any order for an admin.
/// Other people's orders are reported as not found.
pub async fn get_order_for_viewer(
    db: &DatabaseConnection,
    viewer: &user::Model,
    order_id: i64,
) -> Result<OrderWithItems> {
    let full = get_order_with_items(db, order_id).await?;
    if full.order.user_id == Some(viewer.id) || viewer.is_admin() {
        Ok(full)
    } else {
        Err(Error::not_found("Order", order_id))
    }
}

/// A user's orders, newest first.
pub async fn list_orders_for_user(
    db: &DatabaseConnection,
    user_id: i64,
    request: PageRequest,
) -> Result<Page<order::Model>> {
    let select = Order::find()
        .filter(order::Column::UserId.eq(user_id))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id);
    paginate(db, select, request).await
}

/// All orders for the admin table, newest first.
pub async fn list_orders(
    db: &DatabaseConnection,
    filter: &OrderFilter,
    request: PageRequest,
) -> Result<Page<order::Model>> {
    let mut select = Order::find();

    if let Some(status) = filter.status {
        select = select.filter(order::Column::Status.eq(status));
    }
    if let Some(term) = filter.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        let mut condition =
            Condition::any().add(order::Column::Email.like(contains_pattern(term)));
        if let Ok(id) = term.trim_start_matches('#').parse::<i64>() {
            condition = condition.add(order::Column::Id.eq(id));
        }
        select = select.filter(condition);
    }

    let select = select
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id);
    paginate(db, select, request).await
}

/// Loads one order.
///
/// # Errors
/// Returns `NotFound` if the order does not exist.
pub(crate) async fn find_order(db: &DatabaseConnection, order_id: i64) -> Result<order::Model> {
    Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order_id))
}

/// Moves an order from `from` to `to` in one conditional update. Returns
/// false, changing nothing, when the order is no longer in `from`.
pub(crate) async fn transition_status<C>(
    db: &C,
    order_id: i64,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let updated = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(to))
        .col_expr(order::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(from))
        .exec(db)
        .await?;
    Ok(updated.rows_affected > 0)
}

/// Moves an order to a new status if the transition is allowed.
///
/// Marking a pending order paid settles it the same way a completed checkout
/// does, crediting product sales. The write only applies if the status has
/// not changed since it was read.
///
/// # Errors
/// Returns an error if:
/// - The order does not exist
/// - The transition is not allowed (e.g. cancelled → paid), including when
///   another writer moved the order first
/// - The database update fails
pub async fn update_order_status(
    db: &DatabaseConnection,
    order_id: i64,
    status: OrderStatus,
) -> Result<order::Model> {
    let from = find_order(db, order_id).await?.status;
    if !can_transition(from, status) {
        return Err(Error::InvalidTransition {
            from: from.to_string(),
            to: status.to_string(),
        });
    }

    let moved = if status == OrderStatus::Paid {
        checkout::settle_order(db, order_id).await?
    } else {
        transition_status(db, order_id, from, status).await?
    };
    let updated = find_order(db, order_id).await?;
    if !moved {
        warn!(
            order_id,
            %from,
            current = %updated.status,
            to = %status,
            "Order status changed underneath update"
        );
        return Err(Error::InvalidTransition {
            from: updated.status.to_string(),
            to: status.to_string(),
        });
    }

    info!(order_id, %from, to = %status, "Order status changed");
    Ok(updated)
}

/// Whether `user_id` has a paid or fulfilled order containing `product_id`.
pub async fn has_purchased(db: &DatabaseConnection, user_id: i64, product_id: i64) -> Result<bool> {
    let count = OrderItem::find()
        .inner_join(Order)
        .filter(order_item::Column::ProductId.eq(product_id))
        .filter(order::Column::UserId.eq(user_id))
        .filter(order::Column::Status.is_in([OrderStatus::Paid, OrderStatus::Fulfilled]))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Download links for the digital assets in one of the viewer's orders.
///
/// # Errors
/// Returns an error if the order is not the viewer's, or has not been paid.
pub async fn download_links(
    db: &DatabaseConnection,
    viewer: &user::Model,
    order_id: i64,
) -> Result<Vec<DownloadLink>> {
    let full = get_order_for_viewer(db, viewer, order_id).await?;
    if !full.order.status.is_settled() {
        return Err(Error::Forbidden);
    }

    let product_ids: Vec<i64> = full.items.iter().map(|i| i.product_id).collect();
    let products: BTreeMap<i64, product::Model> = Product::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    Ok(full
        .items
        .iter()
        .filter_map(|item| {
            let url = products.get(&item.product_id)?.file_url.clone()?;
            Some(DownloadLink {
                product_id: item.product_id,
                name: item.product_name.clone(),
                url,
            })
        })
        .collect())
}

/// Collects the admin dashboard numbers.
pub async fn dashboard_stats(db: &DatabaseConnection) -> Result<DashboardStats> {
    let settled_totals: Vec<i64> = Order::find()
        .select_only()
        .column(order::Column::TotalCents)
        .filter(order::Column::Status.is_in([OrderStatus::Paid, OrderStatus::Fulfilled]))
        .into_tuple()
        .all(db)
        .await?;

    let mut orders_by_status = BTreeMap::new();
    for status in OrderStatus::iter() {
        let count = Order::find()
            .filter(order::Column::Status.eq(status))
            .count(db)
            .await?;
        orders_by_status.insert(status.to_string(), count);
    }

    let product_count = Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .count(db)
        .await?;
    let user_count = User::find().count(db).await?;
    let open_service_requests = ServiceRequest::find()
        .filter(
            service_request::Column::Status
                .is_in([RequestStatus::New, RequestStatus::InProgress]),
        )
        .count(db)
        .await?;

    Ok(DashboardStats {
        revenue_cents: settled_totals.iter().sum(),
        orders_by_status,
        product_count,
        user_count,
        open_service_requests,
    })
}
