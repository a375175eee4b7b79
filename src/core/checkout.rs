//! Checkout orchestration.
//!
//! A checkout is three steps: [`create_checkout_session`] writes a pending
//! order and opens a hosted payment page, the buyer pays at the provider,
//! and [`complete_checkout`] confirms the payment with the provider before
//! marking the order paid. Abandoned checkouts go through [`cancel_checkout`].

use crate::{
    config::settings::StoreSettings,
    core::{
        cart::{Cart, price_cart},
        orders,
        payment::{CheckoutLine, CheckoutRequest, PaymentGateway},
    },
    entities::{Order, OrderItem, OrderStatus, Product, order, order_item, product, user},
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Placeholder the provider substitutes with the session id in the success URL
const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// Result of starting a checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutStarted {
    /// The pending (or, for free carts, paid) order
    pub order_id: i64,
    /// Provider session id; `None` for free carts
    pub session_id: Option<String>,
    /// Where to send the buyer next
    pub url: String,
}

fn success_url(store: &StoreSettings) -> String {
    format!(
        "{}/api/checkout/success?session_id={SESSION_ID_PLACEHOLDER}",
        store.base_url.trim_end_matches('/')
    )
}

fn cancel_url(store: &StoreSettings, order_id: i64) -> String {
    format!(
        "{}/api/checkout/cancel?order_id={order_id}",
        store.base_url.trim_end_matches('/')
    )
}

fn order_page_url(store: &StoreSettings, order_id: i64) -> String {
    format!("{}/orders/{order_id}", store.base_url.trim_end_matches('/'))
}

/// Marks a pending order paid and credits product sales, all in one
/// transaction. Returns false if the order was no longer pending.
pub(crate) async fn settle_order(db: &DatabaseConnection, order_id: i64) -> Result<bool> {
    let txn = db.begin().await?;
    let now = chrono::Utc::now();

    let updated = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(OrderStatus::Paid))
        .col_expr(order::Column::PaidAt, Expr::value(Some(now)))
        .col_expr(order::Column::UpdatedAt, Expr::value(now))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(OrderStatus::Pending))
        .exec(&txn)
        .await?;

    if updated.rows_affected == 0 {
        txn.rollback().await?;
        return Ok(false);
    }

    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(&txn)
        .await?;
    for item in items {
        Product::update_many()
            .col_expr(
                product::Column::SalesCount,
                Expr::col(product::Column::SalesCount).add(i64::from(item.quantity)),
            )
            .filter(product::Column::Id.eq(item.product_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;
    Ok(true)
}

/// Starts a checkout for `user`'s cart.
///
/// The cart is priced from the catalog, a pending order with its lines is
/// written in one database transaction, and a hosted session is opened with
/// the provider. If the provider fails the order is cancelled. A cart that
/// costs nothing skips the provider and is paid immediately.
///
/// # Errors
/// Returns an error if:
/// - The cart is empty or references unknown products
/// - The payment provider rejects the session
/// - A database operation fails
#[instrument(skip(db, gateway, store, cart), fields(user_id = user.id))]
pub async fn create_checkout_session(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    store: &StoreSettings,
    user: &user::Model,
    cart: &Cart,
) -> Result<CheckoutStarted> {
    let priced = price_cart(db, cart).await?;
    let now = chrono::Utc::now();

    let txn = db.begin().await?;
    let order = order::ActiveModel {
        user_id: Set(Some(user.id)),
        email: Set(user.email.clone()),
        status: Set(OrderStatus::Pending),
        total_cents: Set(priced.subtotal_cents),
        currency: Set(store.currency.to_ascii_lowercase()),
        checkout_session_id: Set(None),
        created_at: Set(now),
        paid_at: Set(None),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    for line in &priced.lines {
        order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(line.product.id),
            product_name: Set(line.product.name.clone()),
            unit_price_cents: Set(line.unit_price_cents),
            quantity: Set(i32::try_from(line.quantity)?),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    if priced.subtotal_cents == 0 {
        settle_order(db, order.id).await?;
        info!(order_id = order.id, "Free order completed without payment");
        return Ok(CheckoutStarted {
            order_id: order.id,
            session_id: None,
            url: order_page_url(store, order.id),
        });
    }

    let request = CheckoutRequest {
        order_id: order.id,
        customer_email: user.email.clone(),
        currency: store.currency.to_ascii_lowercase(),
        lines: priced
            .lines
            .iter()
            .map(|line| CheckoutLine {
                name: line.product.name.clone(),
                unit_amount_cents: line.unit_price_cents,
                quantity: line.quantity,
            })
            .collect(),
        success_url: success_url(store),
        cancel_url: cancel_url(store, order.id),
    };

    let session = match gateway.create_session(&request).await {
        Ok(session) => session,
        Err(e) => {
            warn!(order_id = order.id, error = %e, "Hosted checkout failed, cancelling order");
            orders::transition_status(db, order.id, OrderStatus::Pending, OrderStatus::Cancelled)
                .await?;
            return Err(e);
        }
    };

    let mut pending: order::ActiveModel = order.into();
    pending.checkout_session_id = Set(Some(session.id.clone()));
    pending.updated_at = Set(chrono::Utc::now());
    let order = pending.update(db).await?;

    info!(order_id = order.id, session_id = %session.id, "Checkout session created");
    Ok(CheckoutStarted {
        order_id: order.id,
        session_id: Some(session.id),
        url: session.url,
    })
}

/// Confirms a hosted checkout after the buyer returns from the provider.
///
/// Calling this again for an already-paid order returns the order unchanged.
///
/// # Errors
/// Returns an error if:
/// - No order carries this session id
/// - The order was cancelled or refunded
/// - The provider reports the session unpaid, or a different amount
/// - A database operation fails
#[instrument(skip(db, gateway))]
pub async fn complete_checkout(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    session_id: &str,
) -> Result<order::Model> {
    let order = Order::find()
        .filter(order::Column::CheckoutSessionId.eq(session_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Checkout session", session_id))?;

    match order.status {
        OrderStatus::Paid | OrderStatus::Fulfilled => return Ok(order),
        OrderStatus::Pending => {}
        other => {
            return Err(Error::InvalidTransition {
                from: other.to_string(),
                to: OrderStatus::Paid.to_string(),
            });
        }
    }

    let status = gateway.retrieve_session(session_id).await?;
    if !status.paid {
        return Err(Error::Payment {
            message: "Payment has not been completed".to_string(),
        });
    }
    if let Some(amount) = status.amount_total_cents {
        if amount != order.total_cents {
            warn!(
                order_id = order.id,
                expected = order.total_cents,
                charged = amount,
                "Charged amount does not match order total"
            );
            return Err(Error::Payment {
                message: "Charged amount does not match the order total".to_string(),
            });
        }
    }

    if settle_order(db, order.id).await? {
        info!(order_id = order.id, "Order paid");
    }

    Order::find_by_id(order.id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Order", order.id))
}

/// Cancels a pending order the buyer walked away from.
///
/// # Errors
/// Returns an error if the order is not the user's, or is no longer pending.
pub async fn cancel_checkout(
    db: &DatabaseConnection,
    user: &user::Model,
    order_id: i64,
) -> Result<order::Model> {
    let order = Order::find_by_id(order_id)
        .one(db)
        .await?
        .filter(|o| o.user_id == Some(user.id))
        .ok_or_else(|| Error::not_found("Order", order_id))?;

    if order.status != OrderStatus::Pending {
        return Err(Error::InvalidTransition {
            from: order.status.to_string(),
            to: OrderStatus::Cancelled.to_string(),
        });
    }

    let cancelled =
        orders::transition_status(db, order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await?;
    let current = orders::find_order(db, order.id).await?;
    if !cancelled {
        return Err(Error::InvalidTransition {
            from: current.status.to_string(),
            to: OrderStatus::Cancelled.to_string(),
        });
    }
    info!(order_id = order.id, "Checkout cancelled");
    Ok(current)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn store() -> StoreSettings {
        StoreSettings {
            base_url: "http://shop.test/".to_string(),
            ..StoreSettings::default()
        }
    }

    #[tokio::test]
    async fn test_create_checkout_session_writes_pending_order() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "buyer@example.com").await?;
        let a = create_custom_product(&db, "A", "misc", 1500).await?;
        let b = create_custom_product(&db, "B", "misc", 500).await?;
        let gateway = FakeGateway::default();

        let mut cart = Cart::new();
        cart.add(a.id, 2);
        cart.add(b.id, 1);

        let started = create_checkout_session(&db, &gateway, &store(), &user, &cart).await?;
        assert_eq!(started.url, format!("https://pay.test/cs_fake_{}", started.order_id));

        let full = orders::get_order_with_items(&db, started.order_id).await?;
        assert_eq!(full.order.status, OrderStatus::Pending);
        assert_eq!(full.order.total_cents, 3500);
        assert_eq!(full.order.email, "buyer@example.com");
        assert_eq!(full.order.checkout_session_id, started.session_id);
        assert_eq!(full.items.len(), 2);

        let sent = gateway.created_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].success_url,
            "http://shop.test/api/checkout/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(
            sent[0].cancel_url,
            format!("http://shop.test/api/checkout/cancel?order_id={}", started.order_id)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_gateway_failure_cancels_order() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "buyer@example.com").await?;
        let product = create_test_product(&db, "A").await?;
        let gateway = FakeGateway::failing();

        let mut cart = Cart::new();
        cart.add(product.id, 1);

        let result = create_checkout_session(&db, &gateway, &store(), &user, &cart).await;
        assert!(matches!(result, Err(Error::Payment { .. })));

        let orders = Order::find().all(&db).await?;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
        Ok(())
    }

    #[tokio::test]
    async fn test_free_cart_is_paid_immediately() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "buyer@example.com").await?;
        let freebie = create_custom_product(&db, "Freebie", "misc", 0).await?;
        let gateway = FakeGateway::default();

        let mut cart = Cart::new();
        cart.add(freebie.id, 1);

        let started = create_checkout_session(&db, &gateway, &store(), &user, &cart).await?;
        assert!(started.session_id.is_none());
        assert!(gateway.created_requests().is_empty());

        let order = Order::find_by_id(started.order_id).one(&db).await?.unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.paid_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_checkout_marks_paid_once() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "buyer@example.com").await?;
        let product = create_custom_product(&db, "A", "misc", 1000).await?;
        let gateway = FakeGateway::default();

        let mut cart = Cart::new();
        cart.add(product.id, 3);
        let started = create_checkout_session(&db, &gateway, &store(), &user, &cart).await?;
        let session_id = started.session_id.unwrap();

        // Not paid yet at the provider
        let result = complete_checkout(&db, &gateway, &session_id).await;
        assert!(matches!(result, Err(Error::Payment { .. })));

        gateway.mark_paid(&session_id);
        let order = complete_checkout(&db, &gateway, &session_id).await?;
        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.paid_at.is_some());

        // Second confirmation is a no-op
        let again = complete_checkout(&db, &gateway, &session_id).await?;
        assert_eq!(again.status, OrderStatus::Paid);

        let product = Product::find_by_id(product.id).one(&db).await?.unwrap();
        assert_eq!(product.sales_count, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_checkout_rejects_amount_mismatch() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "buyer@example.com").await?;
        let product = create_custom_product(&db, "A", "misc", 1000).await?;
        let gateway = FakeGateway::default();

        let mut cart = Cart::new();
        cart.add(product.id, 1);
        let started = create_checkout_session(&db, &gateway, &store(), &user, &cart).await?;
        let session_id = started.session_id.unwrap();
        gateway.mark_paid_with_amount(&session_id, 1);

        let result = complete_checkout(&db, &gateway, &session_id).await;
        assert!(matches!(result, Err(Error::Payment { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_unknown_session() -> Result<()> {
        let db = setup_test_db().await?;
        let gateway = FakeGateway::default();
        let result = complete_checkout(&db, &gateway, "cs_missing").await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_checkout() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "buyer@example.com").await?;
        let other = create_test_user(&db, "other@example.com").await?;
        let product = create_test_product(&db, "A").await?;
        let gateway = FakeGateway::default();

        let mut cart = Cart::new();
        cart.add(product.id, 1);
        let started = create_checkout_session(&db, &gateway, &store(), &user, &cart).await?;

        // Someone else cannot cancel it
        let result = cancel_checkout(&db, &other, started.order_id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        let cancelled = cancel_checkout(&db, &user, started.order_id).await?;
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        // A cancelled order cannot be completed or cancelled again
        let result = cancel_checkout(&db, &user, started.order_id).await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));

        let session_id = started.session_id.unwrap();
        gateway.mark_paid(&session_id);
        let result = complete_checkout(&db, &gateway, &session_id).await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
        Ok(())
    }
}
