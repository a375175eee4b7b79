//! Shared test utilities for the marketplace.
//!
//! This module provides helpers for setting up an in-memory database,
//! creating users, products and orders with sensible defaults, and a
//! [`FakeGateway`] standing in for the payment provider.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        catalog::{self, NewProduct},
        payment::{CheckoutRequest, HostedSession, PaymentGateway, SessionStatus},
    },
    entities::{OrderStatus, Role, order, order_item, product, user},
    errors::{Error, Result},
};
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing_subscriber::EnvFilter;

/// Routes test logs through the test harness writer. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

async fn insert_user(db: &DatabaseConnection, email: &str, role: Role) -> Result<user::Model> {
    let now = chrono::Utc::now();
    let name = email.split('@').next().unwrap_or_default().to_string();
    user::ActiveModel {
        email: Set(email.to_string()),
        name: Set(name),
        image: Set(None),
        password_hash: Set(None),
        role: Set(role),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates a regular user named after the local part of `email`, without a
/// password.
pub async fn create_test_user(db: &DatabaseConnection, email: &str) -> Result<user::Model> {
    insert_user(db, email, Role::User).await
}

/// Creates an administrator.
pub async fn create_test_admin(db: &DatabaseConnection, email: &str) -> Result<user::Model> {
    insert_user(db, email, Role::Admin).await
}

/// Creates a test product with sensible defaults.
///
/// # Defaults
/// * category: `"misc"`
/// * price: 1000 cents
/// * no image, no downloadable file
pub async fn create_test_product(db: &DatabaseConnection, name: &str) -> Result<product::Model> {
    create_custom_product(db, name, "misc", 1000).await
}

/// Creates a test product with a custom category and price.
pub async fn create_custom_product(
    db: &DatabaseConnection,
    name: &str,
    category: &str,
    price_cents: i64,
) -> Result<product::Model> {
    catalog::create_product(
        db,
        NewProduct {
            name: name.to_string(),
            description: format!("{name} description"),
            category: category.to_string(),
            price_cents,
            image_url: None,
            file_url: None,
            is_featured: false,
        },
    )
    .await
}

/// Creates a product with a downloadable asset at `file_url`.
pub async fn create_product_with_file(
    db: &DatabaseConnection,
    name: &str,
    file_url: &str,
) -> Result<product::Model> {
    catalog::create_product(
        db,
        NewProduct {
            name: name.to_string(),
            description: String::new(),
            category: "misc".to_string(),
            price_cents: 1500,
            image_url: None,
            file_url: Some(file_url.to_string()),
            is_featured: false,
        },
    )
    .await
}

/// Inserts an order for `buyer` directly in the given status, bypassing
/// checkout. Settled and refunded orders get a `paid_at`.
pub async fn create_test_order(
    db: &DatabaseConnection,
    buyer: &user::Model,
    lines: &[(&product::Model, i32)],
    status: OrderStatus,
) -> Result<order::Model> {
    let now = chrono::Utc::now();
    let total: i64 = lines
        .iter()
        .map(|(p, qty)| p.price_cents * i64::from(*qty))
        .sum();
    let paid = matches!(
        status,
        OrderStatus::Paid | OrderStatus::Fulfilled | OrderStatus::Refunded
    );

    let order = order::ActiveModel {
        user_id: Set(Some(buyer.id)),
        email: Set(buyer.email.clone()),
        status: Set(status),
        total_cents: Set(total),
        currency: Set("usd".to_string()),
        checkout_session_id: Set(None),
        created_at: Set(now),
        paid_at: Set(paid.then_some(now)),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    for (product, quantity) in lines {
        order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(product.id),
            product_name: Set(product.name.clone()),
            unit_price_cents: Set(product.price_cents),
            quantity: Set(*quantity),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(order)
}

#[derive(Default)]
struct FakeState {
    requests: Vec<CheckoutRequest>,
    expected: HashMap<String, i64>,
    paid: HashMap<String, i64>,
}

/// In-memory payment provider. Sessions are named `cs_fake_<order id>` and
/// stay unpaid until [`FakeGateway::mark_paid`] is called.
#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<FakeState>>,
    failing: bool,
}

impl FakeGateway {
    /// A gateway whose every call fails with a payment error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Marks a session paid for the amount it was created with.
    pub fn mark_paid(&self, session_id: &str) {
        let mut state = self.state.lock().unwrap();
        let amount = state.expected.get(session_id).copied().unwrap_or_default();
        state.paid.insert(session_id.to_string(), amount);
    }

    /// Marks a session paid for an arbitrary amount.
    pub fn mark_paid_with_amount(&self, session_id: &str, amount_cents: i64) {
        let mut state = self.state.lock().unwrap();
        state.paid.insert(session_id.to_string(), amount_cents);
    }

    /// Every checkout request received so far.
    pub fn created_requests(&self) -> Vec<CheckoutRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_session(&self, request: &CheckoutRequest) -> Result<HostedSession> {
        if self.failing {
            return Err(Error::Payment {
                message: "fake provider is down".to_string(),
            });
        }
        let id = format!("cs_fake_{}", request.order_id);
        let amount: i64 = request
            .lines
            .iter()
            .map(|l| l.unit_amount_cents * i64::from(l.quantity))
            .sum();

        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        state.expected.insert(id.clone(), amount);
        Ok(HostedSession {
            url: format!("https://pay.test/{id}"),
            id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus> {
        if self.failing {
            return Err(Error::Payment {
                message: "fake provider is down".to_string(),
            });
        }
        let state = self.state.lock().unwrap();
        let Some(expected) = state.expected.get(session_id).copied() else {
            return Err(Error::Payment {
                message: format!("No such checkout session: {session_id}"),
            });
        };
        let paid = state.paid.get(session_id).copied();
        Ok(SessionStatus {
            id: session_id.to_string(),
            paid: paid.is_some(),
            amount_total_cents: Some(paid.unwrap_or(expected)),
        })
    }
}
