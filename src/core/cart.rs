//! Shopping cart.
//!
//! The browser keeps the cart in local storage and posts it back; the server
//! never trusts client prices and re-prices every line from the catalog with
//! [`price_cart`] before showing totals or starting a checkout.

use crate::{
    entities::{Product, product},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Most units of a single product one cart line may hold
pub const MAX_QUANTITY: u32 = 10;

/// One cart line as stored on the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product id
    pub product_id: i64,
    /// Units, `1..=MAX_QUANTITY`
    pub quantity: u32,
}

/// Cart contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Lines in insertion order, one per product
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Adds units of a product, merging with an existing line. The line is
    /// capped at [`MAX_QUANTITY`].
    pub fn add(&mut self, product_id: i64, quantity: u32) {
        if quantity == 0 {
            return;
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = item.quantity.saturating_add(quantity).min(MAX_QUANTITY);
        } else {
            self.items.push(CartItem {
                product_id,
                quantity: quantity.min(MAX_QUANTITY),
            });
        }
    }

    /// Sets a line's quantity; zero removes the line.
    pub fn set_quantity(&mut self, product_id: i64, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
            return;
        }
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = quantity.min(MAX_QUANTITY);
        } else {
            self.add(product_id, quantity);
        }
    }

    /// Removes a product's line if present.
    pub fn remove(&mut self, product_id: i64) {
        self.items.retain(|i| i.product_id != product_id);
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Total units across all lines
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Whether the cart has no lines
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Collapses duplicate product lines a client may have sent.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut cart = Self::new();
        for item in &self.items {
            cart.add(item.product_id, item.quantity);
        }
        cart
    }
}

/// A cart line priced from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    /// Product as currently listed
    pub product: product::Model,
    /// Units
    pub quantity: u32,
    /// Catalog unit price in cents
    pub unit_price_cents: i64,
    /// `unit_price_cents * quantity`
    pub line_total_cents: i64,
}

/// A fully priced cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedCart {
    /// Lines in cart order
    pub lines: Vec<PricedLine>,
    /// Sum of line totals in cents
    pub subtotal_cents: i64,
    /// Total units
    pub item_count: u32,
}

fn total_too_large(product_id: i64) -> Error {
    Error::validation(format!("Cart total is too large at product {product_id}"))
}

/// Prices every line of `cart` from the database.
///
/// # Errors
/// Returns an error if:
/// - The cart is empty
/// - A line has a quantity outside `1..=MAX_QUANTITY`
/// - A product is unknown or deleted
/// - A line total or the subtotal does not fit in an `i64`
/// - The database query fails
pub async fn price_cart<C>(db: &C, cart: &Cart) -> Result<PricedCart>
where
    C: ConnectionTrait,
{
    if cart.is_empty() {
        return Err(Error::validation("Your cart is empty"));
    }
    if let Some(bad) = cart
        .items
        .iter()
        .find(|i| i.quantity == 0 || i.quantity > MAX_QUANTITY)
    {
        return Err(Error::validation(format!(
            "Quantity for product {} must be between 1 and {MAX_QUANTITY}",
            bad.product_id
        )));
    }

    let cart = cart.normalized();
    let ids: Vec<i64> = cart.items.iter().map(|i| i.product_id).collect();
    let products: HashMap<i64, product::Model> = Product::find()
        .filter(product::Column::Id.is_in(ids))
        .filter(product::Column::IsDeleted.eq(false))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut lines = Vec::with_capacity(cart.items.len());
    for item in &cart.items {
        let product = products
            .get(&item.product_id)
            .cloned()
            .ok_or_else(|| Error::not_found("Product", item.product_id))?;
        let unit_price_cents = product.price_cents;
        let line_total_cents = unit_price_cents
            .checked_mul(i64::from(item.quantity))
            .ok_or_else(|| total_too_large(product.id))?;
        lines.push(PricedLine {
            product,
            quantity: item.quantity,
            unit_price_cents,
            line_total_cents,
        });
    }

    let mut subtotal_cents: i64 = 0;
    for line in &lines {
        subtotal_cents = subtotal_cents
            .checked_add(line.line_total_cents)
            .ok_or_else(|| total_too_large(line.product.id))?;
    }

    Ok(PricedCart {
        subtotal_cents,
        item_count: cart.item_count(),
        lines,
    })
}
