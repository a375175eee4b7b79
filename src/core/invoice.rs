//! Invoices for settled orders, rendered to PDF.
//!
//! [`build_invoice`] snapshots an order into an [`Invoice`];
//! [`render_invoice_pdf`] lays it out on A4 pages with the PDF built-in
//! Helvetica fonts, so no font files are needed at runtime.

use crate::{
    config::settings::StoreSettings,
    core::orders::{OrderWithItems, get_order_with_items},
    entities::OrderStatus,
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::debug;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const LINE_HEIGHT: f32 = 7.0;
const MAX_NAME_CHARS: usize = 48;

/// One invoice line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceLine {
    /// Product name at purchase time
    pub name: String,
    /// Units
    pub quantity: i32,
    /// Unit price in cents
    pub unit_price_cents: i64,
    /// `quantity * unit_price_cents`
    pub total_cents: i64,
}

/// Everything printed on an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    /// `INV-<year>-<order id, 6 digits>`
    pub number: String,
    /// Invoice date (payment time, or order time if unknown)
    pub issued_at: DateTime<Utc>,
    /// Seller
    pub store_name: String,
    /// Seller contact
    pub support_email: String,
    /// Buyer
    pub customer_email: String,
    /// Current order state
    pub status: OrderStatus,
    /// Lowercase ISO currency
    pub currency: String,
    /// Lines
    pub lines: Vec<InvoiceLine>,
    /// Amount charged, in cents
    pub total_cents: i64,
}

/// Invoice number for an order placed or paid at `issued_at`.
#[must_use]
pub fn invoice_number(order_id: i64, issued_at: DateTime<Utc>) -> String {
    format!("INV-{}-{order_id:06}", issued_at.year())
}

/// Whether an order in `status` may be invoiced.
#[must_use]
pub const fn is_invoiceable(status: OrderStatus) -> bool {
    matches!(
        status,
        OrderStatus::Paid | OrderStatus::Fulfilled | OrderStatus::Refunded
    )
}

/// Builds an invoice from an already loaded order.
///
/// # Errors
/// Returns a validation error if the order was never paid.
pub fn invoice_for_order(full: &OrderWithItems, store: &StoreSettings) -> Result<Invoice> {
    let order = &full.order;
    if !is_invoiceable(order.status) {
        return Err(Error::validation(format!(
            "Order #{} has no invoice while it is {}",
            order.id, order.status
        )));
    }

    let issued_at = order.paid_at.unwrap_or(order.created_at);
    let lines = full
        .items
        .iter()
        .map(|item| InvoiceLine {
            name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            total_cents: item.line_total_cents(),
        })
        .collect();

    Ok(Invoice {
        number: invoice_number(order.id, issued_at),
        issued_at,
        store_name: store.name.clone(),
        support_email: store.support_email.clone(),
        customer_email: order.email.clone(),
        status: order.status,
        currency: order.currency.clone(),
        lines,
        total_cents: order.total_cents,
    })
}

/// Loads an order and builds its invoice.
pub async fn build_invoice(
    db: &DatabaseConnection,
    order_id: i64,
    store: &StoreSettings,
) -> Result<Invoice> {
    let full = get_order_with_items(db, order_id).await?;
    invoice_for_order(&full, store)
}

/// Amount as plain ASCII, the built-in fonts have no currency glyphs.
fn pdf_amount(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!(
        "{sign}{} {}.{:02}",
        currency.to_ascii_uppercase(),
        abs / 100,
        abs % 100
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

fn pdf_error(e: impl std::fmt::Display) -> Error {
    Error::Pdf {
        message: e.to_string(),
    }
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn table_header(layer: &PdfLayerReference, fonts: &Fonts, y: f32) {
    layer.use_text("Item", 10.0, Mm(MARGIN), Mm(y), &fonts.bold);
    layer.use_text("Qty", 10.0, Mm(120.0), Mm(y), &fonts.bold);
    layer.use_text("Unit price", 10.0, Mm(135.0), Mm(y), &fonts.bold);
    layer.use_text("Amount", 10.0, Mm(165.0), Mm(y), &fonts.bold);
}

/// Renders an invoice as a PDF document.
///
/// # Errors
/// Returns `Error::Pdf` if the document cannot be assembled.
pub fn render_invoice_pdf(invoice: &Invoice) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Invoice {}", invoice.number),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Layer 1",
    );
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?,
    };
    let mut current = doc.get_page(page).get_layer(layer);

    let mut y = PAGE_HEIGHT - MARGIN;
    current.use_text(&invoice.store_name, 20.0, Mm(MARGIN), Mm(y), &fonts.bold);
    y -= 10.0;
    current.use_text(
        format!("Invoice {}", invoice.number),
        12.0,
        Mm(MARGIN),
        Mm(y),
        &fonts.regular,
    );
    y -= LINE_HEIGHT;
    current.use_text(
        format!("Date: {}", invoice.issued_at.format("%Y-%m-%d")),
        10.0,
        Mm(MARGIN),
        Mm(y),
        &fonts.regular,
    );
    y -= LINE_HEIGHT;
    current.use_text(
        format!("Billed to: {}", invoice.customer_email),
        10.0,
        Mm(MARGIN),
        Mm(y),
        &fonts.regular,
    );
    if invoice.status == OrderStatus::Refunded {
        y -= LINE_HEIGHT;
        current.use_text("REFUNDED", 12.0, Mm(MARGIN), Mm(y), &fonts.bold);
    }

    y -= 2.0 * LINE_HEIGHT;
    table_header(&current, &fonts, y);
    y -= LINE_HEIGHT;

    for line in &invoice.lines {
        if y < MARGIN + 2.0 * LINE_HEIGHT {
            let (next_page, next_layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            current = doc.get_page(next_page).get_layer(next_layer);
            y = PAGE_HEIGHT - MARGIN;
            table_header(&current, &fonts, y);
            y -= LINE_HEIGHT;
        }
        current.use_text(
            truncate(&line.name, MAX_NAME_CHARS),
            10.0,
            Mm(MARGIN),
            Mm(y),
            &fonts.regular,
        );
        current.use_text(line.quantity.to_string(), 10.0, Mm(120.0), Mm(y), &fonts.regular);
        current.use_text(
            pdf_amount(line.unit_price_cents, &invoice.currency),
            10.0,
            Mm(135.0),
            Mm(y),
            &fonts.regular,
        );
        current.use_text(
            pdf_amount(line.total_cents, &invoice.currency),
            10.0,
            Mm(165.0),
            Mm(y),
            &fonts.regular,
        );
        y -= LINE_HEIGHT;
    }

    y -= LINE_HEIGHT;
    current.use_text("Total", 12.0, Mm(135.0), Mm(y), &fonts.bold);
    current.use_text(
        pdf_amount(invoice.total_cents, &invoice.currency),
        12.0,
        Mm(165.0),
        Mm(y),
        &fonts.bold,
    );
    y -= 2.0 * LINE_HEIGHT;
    current.use_text(
        format!("Questions? Contact {}", invoice.support_email),
        9.0,
        Mm(MARGIN),
        Mm(y.max(MARGIN / 2.0)),
        &fonts.regular,
    );

    let bytes = doc.save_to_bytes().map_err(pdf_error)?;
    debug!(number = %invoice.number, size = bytes.len(), "Invoice rendered");
    Ok(bytes)
}
