//! Hosted checkout against the payment provider.
//!
//! The store never sees card data: it creates a hosted checkout session,
//! redirects the buyer to the provider, and later asks the provider whether
//! the session was paid. [`PaymentGateway`] is the seam; [`StripeGateway`]
//! talks to the Stripe Checkout Sessions API.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

/// One line shown on the hosted payment page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLine {
    /// Product name
    pub name: String,
    /// Unit price in cents
    pub unit_amount_cents: i64,
    /// Units
    pub quantity: u32,
}

/// Everything the provider needs to open a hosted checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Local order id, echoed back as the client reference
    pub order_id: i64,
    /// Pre-filled buyer email
    pub customer_email: String,
    /// Lowercase ISO currency
    pub currency: String,
    /// Lines to charge
    pub lines: Vec<CheckoutLine>,
    /// Where the provider sends the buyer after paying
    pub success_url: String,
    /// Where the provider sends the buyer after giving up
    pub cancel_url: String,
}

/// A created hosted checkout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostedSession {
    /// Provider session id
    pub id: String,
    /// Page to redirect the buyer to
    pub url: String,
}

/// Payment state of a hosted checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Provider session id
    pub id: String,
    /// Whether the provider has captured the money
    pub paid: bool,
    /// Amount charged in cents, if reported
    pub amount_total_cents: Option<i64>,
}

/// Operations the store needs from a payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a hosted checkout for `request`.
    async fn create_session(&self, request: &CheckoutRequest) -> Result<HostedSession>;

    /// Looks up the payment state of a session.
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus>;
}

/// Stripe Checkout Sessions client
pub struct StripeGateway {
    client: Client,
    api_base: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
    amount_total: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    /// Creates a client for the API at `api_base` (e.g. `https://api.stripe.com`).
    #[must_use]
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/checkout/sessions", self.api_base)
    }

    /// Flattens a checkout request into Stripe's bracketed form encoding.
    fn form_fields(request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("customer_email".to_string(), request.customer_email.clone()),
            ("client_reference_id".to_string(), request.order_id.to_string()),
            ("metadata[order_id]".to_string(), request.order_id.to_string()),
        ];
        for (i, line) in request.lines.iter().enumerate() {
            let prefix = format!("line_items[{i}]");
            fields.push((
                format!("{prefix}[price_data][currency]"),
                request.currency.clone(),
            ));
            fields.push((
                format!("{prefix}[price_data][product_data][name]"),
                line.name.clone(),
            ));
            fields.push((
                format!("{prefix}[price_data][unit_amount]"),
                line.unit_amount_cents.to_string(),
            ));
            fields.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
        }
        fields
    }

    async fn read_session(response: reqwest::Response) -> Result<StripeSession> {
        let status = response.status();
        if status.is_success() {
            return response.json::<StripeSession>().await.map_err(Into::into);
        }

        let message = response
            .json::<StripeErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error.message)
            .unwrap_or_else(|| format!("provider responded with {status}"));
        warn!(%status, %message, "Payment provider rejected request");
        Err(Error::Payment { message })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(&self, request: &CheckoutRequest) -> Result<HostedSession> {
        debug!(order_id = request.order_id, "Creating hosted checkout session");
        let response = self
            .client
            .post(self.sessions_url())
            .bearer_auth(&self.secret_key)
            .form(&Self::form_fields(request))
            .send()
            .await?;

        let session = Self::read_session(response).await?;
        let url = session.url.ok_or_else(|| Error::Payment {
            message: "Checkout session has no redirect URL".to_string(),
        })?;
        Ok(HostedSession {
            id: session.id,
            url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus> {
        let response = self
            .client
            .get(format!("{}/{session_id}", self.sessions_url()))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let session = Self::read_session(response).await?;
        Ok(SessionStatus {
            id: session.id,
            paid: matches!(
                session.payment_status.as_deref(),
                Some("paid" | "no_payment_required")
            ),
            amount_total_cents: session.amount_total,
        })
    }
}

/// Stand-in used when no `STRIPE_SECRET_KEY` is configured: every call fails
/// with a clear payment error instead of reaching the network.
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn create_session(&self, _request: &CheckoutRequest) -> Result<HostedSession> {
        Err(Error::Payment {
            message: "Payments are not configured".to_string(),
        })
    }

    async fn retrieve_session(&self, _session_id: &str) -> Result<SessionStatus> {
        Err(Error::Payment {
            message: "Payments are not configured".to_string(),
        })
    }
}
