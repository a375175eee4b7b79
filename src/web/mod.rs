//! HTTP surface: an axum router over the `core` operations.
//!
//! Handlers are thin: they extract input, call into [`crate::core`], and
//! serialise the result. Errors become JSON through
//! [`response`](self::response).

use crate::{
    config::{Secrets, Settings},
    core::{
        oauth::{OAuthClient, Provider},
        payment::{PaymentGateway, StripeGateway, UnconfiguredGateway},
        uploads::{FileStore, HttpFileStore, UnconfiguredFileStore},
    },
    errors::{Error, Result},
};
use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Admin back-office routes
pub mod admin;
/// Registration, login and OAuth routes
pub mod auth;
/// Session extractors and cookie helpers
pub mod extract;
/// Error to HTTP response mapping
pub mod response;
/// Public storefront routes
pub mod storefront;

/// OAuth clients for the providers that have credentials
#[derive(Default)]
pub struct OAuthClients {
    /// Google, if `GOOGLE_CLIENT_ID`/`SECRET` are set
    pub google: Option<OAuthClient>,
    /// GitHub, if `GITHUB_CLIENT_ID`/`SECRET` are set
    pub github: Option<OAuthClient>,
}

impl OAuthClients {
    /// The configured client for `provider`.
    ///
    /// # Errors
    /// Returns `NotFound` when the provider has no credentials.
    pub fn get(&self, provider: Provider) -> Result<&OAuthClient> {
        match provider {
            Provider::Google => self.google.as_ref(),
            Provider::Github => self.github.as_ref(),
        }
        .ok_or_else(|| Error::not_found("OAuth provider", provider))
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
    /// Parsed config.toml
    pub settings: Arc<Settings>,
    /// Payment provider
    pub gateway: Arc<dyn PaymentGateway>,
    /// Upload service
    pub file_store: Arc<dyn FileStore>,
    /// OAuth providers
    pub oauth: Arc<OAuthClients>,
}

impl AppState {
    /// Wires up the external services from settings and secrets. Services
    /// without secrets are replaced by stand-ins that fail when used.
    #[must_use]
    pub fn new(db: DatabaseConnection, settings: Settings, secrets: &Secrets) -> Self {
        let gateway: Arc<dyn PaymentGateway> = match &secrets.stripe_secret_key {
            Some(key) => Arc::new(StripeGateway::new(settings.payment.api_base.clone(), key.clone())),
            None => {
                warn!("STRIPE_SECRET_KEY not set, checkout is disabled");
                Arc::new(UnconfiguredGateway)
            }
        };

        let file_store: Arc<dyn FileStore> = match &secrets.upload_api_key {
            Some(key) => Arc::new(HttpFileStore::new(settings.uploads.endpoint.clone(), key.clone())),
            None => {
                warn!("UPLOAD_API_KEY not set, uploads are disabled");
                Arc::new(UnconfiguredFileStore)
            }
        };

        let base_url = settings.store.base_url.trim_end_matches('/').to_string();
        let client_for = |provider: Provider| {
            let (endpoints, credentials) = match provider {
                Provider::Google => (&settings.oauth.google, &secrets.google),
                Provider::Github => (&settings.oauth.github, &secrets.github),
            };
            credentials.as_ref().map(|credentials| {
                info!(%provider, "OAuth sign-in enabled");
                OAuthClient::new(
                    provider,
                    endpoints.clone(),
                    credentials.clone(),
                    format!("{base_url}/auth/oauth/{provider}/callback"),
                )
            })
        };
        let oauth = OAuthClients {
            google: client_for(Provider::Google),
            github: client_for(Provider::Github),
        };

        Self {
            db: Arc::new(db),
            settings: Arc::new(settings),
            gateway,
            file_store,
            oauth: Arc::new(oauth),
        }
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(storefront::routes())
        .nest("/auth", auth::routes())
        .nest("/admin", admin::routes(&state.settings))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
