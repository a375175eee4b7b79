//! Marketplace settings loaded from config.toml
//!
//! Every section has defaults, so an empty file (or a missing section) still
//! produces a usable configuration. The `[[products]]` list seeds the catalog
//! on first run.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Store identity and admin bootstrap
    pub store: StoreSettings,
    /// Catalog listing defaults
    pub catalog: CatalogSettings,
    /// Payment provider endpoint
    pub payment: PaymentSettings,
    /// Upload service endpoint and limits
    pub uploads: UploadSettings,
    /// Admin notification polling
    pub notifications: NotificationSettings,
    /// Session lifetime
    pub auth: AuthSettings,
    /// OAuth provider endpoints
    pub oauth: OAuthSettings,
    /// Products to seed into an empty catalog
    pub products: Vec<ProductSeed>,
}

/// `[store]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Store name shown on pages and invoices
    pub name: String,
    /// Lowercase ISO currency code sent to the payment provider
    pub currency: String,
    /// Public base URL, used to build checkout and OAuth redirect URLs
    pub base_url: String,
    /// Contact address printed on the contact page and invoices
    pub support_email: String,
    /// Emails that receive the admin role once verified by an OAuth provider
    pub admin_emails: Vec<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            name: "Digital Market".to_string(),
            currency: "usd".to_string(),
            base_url: "http://localhost:3000".to_string(),
            support_email: "support@example.com".to_string(),
            admin_emails: Vec::new(),
        }
    }
}

impl StoreSettings {
    /// Whether `email` is configured as an administrator (case-insensitive)
    #[must_use]
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email.trim()))
    }

    /// Whether cookies must carry `Secure`, i.e. the store is served over https
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url
            .trim()
            .get(..8)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
    }
}

/// `[catalog]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Products per listing page when the query string does not say
    pub page_size: u64,
    /// Products in the featured strip
    pub featured_limit: u64,
    /// Maximum suggestions returned for the search box
    pub suggestion_limit: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            page_size: 12,
            featured_limit: 6,
            suggestion_limit: 5,
        }
    }
}

/// `[payment]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    /// Base URL of the payment provider API
    pub api_base: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.stripe.com".to_string(),
        }
    }
}

/// `[uploads]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Upload service endpoint receiving file bodies
    pub endpoint: String,
    /// Largest accepted image, in bytes
    pub max_image_bytes: u64,
    /// Largest accepted downloadable asset, in bytes
    pub max_asset_bytes: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://uploads.example.com/v1/files".to_string(),
            max_image_bytes: 4 * 1024 * 1024,
            max_asset_bytes: 64 * 1024 * 1024,
        }
    }
}

/// `[notifications]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// How often the admin console should poll for new activity
    pub poll_interval_secs: u64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 120,
        }
    }
}

/// `[auth]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Lifetime of a login session
    pub session_ttl_hours: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24 * 30,
        }
    }
}

/// Endpoints of one OAuth provider
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProviderSettings {
    /// Where the browser is sent to grant access
    pub authorize_url: String,
    /// Code-for-token exchange endpoint
    pub token_url: String,
    /// Profile endpoint queried with the access token
    pub userinfo_url: String,
    /// Space-separated scopes
    pub scopes: String,
}

/// `[oauth]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    /// `[oauth.google]`
    pub google: OAuthProviderSettings,
    /// `[oauth.github]`
    pub github: OAuthProviderSettings,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            google: OAuthProviderSettings {
                authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
                scopes: "openid email profile".to_string(),
            },
            github: OAuthProviderSettings {
                authorize_url: "https://github.com/login/oauth/authorize".to_string(),
                token_url: "https://github.com/login/oauth/access_token".to_string(),
                userinfo_url: "https://api.github.com/user".to_string(),
                scopes: "read:user user:email".to_string(),
            },
        }
    }
}

/// A product to insert when the catalog is empty
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSeed {
    /// Product name
    pub name: String,
    /// Description
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
    pub featured: bool,
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A field has the wrong type
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    debug!("Loading configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_settings(&contents)
}

/// Parses settings from TOML text
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from `MARKET_CONFIG`, or ./config.toml. A missing file at
/// the default location yields the built-in defaults.
pub fn load_default_settings() -> Result<Settings> {
    match std::env::var("MARKET_CONFIG") {
        Ok(path) => load_settings(path),
        Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => load_settings(DEFAULT_CONFIG_PATH),
        Err(_) => {
            tracing::warn!("No {DEFAULT_CONFIG_PATH} found, using built-in defaults");
            Ok(Settings::default())
        }
    }
}
