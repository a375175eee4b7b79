//! Secrets for external services, read from environment variables.
//!
//! Nothing in here is stored in `config.toml`. Missing secrets are not an
//! error at load time: the integration that needs them reports it when used.

use std::fmt;

/// OAuth client id and secret for one provider.
#[derive(Clone)]
pub struct ClientCredentials {
    /// Public client id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// All secrets the server may need.
#[derive(Clone, Default)]
pub struct Secrets {
    /// `STRIPE_SECRET_KEY`
    pub stripe_secret_key: Option<String>,
    /// `UPLOAD_API_KEY`
    pub upload_api_key: Option<String>,
    /// `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`
    pub google: Option<ClientCredentials>,
    /// `GITHUB_CLIENT_ID` / `GITHUB_CLIENT_SECRET`
    pub github: Option<ClientCredentials>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("stripe_secret_key", &self.stripe_secret_key.is_some())
            .field("upload_api_key", &self.upload_api_key.is_some())
            .field("google", &self.google)
            .field("github", &self.github)
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn credentials(id_var: &str, secret_var: &str) -> Option<ClientCredentials> {
    match (non_empty_var(id_var), non_empty_var(secret_var)) {
        (Some(client_id), Some(client_secret)) => Some(ClientCredentials {
            client_id,
            client_secret,
        }),
        _ => None,
    }
}

impl Secrets {
    /// Reads every secret from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            stripe_secret_key: non_empty_var("STRIPE_SECRET_KEY"),
            upload_api_key: non_empty_var("UPLOAD_API_KEY"),
            google: credentials("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            github: credentials("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
        }
    }
}
