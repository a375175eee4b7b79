//! OAuth authorization-code flow for Google and GitHub.
//!
//! [`OAuthClient`] builds the provider's consent URL, exchanges the returned
//! code for an access token, and reads the user's profile. The profile is then
//! handed to [`crate::core::auth::oauth_sign_in`].

use crate::{
    config::{secrets::ClientCredentials, settings::OAuthProviderSettings},
    core::auth::OAuthProfile,
    errors::{Error, Result},
};
use reqwest::{Client, header};
use serde::Deserialize;
use std::{fmt, str::FromStr};
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!("digital-market/", env!("CARGO_PKG_VERSION"));

/// Supported OAuth providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Google accounts (OpenID Connect userinfo)
    Google,
    /// GitHub accounts
    Github,
}

impl Provider {
    /// Lowercase name used in routes and account rows
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            other => Err(Error::not_found("OAuth provider", other)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// Client for one provider's authorization-code flow
pub struct OAuthClient {
    client: Client,
    provider: Provider,
    endpoints: OAuthProviderSettings,
    credentials: ClientCredentials,
    redirect_uri: String,
}

impl OAuthClient {
    /// Creates a client; `redirect_uri` must match the one registered with
    /// the provider.
    #[must_use]
    pub fn new(
        provider: Provider,
        endpoints: OAuthProviderSettings,
        credentials: ClientCredentials,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            provider,
            endpoints,
            credentials,
            redirect_uri: redirect_uri.into(),
        }
    }

    /// The provider this client talks to
    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    fn failed(&self) -> Error {
        Error::unauthorized(format!("Sign-in with {} failed", self.provider))
    }

    /// URL of the provider consent page carrying the anti-forgery `state`.
    pub fn authorize_url(&self, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &self.endpoints.authorize_url,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", self.endpoints.scopes.as_str()),
                ("state", state),
            ],
        )
        .map_err(|e| Error::Config {
            message: format!("Invalid authorize URL for {}: {e}", self.provider),
        })?;
        Ok(url.into())
    }

    /// Exchanges an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoints.token_url)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, USER_AGENT)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(provider = %self.provider, status = %response.status(), "Token exchange rejected");
            return Err(self.failed());
        }

        let token: TokenResponse = response.json().await?;
        match (token.access_token, token.error) {
            (Some(access_token), _) => Ok(access_token),
            (None, error) => {
                warn!(provider = %self.provider, ?error, "Token response without access token");
                Err(self.failed())
            }
        }
    }

    async fn get_json<T>(&self, url: &str, access_token: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(provider = %self.provider, status = %response.status(), url, "Profile request rejected");
            return Err(self.failed());
        }
        response.json::<T>().await.map_err(Into::into)
    }

    /// Reads the signed-in user's profile.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<OAuthProfile> {
        match self.provider {
            Provider::Google => {
                let info: GoogleUserInfo =
                    self.get_json(&self.endpoints.userinfo_url, access_token).await?;
                if info.email_verified == Some(false) {
                    return Err(Error::unauthorized("Your Google email is not verified"));
                }
                Ok(OAuthProfile {
                    provider: self.provider.to_string(),
                    provider_account_id: info.sub,
                    email: info.email.unwrap_or_default(),
                    name: info.name,
                    image: info.picture,
                })
            }
            Provider::Github => {
                let user: GithubUser =
                    self.get_json(&self.endpoints.userinfo_url, access_token).await?;
                let email = match user.email {
                    Some(email) => email,
                    None => {
                        debug!("GitHub profile has no public email, reading email list");
                        let emails_url =
                            format!("{}/emails", self.endpoints.userinfo_url.trim_end_matches('/'));
                        let emails: Vec<GithubEmail> =
                            self.get_json(&emails_url, access_token).await?;
                        emails
                            .into_iter()
                            .find(|e| e.primary && e.verified)
                            .map(|e| e.email)
                            .unwrap_or_default()
                    }
                };
                Ok(OAuthProfile {
                    provider: self.provider.to_string(),
                    provider_account_id: user.id.to_string(),
                    email,
                    name: user.name.or(Some(user.login)),
                    image: user.avatar_url,
                })
            }
        }
    }

    /// Runs the code exchange and profile fetch in one go.
    pub async fn profile_from_code(&self, code: &str) -> Result<OAuthProfile> {
        let access_token = self.exchange_code(code).await?;
        self.fetch_profile(&access_token).await
    }
}
