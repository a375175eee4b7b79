//! Session extraction and cookie helpers.
//!
//! A session is read from `Authorization: Bearer` first, then the session
//! cookie. Cookies get `Secure` when the store's base URL is https.

use crate::{
    core::auth,
    entities::{session, user},
    errors::{Error, Result},
    web::AppState,
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header, request::Parts},
};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";
/// Name of the cookie carrying the OAuth anti-forgery state
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Value of the cookie `name`, if the request carries it.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Session token from `Authorization: Bearer` or the session cookie.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());
    bearer.or_else(|| cookie_value(headers, SESSION_COOKIE))
}

fn cookie_header(cookie: &str, secure: bool) -> Result<HeaderValue> {
    let cookie = if secure {
        format!("{cookie}; Secure")
    } else {
        cookie.to_string()
    };
    HeaderValue::from_str(&cookie).map_err(|e| Error::validation(format!("Invalid cookie: {e}")))
}

/// `Set-Cookie` value storing a session until it expires.
pub fn session_cookie(session: &session::Model, secure: bool) -> Result<HeaderValue> {
    let max_age = (session.expires_at - chrono::Utc::now()).num_seconds().max(0);
    cookie_header(
        &format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
            session.token
        ),
        secure,
    )
}

/// `Set-Cookie` value removing cookie `name`.
pub fn clear_cookie(name: &str, secure: bool) -> Result<HeaderValue> {
    cookie_header(&format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"), secure)
}

/// Short-lived cookie holding the OAuth `state` between redirect and callback.
pub fn oauth_state_cookie(state: &str, secure: bool) -> Result<HeaderValue> {
    cookie_header(
        &format!("{OAUTH_STATE_COOKIE}={state}; Path=/auth/oauth; HttpOnly; SameSite=Lax; Max-Age=600"),
        secure,
    )
}

/// The signed-in user. Rejects with 401 when there is no valid session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token =
            session_token(&parts.headers).ok_or_else(|| Error::unauthorized("Please sign in"))?;
        auth::resolve_session(&state.db, &token).await.map(Self)
    }
}

/// A signed-in administrator. Rejects with 401 or 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub user::Model);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        auth::require_admin(&user)?;
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_session_token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc123; other=x"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok-9"));
        assert_eq!(session_token(&headers).as_deref(), Some("tok-9"));
    }

    #[test]
    fn test_cookie_value_ignores_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(cookie_value(&headers, SESSION_COOKIE), None);
    }

    #[test]
    fn test_clear_cookie() {
        let value = clear_cookie(SESSION_COOKIE, false).unwrap();
        assert!(value.to_str().unwrap().contains("Max-Age=0"));
        assert!(!value.to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn test_secure_flag_follows_argument() {
        let session = session::Model {
            id: 1,
            user_id: 1,
            token: "tok".to_string(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
            created_at: chrono::Utc::now(),
        };

        let plain = session_cookie(&session, false).unwrap();
        assert!(!plain.to_str().unwrap().contains("Secure"));

        let secure = session_cookie(&session, true).unwrap();
        let secure = secure.to_str().unwrap();
        assert!(secure.starts_with("session=tok;"));
        assert!(secure.ends_with("; Secure"));

        let state = oauth_state_cookie("csrf", true).unwrap();
        assert!(state.to_str().unwrap().ends_with("; Secure"));
        assert!(clear_cookie(OAUTH_STATE_COOKIE, true).unwrap().to_str().unwrap().ends_with("; Secure"));
    }
}
