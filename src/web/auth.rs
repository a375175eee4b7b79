//! Account routes: credentials registration and login, logout, the current
//! user, and the OAuth redirect and callback pair.

use crate::{
    core::{
        auth::{self, SignedIn},
        oauth::Provider,
    },
    entities::user,
    errors::{Error, Result},
    web::{
        AppState,
        extract::{
            CurrentUser, OAUTH_STATE_COOKIE, SESSION_COOKIE, clear_cookie, cookie_value,
            oauth_state_cookie, session_cookie, session_token,
        },
    },
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{AppendHeaders, IntoResponse, Redirect},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Credentials and OAuth sign-in routes, nested under `/auth`
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/oauth/:provider", get(oauth_start))
        .route("/oauth/:provider/callback", get(oauth_callback))
}

#[derive(Debug, Deserialize)]
struct RegisterInput {
    email: String,
    name: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginInput {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct SignedInBody {
    user: user::Model,
    token: String,
}

fn signed_in_response(
    state: &AppState,
    status: StatusCode,
    signed_in: SignedIn,
) -> Result<impl IntoResponse + use<>> {
    let cookie = session_cookie(&signed_in.session, state.settings.store.secure_cookies())?;
    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(SignedInBody {
            user: signed_in.user,
            token: signed_in.session.token,
        }),
    ))
}

async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<impl IntoResponse> {
    let user = auth::register(&state.db, &input.email, &input.name, &input.password).await?;
    let session = auth::create_session(&state.db, &state.settings.auth, user.id).await?;
    signed_in_response(&state, StatusCode::CREATED, SignedIn { user, session })
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<impl IntoResponse> {
    let signed_in = auth::login(&state.db, &state.settings.auth, &input.email, &input.password).await?;
    signed_in_response(&state, StatusCode::OK, signed_in)
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse> {
    if let Some(token) = session_token(&headers) {
        auth::logout(&state.db, &token).await?;
    }
    Ok((
        StatusCode::NO_CONTENT,
        [(
            header::SET_COOKIE,
            clear_cookie(SESSION_COOKIE, state.settings.store.secure_cookies())?,
        )],
    ))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<user::Model> {
    Json(user)
}

async fn oauth_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse> {
    let provider: Provider = provider.parse()?;
    let client = state.oauth.get(provider)?;
    let csrf_state = uuid::Uuid::new_v4().simple().to_string();
    let url = client.authorize_url(&csrf_state)?;
    Ok((
        [(
            header::SET_COOKIE,
            oauth_state_cookie(&csrf_state, state.settings.store.secure_cookies())?,
        )],
        Redirect::to(&url),
    ))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let provider: Provider = provider.parse()?;
    let client = state.oauth.get(provider)?;

    if let Some(error) = query.error {
        warn!(%provider, %error, "Provider refused sign-in");
        return Err(Error::unauthorized(format!("Sign-in with {provider} was cancelled")));
    }
    let expected = cookie_value(&headers, OAUTH_STATE_COOKIE);
    if expected.is_none() || expected != query.state {
        warn!(%provider, "OAuth state mismatch");
        return Err(Error::unauthorized("Sign-in link expired, please try again"));
    }
    let code = query
        .code
        .ok_or_else(|| Error::unauthorized(format!("Sign-in with {provider} failed")))?;

    let profile = client.profile_from_code(&code).await?;
    let signed_in =
        auth::oauth_sign_in(&state.db, &state.settings.store, &state.settings.auth, &profile)
            .await?;
    info!(%provider, user_id = signed_in.user.id, "Signed in with OAuth");

    let secure = state.settings.store.secure_cookies();
    Ok((
        AppendHeaders([
            (header::SET_COOKIE, session_cookie(&signed_in.session, secure)?),
            (header::SET_COOKIE, clear_cookie(OAUTH_STATE_COOKIE, secure)?),
        ]),
        Redirect::to("/"),
    ))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        config::{
            Settings,
            secrets::ClientCredentials,
            settings::{OAuthProviderSettings, StoreSettings},
        },
        core::oauth::OAuthClient,
        web::{OAuthClients, router, test_support::*},
    };
    use axum::{body::Body, http::Request};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_register_login_me_logout() -> Result<()> {
        let (state, _) = test_state().await?;
        let (status, body) = send(
            &state,
            request(
                "POST",
                "/auth/register",
                None,
                Some(json!({ "email": "Ann@Example.com", "name": "Ann", "password": "correct horse" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["email"], "ann@example.com");
        assert!(body["user"].get("password_hash").is_none());

        let (status, body) = send(
            &state,
            request(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": "ann@example.com", "password": "wrong password" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let response = router(state.clone())
            .oneshot(request(
                "POST",
                "/auth/login",
                None,
                Some(json!({ "email": "ann@example.com", "password": "correct horse" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
        let session_pair = cookie.split(';').next().unwrap().to_string();

        let me = Request::get("/auth/me")
            .header(header::COOKIE, &session_pair)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&state, me).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ann");

        let logout = Request::post("/auth/logout")
            .header(header::COOKIE, &session_pair)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, logout).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let me = Request::get("/auth/me")
            .header(header::COOKIE, &session_pair)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, me).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_register_with_admin_email_stays_regular_user() -> Result<()> {
        let (mut state, _) = test_state().await?;
        state.settings = Arc::new(Settings {
            store: StoreSettings {
                admin_emails: vec!["boss@example.com".to_string()],
                ..StoreSettings::default()
            },
            ..Settings::default()
        });

        let (status, body) = send(
            &state,
            request(
                "POST",
                "/auth/register",
                None,
                Some(json!({ "email": "Boss@Example.com", "name": "Mallory", "password": "password1" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["role"], "user");

        let token = body["token"].as_str().unwrap().to_string();
        let (status, _) = send(&state, request("GET", "/admin/stats", Some(&token), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn test_https_store_sets_secure_cookie() -> Result<()> {
        let (mut state, _) = test_state().await?;
        state.settings = Arc::new(Settings {
            store: StoreSettings {
                base_url: "https://shop.example.com".to_string(),
                ..StoreSettings::default()
            },
            ..Settings::default()
        });

        let response = router(state.clone())
            .oneshot(request(
                "POST",
                "/auth/register",
                None,
                Some(json!({ "email": "ann@example.com", "name": "Ann", "password": "password1" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("; Secure"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_not_found() -> Result<()> {
        let (state, _) = test_state().await?;
        let (status, _) = send(&state, request("GET", "/auth/oauth/github", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&state, request("GET", "/auth/oauth/myspace", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_github_oauth_round_trip() -> Result<()> {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/login/oauth/access_token");
                then.status(200)
                    .json_body(json!({ "access_token": "gho_123", "token_type": "bearer" }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/user")
                    .header("authorization", "Bearer gho_123");
                then.status(200).json_body(json!({
                    "id": 42,
                    "login": "octo",
                    "name": "Octo Cat",
                    "email": "octo@example.com",
                    "avatar_url": null
                }));
            })
            .await;

        let (mut state, _) = test_state().await?;
        let client = OAuthClient::new(
            Provider::Github,
            OAuthProviderSettings {
                authorize_url: server.url("/login/oauth/authorize"),
                token_url: server.url("/login/oauth/access_token"),
                userinfo_url: server.url("/user"),
                scopes: "read:user user:email".to_string(),
            },
            ClientCredentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            },
            "http://localhost:3000/auth/oauth/github/callback".to_string(),
        );
        state.oauth = Arc::new(OAuthClients {
            google: None,
            github: Some(client),
        });

        let response = router(state.clone())
            .oneshot(request("GET", "/auth/oauth/github", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.starts_with(&server.url("/login/oauth/authorize")));
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        let state_pair = cookie.split(';').next().unwrap().to_string();
        let csrf = state_pair.trim_start_matches("oauth_state=").to_string();

        let forged = Request::get("/auth/oauth/github/callback?code=abc&state=forged")
            .header(header::COOKIE, &state_pair)
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&state, forged).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let callback = Request::get(format!("/auth/oauth/github/callback?code=abc&state={csrf}"))
            .header(header::COOKIE, &state_pair)
            .body(Body::empty())
            .unwrap();
        let response = router(state.clone()).oneshot(callback).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookies: Vec<_> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("session="));
        assert!(cookies[1].contains("Max-Age=0"));

        let session_pair = cookies[0].split(';').next().unwrap().to_string();
        let me = Request::get("/auth/me")
            .header(header::COOKIE, &session_pair)
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&state, me).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "octo@example.com");
        assert_eq!(body["name"], "Octo Cat");
        Ok(())
    }
}
