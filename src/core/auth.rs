//! Authentication - credentials, OAuth sign-in, and sessions.
//!
//! Passwords are hashed with Argon2. A successful sign-in (either way) creates
//! a [`session`] row whose random token the client sends back as a cookie or
//! bearer token. OAuth identities are linked to users through [`account`] rows.

use crate::{
    config::settings::{AuthSettings, StoreSettings},
    entities::{Account, Role, Session, User, account, session, user},
    errors::{Error, Result},
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{Set, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Shortest accepted password
pub const MIN_PASSWORD_LEN: usize = 8;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// A profile returned by an OAuth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthProfile {
    /// Provider name, e.g. `"google"`
    pub provider: String,
    /// Stable user id at the provider
    pub provider_account_id: String,
    /// Verified email
    pub email: String,
    /// Display name, if the provider has one
    pub name: Option<String>,
    /// Avatar URL
    pub image: Option<String>,
}

/// A signed-in user and their fresh session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    /// The user
    pub user: user::Model,
    /// The new session
    pub session: session::Model,
}

/// Normalises an email for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Cheap shape check: one `@`, something before it, a dot after it.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Hashes a password into an Argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Config {
            message: format!("Password hashing failed: {e}"),
        })
}

/// Checks a password against a stored PHC string.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn new_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

async fn find_user_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a session for `user_id` valid for the configured lifetime.
pub async fn create_session(
    db: &DatabaseConnection,
    auth: &AuthSettings,
    user_id: i64,
) -> Result<session::Model> {
    let now = chrono::Utc::now();
    session::ActiveModel {
        token: Set(new_token()),
        user_id: Set(user_id),
        expires_at: Set(now + chrono::Duration::hours(auth.session_ttl_hours)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Resolves a session token to its user.
///
/// Expired sessions are deleted on sight.
///
/// # Errors
/// Returns `Unauthorized` if the token is unknown or expired.
pub async fn resolve_session(db: &DatabaseConnection, token: &str) -> Result<user::Model> {
    let found = Session::find()
        .filter(session::Column::Token.eq(token))
        .find_also_related(User)
        .one(db)
        .await?;

    let Some((session, Some(user))) = found else {
        return Err(Error::unauthorized("Please sign in"));
    };

    if session.expires_at <= chrono::Utc::now() {
        debug!(session_id = session.id, "Removing expired session");
        session.delete(db).await?;
        return Err(Error::unauthorized("Your session has expired, please sign in again"));
    }

    Ok(user)
}

/// Ends a session. Unknown tokens are ignored.
pub async fn logout(db: &DatabaseConnection, token: &str) -> Result<()> {
    Session::delete_many()
        .filter(session::Column::Token.eq(token))
        .exec(db)
        .await?;
    Ok(())
}

/// Registers a credentials user.
///
/// Always creates a regular user; admin emails are only promoted through
/// [`oauth_sign_in`].
///
/// # Errors
/// Returns an error if:
/// - The email is malformed or the name is empty
/// - The password is shorter than [`MIN_PASSWORD_LEN`]
/// - The email is already registered
/// - The database insert fails
#[instrument(skip(db, password))]
pub async fn register(
    db: &DatabaseConnection,
    email: &str,
    name: &str,
    password: &str,
) -> Result<user::Model> {
    if !is_valid_email(email) {
        return Err(Error::validation("Please enter a valid email address"));
    }
    if name.trim().is_empty() {
        return Err(Error::validation("Name cannot be empty"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if find_user_by_email(db, email).await?.is_some() {
        return Err(Error::Conflict {
            message: "An account with this email already exists".to_string(),
        });
    }

    let now = chrono::Utc::now();
    let created = user::ActiveModel {
        email: Set(normalize_email(email)),
        name: Set(name.trim().to_string()),
        image: Set(None),
        password_hash: Set(Some(hash_password(password)?)),
        role: Set(Role::User),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(user_id = created.id, "User registered");
    Ok(created)
}

/// Signs in with email and password.
///
/// Unknown emails, OAuth-only users and wrong passwords all produce the same
/// error so the response does not reveal which emails exist.
#[instrument(skip(db, auth, password))]
pub async fn login(
    db: &DatabaseConnection,
    auth: &AuthSettings,
    email: &str,
    password: &str,
) -> Result<SignedIn> {
    let user = find_user_by_email(db, email)
        .await?
        .ok_or_else(|| Error::unauthorized(INVALID_CREDENTIALS))?;

    let verified = user
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(password, hash));
    if !verified {
        warn!(user_id = user.id, "Failed login attempt");
        return Err(Error::unauthorized(INVALID_CREDENTIALS));
    }

    let session = create_session(db, auth, user.id).await?;
    Ok(SignedIn { user, session })
}

/// Signs in with an OAuth profile.
///
/// An existing link for the provider identity wins. Otherwise a user with the
/// same email gets the identity linked, and failing that a new user is
/// created. Linking to a password account drops the password and its
/// sessions.
#[instrument(skip(db, store, auth), fields(provider = %profile.provider))]
pub async fn oauth_sign_in(
    db: &DatabaseConnection,
    store: &StoreSettings,
    auth: &AuthSettings,
    profile: &OAuthProfile,
) -> Result<SignedIn> {
    if !is_valid_email(&profile.email) {
        return Err(Error::unauthorized(
            "Your provider did not share a usable email address",
        ));
    }

    let linked = Account::find()
        .filter(account::Column::Provider.eq(profile.provider.as_str()))
        .filter(account::Column::ProviderAccountId.eq(profile.provider_account_id.as_str()))
        .find_also_related(User)
        .one(db)
        .await?;

    let user = if let Some((_, Some(user))) = linked {
        user
    } else {
        let user = match find_user_by_email(db, &profile.email).await? {
            Some(existing) => claim_existing_user(db, store, existing).await?,
            None => {
                let email = normalize_email(&profile.email);
                let now = chrono::Utc::now();
                let name = profile
                    .name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
                let role = if store.is_admin_email(&email) {
                    Role::Admin
                } else {
                    Role::User
                };
                let created = user::ActiveModel {
                    email: Set(email),
                    name: Set(name),
                    image: Set(profile.image.clone()),
                    password_hash: Set(None),
                    role: Set(role),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(db)
                .await?;
                info!(user_id = created.id, "User created from OAuth profile");
                created
            }
        };

        account::ActiveModel {
            user_id: Set(user.id),
            provider: Set(profile.provider.clone()),
            provider_account_id: Set(profile.provider_account_id.clone()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        user
    };

    let session = create_session(db, auth, user.id).await?;
    Ok(SignedIn { user, session })
}

/// Hands an existing account to the owner of the provider-verified email.
///
/// Clears any password and open sessions, and promotes admin emails.
async fn claim_existing_user(
    db: &DatabaseConnection,
    store: &StoreSettings,
    existing: user::Model,
) -> Result<user::Model> {
    let had_password = existing.password_hash.is_some();
    let promote = existing.role == Role::User && store.is_admin_email(&existing.email);
    if !had_password && !promote {
        return Ok(existing);
    }

    let user_id = existing.id;
    if had_password {
        let removed = Session::delete_many()
            .filter(session::Column::UserId.eq(user_id))
            .exec(db)
            .await?;
        warn!(
            user_id,
            sessions = removed.rows_affected,
            "Password account claimed through OAuth, password and sessions revoked"
        );
    }

    let mut active: user::ActiveModel = existing.into();
    active.password_hash = Set(None);
    if promote {
        active.role = Set(Role::Admin);
    }
    active.updated_at = Set(chrono::Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Fails with `Forbidden` unless the user is an administrator.
pub fn require_admin(user: &user::Model) -> Result<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}
