//! User administration - listing, role changes, deletion.

use crate::{
    core::{
        auth::require_admin,
        pagination::{Page, PageRequest, contains_pattern, paginate},
    },
    entities::{Role, User, user},
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use tracing::info;

async fn find_user(db: &DatabaseConnection, user_id: i64) -> Result<user::Model> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("User", user_id))
}

/// Users for the admin table, newest first, optionally matching `search`
/// against email and name.
pub async fn list_users(
    db: &DatabaseConnection,
    search: Option<&str>,
    request: PageRequest,
) -> Result<Page<user::Model>> {
    let mut select = User::find();
    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(user::Column::Email.like(contains_pattern(term)))
                .add(user::Column::Name.like(contains_pattern(term))),
        );
    }
    let select = select
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id);
    paginate(db, select, request).await
}

/// Changes a user's role. Admins cannot demote themselves, so the store
/// always keeps at least the acting admin.
pub async fn set_user_role(
    db: &DatabaseConnection,
    actor: &user::Model,
    user_id: i64,
    role: Role,
) -> Result<user::Model> {
    require_admin(actor)?;
    if actor.id == user_id && role != Role::Admin {
        return Err(Error::validation("You cannot remove your own admin role"));
    }

    let target = find_user(db, user_id).await?;
    if target.role == role {
        return Ok(target);
    }

    let mut active: user::ActiveModel = target.into();
    active.role = Set(role);
    active.updated_at = Set(chrono::Utc::now());
    let updated = active.update(db).await?;

    info!(user_id, actor_id = actor.id, ?role, "User role changed");
    Ok(updated)
}

/// Deletes a user. Their sessions, OAuth links and reviews go with them;
/// their orders stay, detached from the account.
pub async fn delete_user(db: &DatabaseConnection, actor: &user::Model, user_id: i64) -> Result<()> {
    require_admin(actor)?;
    if actor.id == user_id {
        return Err(Error::validation("You cannot delete your own account"));
    }

    let target = find_user(db, user_id).await?;
    target.delete(db).await?;
    info!(user_id, actor_id = actor.id, "User deleted");
    Ok(())
}
