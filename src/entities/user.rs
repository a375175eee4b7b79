//! User entity - A shopper or administrator.
//!
//! Users created through OAuth have no password hash; credentials users do.
//! The role decides access to the admin back-office.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Access level of a user
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular shopper
    #[sea_orm(string_value = "user")]
    User,
    /// Back-office administrator
    #[sea_orm(string_value = "admin")]
    Admin,
}

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Login email, stored lowercase
    #[sea_orm(unique)]
    pub email: String,
    /// Display name
    pub name: String,
    /// Avatar URL from the OAuth provider, if any
    pub image: Option<String>,
    /// Argon2 PHC string; `None` for OAuth-only users
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// Access level
    pub role: Role,
    /// When the user signed up
    pub created_at: DateTimeUtc,
    /// When the user was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Whether the user may use the admin back-office
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// OAuth account links
    #[sea_orm(has_many = "super::account::Entity")]
    Accounts,
    /// Active login sessions
    #[sea_orm(has_many = "super::session::Entity")]
    Sessions,
    /// Orders placed by the user
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    /// Reviews written by the user
    #[sea_orm(has_many = "super::review::Entity")]
    Reviews,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
