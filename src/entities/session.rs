//! Session entity - An opaque login token with an expiry.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Login session
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Random token handed to the client as a cookie or bearer token
    #[sea_orm(unique)]
    pub token: String,
    /// Signed-in user
    pub user_id: i64,
    /// The session is rejected after this instant
    pub expires_at: DateTimeUtc,
    /// When the session was created
    pub created_at: DateTimeUtc,
}

/// Each session belongs to one user
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Signed-in user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
