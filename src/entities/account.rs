//! Account entity - Links a user to an OAuth provider identity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// OAuth account link
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// Provider name, e.g. `"google"` or `"github"`
    pub provider: String,
    /// The user's id at the provider
    pub provider_account_id: String,
    /// When the link was created
    pub created_at: DateTimeUtc,
}

/// Each account belongs to one user
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Owning user
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
