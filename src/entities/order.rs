//! Order entity - One checkout attempt and its payment state.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an order
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Hosted checkout created, payment not confirmed
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Payment confirmed by the provider
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Delivered / acknowledged by an admin
    #[sea_orm(string_value = "fulfilled")]
    Fulfilled,
    /// Abandoned or cancelled before payment
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Money returned to the buyer
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl OrderStatus {
    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Fulfilled => "fulfilled",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Whether money has been received for the order (and not returned)
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Paid | Self::Fulfilled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier, also used in the invoice number
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Buyer; cleared if the user is deleted
    pub user_id: Option<i64>,
    /// Buyer email at the time of purchase
    pub email: String,
    /// Current lifecycle state
    pub status: OrderStatus,
    /// Sum of all lines in cents
    pub total_cents: i64,
    /// ISO currency code, lowercase
    pub currency: String,
    /// Hosted checkout session id from the payment provider
    pub checkout_session_id: Option<String>,
    /// When the order was created
    pub created_at: DateTimeUtc,
    /// When payment was confirmed
    pub paid_at: Option<DateTimeUtc>,
    /// When the order was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Buyer
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    User,
    /// Lines of the order
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
