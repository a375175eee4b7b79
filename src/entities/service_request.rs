//! Service request entity - A custom-work enquiry sent from the contact form.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Triage state of a service request
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Not looked at yet
    #[sea_orm(string_value = "new")]
    New,
    /// Someone is working on it
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    /// Done
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Dropped
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Service request database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "service_requests")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Contact name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Requested service, e.g. "Web design"
    pub service: String,
    /// Optional budget as typed by the requester
    pub budget: Option<String>,
    /// Request details
    #[sea_orm(column_type = "Text")]
    pub message: String,
    /// Triage state
    pub status: RequestStatus,
    /// When the request was submitted
    pub created_at: DateTimeUtc,
    /// When the request was last modified
    pub updated_at: DateTimeUtc,
}

/// `ServiceRequest` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
