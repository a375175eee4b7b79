//! Admin notifications - what happened since an admin last looked.
//!
//! The admin console polls [`notification_summary`] (every
//! `notifications.poll_interval_secs`) and calls [`mark_notifications_seen`]
//! when the feed is opened. The "last seen" marker lives in the key-value
//! `system_state` table.

use crate::{
    entities::{Order, ServiceRequest, SystemState, order, service_request, system_state},
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, prelude::*, sea_query::OnConflict};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// `system_state` key holding the RFC 3339 "last seen" time
pub const SEEN_AT_KEY: &str = "notifications_seen_at";

/// New activity since the marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationSummary {
    /// Orders placed since `since`
    pub new_orders: u64,
    /// Service requests submitted since `since`
    pub new_service_requests: u64,
    /// The marker; `None` means nothing has been seen yet
    pub since: Option<DateTime<Utc>>,
}

impl NotificationSummary {
    /// Sum of all new items, for a badge
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.new_orders + self.new_service_requests
    }
}

/// Retrieves a value from the key-value `system_state` table.
#[instrument(skip(db))]
pub async fn get_state_value(db: &DatabaseConnection, key: &str) -> Result<Option<String>> {
    let value = SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?
        .map(|row| row.value);
    debug!("System state for key '{}': {:?}", key, value);
    Ok(value)
}

/// Sets or replaces a value in the key-value `system_state` table.
#[instrument(skip(db))]
pub async fn set_state_value(db: &DatabaseConnection, key: &str, value: &str) -> Result<()> {
    let row = system_state::ActiveModel {
        key: Set(key.to_string()),
        value: Set(value.to_string()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    SystemState::insert(row)
        .on_conflict(
            OnConflict::column(system_state::Column::Key)
                .update_columns([system_state::Column::Value, system_state::Column::UpdatedAt])
                .to_owned(),
        )
        .exec(db)
        .await?;
    debug!("Set system state: {} = {}", key, value);
    Ok(())
}

async fn seen_at(db: &DatabaseConnection) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = get_state_value(db, SEEN_AT_KEY).await? else {
        return Ok(None);
    };
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(parsed) => Ok(Some(parsed.with_timezone(&Utc))),
        Err(e) => {
            warn!(value = %raw, error = %e, "Ignoring unreadable notification marker");
            Ok(None)
        }
    }
}

/// Counts orders and service requests created after the "last seen" marker,
/// or all of them when no marker exists.
pub async fn notification_summary(db: &DatabaseConnection) -> Result<NotificationSummary> {
    let since = seen_at(db).await?;

    let mut orders = Order::find();
    let mut requests = ServiceRequest::find();
    if let Some(since) = since {
        orders = orders.filter(order::Column::CreatedAt.gt(since));
        requests = requests.filter(service_request::Column::CreatedAt.gt(since));
    }

    Ok(NotificationSummary {
        new_orders: orders.count(db).await?,
        new_service_requests: requests.count(db).await?,
        since,
    })
}

/// Moves the marker to now, returning the new marker.
pub async fn mark_notifications_seen(db: &DatabaseConnection) -> Result<DateTime<Utc>> {
    let now = Utc::now();
    set_state_value(db, SEEN_AT_KEY, &now.to_rfc3339()).await?;
    info!(seen_at = %now, "Notifications marked as seen");
    Ok(now)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::service_requests::{NewServiceRequest, submit_service_request};
    use crate::entities::OrderStatus;
    use crate::test_utils::*;

    fn contact() -> NewServiceRequest {
        NewServiceRequest {
            name: "Ann".to_string(),
            email: "ann@example.com".to_string(),
            service: "Design".to_string(),
            budget: None,
            message: "Hello".to_string(),
        }
    }

    #[tokio::test]
    async fn test_set_and_get_state_value() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(get_state_value(&db, "missing").await?, None);

        set_state_value(&db, "key", "one").await?;
        assert_eq!(get_state_value(&db, "key").await?.as_deref(), Some("one"));

        set_state_value(&db, "key", "two").await?;
        assert_eq!(get_state_value(&db, "key").await?.as_deref(), Some("two"));
        assert_eq!(SystemState::find().count(&db).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_summary_without_marker_counts_everything() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "u@example.com").await?;
        let product = create_test_product(&db, "A").await?;
        create_test_order(&db, &user, &[(&product, 1)], OrderStatus::Paid).await?;
        submit_service_request(&db, contact()).await?;

        let summary = notification_summary(&db).await?;
        assert_eq!(summary.new_orders, 1);
        assert_eq!(summary.new_service_requests, 1);
        assert_eq!(summary.total(), 2);
        assert!(summary.since.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_mark_seen_resets_counts() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "u@example.com").await?;
        let product = create_test_product(&db, "A").await?;
        create_test_order(&db, &user, &[(&product, 1)], OrderStatus::Paid).await?;

        let marker = mark_notifications_seen(&db).await?;
        let summary = notification_summary(&db).await?;
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.since, Some(marker));

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        submit_service_request(&db, contact()).await?;
        let summary = notification_summary(&db).await?;
        assert_eq!(summary.new_orders, 0);
        assert_eq!(summary.new_service_requests, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_marker_is_ignored() -> Result<()> {
        let db = setup_test_db().await?;
        submit_service_request(&db, contact()).await?;
        set_state_value(&db, SEEN_AT_KEY, "yesterday-ish").await?;

        let summary = notification_summary(&db).await?;
        assert!(summary.since.is_none());
        assert_eq!(summary.new_service_requests, 1);
        Ok(())
    }
}
