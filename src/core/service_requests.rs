//! Service requests - custom-work enquiries from the contact form, triaged in
//! the admin console.

use crate::{
    core::{
        auth::is_valid_email,
        pagination::{Page, PageRequest, contains_pattern, paginate},
    },
    entities::{RequestStatus, ServiceRequest, service_request},
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::info;

/// Longest accepted message, in characters
pub const MAX_MESSAGE_LEN: usize = 5000;

/// Contact form submission
#[derive(Debug, Clone, Deserialize)]
pub struct NewServiceRequest {
    /// Contact name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Requested service
    pub service: String,
    /// Optional budget, free text
    #[serde(default)]
    pub budget: Option<String>,
    /// Request details
    pub message: String,
}

/// Admin table filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceRequestFilter {
    /// Only requests in this state
    pub status: Option<RequestStatus>,
    /// Matches name, email or service
    pub q: Option<String>,
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

/// Stores a contact form submission with status `new`.
///
/// # Errors
/// Returns a validation error if name, email, service or message is blank,
/// the email is malformed, or the message is too long.
pub async fn submit_service_request(
    db: &DatabaseConnection,
    input: NewServiceRequest,
) -> Result<service_request::Model> {
    let name = required(&input.name, "Name")?;
    let email = required(&input.email, "Email")?;
    let service = required(&input.service, "Service")?;
    let message = required(&input.message, "Message")?;

    if !is_valid_email(email) {
        return Err(Error::validation("Please enter a valid email address"));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(Error::validation(format!(
            "Message cannot be longer than {MAX_MESSAGE_LEN} characters"
        )));
    }

    let now = chrono::Utc::now();
    let created = service_request::ActiveModel {
        name: Set(name.to_string()),
        email: Set(email.to_ascii_lowercase()),
        service: Set(service.to_string()),
        budget: Set(input
            .budget
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())),
        message: Set(message.to_string()),
        status: Set(RequestStatus::New),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(request_id = created.id, service = %created.service, "Service request submitted");
    Ok(created)
}

/// Service requests for the admin table, newest first.
pub async fn list_service_requests(
    db: &DatabaseConnection,
    filter: &ServiceRequestFilter,
    request: PageRequest,
) -> Result<Page<service_request::Model>> {
    let mut select = ServiceRequest::find();
    if let Some(status) = filter.status {
        select = select.filter(service_request::Column::Status.eq(status));
    }
    if let Some(term) = filter.q.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(service_request::Column::Name.like(contains_pattern(term)))
                .add(service_request::Column::Email.like(contains_pattern(term)))
                .add(service_request::Column::Service.like(contains_pattern(term))),
        );
    }
    let select = select
        .order_by_desc(service_request::Column::CreatedAt)
        .order_by_desc(service_request::Column::Id);
    paginate(db, select, request).await
}

/// Sets the triage state of a request.
pub async fn update_service_request_status(
    db: &DatabaseConnection,
    request_id: i64,
    status: RequestStatus,
) -> Result<service_request::Model> {
    let existing = ServiceRequest::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Service request", request_id))?;

    let mut active: service_request::ActiveModel = existing.into();
    active.status = Set(status);
    active.updated_at = Set(chrono::Utc::now());
    let updated = active.update(db).await?;

    info!(request_id, %status, "Service request status changed");
    Ok(updated)
}

/// Permanently removes a request.
pub async fn delete_service_request(db: &DatabaseConnection, request_id: i64) -> Result<()> {
    let result = ServiceRequest::delete_by_id(request_id).exec(db).await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Service request", request_id));
    }
    info!(request_id, "Service request deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_db;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn submission(name: &str, email: &str, service: &str) -> NewServiceRequest {
        NewServiceRequest {
            name: name.to_string(),
            email: email.to_string(),
            service: service.to_string(),
            budget: None,
            message: "We need a new landing page.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = submit_service_request(&db, submission("", "a@b.co", "Design")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = submit_service_request(&db, submission("Ann", "not-an-email", "Design")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = submit_service_request(&db, submission("Ann", "a@b.co", "  ")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let mut long = submission("Ann", "a@b.co", "Design");
        long.message = "x".repeat(MAX_MESSAGE_LEN + 1);
        let result = submit_service_request(&db, long).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_and_list() -> Result<()> {
        let db = setup_test_db().await?;
        let mut first = submission(" Ann ", "Ann@Example.com", "Web design");
        first.budget = Some("  ".to_string());
        let first = submit_service_request(&db, first).await?;
        assert_eq!(first.name, "Ann");
        assert_eq!(first.email, "ann@example.com");
        assert_eq!(first.budget, None);
        assert_eq!(first.status, RequestStatus::New);

        let second =
            submit_service_request(&db, submission("Bob", "bob@example.com", "Branding")).await?;

        let all = list_service_requests(&db, &ServiceRequestFilter::default(), PageRequest::new(1, 10))
            .await?;
        let ids: Vec<_> = all.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let search = ServiceRequestFilter {
            status: None,
            q: Some("brand".to_string()),
        };
        let found = list_service_requests(&db, &search, PageRequest::new(1, 10)).await?;
        assert_eq!(found.total_items, 1);
        assert_eq!(found.items[0].id, second.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_status_filter_and_update() -> Result<()> {
        let db = setup_test_db().await?;
        let request =
            submit_service_request(&db, submission("Ann", "ann@example.com", "Design")).await?;
        submit_service_request(&db, submission("Bob", "bob@example.com", "Design")).await?;

        let updated =
            update_service_request_status(&db, request.id, RequestStatus::InProgress).await?;
        assert_eq!(updated.status, RequestStatus::InProgress);

        let in_progress = ServiceRequestFilter {
            status: Some(RequestStatus::InProgress),
            q: None,
        };
        let page = list_service_requests(&db, &in_progress, PageRequest::new(1, 10)).await?;
        assert_eq!(page.total_items, 1);

        let result = update_service_request_status(&db, 999, RequestStatus::Completed).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_service_request() -> Result<()> {
        let db = setup_test_db().await?;
        let request =
            submit_service_request(&db, submission("Ann", "ann@example.com", "Design")).await?;

        delete_service_request(&db, request.id).await?;
        let result = delete_service_request(&db, request.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }
}
