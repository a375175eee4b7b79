//! Admin back-office routes, nested under `/admin`.
//!
//! Every handler takes an [`AdminUser`](super::extract::AdminUser), so
//! non-admins get 403 before any work is done.

use crate::{
    config::Settings,
    core::{
        catalog::{self, NewProduct, ProductFilter, ProductSort, ProductUpdate},
        insights::{self, NewPost, PostUpdate},
        notifications::{self, NotificationSummary},
        orders::{self, DashboardStats, OrderFilter, OrderWithItems},
        pagination::{Page, PageParams, PageRequest},
        service_requests::{self, ServiceRequestFilter},
        uploads::{UploadKind, UploadRequest, UploadedFile, validate_upload},
        users,
    },
    entities::{OrderStatus, PostModel, RequestStatus, Role, order, product, service_request, user},
    errors::Result,
    web::{AppState, extract::AdminUser},
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

const ADMIN_PER_PAGE: u64 = 20;

/// Back-office routes, nested under `/admin`. Every handler requires an
/// administrator session.
pub fn routes(settings: &Settings) -> Router<AppState> {
    let upload_limit = usize::try_from(settings.uploads.max_asset_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route("/stats", get(stats))
        .route("/notifications", get(notification_summary))
        .route("/notifications/seen", post(notifications_seen))
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", patch(update_product).delete(delete_product))
        .route("/products/:id/featured", post(set_featured))
        .route(
            "/uploads",
            post(upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(order_detail))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/users", get(list_users))
        .route("/users/:id", axum::routing::delete(delete_user))
        .route("/users/:id/role", patch(set_role))
        .route("/service-requests", get(list_service_requests))
        .route(
            "/service-requests/:id",
            axum::routing::delete(delete_service_request),
        )
        .route("/service-requests/:id/status", patch(update_request_status))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/:id", patch(update_post).delete(delete_post))
        .route("/posts/:id/publish", post(publish_post))
}

fn page_request(page: Option<u64>, per_page: Option<u64>) -> PageRequest {
    PageRequest::from_params(PageParams { page, per_page }, ADMIN_PER_PAGE)
}

async fn stats(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<DashboardStats>> {
    orders::dashboard_stats(&state.db).await.map(Json)
}

#[derive(Debug, Serialize)]
struct NotificationsBody {
    #[serde(flatten)]
    summary: NotificationSummary,
    total: u64,
    poll_interval_secs: u64,
}

async fn notification_summary(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<NotificationsBody>> {
    let summary = notifications::notification_summary(&state.db).await?;
    Ok(Json(NotificationsBody {
        total: summary.total(),
        summary,
        poll_interval_secs: state.settings.notifications.poll_interval_secs,
    }))
}

#[derive(Debug, Serialize)]
struct SeenBody {
    seen_at: DateTime<Utc>,
}

async fn notifications_seen(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<SeenBody>> {
    let seen_at = notifications::mark_notifications_seen(&state.db).await?;
    Ok(Json(SeenBody { seen_at }))
}

/// Product as the back-office sees it, asset URL included
#[derive(Debug, Serialize)]
struct AdminProduct {
    #[serde(flatten)]
    product: product::Model,
    file_url: Option<String>,
}

impl From<product::Model> for AdminProduct {
    fn from(product: product::Model) -> Self {
        Self {
            file_url: product.file_url.clone(),
            product,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AdminProductQuery {
    q: Option<String>,
    category: Option<String>,
    sort: Option<ProductSort>,
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn list_products(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminProductQuery>,
) -> Result<Json<Page<AdminProduct>>> {
    let filter = ProductFilter {
        q: query.q,
        category: query.category,
        sort: query.sort.unwrap_or_default(),
        ..ProductFilter::default()
    };
    let page = catalog::list_products(&state.db, &filter, page_request(query.page, query.per_page))
        .await?;
    Ok(Json(page.map(AdminProduct::from)))
}

async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(input): Json<NewProduct>,
) -> Result<(StatusCode, Json<AdminProduct>)> {
    let created = catalog::create_product(&state.db, input).await?;
    info!(admin_id = admin.id, product_id = created.id, "Product created from admin");
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(product_id): Path<i64>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<AdminProduct>> {
    let updated = catalog::update_product(&state.db, product_id, update).await?;
    Ok(Json(updated.into()))
}

async fn delete_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(product_id): Path<i64>,
) -> Result<StatusCode> {
    catalog::delete_product(&state.db, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct FeaturedInput {
    featured: bool,
}

async fn set_featured(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(product_id): Path<i64>,
    Json(input): Json<FeaturedInput>,
) -> Result<Json<AdminProduct>> {
    let updated = catalog::set_featured(&state.db, product_id, input.featured).await?;
    Ok(Json(updated.into()))
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    kind: UploadKind,
    file_name: String,
}

/// Raw request body upload; the file name and purpose travel in the query
/// string and the type in `Content-Type`.
async fn upload(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadedFile>)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let size = u64::try_from(body.len())?;
    validate_upload(query.kind, &content_type, size, &state.settings.uploads)?;

    let stored = state
        .file_store
        .upload(UploadRequest {
            kind: query.kind,
            file_name: query.file_name,
            content_type,
            bytes: body.to_vec(),
        })
        .await?;
    info!(admin_id = admin.id, key = %stored.key, size, "File uploaded");
    Ok((StatusCode::CREATED, Json(stored)))
}

#[derive(Debug, Default, Deserialize)]
struct AdminOrderQuery {
    status: Option<OrderStatus>,
    q: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminOrderQuery>,
) -> Result<Json<Page<order::Model>>> {
    let filter = OrderFilter {
        status: query.status,
        q: query.q,
    };
    orders::list_orders(&state.db, &filter, page_request(query.page, query.per_page))
        .await
        .map(Json)
}

async fn order_detail(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderWithItems>> {
    orders::get_order_with_items(&state.db, order_id)
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
struct OrderStatusInput {
    status: OrderStatus,
}

async fn update_order_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(order_id): Path<i64>,
    Json(input): Json<OrderStatusInput>,
) -> Result<Json<order::Model>> {
    orders::update_order_status(&state.db, order_id, input.status)
        .await
        .map(Json)
}

#[derive(Debug, Default, Deserialize)]
struct AdminSearchQuery {
    q: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminSearchQuery>,
) -> Result<Json<Page<user::Model>>> {
    users::list_users(
        &state.db,
        query.q.as_deref(),
        page_request(query.page, query.per_page),
    )
    .await
    .map(Json)
}

#[derive(Debug, Deserialize)]
struct RoleInput {
    role: Role,
}

async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
    Json(input): Json<RoleInput>,
) -> Result<Json<user::Model>> {
    users::set_user_role(&state.db, &admin, user_id, input.role)
        .await
        .map(Json)
}

async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i64>,
) -> Result<StatusCode> {
    users::delete_user(&state.db, &admin, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
struct AdminRequestQuery {
    status: Option<RequestStatus>,
    q: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn list_service_requests(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminRequestQuery>,
) -> Result<Json<Page<service_request::Model>>> {
    let filter = ServiceRequestFilter {
        status: query.status,
        q: query.q,
    };
    service_requests::list_service_requests(
        &state.db,
        &filter,
        page_request(query.page, query.per_page),
    )
    .await
    .map(Json)
}

#[derive(Debug, Deserialize)]
struct RequestStatusInput {
    status: RequestStatus,
}

async fn update_request_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(request_id): Path<i64>,
    Json(input): Json<RequestStatusInput>,
) -> Result<Json<service_request::Model>> {
    service_requests::update_service_request_status(&state.db, request_id, input.status)
        .await
        .map(Json)
}

async fn delete_service_request(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(request_id): Path<i64>,
) -> Result<StatusCode> {
    service_requests::delete_service_request(&state.db, request_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_posts(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<PostModel>>> {
    insights::list_all_posts(&state.db, PageRequest::from_params(params, ADMIN_PER_PAGE))
        .await
        .map(Json)
}

async fn create_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(input): Json<NewPost>,
) -> Result<(StatusCode, Json<PostModel>)> {
    let created = insights::create_post(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(post_id): Path<i64>,
    Json(update): Json<PostUpdate>,
) -> Result<Json<PostModel>> {
    insights::update_post(&state.db, post_id, update)
        .await
        .map(Json)
}

async fn delete_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(post_id): Path<i64>,
) -> Result<StatusCode> {
    insights::delete_post(&state.db, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct PublishInput {
    published: bool,
}

async fn publish_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(post_id): Path<i64>,
    Json(input): Json<PublishInput>,
) -> Result<Json<PostModel>> {
    insights::set_published(&state.db, post_id, input.published)
        .await
        .map(Json)
}
