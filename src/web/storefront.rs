//! Public storefront and buyer routes: catalog browsing, cart pricing,
//! checkout, orders and downloads, reviews, insights and service requests.

use crate::{
    core::{
        cart::{Cart, PricedCart, price_cart},
        catalog::{self, ProductFilter, ProductSort, ProductSuggestion},
        checkout::{self, CheckoutStarted},
        insights::{self, PostSummary, reading_time_minutes},
        invoice::{invoice_for_order, render_invoice_pdf},
        orders::{self, DownloadLink, OrderWithItems},
        pages,
        pagination::{Page, PageParams, PageRequest},
        reviews::{self, RatingSummary, ReviewView},
        service_requests::{NewServiceRequest, submit_service_request},
    },
    entities::{PostModel, order, product, review, service_request},
    errors::{Error, Result},
    web::{AppState, extract::CurrentUser},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const DEFAULT_PER_PAGE: u64 = 10;

/// Public storefront and buyer routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/pages/:slug", get(static_page))
        .route("/api/products", get(list_products))
        .route("/api/featured", get(featured))
        .route("/api/products/:product", get(product_detail))
        .route(
            "/api/products/:product/reviews",
            get(list_reviews).post(create_review),
        )
        .route("/api/reviews/:id", delete(delete_review))
        .route("/api/categories", get(categories))
        .route("/api/search", get(search))
        .route("/api/cart/price", post(price))
        .route("/api/checkout", post(start_checkout))
        .route("/api/checkout/success", get(checkout_success))
        .route("/api/checkout/cancel", get(checkout_cancel))
        .route("/api/orders", get(my_orders))
        .route("/api/orders/:id", get(order_detail))
        .route("/api/orders/:id/invoice.pdf", get(invoice_pdf))
        .route("/api/orders/:id/downloads", get(downloads))
        .route("/api/insights", get(list_posts))
        .route("/api/insights/:slug", get(post_detail))
        .route("/api/service-requests", post(submit_request))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn static_page(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Html<String>> {
    pages::render_page(&slug, &state.settings.store).map(Html)
}

#[derive(Debug, Default, Deserialize)]
struct ProductQuery {
    q: Option<String>,
    category: Option<String>,
    min_price: Option<i64>,
    max_price: Option<i64>,
    sort: Option<ProductSort>,
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<product::Model>>> {
    let request = PageRequest::from_params(
        PageParams {
            page: query.page,
            per_page: query.per_page,
        },
        state.settings.catalog.page_size,
    );
    let filter = ProductFilter {
        q: query.q,
        category: query.category,
        min_price: query.min_price,
        max_price: query.max_price,
        sort: query.sort.unwrap_or_default(),
    };
    catalog::list_products(&state.db, &filter, request).await.map(Json)
}

async fn featured(State(state): State<AppState>) -> Result<Json<Vec<product::Model>>> {
    catalog::featured_products(&state.db, state.settings.catalog.featured_limit)
        .await
        .map(Json)
}

#[derive(Debug, Serialize)]
struct ProductDetail {
    #[serde(flatten)]
    product: product::Model,
    rating: RatingSummary,
}

async fn product_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>> {
    let product = catalog::get_product_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| Error::not_found("Product", &slug))?;
    let rating = reviews::rating_summary(&state.db, product.id).await?;
    Ok(Json(ProductDetail { product, rating }))
}

async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<Vec<ReviewView>>> {
    reviews::list_reviews_for_product(&state.db, product_id)
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
struct ReviewInput {
    rating: i32,
    comment: String,
}

async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<i64>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<review::Model>)> {
    let created =
        reviews::create_review(&state.db, &user, product_id, input.rating, &input.comment).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(review_id): Path<i64>,
) -> Result<StatusCode> {
    reviews::delete_review(&state.db, &user, review_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn categories(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    catalog::list_categories(&state.db).await.map(Json)
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ProductSuggestion>>> {
    catalog::search_suggestions(&state.db, &query.q, state.settings.catalog.suggestion_limit)
        .await
        .map(Json)
}

async fn price(State(state): State<AppState>, Json(cart): Json<Cart>) -> Result<Json<PricedCart>> {
    price_cart(&*state.db, &cart).await.map(Json)
}

async fn start_checkout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(cart): Json<Cart>,
) -> Result<Json<CheckoutStarted>> {
    checkout::create_checkout_session(
        &state.db,
        state.gateway.as_ref(),
        &state.settings.store,
        &user,
        &cart,
    )
    .await
    .map(Json)
}

#[derive(Debug, Deserialize)]
struct SuccessQuery {
    session_id: String,
}

async fn checkout_success(
    State(state): State<AppState>,
    Query(query): Query<SuccessQuery>,
) -> Result<Json<order::Model>> {
    checkout::complete_checkout(&state.db, state.gateway.as_ref(), &query.session_id)
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
struct CancelQuery {
    order_id: i64,
}

async fn checkout_cancel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<CancelQuery>,
) -> Result<Json<order::Model>> {
    checkout::cancel_checkout(&state.db, &user, query.order_id)
        .await
        .map(Json)
}

async fn my_orders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<order::Model>>> {
    let request = PageRequest::from_params(params, DEFAULT_PER_PAGE);
    orders::list_orders_for_user(&state.db, user.id, request)
        .await
        .map(Json)
}

async fn order_detail(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderWithItems>> {
    orders::get_order_for_viewer(&state.db, &user, order_id)
        .await
        .map(Json)
}

async fn invoice_pdf(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let full = orders::get_order_for_viewer(&state.db, &user, order_id).await?;
    let invoice = invoice_for_order(&full, &state.settings.store)?;
    let file_name = format!("{}.pdf", invoice.number);
    let pdf = tokio::task::spawn_blocking(move || render_invoice_pdf(&invoice))
        .await
        .map_err(|e| Error::Pdf {
            message: e.to_string(),
        })??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        pdf,
    ))
}

async fn downloads(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Json<Vec<DownloadLink>>> {
    orders::download_links(&state.db, &user, order_id)
        .await
        .map(Json)
}

async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<PostSummary>>> {
    let request = PageRequest::from_params(params, DEFAULT_PER_PAGE);
    insights::list_published_posts(&state.db, request)
        .await
        .map(Json)
}

#[derive(Debug, Serialize)]
struct PostView {
    #[serde(flatten)]
    post: PostModel,
    reading_minutes: usize,
}

async fn post_detail(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PostView>> {
    let post = insights::get_published_post_by_slug(&state.db, &slug).await?;
    let reading_minutes = reading_time_minutes(&post.body);
    Ok(Json(PostView {
        post,
        reading_minutes,
    }))
}

async fn submit_request(
    State(state): State<AppState>,
    Json(input): Json<NewServiceRequest>,
) -> Result<(StatusCode, Json<service_request::Model>)> {
    let created = submit_service_request(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        entities::OrderStatus,
        test_utils::*,
        web::{router, test_support::*},
    };
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_and_pages() -> Result<()> {
        let (state, _) = test_state().await?;
        let (status, body) = send(&state, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let response = router(state.clone())
            .oneshot(Request::get("/pages/refund-policy").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&html).contains("Digital Market"));

        let (status, body) = send(&state, request("GET", "/pages/careers", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("careers"));
        Ok(())
    }

    #[tokio::test]
    async fn test_product_listing_and_detail() -> Result<()> {
        let (state, _) = test_state().await?;
        create_custom_product(&state.db, "Icon Pack", "design", 1900).await?;
        create_custom_product(&state.db, "Resume Kit", "templates", 900).await?;

        let (status, body) = send(
            &state,
            request("GET", "/api/products?category=design&sort=price_asc", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_items"], 1);
        assert_eq!(body["items"][0]["name"], "Icon Pack");
        assert!(body["items"][0].get("file_url").is_none());

        let (status, body) = send(&state, request("GET", "/api/products/icon-pack", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price_cents"], 1900);
        assert_eq!(body["rating"]["count"], 0);

        let (status, _) = send(&state, request("GET", "/api/products/nope", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&state, request("GET", "/api/search?q=ic", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_checkout_flow_over_http() -> Result<()> {
        let (state, gateway) = test_state().await?;
        let user = create_test_user(&state.db, "buyer@example.com").await?;
        let token = token_for(&state, &user).await?;
        let product = create_product_with_file(&state.db, "Kit", "https://files.test/kit.zip").await?;
        let cart = json!({ "items": [{ "product_id": product.id, "quantity": 2 }] });

        let (status, body) = send(&state, request("POST", "/api/cart/price", None, Some(cart.clone()))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subtotal_cents"], 3000);

        let (status, _) = send(&state, request("POST", "/api/checkout", None, Some(cart.clone()))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&state, request("POST", "/api/checkout", Some(&token), Some(cart))).await;
        assert_eq!(status, StatusCode::OK);
        let order_id = body["order_id"].as_i64().unwrap();
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let downloads_uri = format!("/api/orders/{order_id}/downloads");
        let (status, _) = send(&state, request("GET", &downloads_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        gateway.mark_paid(&session_id);
        let success_uri = format!("/api/checkout/success?session_id={session_id}");
        let (status, body) = send(&state, request("GET", &success_uri, None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "paid");

        let (status, body) = send(&state, request("GET", &downloads_uri, Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["url"], "https://files.test/kit.zip");

        let (status, body) = send(&state, request("GET", "/api/orders", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_items"], 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_invoice_pdf_route() -> Result<()> {
        let (state, _) = test_state().await?;
        let owner = create_test_user(&state.db, "owner@example.com").await?;
        let stranger = create_test_user(&state.db, "stranger@example.com").await?;
        let product = create_test_product(&state.db, "Kit").await?;
        let order = create_test_order(&state.db, &owner, &[(&product, 1)], OrderStatus::Paid).await?;
        let uri = format!("/api/orders/{}/invoice.pdf", order.id);

        let token = token_for(&state, &owner).await?;
        let response = router(state.clone())
            .oneshot(request("GET", &uri, Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let other = token_for(&state, &stranger).await?;
        let (status, _) = send(&state, request("GET", &uri, Some(&other), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn test_reviews_over_http() -> Result<()> {
        let (state, _) = test_state().await?;
        let buyer = create_test_user(&state.db, "buyer@example.com").await?;
        let product = create_test_product(&state.db, "Kit").await?;
        create_test_order(&state.db, &buyer, &[(&product, 1)], OrderStatus::Paid).await?;
        let token = token_for(&state, &buyer).await?;
        let uri = format!("/api/products/{}/reviews", product.id);

        let (status, body) = send(
            &state,
            request("POST", &uri, Some(&token), Some(json!({ "rating": 9, "comment": "!" }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Rating must be between 1 and 5");

        let (status, _) = send(
            &state,
            request("POST", &uri, Some(&token), Some(json!({ "rating": 5, "comment": "Great" }))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&state, request("GET", &uri, None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["author_name"], "buyer");
        Ok(())
    }

    #[tokio::test]
    async fn test_service_request_and_insights() -> Result<()> {
        let (state, _) = test_state().await?;
        let (status, body) = send(
            &state,
            request(
                "POST",
                "/api/service-requests",
                None,
                Some(json!({
                    "name": "Ann",
                    "email": "ann@example.com",
                    "service": "Branding",
                    "message": "New logo please"
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "new");

        let post = insights::create_post(
            &state.db,
            insights::NewPost {
                title: "Hello World".to_string(),
                excerpt: String::new(),
                body: "First post".to_string(),
                cover_image_url: None,
                published: true,
            },
        )
        .await?;
        let (status, body) = send(&state, request("GET", "/api/insights", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"][0]["slug"], post.slug);

        let (status, body) = send(&state, request("GET", "/api/insights/hello-world", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reading_minutes"], 1);
        Ok(())
    }
}
