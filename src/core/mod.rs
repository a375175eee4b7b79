/// Credentials, OAuth sign-in and sessions
pub mod auth;
/// Server-side cart pricing
pub mod cart;
/// Product catalog: browsing, search and admin CRUD
pub mod catalog;
/// Turning a cart into a paid order
pub mod checkout;
/// Blog posts
pub mod insights;
/// Invoice building and PDF rendering
pub mod invoice;
/// Money formatting
pub mod money;
/// Admin "new activity" polling
pub mod notifications;
/// `OAuth` authorization-code clients
pub mod oauth;
/// Order history, admin order management and downloads
pub mod orders;
/// Static info and legal pages
pub mod pages;
/// Page/per-page query-string state
pub mod pagination;
/// Hosted payment provider
pub mod payment;
/// Product reviews
pub mod reviews;
/// Contact-form service requests
pub mod service_requests;
/// URL slugs
pub mod slug;
/// File uploads
pub mod uploads;
/// User administration
pub mod users;
