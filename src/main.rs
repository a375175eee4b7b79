use digital_market::{
    config::{self, Secrets},
    core::catalog,
    errors::{Error, Result},
    web::{self, AppState},
};
use dotenvy::dotenv;
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also come from the environment
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Settings from config.toml, secrets from the environment
    let settings = config::settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;
    let secrets = Secrets::from_env();

    // 4. Database
    let db = config::database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    config::database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Seed the catalog on first start
    let seeded = catalog::seed_products(&db, &settings.products)
        .await
        .inspect_err(|e| error!("Failed to seed products: {}", e))?;
    if seeded > 0 {
        info!("Seeded {} products", seeded);
    }

    // 6. Serve
    let addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .inspect_err(|e| error!("Failed to bind {}: {}", addr, e))?;
    info!("Listening on http://{}", addr);

    let app = web::router(AppState::new(db, settings, &secrets));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Error::from)?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
