/// Database configuration and connection management
pub mod database;

/// Secrets loaded from environment variables
pub mod secrets;

/// Marketplace settings loaded from config.toml
pub mod settings;

pub use secrets::Secrets;
pub use settings::Settings;
