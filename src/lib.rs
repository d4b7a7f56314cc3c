//! Webhook Store
//!
//! Per-user persistence for webhook subscriptions with support for:
//! - Any webhook shape and any persisted registration shape
//! - Pluggable payload encoding and key normalization
//! - Action and predicate queries for one user or across all users
//! - In-memory and PostgreSQL unit-of-work backends

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use tracing::info;

use domain::{WebHook, WebHookRegistration};
use infrastructure::{StorageFactory, StorageWebHookStore, logging};

/// The store wired with the built-in webhook and registration types
pub type DefaultWebHookStore = StorageWebHookStore<WebHook, WebHookRegistration>;

/// Builds the store for the configured storage backend
pub async fn build_webhook_store(config: &AppConfig) -> anyhow::Result<DefaultWebHookStore> {
    let storage_config = config.storage.to_storage_config()?;
    let storage = StorageFactory::create::<WebHookRegistration>(&storage_config).await?;

    info!(backend = ?storage_config.storage_type(), "Webhook store ready");
    Ok(StorageWebHookStore::new(storage))
}

/// Loads `.env` and configuration, installs logging, and builds the store
pub async fn init() -> anyhow::Result<(AppConfig, DefaultWebHookStore)> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging)?;

    let store = build_webhook_store(&config).await?;
    Ok((config, store))
}
