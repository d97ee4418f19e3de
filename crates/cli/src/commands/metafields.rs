//! App metafield inspection and repair.
//!
//! Uses the shop's stored offline session, so the app must be installed.
//!
//! # Environment Variables
//!
//! Same as the app server (see `canopy_app::config`).

use canopy_app::config::{AppConfig, ConfigError};
use canopy_app::db::{self, RepositoryError, ShopSessionRepository};
use canopy_app::services::metafields::{MetafieldError, MetafieldStore, MetafieldType, parse_value};
use canopy_app::state::AppState;
use thiserror::Error;

/// Errors from metafield commands.
#[derive(Debug, Error)]
pub enum MetafieldCommandError {
    /// `--shop` was not given.
    #[error("--shop is required")]
    MissingShop,

    /// The shop domain is not valid.
    #[error("Invalid shop domain: {0}")]
    InvalidShop(String),

    /// No stored session for the shop.
    #[error("No session stored for {0}; install the app first")]
    NotInstalled(String),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session lookup failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Admin API call failed.
    #[error(transparent)]
    Metafield(#[from] MetafieldError),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(String),
}

async fn app_state() -> Result<AppState, MetafieldCommandError> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    AppState::new(config, pool).map_err(|e| MetafieldCommandError::Http(e.to_string()))
}

async fn store_for(shop: &str) -> Result<MetafieldStore, MetafieldCommandError> {
    let state = app_state().await?;
    let shop = state
        .parse_shop(shop)
        .ok_or_else(|| MetafieldCommandError::InvalidShop(shop.to_string()))?;
    let session = state
        .shop_session(shop.as_str())
        .await?
        .ok_or_else(|| MetafieldCommandError::NotInstalled(shop.to_string()))?;
    Ok(state.metafield_store(&session))
}

/// Print every shop with a stored session.
///
/// # Errors
///
/// Returns an error if configuration or the database fails.
pub async fn shops() -> Result<(), MetafieldCommandError> {
    let state = app_state().await?;
    let shops = ShopSessionRepository::new(state.pool()).list_shops().await?;

    #[allow(clippy::print_stdout)]
    {
        for shop in shops {
            println!("{shop}");
        }
    }
    Ok(())
}

/// Print the first 100 metafields in the app namespace.
///
/// # Errors
///
/// Returns an error if the shop is unknown or the Admin API fails.
pub async fn list(shop: &str) -> Result<(), MetafieldCommandError> {
    let store = store_for(shop).await?;
    let metafields = store.list().await?;

    let mut entries: Vec<_> = metafields.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    #[allow(clippy::print_stdout)]
    {
        println!("{} metafields in {}", entries.len(), store.namespace());
        for (key, value) in entries {
            println!("{key} = {}", value.to_text());
        }
    }
    Ok(())
}

/// Print one metafield.
///
/// # Errors
///
/// Returns an error if the shop is unknown or the Admin API fails.
pub async fn get(shop: &str, key: &str) -> Result<(), MetafieldCommandError> {
    let store = store_for(shop).await?;
    let value = store.get(key).await?;

    #[allow(clippy::print_stdout)]
    {
        match value {
            Some(value) => println!("{}", value.to_text()),
            None => println!("{key} is not set"),
        }
    }
    Ok(())
}

/// Write one metafield.
///
/// # Errors
///
/// Returns an error if the shop is unknown or the write fails.
pub async fn set(
    shop: &str,
    key: &str,
    raw: &str,
    type_tag: &str,
) -> Result<(), MetafieldCommandError> {
    let store = store_for(shop).await?;
    let type_ = MetafieldType::from_tag(type_tag);
    let written = store.set(key, type_, parse_value(type_.as_str(), raw)).await?;

    tracing::info!(key = %written.key, type_ = %written.type_, "Metafield written");
    Ok(())
}

/// Delete one metafield.
///
/// # Errors
///
/// Returns an error if the shop is unknown or the delete fails.
pub async fn delete(shop: &str, key: &str) -> Result<(), MetafieldCommandError> {
    let store = store_for(shop).await?;
    let deleted = store.delete(key).await?;

    if deleted {
        tracing::info!(key, "Metafield deleted");
    } else {
        tracing::warn!(key, "Metafield was not set");
    }
    Ok(())
}
