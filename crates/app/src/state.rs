//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use canopy_core::ShopDomain;

use crate::config::AppConfig;
use crate::db::{RepositoryError, ShopSession, ShopSessionRepository};
use crate::services::MetafieldStore;
use crate::shopify::AdminClient;

/// How long a shop session stays cached in memory.
const SESSION_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Upper bound on cached shop sessions.
const SESSION_CACHE_CAPACITY: u64 = 10_000;

/// Timeout for outbound Shopify requests.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

#[derive(Clone)]
struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    http: reqwest::Client,
    sessions: Cache<String, ShopSession>,
    admin_endpoint: Option<String>,
}

impl AppState {
    /// Create the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: AppConfig, pool: PgPool) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("canopy/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let sessions = Cache::builder()
            .max_capacity(SESSION_CACHE_CAPACITY)
            .time_to_live(SESSION_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                http,
                sessions,
                admin_endpoint: None,
            }),
        })
    }

    /// Send every Admin GraphQL call to a fixed endpoint.
    ///
    /// Used to run the app against a local mock of the Admin API.
    #[must_use]
    pub fn with_admin_endpoint(self, endpoint: impl Into<String>) -> Self {
        let inner = Arc::unwrap_or_clone(self.inner);
        Self {
            inner: Arc::new(AppStateInner {
                admin_endpoint: Some(endpoint.into()),
                ..inner
            }),
        }
    }

    /// Get the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get the database pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Shared HTTP client for Shopify calls.
    #[must_use]
    pub fn http(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Parse a shop parameter against the configured domains.
    #[must_use]
    pub fn parse_shop(&self, raw: &str) -> Option<ShopDomain> {
        ShopDomain::parse(raw, &self.inner.config.shopify.custom_shop_domains)
    }

    // =========================================================================
    // Shop sessions
    // =========================================================================

    /// Look up the offline session for a shop, cached for a few minutes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the lookup fails.
    pub async fn shop_session(&self, shop: &str) -> Result<Option<ShopSession>, RepositoryError> {
        if let Some(session) = self.inner.sessions.get(shop).await {
            return Ok(Some(session));
        }

        let session = ShopSessionRepository::new(self.pool())
            .get_by_shop(shop)
            .await?;
        if let Some(session) = &session {
            self.inner
                .sessions
                .insert(shop.to_string(), session.clone())
                .await;
        }
        Ok(session)
    }

    /// Persist a session from a completed OAuth exchange.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn save_shop_session(&self, session: ShopSession) -> Result<(), RepositoryError> {
        ShopSessionRepository::new(self.pool()).save(&session).await?;
        self.inner
            .sessions
            .insert(session.shop.clone(), session)
            .await;
        Ok(())
    }

    /// Remove a shop's session after uninstall.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove_shop_session(&self, shop: &str) -> Result<bool, RepositoryError> {
        self.inner.sessions.invalidate(shop).await;
        ShopSessionRepository::new(self.pool()).delete(shop).await
    }

    /// Put a session into the in-memory cache only.
    pub async fn cache_shop_session(&self, session: ShopSession) {
        self.inner
            .sessions
            .insert(session.shop.clone(), session)
            .await;
    }

    // =========================================================================
    // Shopify clients
    // =========================================================================

    /// Admin API client authenticated as the session's shop.
    #[must_use]
    pub fn admin_client(&self, session: &ShopSession) -> AdminClient {
        let endpoint = self.inner.admin_endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://{}/admin/api/{}/graphql.json",
                session.shop, self.inner.config.shopify.api_version
            )
        });
        AdminClient::with_endpoint(
            self.inner.http.clone(),
            &session.shop,
            session.access_token.clone(),
            endpoint,
        )
    }

    /// Metafield store for the session's shop in the configured namespace.
    #[must_use]
    pub fn metafield_store(&self, session: &ShopSession) -> MetafieldStore {
        MetafieldStore::new(
            self.admin_client(session),
            self.inner.config.donation.metafield_namespace.clone(),
        )
    }
}
