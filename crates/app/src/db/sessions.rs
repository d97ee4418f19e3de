//! Offline shop session repository.
//!
//! One row per installed shop holding the Admin API access token obtained
//! through OAuth. Rows are removed when the app is uninstalled.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use super::RepositoryError;
use crate::shopify::oauth::OAuthToken;

/// An installed shop and its offline token.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopSession {
    /// Shop domain (e.g., your-store.myshopify.com).
    pub shop: String,
    /// Offline Admin API access token.
    pub access_token: SecretString,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// When the token was obtained.
    pub obtained_at: DateTime<Utc>,
}

impl std::fmt::Debug for ShopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopSession")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

impl ShopSession {
    /// Whether every required scope was granted.
    #[must_use]
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| {
            self.scopes.iter().any(|granted| {
                granted == scope
                    // write_x implies read_x
                    || scope
                        .strip_prefix("read_")
                        .is_some_and(|rest| granted.strip_prefix("write_") == Some(rest))
            })
        })
    }
}

impl From<OAuthToken> for ShopSession {
    fn from(token: OAuthToken) -> Self {
        Self {
            shop: token.shop,
            access_token: token.access_token,
            scopes: split_scopes(&token.scope),
            obtained_at: token.obtained_at,
        }
    }
}

fn split_scopes(scope: &str) -> Vec<String> {
    scope
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Internal row type for `PostgreSQL` queries.
#[derive(Debug, sqlx::FromRow)]
struct ShopSessionRow {
    shop: String,
    access_token: String,
    scope: String,
    obtained_at: DateTime<Utc>,
}

impl From<ShopSessionRow> for ShopSession {
    fn from(row: ShopSessionRow) -> Self {
        Self {
            shop: row.shop,
            access_token: SecretString::from(row.access_token),
            scopes: split_scopes(&row.scope),
            obtained_at: row.obtained_at,
        }
    }
}

/// Repository for shop session database operations.
pub struct ShopSessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShopSessionRepository<'a> {
    /// Create a new shop session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the session for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_shop(&self, shop: &str) -> Result<Option<ShopSession>, RepositoryError> {
        let row = sqlx::query_as::<_, ShopSessionRow>(
            r"
            SELECT shop, access_token, scope, obtained_at
            FROM shop_sessions
            WHERE shop = $1
            ",
        )
        .bind(shop)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ShopSession::from))
    }

    /// Save or replace the session for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save(&self, session: &ShopSession) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop_sessions (shop, access_token, scope, obtained_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (shop) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                scope = EXCLUDED.scope,
                obtained_at = EXCLUDED.obtained_at,
                updated_at = NOW()
            ",
        )
        .bind(&session.shop)
        .bind(session.access_token.expose_secret())
        .bind(session.scopes.join(","))
        .bind(session.obtained_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete the session for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, shop: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop_sessions WHERE shop = $1")
            .bind(shop)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List installed shop domains.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_shops(&self) -> Result<Vec<String>, RepositoryError> {
        let shops = sqlx::query_scalar::<_, String>("SELECT shop FROM shop_sessions ORDER BY shop")
            .fetch_all(self.pool)
            .await?;
        Ok(shops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(scopes: &str) -> ShopSession {
        ShopSession {
            shop: "test-shop.myshopify.com".to_string(),
            access_token: SecretString::from("shpat_secret"),
            scopes: split_scopes(scopes),
            obtained_at: Utc::now(),
        }
    }

    #[test]
    fn test_split_scopes_trims_and_skips_empty() {
        assert_eq!(
            split_scopes("read_orders, write_products,,"),
            vec!["read_orders", "write_products"]
        );
    }

    #[test]
    fn test_has_scopes_write_implies_read() {
        let s = session("write_products,read_orders");
        assert!(s.has_scopes(&["read_products".to_string(), "read_orders".to_string()]));
        assert!(!s.has_scopes(&["write_orders".to_string()]));
    }

    #[test]
    fn test_debug_redacts_token() {
        let debug = format!("{:?}", session("read_orders"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("shpat_secret"));
    }
}
