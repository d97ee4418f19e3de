//! Embedded admin pages under `/app`.
//!
//! Loaders are GET handlers; actions are POST handlers that answer with a
//! redirect carrying a `notice` or `error` banner, or with an
//! [`ActionResult`] as JSON when the client asks for it.

pub mod cart_settings;
pub mod home;
pub mod orders;
pub mod pricing;
pub mod stats;

use axum::{
    Json,
    http::{HeaderMap, header::ACCEPT},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::AppError;
use crate::middleware::ShopAdmin;
use crate::models::session_keys;
use crate::state::AppState;

/// Banner query parameters set by action redirects.
#[derive(Debug, Default, Deserialize)]
pub struct BannerQuery {
    pub notice: Option<String>,
    pub error: Option<String>,
}

/// Values shared by every page layout.
#[derive(Debug, Clone)]
pub struct Layout {
    pub api_key: String,
    pub shop: String,
    pub host: Option<String>,
    pub current_path: &'static str,
    pub notice: Option<String>,
    pub error: Option<String>,
    pub csrf_token: String,
}

impl Layout {
    /// Build the layout for a page.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Session` if the CSRF token cannot be stored.
    pub async fn new(
        state: &AppState,
        admin: &ShopAdmin,
        session: &Session,
        current_path: &'static str,
        banner: BannerQuery,
    ) -> Result<Self, AppError> {
        Ok(Self {
            api_key: state.config().shopify.api_key.clone(),
            shop: admin.shop().to_string(),
            host: admin.host.clone(),
            current_path,
            notice: banner.notice.filter(|s| !s.is_empty()),
            error: banner.error.filter(|s| !s.is_empty()),
            csrf_token: csrf_token(session).await?,
        })
    }

    /// Link into the shop's Shopify admin.
    #[must_use]
    pub fn admin_url(&self, path: &str) -> String {
        format!("https://{}/admin/{}", self.shop, path.trim_start_matches('/'))
    }
}

// =============================================================================
// Action results
// =============================================================================

/// Outcome of a page action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    /// Successful action with a banner message.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    /// Failed action with a banner message.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }

    /// JSON for API clients, otherwise a redirect back to `path` with a banner.
    #[must_use]
    pub fn respond(self, headers: &HeaderMap, path: &str) -> Response {
        let wants_json = headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        if wants_json {
            return Json(self).into_response();
        }

        let target = match (&self.message, &self.error) {
            (_, Some(error)) => format!("{path}?error={}", urlencoding::encode(error)),
            (Some(message), None) => format!("{path}?notice={}", urlencoding::encode(message)),
            (None, None) => path.to_string(),
        };
        Redirect::to(&target).into_response()
    }
}

// =============================================================================
// CSRF
// =============================================================================

/// Rejection message for a missing or stale form token.
pub const INVALID_FORM_TOKEN: &str = "Your session expired. Reload the page and try again.";

/// Get or create the per-session form token.
///
/// # Errors
///
/// Returns `AppError::Session` if the session store fails.
pub async fn csrf_token(session: &Session) -> Result<String, AppError> {
    if let Some(token) = session.get::<String>(session_keys::CSRF_TOKEN).await? {
        return Ok(token);
    }
    let token = uuid::Uuid::new_v4().to_string();
    session.insert(session_keys::CSRF_TOKEN, &token).await?;
    Ok(token)
}

/// Whether a submitted form token matches the session's.
pub async fn verify_csrf(session: &Session, provided: Option<&str>) -> bool {
    let stored = session
        .get::<String>(session_keys::CSRF_TOKEN)
        .await
        .ok()
        .flatten();
    matches!((stored, provided), (Some(stored), Some(provided)) if stored == provided)
}
