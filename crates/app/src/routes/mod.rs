//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                   - Liveness check
//! GET  /health/ready             - Readiness check (database)
//!
//! # Install (OAuth)
//! GET  /                         - Landing page
//! GET  /auth                     - Start OAuth for ?shop=
//! GET  /auth/callback            - OAuth callback
//!
//! # Embedded admin (session-token authenticated, framed by Shopify)
//! GET  /app                      - Setup guide
//! POST /app                      - Create the donation product
//! GET  /app/cart-settings        - Cart donation settings
//! POST /app/cart-settings        - Toggle the cart donation
//! GET  /app/stats                - Donation metrics
//! GET  /app/orders               - Tracked donation orders
//! GET  /app/orders/export.csv    - Orders as CSV
//! GET  /app/pricing              - Plans and usage
//!
//! # Shopify callbacks (HMAC authenticated)
//! POST /webhooks/orders/create   - Track donations
//! POST /webhooks/app/uninstalled - Remove the shop session
//! GET  /proxy/donation           - Storefront donation config
//! ```

pub mod app;
pub mod auth;
pub mod health;
pub mod proxy;
pub mod webhooks;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::middleware::frame_ancestors;
use crate::state::AppState;

/// Build all application routes.
pub fn routes(state: &AppState) -> Router<AppState> {
    let embedded = Router::new()
        .route("/app", get(app::home::index).post(app::home::action))
        .route(
            "/app/cart-settings",
            get(app::cart_settings::index).post(app::cart_settings::action),
        )
        .route("/app/stats", get(app::stats::index))
        .route("/app/orders", get(app::orders::index))
        .route("/app/orders/export.csv", get(app::orders::export_csv))
        .route("/app/pricing", get(app::pricing::index))
        .route_layer(middleware::from_fn_with_state(state.clone(), frame_ancestors));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/", get(auth::landing))
        .route("/auth", get(auth::begin))
        .route("/auth/callback", get(auth::callback))
        .route("/webhooks/orders/create", post(webhooks::orders_create))
        .route("/webhooks/app/uninstalled", post(webhooks::app_uninstalled))
        .route("/proxy/donation", get(proxy::donation))
        .merge(embedded)
}
