//! HTTP middleware for the app.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)
//! 4. Frame ancestors (CSP for the admin iframe, `/app` routes only)
//!
//! Page handlers authenticate with the [`ShopAdmin`] extractor.

pub mod auth;
pub mod frame;
pub mod session;

pub use auth::{LaunchParams, ShopAdmin, ShopAuthRejection};
pub use frame::frame_ancestors;
pub use session::create_session_layer;
