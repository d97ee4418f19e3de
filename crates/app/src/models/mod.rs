//! Domain models for the app.

pub mod session;

pub use session::{CurrentShop, keys as session_keys};
