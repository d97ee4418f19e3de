//! `Content-Security-Policy: frame-ancestors` for embedded pages.
//!
//! Only the shop's own admin and `admin.shopify.com` may frame the app.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::CONTENT_SECURITY_POLICY},
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

use crate::models::{CurrentShop, session_keys};
use crate::state::AppState;

/// Origin of the unified Shopify admin.
pub const SHOPIFY_ADMIN_ORIGIN: &str = "https://admin.shopify.com";

/// Policy value for a shop, or for the unified admin alone.
#[must_use]
pub fn frame_ancestors_policy(shop: Option<&str>) -> String {
    match shop {
        Some(shop) => format!("frame-ancestors https://{shop} {SHOPIFY_ADMIN_ORIGIN};"),
        None => format!("frame-ancestors {SHOPIFY_ADMIN_ORIGIN};"),
    }
}

/// Add the frame-ancestors policy to every response.
pub async fn frame_ancestors(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let query_shop = query_shop(&state, &request);
    let session = request.extensions().get::<Session>().cloned();
    let shop = match query_shop {
        Some(shop) => Some(shop),
        None => session_shop(session).await,
    };

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&frame_ancestors_policy(shop.as_deref())) {
        response
            .headers_mut()
            .insert(CONTENT_SECURITY_POLICY, value);
    }
    response
}

fn query_shop(state: &AppState, request: &Request) -> Option<String> {
    let query = request.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "shop")
        .and_then(|(_, value)| state.parse_shop(&value))
        .map(|shop| shop.as_str().to_string())
}

async fn session_shop(session: Option<Session>) -> Option<String> {
    session?
        .get::<CurrentShop>(session_keys::CURRENT_SHOP)
        .await
        .ok()
        .flatten()
        .map(|current| current.shop)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_ancestors_policy() {
        assert_eq!(
            frame_ancestors_policy(Some("canopy-test.myshopify.com")),
            "frame-ancestors https://canopy-test.myshopify.com https://admin.shopify.com;"
        );
        assert_eq!(
            frame_ancestors_policy(None),
            "frame-ancestors https://admin.shopify.com;"
        );
    }
}
