//! Cart settings page: donation checkbox visibility.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::{ActionResult, BannerQuery, INVALID_FORM_TOKEN, Layout, verify_csrf};
use crate::error::AppError;
use crate::middleware::ShopAdmin;
use crate::services::donation::{self, ThemeExtensionConfig};
use crate::state::AppState;

const PATH: &str = "/app/cart-settings";

/// Cart settings template.
#[derive(Template, WebTemplate)]
#[template(path = "app/cart_settings.html")]
pub struct CartSettingsTemplate {
    pub layout: Layout,
    pub cart_enabled: bool,
    pub product_exists: bool,
    pub shop_domain: String,
    pub donation_amount: String,
    pub theme_config: ThemeExtensionConfig,
    pub has_error: bool,
    pub error_message: Option<String>,
}

impl CartSettingsTemplate {
    /// Theme editor deep link for adding the app block.
    #[must_use]
    pub fn theme_editor_url(&self) -> String {
        format!(
            "https://{}/admin/themes/current/editor?context=apps",
            self.shop_domain
        )
    }
}

/// GET /app/cart-settings - Cart display toggle and preview.
#[instrument(skip_all, fields(shop = %admin.shop()))]
pub async fn index(
    admin: ShopAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(banner): Query<BannerQuery>,
) -> Result<Response, AppError> {
    let layout = Layout::new(&state, &admin, &session, PATH, banner).await?;

    let shop_domain = match admin.store.client().shop_domain().await {
        Ok(domain) => domain,
        Err(e) => {
            tracing::warn!(error = %e, "Falling back to session shop domain");
            admin.shop().to_string()
        }
    };

    let template = match donation::load_setup(&admin.store).await {
        Ok(setup) => CartSettingsTemplate {
            layout,
            cart_enabled: setup.cart_enabled,
            product_exists: setup.exists,
            shop_domain,
            donation_amount: setup.donation_amount,
            theme_config: donation::theme_extension_config(&admin.store).await,
            has_error: false,
            error_message: None,
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to load cart settings");
            CartSettingsTemplate {
                layout,
                cart_enabled: false,
                product_exists: false,
                shop_domain,
                donation_amount: donation::DEFAULT_DONATION_AMOUNT.to_string(),
                theme_config: ThemeExtensionConfig::default(),
                has_error: true,
                error_message: Some(e.user_message()),
            }
        }
    };

    Ok(template.into_response())
}

/// Cart settings form data.
#[derive(Debug, Deserialize)]
pub struct CartSettingsForm {
    pub enabled: Option<String>,
    pub csrf_token: Option<String>,
}

/// POST /app/cart-settings - Turn the cart checkbox on or off.
#[instrument(skip_all, fields(shop = %admin.shop(), enabled = ?form.enabled))]
pub async fn action(
    admin: ShopAdmin,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<CartSettingsForm>,
) -> Response {
    if !verify_csrf(&session, form.csrf_token.as_deref()).await {
        return ActionResult::failed(INVALID_FORM_TOKEN).respond(&headers, PATH);
    }

    let enabled = form
        .enabled
        .as_deref()
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));

    let result = match donation::set_cart_enabled(&admin.store, enabled, Utc::now()).await {
        Ok(_) if enabled => ActionResult::ok("Donation checkbox is now shown in the cart"),
        Ok(_) => ActionResult::ok("Donation checkbox is now hidden"),
        Err(e) => {
            tracing::warn!(error = %e, "Cart setting not saved");
            ActionResult::failed(e.user_message())
        }
    };

    result.respond(&headers, PATH)
}
