//! Home page: setup guide and donation product.

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

use canopy_core::{ProductStatus, numeric_id};

use super::{ActionResult, BannerQuery, INVALID_FORM_TOKEN, Layout, verify_csrf};
use crate::error::AppError;
use crate::middleware::ShopAdmin;
use crate::services::donation::{self, DonationSetup};
use crate::state::AppState;

/// Number of steps in the setup guide.
pub const SETUP_STEPS: usize = 3;

/// One step of the setup guide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupStep {
    pub title: &'static str,
    pub description: &'static str,
    pub href: &'static str,
    pub done: bool,
}

/// Setup guide steps and progress.
#[derive(Debug, Clone)]
pub struct SetupGuide {
    pub steps: Vec<SetupStep>,
    pub completed: usize,
}

impl SetupGuide {
    /// Derive step completion from the product and cart state.
    #[must_use]
    pub fn new(product_exists: bool, cart_enabled: bool) -> Self {
        let steps = vec![
            SetupStep {
                title: "Create the donation product",
                description: "Add the \"Support Tree Planting\" product customers donate through.",
                href: "/app",
                done: product_exists,
            },
            SetupStep {
                title: "Show the donation in the cart",
                description: "Turn on the cart checkbox and add the app block to your theme.",
                href: "/app/cart-settings",
                done: product_exists && cart_enabled,
            },
            SetupStep {
                title: "Choose a plan",
                description: "The free plan has a monthly tracking limit; paid plans are unlimited.",
                href: "/app/pricing",
                done: product_exists && cart_enabled,
            },
        ];
        let completed = steps.iter().filter(|s| s.done).count();
        Self { steps, completed }
    }

    /// Whether every step is done.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed == SETUP_STEPS
    }
}

/// Donation product summary.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub title: String,
    pub status: String,
    pub status_tone: &'static str,
    pub price: String,
    pub admin_path: String,
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "app/home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub guide: SetupGuide,
    pub product: Option<ProductView>,
    pub product_exists: bool,
    pub donation_amount: String,
    pub cart_enabled: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
}

const fn status_tone(status: ProductStatus) -> &'static str {
    match status {
        ProductStatus::Active => "success",
        ProductStatus::Draft => "warning",
        ProductStatus::Archived => "subdued",
        ProductStatus::Unlisted => "info",
    }
}

fn product_view(setup: &DonationSetup) -> Option<ProductView> {
    setup.product.as_ref().map(|product| ProductView {
        title: product.title.clone(),
        status: product.status.label().to_string(),
        status_tone: status_tone(product.status),
        price: product.first_variant_price(),
        admin_path: format!("products/{}", numeric_id(product.id.as_str())),
    })
}

/// GET /app - Setup guide and donation product.
#[instrument(skip_all, fields(shop = %admin.shop()))]
pub async fn index(
    admin: ShopAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(banner): Query<BannerQuery>,
) -> Result<Response, AppError> {
    let layout = Layout::new(&state, &admin, &session, "/app", banner).await?;

    let template = match donation::load_setup(&admin.store).await {
        Ok(setup) => HomeTemplate {
            layout,
            guide: SetupGuide::new(setup.exists, setup.cart_enabled),
            product: product_view(&setup),
            product_exists: setup.exists,
            donation_amount: setup.donation_amount,
            cart_enabled: setup.cart_enabled,
            has_error: false,
            error_message: None,
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to load donation setup");
            HomeTemplate {
                layout,
                guide: SetupGuide::new(false, false),
                product: None,
                product_exists: false,
                donation_amount: donation::DEFAULT_DONATION_AMOUNT.to_string(),
                cart_enabled: false,
                has_error: true,
                error_message: Some(e.user_message()),
            }
        }
    };

    Ok(template.into_response())
}

/// Home page form data.
#[derive(Debug, Deserialize)]
pub struct HomeActionForm {
    #[serde(rename = "actionType")]
    pub action_type: Option<String>,
    pub csrf_token: Option<String>,
}

/// POST /app - Home page actions (`actionType=create`).
#[instrument(skip_all, fields(shop = %admin.shop(), action = ?form.action_type))]
pub async fn action(
    admin: ShopAdmin,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<HomeActionForm>,
) -> Response {
    if !verify_csrf(&session, form.csrf_token.as_deref()).await {
        return ActionResult::failed(INVALID_FORM_TOKEN).respond(&headers, "/app");
    }

    let result = match form.action_type.as_deref().unwrap_or("create") {
        "create" => match donation::create_donation_product(&admin.store, Utc::now()).await {
            Ok(product) => ActionResult::ok(format!("\"{}\" created", product.title)),
            Err(e) => {
                tracing::warn!(error = %e, "Donation product not created");
                ActionResult::failed(e.user_message())
            }
        },
        _ => ActionResult::failed("Invalid action type"),
    };

    result.respond(&headers, "/app")
}
