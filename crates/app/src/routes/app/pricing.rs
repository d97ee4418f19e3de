//! Pricing page: plan catalogue and current usage.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tower_sessions::Session;
use tracing::instrument;

use canopy_core::Plan;

use super::{BannerQuery, Layout};
use crate::error::AppError;
use crate::middleware::ShopAdmin;
use crate::services::UsageSnapshot;
use crate::state::AppState;

/// A plan in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCard {
    pub plan: Plan,
    pub name: &'static str,
    pub price: &'static str,
    pub features: Vec<String>,
    pub current: bool,
}

/// The plan catalogue, with `current` marking the shop's plan.
#[must_use]
pub fn plan_catalogue(current: Plan, free_limit: i64) -> Vec<PlanCard> {
    let card = |plan: Plan, name, price, features: Vec<String>| PlanCard {
        plan,
        name,
        price,
        features,
        current: plan == current,
    };
    vec![
        card(
            Plan::Free,
            "Free",
            "$0",
            vec![
                format!("{free_limit} tracked donations per month"),
                "Cart donation checkbox".to_string(),
                "Donation dashboard".to_string(),
            ],
        ),
        card(
            Plan::Essential,
            "Essential",
            "$6.99/month",
            vec![
                "Unlimited tracked donations".to_string(),
                "Orders export".to_string(),
                "Email support".to_string(),
            ],
        ),
        card(
            Plan::Professional,
            "Professional",
            "$29.99/month",
            vec![
                "Everything in Essential".to_string(),
                "Impact reporting".to_string(),
                "Priority support".to_string(),
            ],
        ),
    ]
}

/// Pricing page template.
#[derive(Template, WebTemplate)]
#[template(path = "app/pricing.html")]
pub struct PricingTemplate {
    pub layout: Layout,
    pub plans: Vec<PlanCard>,
    pub usage_count: i64,
    pub usage_limit: Option<i64>,
    pub percent_used: i64,
    pub limit_reached: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
}

/// GET /app/pricing - Plans and usage.
#[instrument(skip_all, fields(shop = %admin.shop()))]
pub async fn index(
    admin: ShopAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(banner): Query<BannerQuery>,
) -> Result<Response, AppError> {
    let layout = Layout::new(&state, &admin, &session, "/app/pricing", banner).await?;
    let free_limit = state.config().donation.free_plan_monthly_limit;

    let template = match admin.store.settings().await {
        Ok(metafields) => {
            let usage = UsageSnapshot::from_metafields(&metafields, free_limit, Utc::now());
            PricingTemplate {
                layout,
                plans: plan_catalogue(usage.plan, free_limit),
                usage_count: usage.count(),
                usage_limit: usage.limit,
                percent_used: usage.percent_used().unwrap_or(0),
                limit_reached: usage.limit_reached(),
                has_error: false,
                error_message: None,
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load usage");
            PricingTemplate {
                layout,
                plans: plan_catalogue(Plan::Free, free_limit),
                usage_count: 0,
                usage_limit: Some(free_limit),
                percent_used: 0,
                limit_reached: false,
                has_error: true,
                error_message: Some("Could not load usage from Shopify.".to_string()),
            }
        }
    };

    Ok(template.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_catalogue_marks_current() {
        let plans = plan_catalogue(Plan::Essential, 50);
        assert_eq!(plans.len(), 3);
        assert_eq!(
            plans.iter().filter(|p| p.current).map(|p| p.plan).collect::<Vec<_>>(),
            vec![Plan::Essential]
        );
        assert!(plans.iter().any(|p| p.features.contains(&"50 tracked donations per month".to_string())));
    }
}
