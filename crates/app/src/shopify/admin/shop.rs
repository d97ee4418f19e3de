//! Shop information for the Admin API.

use tracing::instrument;

use super::{
    AdminClient, AdminShopifyError,
    queries::{ShopDomain, shop_domain},
};

impl AdminClient {
    /// Get the shop's permanent `*.myshopify.com` domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(shop = %self.shop()))]
    pub async fn shop_domain(&self) -> Result<String, AdminShopifyError> {
        let response = self.execute::<ShopDomain>(shop_domain::Variables).await?;
        Ok(response.shop.myshopify_domain)
    }
}
