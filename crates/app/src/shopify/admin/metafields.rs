//! App installation metafield operations for the Admin API.

use tracing::instrument;

use super::{
    AdminClient, AdminShopifyError,
    conversions::{convert_metafield, convert_user_errors, error_code_to_string},
    queries::{
        AppMetafield, AppMetafields, CurrentAppInstallation, MetafieldsDelete, MetafieldsSet,
        app_metafield, app_metafields, current_app_installation, metafields_delete,
        metafields_set,
    },
};
use crate::shopify::types::{
    Metafield, MetafieldIdentifierInput, MetafieldsSetInput, UserError, format_user_errors,
};

impl AdminClient {
    /// Get the GID of the current app installation (the metafield owner).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(shop = %self.shop()))]
    pub async fn current_app_installation_id(&self) -> Result<String, AdminShopifyError> {
        let response = self
            .execute::<CurrentAppInstallation>(current_app_installation::Variables)
            .await?;
        Ok(response.current_app_installation.id)
    }

    /// List the first `first` app metafields in a namespace.
    ///
    /// With `keys`, only those `namespace.key` identifiers are returned.
    /// Returns the installation GID alongside the metafields.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(shop = %self.shop()))]
    pub async fn app_metafields(
        &self,
        namespace: &str,
        first: i64,
        keys: Option<Vec<String>>,
    ) -> Result<(String, Vec<Metafield>), AdminShopifyError> {
        let variables = app_metafields::Variables {
            namespace: namespace.to_string(),
            first,
            keys,
        };

        let response = self.execute::<AppMetafields>(variables).await?;
        let installation = response.current_app_installation;

        Ok((
            installation.id,
            installation
                .metafields
                .nodes
                .into_iter()
                .map(|node| convert_metafield!(node))
                .collect(),
        ))
    }

    /// Look up a single app metafield.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(shop = %self.shop()))]
    pub async fn app_metafield(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<Metafield>, AdminShopifyError> {
        let variables = app_metafield::Variables {
            namespace: namespace.to_string(),
            key: key.to_string(),
        };

        let response = self.execute::<AppMetafield>(variables).await?;

        Ok(response
            .current_app_installation
            .metafield
            .map(|node| convert_metafield!(node)))
    }

    /// Set metafields in a single `metafieldsSet` call.
    ///
    /// # Errors
    ///
    /// Returns `AdminShopifyError::UserError` if Shopify rejects any input.
    #[instrument(skip(self, metafields), fields(shop = %self.shop(), count = metafields.len()))]
    pub async fn set_metafields(
        &self,
        metafields: Vec<MetafieldsSetInput>,
    ) -> Result<Vec<Metafield>, AdminShopifyError> {
        let variables = metafields_set::Variables {
            metafields: metafields
                .into_iter()
                .map(|m| metafields_set::MetafieldsSetInput {
                    owner_id: m.owner_id,
                    namespace: Some(m.namespace),
                    key: m.key,
                    value: m.value,
                    type_: Some(m.type_),
                })
                .collect(),
        };

        let response = self.execute::<MetafieldsSet>(variables).await?;

        let Some(payload) = response.metafields_set else {
            return Ok(Vec::new());
        };

        let user_errors: Vec<UserError> = payload
            .user_errors
            .into_iter()
            .map(|e| UserError {
                field: e.field,
                message: e.message,
                code: e.code.map(error_code_to_string),
            })
            .collect();
        if !user_errors.is_empty() {
            return Err(AdminShopifyError::UserError(format_user_errors(
                &user_errors,
            )));
        }

        Ok(payload
            .metafields
            .unwrap_or_default()
            .into_iter()
            .map(|node| convert_metafield!(node))
            .collect())
    }

    /// Delete metafields by owner, namespace and key.
    ///
    /// Returns the number of metafields Shopify reports as deleted.
    ///
    /// # Errors
    ///
    /// Returns `AdminShopifyError::UserError` if Shopify rejects any input.
    #[instrument(skip(self, metafields), fields(shop = %self.shop(), count = metafields.len()))]
    pub async fn delete_metafields(
        &self,
        metafields: Vec<MetafieldIdentifierInput>,
    ) -> Result<usize, AdminShopifyError> {
        let variables = metafields_delete::Variables {
            metafields: metafields
                .into_iter()
                .map(|m| metafields_delete::MetafieldIdentifierInput {
                    owner_id: m.owner_id,
                    namespace: m.namespace,
                    key: m.key,
                })
                .collect(),
        };

        let response = self.execute::<MetafieldsDelete>(variables).await?;

        let Some(payload) = response.metafields_delete else {
            return Ok(0);
        };

        let user_errors = convert_user_errors!(payload.user_errors);
        if !user_errors.is_empty() {
            return Err(AdminShopifyError::UserError(format_user_errors(
                &user_errors,
            )));
        }

        Ok(payload
            .deleted_metafields
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .count())
    }
}
