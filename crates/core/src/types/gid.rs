//! Newtype wrappers for Shopify global IDs.
//!
//! The Admin GraphQL API identifies records as `gid://shopify/<Resource>/<n>`
//! while REST webhook payloads carry the bare numeric id. Use the
//! `define_gid!` macro to create wrappers that keep the two comparable without
//! mixing up resources.

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe Shopify GID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `from_numeric()`, `as_str()`, `numeric()`
/// - `From<String>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use canopy_core::define_gid;
/// define_gid!(ProductGid, "Product");
///
/// let id = ProductGid::from_numeric(42);
/// assert_eq!(id.as_str(), "gid://shopify/Product/42");
/// assert_eq!(id.numeric(), "42");
/// assert!(id.matches("42"));
/// ```
#[macro_export]
macro_rules! define_gid {
    ($name:ident, $resource:literal) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Shopify resource name used in the GID path.
            pub const RESOURCE: &'static str = $resource;

            /// Wrap an existing GID (or bare numeric id) string.
            #[must_use]
            pub fn new(gid: impl Into<String>) -> Self {
                Self(gid.into())
            }

            /// Build a full GID from a numeric REST id.
            #[must_use]
            pub fn from_numeric(id: u64) -> Self {
                Self(format!("gid://shopify/{}/{id}", $resource))
            }

            /// Get the underlying string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Get the trailing numeric part of the id.
            #[must_use]
            pub fn numeric(&self) -> &str {
                $crate::types::gid::numeric_id(&self.0)
            }

            /// Compare against a GID or bare numeric id from another source.
            #[must_use]
            pub fn matches(&self, other: &str) -> bool {
                !other.is_empty() && $crate::types::gid::numeric_id(other) == self.numeric()
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(gid: String) -> Self {
                Self(gid)
            }
        }

        impl From<&str> for $name {
            fn from(gid: &str) -> Self {
                Self(gid.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Extract the numeric part of a Shopify GID.
///
/// Values that are not GIDs are returned unchanged, so `"123"` and
/// `"gid://shopify/Product/123"` both yield `"123"`. Query suffixes such as
/// `?inventory_item=1` are dropped.
#[must_use]
pub fn numeric_id(id: &str) -> &str {
    if !id.starts_with("gid://") {
        return id;
    }
    let tail = id.rsplit_once('/').map_or(id, |(_, tail)| tail);
    tail.split_once('?').map_or(tail, |(numeric, _)| numeric)
}

define_gid!(ProductGid, "Product");
define_gid!(VariantGid, "ProductVariant");

/// A shop's permanent `*.myshopify.com` domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Validate and normalize a shop domain.
    ///
    /// Accepts `name.myshopify.com` (lowercased, optional scheme and trailing
    /// slash stripped) or an exact match against one of `custom_domains`.
    #[must_use]
    pub fn parse(raw: &str, custom_domains: &[String]) -> Option<Self> {
        let trimmed = raw
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_ascii_lowercase();

        if custom_domains.iter().any(|d| d.eq_ignore_ascii_case(&trimmed)) {
            return Some(Self(trimmed));
        }

        let name = trimmed.strip_suffix(".myshopify.com")?;
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !name.starts_with('-');

        valid.then_some(Self(trimmed))
    }

    /// Get the domain string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
