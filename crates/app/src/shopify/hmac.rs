//! Shopify request signature verification.
//!
//! Shopify signs three kinds of inbound requests with the app's API secret:
//!
//! - OAuth callbacks and embedded app launches: hex HMAC-SHA256 over the
//!   sorted `key=value` query pairs joined by `&`, without `hmac`/`signature`
//! - Webhooks: base64 HMAC-SHA256 of the raw body in `X-Shopify-Hmac-Sha256`
//! - App proxy requests: hex HMAC-SHA256 over the sorted `key=value` pairs
//!   concatenated without a separator, repeated keys joined by `,`
//!
//! All comparisons go through [`Mac::verify_slice`], which is constant-time.
//! Query-signed requests also carry a `timestamp`; [`timestamp_is_fresh`]
//! bounds how long a captured URL can be replayed.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook body signature.
pub const WEBHOOK_HMAC_HEADER: &str = "X-Shopify-Hmac-Sha256";

/// Maximum distance in seconds between a signed request's `timestamp` and now.
pub const MAX_TIMESTAMP_SKEW_SECS: u64 = 300;

fn mac_for(secret: &str, message: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message);
    Some(mac)
}

fn parse_pairs(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Build the message Shopify signs for OAuth and launch requests.
fn query_message(pairs: &[(String, String)]) -> String {
    let mut filtered: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(k, _)| k != "hmac" && k != "signature")
        .collect();
    filtered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    filtered
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the message Shopify signs for app proxy requests.
fn proxy_message(pairs: &[(String, String)]) -> String {
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (k, v) in pairs.iter().filter(|(k, _)| k != "signature") {
        grouped.entry(k.as_str()).or_default().push(v.as_str());
    }
    grouped
        .into_iter()
        .map(|(k, values)| format!("{k}={}", values.join(",")))
        .collect()
}

/// Compute the hex signature for OAuth/launch query pairs.
#[must_use]
pub fn sign_query(pairs: &[(String, String)], secret: &str) -> String {
    mac_for(secret, query_message(pairs).as_bytes())
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Compute the hex signature for app proxy query pairs.
#[must_use]
pub fn sign_proxy_query(pairs: &[(String, String)], secret: &str) -> String {
    mac_for(secret, proxy_message(pairs).as_bytes())
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Compute the base64 signature for a webhook body.
#[must_use]
pub fn sign_webhook(body: &[u8], secret: &str) -> String {
    mac_for(secret, body)
        .map(|mac| BASE64.encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Verify the `hmac` parameter of an OAuth callback or embedded launch query.
#[must_use]
pub fn verify_query_hmac(query: &str, secret: &str) -> bool {
    let pairs = parse_pairs(query);
    let Some(provided) = pairs.iter().find(|(k, _)| k == "hmac").map(|(_, v)| v) else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    mac_for(secret, query_message(&pairs).as_bytes())
        .is_some_and(|mac| mac.verify_slice(&provided).is_ok())
}

/// Verify the `signature` parameter of an app proxy request.
#[must_use]
pub fn verify_proxy_signature(query: &str, secret: &str) -> bool {
    let pairs = parse_pairs(query);
    let Some(provided) = pairs
        .iter()
        .find(|(k, _)| k == "signature")
        .map(|(_, v)| v)
    else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    mac_for(secret, proxy_message(&pairs).as_bytes())
        .is_some_and(|mac| mac.verify_slice(&provided).is_ok())
}

/// Check that the `timestamp` query parameter is within
/// [`MAX_TIMESTAMP_SKEW_SECS`] of `now`. A missing or malformed value fails.
#[must_use]
pub fn timestamp_is_fresh(query: &str, now: DateTime<Utc>) -> bool {
    parse_pairs(query)
        .iter()
        .find(|(k, _)| k == "timestamp")
        .and_then(|(_, v)| v.parse::<i64>().ok())
        .is_some_and(|ts| now.timestamp().abs_diff(ts) <= MAX_TIMESTAMP_SKEW_SECS)
}

/// Verify a webhook body against its `X-Shopify-Hmac-Sha256` header value.
#[must_use]
pub fn verify_webhook_hmac(body: &[u8], header: &str, secret: &str) -> bool {
    let Ok(provided) = BASE64.decode(header.trim()) else {
        return false;
    };
    mac_for(secret, body).is_some_and(|mac| mac.verify_slice(&provided).is_ok())
}
