//! The `X-402-*` header set and receipt extraction.
//!
//! Header names are written in their canonical case; lookups are
//! case-insensitive (the caller supplies the getter, and HTTP header maps
//! are case-insensitive already).

pub const PAY_TO: &str = "X-402-PayTo";
pub const PRICE: &str = "X-402-Price";
pub const CURRENCY: &str = "X-402-Currency";
pub const NETWORK: &str = "X-402-Network";
pub const FACILITATOR: &str = "X-402-Facilitator";
pub const CONTENT_ID: &str = "X-402-Content-Id";
pub const DESCRIPTION: &str = "X-402-Description";
pub const RECEIPT: &str = "X-402-Receipt";

/// Alternate receipt-carrying header.
pub const X_PAYMENT: &str = "X-PAYMENT";

/// Facilitator-originated data attached to protected 200 responses.
pub const PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";

/// Scheme prefix recognized in the `Authorization` header.
pub const AUTH_SCHEME_PREFIX: &str = "X402 ";

/// Pull a receipt token out of inbound headers.
///
/// Checks, in order: `X-402-Receipt`, `X-PAYMENT`, then `Authorization`
/// when it starts with `"X402 "` (prefix stripped).
pub fn extract_receipt(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(token) = lookup(RECEIPT) {
        return Some(token);
    }
    if let Some(token) = lookup(X_PAYMENT) {
        return Some(token);
    }
    lookup("Authorization")
        .and_then(|v| v.strip_prefix(AUTH_SCHEME_PREFIX).map(str::to_string))
}
