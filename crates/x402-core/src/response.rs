//! 402 response assembly and parsing.
//!
//! The assembler produces the header set and JSON body a resource server
//! returns with a 402; the parser is its inverse on the client side, reading
//! the body first and falling back to headers per field.

use alloy::primitives::Address;
use serde_json::json;

use crate::error::CoreError;
use crate::headers;
use crate::network::{Network, CURRENCY};
use crate::payment::{PaymentRequest, PaymentScheme};
use crate::price::parse_price;
use crate::{SCHEME_EXACT, X402_VERSION};

/// Static configuration of a paid publisher: who gets paid, how much, where.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub pay_to: Address,
    pub price: String,
    pub network: Network,
    pub facilitator_url: String,
    pub description: Option<String>,
}

/// Build the 402 payment parameters for one piece of content.
pub fn payment_request(config: &PublisherConfig, content_id: &str) -> PaymentRequest {
    PaymentRequest {
        pay_to: config.pay_to.to_string(),
        price: config.price.clone(),
        currency: CURRENCY.to_string(),
        content_id: content_id.to_string(),
        network: config.network.key().to_string(),
        facilitator_url: Some(config.facilitator_url.clone()),
        description: config.description.clone(),
    }
}

/// Header set for a 402 response. Deterministic for identical requests.
pub fn response_headers(request: &PaymentRequest) -> Vec<(&'static str, String)> {
    let mut out = vec![
        (headers::PAY_TO, request.pay_to.clone()),
        (headers::PRICE, request.price.clone()),
        (headers::CURRENCY, request.currency.clone()),
        (headers::NETWORK, request.network.clone()),
        (headers::CONTENT_ID, request.content_id.clone()),
    ];
    if let Some(url) = &request.facilitator_url {
        out.push((headers::FACILITATOR, url.clone()));
    }
    if let Some(desc) = &request.description {
        out.push((headers::DESCRIPTION, desc.clone()));
    }
    out
}

/// JSON body for a 402 response: the payment parameters plus an `accepts`
/// array holding the one supported scheme with its EIP-712 skeleton.
pub fn response_body(request: &PaymentRequest) -> Result<serde_json::Value, CoreError> {
    let network = Network::from_key(&request.network)
        .ok_or_else(|| CoreError::UnsupportedNetwork(request.network.clone()))?;
    let max_amount = parse_price(&request.price)?;

    let scheme = PaymentScheme {
        scheme: SCHEME_EXACT.to_string(),
        network: network.caip2().to_string(),
        max_amount_required: max_amount.clone(),
        resource: request.content_id.clone(),
        description: request.description.clone(),
        mime_type: "application/json".to_string(),
        payload: eip712_skeleton(network, &request.pay_to, &max_amount),
    };

    let mut body = serde_json::to_value(request)?;
    body["accepts"] = json!([scheme]);
    Ok(body)
}

/// EIP-712 typed-data template the client fills in before signing.
/// `from`, `validAfter`, `validBefore`, and `nonce` stay null.
fn eip712_skeleton(network: Network, pay_to: &str, value: &str) -> serde_json::Value {
    json!({
        "types": {
            "TransferWithAuthorization": [
                {"name": "from", "type": "address"},
                {"name": "to", "type": "address"},
                {"name": "value", "type": "uint256"},
                {"name": "validAfter", "type": "uint256"},
                {"name": "validBefore", "type": "uint256"},
                {"name": "nonce", "type": "bytes32"},
            ],
        },
        "primaryType": "TransferWithAuthorization",
        "domain": {
            "name": "USD Coin",
            "version": "2",
            "chainId": network.chain_id(),
            "verifyingContract": network.usdc_address().to_string(),
        },
        "message": {
            "from": null,
            "to": pay_to,
            "value": value,
            "validAfter": null,
            "validBefore": null,
            "nonce": null,
        },
    })
}

/// Parse a 402 response back into payment parameters.
///
/// Each field is read from the body first, then from headers. Returns `None`
/// when any of `payTo`, `price`, `contentId`, `network` cannot be found.
pub fn parse_payment_request(
    body: Option<&serde_json::Value>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<PaymentRequest> {
    let field = |key: &str, header: &str| -> Option<String> {
        body.and_then(|b| b.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| lookup(header))
    };

    Some(PaymentRequest {
        pay_to: field("payTo", headers::PAY_TO)?,
        price: field("price", headers::PRICE)?,
        currency: field("currency", headers::CURRENCY).unwrap_or_else(|| CURRENCY.to_string()),
        content_id: field("contentId", headers::CONTENT_ID)?,
        network: field("network", headers::NETWORK)?,
        facilitator_url: field("facilitatorUrl", headers::FACILITATOR),
        description: field("description", headers::DESCRIPTION),
    })
}
