//! One-shot stateless payment.
//!
//! Same pipeline as [`Agent::fetch`](crate::Agent::fetch) minus the cache,
//! budget, and events: a per-call `max_price` guard, an optional one-shot
//! temporary wallet, and the standard facilitator retry only.

use alloy::primitives::U256;
use alloy::signers::local::PrivateKeySigner;

use x402_core::price::parse_price;
use x402_core::response::parse_payment_request;

use crate::client::{
    attach_receipt, build_signed_payload, default_http_client, resolve_network, submit_payment,
    RetryConfig,
};
use crate::error::AgentError;

/// Fetch a 402-gated resource once, paying at most `max_price`.
///
/// When `signer` is `None`, a fresh throwaway key signs the authorization —
/// only useful against facilitators in mock mode, since the key holds no
/// funds.
pub async fn pay_once(
    url: &str,
    method: reqwest::Method,
    max_price: &str,
    signer: Option<PrivateKeySigner>,
) -> Result<reqwest::Response, AgentError> {
    let http = default_http_client();
    let signer = signer.unwrap_or_else(PrivateKeySigner::random);

    let max_amount: U256 = parse_price(max_price)
        .map_err(|e| AgentError::PaymentFailed(format!("invalid max_price: {e}")))?
        .parse()
        .map_err(|e| AgentError::PaymentFailed(format!("invalid max_price: {e}")))?;

    let resp = http
        .request(method.clone(), url)
        .send()
        .await
        .map_err(|e| AgentError::Network(e.to_string()))?;
    if resp.status().as_u16() != 402 {
        return Ok(resp);
    }

    let header_map = resp.headers().clone();
    let body: Option<serde_json::Value> = resp.json().await.ok();
    let request = parse_payment_request(body.as_ref(), |name| {
        header_map
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    })
    .ok_or(AgentError::Invalid402Response)?;

    let amount: U256 = parse_price(&request.price)
        .map_err(|_| AgentError::Invalid402Response)?
        .parse()
        .map_err(|_| AgentError::Invalid402Response)?;
    if amount > max_amount {
        return Err(AgentError::PerRequestLimit(format!(
            "resource costs {} which exceeds max_price {max_price}",
            request.price
        )));
    }

    let network = resolve_network(&request.network).ok_or(AgentError::Invalid402Response)?;
    let pay_to = request
        .pay_to
        .parse()
        .map_err(|_| AgentError::Invalid402Response)?;
    let facilitator = request
        .facilitator_url
        .as_deref()
        .ok_or_else(|| AgentError::PaymentFailed("no facilitator url announced".to_string()))?;

    let payload =
        build_signed_payload(&signer, network, pay_to, amount, &request.content_id)?;
    let settlement =
        submit_payment(&http, facilitator, &payload, &RetryConfig::default()).await?;

    attach_receipt(http.request(method, url), &settlement.receipt)
        .send()
        .await
        .map_err(|e| AgentError::Network(e.to_string()))
}
