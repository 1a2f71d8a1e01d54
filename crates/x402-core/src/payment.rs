use alloy::primitives::{Address, FixedBytes};
use serde::{Deserialize, Serialize};

/// EIP-3009 authorization as it travels on the wire. `value` stays a decimal
/// string so 256-bit amounts survive JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAuthorization {
    pub from: Address,
    pub to: Address,
    pub value: String,
    pub valid_after: u64,
    pub valid_before: u64,
    pub nonce: FixedBytes<32>,
}

/// Signature + authorization pair inside a facilitator payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPayload {
    pub signature: String,
    pub authorization: TransferAuthorization,
}

/// Request body POSTed to the facilitator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorPayload {
    pub x402_version: u32,
    pub scheme: String,
    pub network: String,
    pub payload: ExactPayload,
    pub resource: String,
}

/// Successful facilitator response: the signed receipt plus the settlement
/// transaction hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub receipt: String,
    pub tx_hash: String,
}

/// Payment parameters a resource server announces with a 402. The same
/// information is carried in both the response body and `X-402-*` headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub pay_to: String,
    pub price: String,
    pub currency: String,
    pub content_id: String,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facilitator_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A single entry in the `accepts` array of a 402 body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentScheme {
    pub scheme: String,
    pub network: String,
    pub max_amount_required: String,
    pub resource: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mime_type: String,
    /// EIP-712 typed-data skeleton with unfilled from/validAfter/validBefore/nonce.
    pub payload: serde_json::Value,
}
