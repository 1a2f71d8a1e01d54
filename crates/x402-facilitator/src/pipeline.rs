//! The settle pipeline: validate → recover signer → check time window →
//! split fee → execute transfer → mint receipt.
//!
//! Stages run sequentially and short-circuit on the first failure. Client
//! faults become [`PipelineError::Reject`] (HTTP 400) with a message naming
//! the offending field; executor and signing faults become
//! [`PipelineError::Fail`] (HTTP 500).

use alloy::primitives::{Address, FixedBytes, U256};
use serde_json::Value;

use x402_core::eip712::{decode_signature_hex, recover_signer};
use x402_core::receipt::{new_receipt_id, sign_receipt, Receipt};
use x402_core::{
    ExactPayload, FacilitatorPayload, Network, SettlementResponse, TransferAuthorization,
    TransferWithAuthorization, CURRENCY, SCHEME_EXACT, X402_VERSION,
};

use crate::fee::split_fee;
use crate::state::AppState;

/// Per-request progress through the pipeline, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    SignatureOk,
    TimeOk,
    TransferOk,
    ReceiptSigned,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::SignatureOk => "signature_ok",
            Stage::TimeOk => "time_ok",
            Stage::TransferOk => "transfer_ok",
            Stage::ReceiptSigned => "receipt_signed",
        }
    }
}

/// Terminal failure modes of the pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// Client-input fault → 400 with the reason.
    Reject(String),
    /// Executor or signing fault → 500 with the reason.
    Fail(String),
}

fn unix_now() -> Result<u64, PipelineError> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| PipelineError::Fail(format!("system time error: {e}")))
}

/// Run one settlement request through the full pipeline.
pub async fn settle(
    state: &AppState,
    raw: &Value,
) -> Result<SettlementResponse, PipelineError> {
    tracing::debug!(stage = Stage::Received.as_str(), "settlement request");

    // 1. Shape validation
    let payload = validate_payload(raw).map_err(PipelineError::Reject)?;
    tracing::debug!(stage = Stage::Validated.as_str(), resource = %payload.resource, "shape ok");

    // 2. Network resolution
    let network = Network::from_caip2(&payload.network).ok_or_else(|| {
        PipelineError::Reject(format!("Unsupported network: {}", payload.network))
    })?;

    let auth = &payload.payload.authorization;
    let value: U256 = auth
        .value
        .parse()
        .map_err(|e| PipelineError::Reject(format!("authorization.value: {e}")))?;

    // 3. Signature recovery
    let sig_bytes = decode_signature_hex(&payload.payload.signature)
        .map_err(|e| PipelineError::Reject(e.to_string()))?;
    let typed = TransferWithAuthorization {
        from: auth.from,
        to: auth.to,
        value,
        validAfter: U256::from(auth.valid_after),
        validBefore: U256::from(auth.valid_before),
        nonce: auth.nonce,
    };
    let recovered = recover_signer(&typed, &sig_bytes, network)
        .map_err(|e| PipelineError::Reject(e.to_string()))?;
    if recovered != auth.from {
        tracing::warn!(
            recovered = %recovered,
            expected = %auth.from,
            "signature mismatch"
        );
        return Err(PipelineError::Reject(format!(
            "Signature mismatch: recovered {recovered}, expected {}",
            auth.from
        )));
    }
    tracing::debug!(stage = Stage::SignatureOk.as_str(), payer = %auth.from, "signer recovered");

    // 4. Time window
    let now = unix_now()?;
    if auth.valid_before <= now {
        return Err(PipelineError::Reject(format!(
            "Authorization expired: validBefore {} is in the past",
            auth.valid_before
        )));
    }
    if auth.valid_after > now {
        return Err(PipelineError::Reject(format!(
            "Authorization not yet valid: validAfter {} is in the future",
            auth.valid_after
        )));
    }
    tracing::debug!(stage = Stage::TimeOk.as_str(), "window ok");

    // 5. Fee split
    let split = split_fee(value, state.config.fee_bps);

    // 6. Transfer execution
    let outcome = state
        .executor
        .execute(&typed, &sig_bytes, network)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, payer = %auth.from, "transfer execution error");
            PipelineError::Fail(e.to_string())
        })?;
    if !outcome.success {
        return Err(PipelineError::Fail("Transfer execution failed".to_string()));
    }
    tracing::debug!(stage = Stage::TransferOk.as_str(), tx = %outcome.tx_hash, "transfer done");

    // 7. Receipt mint
    let receipt = Receipt {
        id: new_receipt_id(),
        content_id: payload.resource.clone(),
        payer: auth.from,
        payee: auth.to,
        amount: split.publisher.to_string(),
        currency: CURRENCY.to_string(),
        chain_id: network.chain_id(),
        tx_hash: outcome.tx_hash.clone(),
        paid_at: now,
        expires_at: now + state.config.receipt_ttl_secs,
        facilitator: state.config.facilitator_url.clone(),
    };
    let token = sign_receipt(&receipt, &state.config.jwt_secret)
        .map_err(|e| PipelineError::Fail(format!("Receipt signing failed: {e}")))?;

    tracing::info!(
        stage = Stage::ReceiptSigned.as_str(),
        payer = %auth.from,
        payee = %auth.to,
        amount = %split.publisher,
        fee = %split.fee,
        tx = %outcome.tx_hash,
        resource = %payload.resource,
        "payment settled"
    );

    Ok(SettlementResponse {
        receipt: token,
        tx_hash: outcome.tx_hash,
    })
}

/// Validate the raw request body field by field, naming the first offender.
pub fn validate_payload(raw: &Value) -> Result<FacilitatorPayload, String> {
    if raw.get("x402Version").and_then(Value::as_u64) != Some(X402_VERSION as u64) {
        return Err("x402Version must be 1".to_string());
    }
    if raw.get("scheme").and_then(Value::as_str) != Some(SCHEME_EXACT) {
        return Err("scheme must be \"exact\"".to_string());
    }
    let network = require_str(raw, "network")?;
    let resource = require_str(raw, "resource")?;

    let inner = raw
        .get("payload")
        .and_then(Value::as_object)
        .ok_or_else(|| "payload is required".to_string())?;

    let signature = inner
        .get("signature")
        .and_then(Value::as_str)
        .ok_or_else(|| "payload.signature must be a string".to_string())?;
    if !signature.starts_with("0x") {
        return Err("payload.signature must be 0x-prefixed".to_string());
    }

    let auth = inner
        .get("authorization")
        .and_then(Value::as_object)
        .ok_or_else(|| "payload.authorization is required".to_string())?;

    let from = require_address(auth, "from")?;
    let to = require_address(auth, "to")?;

    let value_str = auth
        .get("value")
        .and_then(Value::as_str)
        .ok_or_else(|| "authorization.value must be a decimal string".to_string())?;
    let value: U256 = value_str
        .parse()
        .map_err(|_| "authorization.value must fit a 256-bit unsigned integer".to_string())?;
    if value < U256::ONE {
        return Err("authorization.value must be at least 1".to_string());
    }

    let valid_after = require_u64(auth, "validAfter")?;
    let valid_before = require_u64(auth, "validBefore")?;
    if valid_after >= valid_before {
        return Err("authorization.validAfter must be less than validBefore".to_string());
    }

    let nonce_str = auth
        .get("nonce")
        .and_then(Value::as_str)
        .ok_or_else(|| "authorization.nonce must be a string".to_string())?;
    if !nonce_str.starts_with("0x") {
        return Err("authorization.nonce must be 0x-prefixed".to_string());
    }
    let nonce_bytes = alloy::hex::decode(&nonce_str[2..])
        .map_err(|_| "authorization.nonce must be valid hex".to_string())?;
    if nonce_bytes.len() != 32 {
        return Err("authorization.nonce must be 32 bytes".to_string());
    }
    let nonce = FixedBytes::<32>::from_slice(&nonce_bytes);

    Ok(FacilitatorPayload {
        x402_version: X402_VERSION,
        scheme: SCHEME_EXACT.to_string(),
        network: network.to_string(),
        payload: ExactPayload {
            signature: signature.to_string(),
            authorization: TransferAuthorization {
                from,
                to,
                value: value_str.to_string(),
                valid_after,
                valid_before,
                nonce,
            },
        },
        resource: resource.to_string(),
    })
}

fn require_str<'a>(raw: &'a Value, key: &str) -> Result<&'a str, String> {
    raw.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{key} must be a string"))
}

fn require_u64(
    obj: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<u64, String> {
    obj.get(key)
        .and_then(Value::as_u64)
        .ok_or_else(|| format!("authorization.{key} must be an unsigned integer"))
}

fn require_address(
    obj: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Address, String> {
    let s = obj
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("authorization.{key} must be a string"))?;
    if !s.starts_with("0x") {
        return Err(format!("authorization.{key} must be 0x-prefixed"));
    }
    s.parse()
        .map_err(|_| format!("authorization.{key} is not a valid address"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_body() -> Value {
        json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "eip155:8453",
            "resource": "article-1",
            "payload": {
                "signature": format!("0x{}", "ab".repeat(65)),
                "authorization": {
                    "from": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
                    "to": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
                    "value": "100000",
                    "validAfter": 0,
                    "validBefore": 9_999_999_999u64,
                    "nonce": format!("0x{}", "ab".repeat(32)),
                }
            }
        })
    }

    #[test]
    fn valid_body_parses() {
        let payload = validate_payload(&sample_body()).unwrap();
        assert_eq!(payload.resource, "article-1");
        assert_eq!(payload.payload.authorization.value, "100000");
    }

    #[test]
    fn rejects_wrong_version() {
        let mut body = sample_body();
        body["x402Version"] = json!(2);
        assert_eq!(validate_payload(&body).unwrap_err(), "x402Version must be 1");
    }

    #[test]
    fn rejects_wrong_scheme() {
        let mut body = sample_body();
        body["scheme"] = json!("permit");
        assert!(validate_payload(&body).unwrap_err().contains("exact"));
    }

    #[test]
    fn rejects_missing_network() {
        let mut body = sample_body();
        body.as_object_mut().unwrap().remove("network");
        assert!(validate_payload(&body).unwrap_err().contains("network"));
    }

    #[test]
    fn rejects_unprefixed_signature() {
        let mut body = sample_body();
        body["payload"]["signature"] = json!("abcd");
        assert!(validate_payload(&body)
            .unwrap_err()
            .contains("payload.signature"));
    }

    #[test]
    fn rejects_bad_address() {
        let mut body = sample_body();
        body["payload"]["authorization"]["from"] = json!("0x1234");
        assert!(validate_payload(&body)
            .unwrap_err()
            .contains("authorization.from"));
    }

    #[test]
    fn rejects_zero_value() {
        let mut body = sample_body();
        body["payload"]["authorization"]["value"] = json!("0");
        assert!(validate_payload(&body).unwrap_err().contains("at least 1"));
    }

    #[test]
    fn rejects_inverted_window() {
        let mut body = sample_body();
        body["payload"]["authorization"]["validAfter"] = json!(100);
        body["payload"]["authorization"]["validBefore"] = json!(50);
        assert!(validate_payload(&body)
            .unwrap_err()
            .contains("validAfter must be less than validBefore"));
    }

    #[test]
    fn rejects_short_nonce() {
        let mut body = sample_body();
        body["payload"]["authorization"]["nonce"] = json!("0xabcd");
        assert!(validate_payload(&body).unwrap_err().contains("32 bytes"));
    }
}
