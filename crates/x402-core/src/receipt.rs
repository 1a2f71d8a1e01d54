//! Signed payment receipts.
//!
//! A receipt is a compact three-segment token (`header.payload.signature`)
//! minted by the facilitator after settlement and accepted by resource
//! servers in lieu of re-payment. The default trust model is symmetric
//! (HMAC-SHA256 over a shared secret); verification alternatively accepts
//! an ECDSA P-256 public key, or decodes without verification for display.

use alloy::primitives::Address;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ReceiptError;

/// Proof of payment for one piece of content.
///
/// `amount` is the publisher share after the facilitator fee, in smallest
/// units. `paid_at`/`expires_at` are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: String,
    pub content_id: String,
    pub payer: Address,
    pub payee: Address,
    pub amount: String,
    pub currency: String,
    pub chain_id: u64,
    pub tx_hash: String,
    pub paid_at: u64,
    pub expires_at: u64,
    pub facilitator: String,
}

/// Token claims: every receipt field plus the registered claims mirroring
/// payer and the validity window.
#[derive(Debug, Serialize, Deserialize)]
struct ReceiptClaims {
    #[serde(flatten)]
    receipt: Receipt,
    sub: String,
    iat: u64,
    exp: u64,
}

/// Generate a fresh opaque receipt id.
pub fn new_receipt_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Sign a receipt with the facilitator's secret (HS256).
pub fn sign_receipt(receipt: &Receipt, secret: &[u8]) -> Result<String, ReceiptError> {
    let claims = ReceiptClaims {
        sub: receipt.payer.to_string(),
        iat: receipt.paid_at,
        exp: receipt.expires_at,
        receipt: receipt.clone(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| ReceiptError::Invalid(format!("signing failed: {e}")))
}

/// Receipt verification policy.
///
/// Exactly one trust anchor applies, checked in order: a shared HMAC secret,
/// an ECDSA P-256 public key (SPKI PEM), or neither — in which case the
/// token is decoded without signature verification and must not be used to
/// authorize access. Expiry and, when set, the expected content id are
/// enforced on every path.
#[derive(Default, Clone)]
pub struct ReceiptVerifier {
    jwt_secret: Option<Vec<u8>>,
    public_key_pem: Option<String>,
    expected_content_id: Option<String>,
}

impl ReceiptVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify with a shared HMAC secret.
    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    /// Verify with an ECDSA P-256 public key in SPKI PEM form.
    pub fn with_public_key(mut self, pem: impl Into<String>) -> Self {
        self.public_key_pem = Some(pem.into());
        self
    }

    /// Additionally require the receipt to cover this content id.
    pub fn expecting_content_id(mut self, content_id: impl Into<String>) -> Self {
        self.expected_content_id = Some(content_id.into());
        self
    }

    /// Verify a token and return the embedded receipt.
    pub fn verify(&self, token: &str) -> Result<Receipt, ReceiptError> {
        if token.is_empty() {
            return Err(ReceiptError::Missing);
        }

        let receipt = if let Some(secret) = &self.jwt_secret {
            decode_checked(token, &DecodingKey::from_secret(secret), Algorithm::HS256)?
        } else if let Some(pem) = &self.public_key_pem {
            let key = DecodingKey::from_ec_pem(pem.as_bytes())
                .map_err(|e| ReceiptError::Invalid(format!("invalid public key: {e}")))?;
            decode_checked(token, &key, Algorithm::ES256)?
        } else {
            decode_receipt_unverified(token)?
        };

        if let Some(expected) = &self.expected_content_id {
            if receipt.content_id != *expected {
                return Err(ReceiptError::Invalid(format!(
                    "receipt is for content '{}', expected '{expected}'",
                    receipt.content_id
                )));
            }
        }

        Ok(receipt)
    }
}

fn decode_checked(
    token: &str,
    key: &DecodingKey,
    alg: Algorithm,
) -> Result<Receipt, ReceiptError> {
    let mut validation = Validation::new(alg);
    validation.leeway = 0;

    let data = decode::<ReceiptClaims>(token, key, &validation).map_err(|e| {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => ReceiptError::Expired,
            _ => ReceiptError::Invalid(e.to_string()),
        }
    })?;
    Ok(data.claims.receipt)
}

/// Decode a receipt without checking its signature. Expiry is still
/// enforced. Display-only: never authorize access from this result.
pub fn decode_receipt_unverified(token: &str) -> Result<Receipt, ReceiptError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.leeway = 0;

    let data =
        decode::<ReceiptClaims>(token, &DecodingKey::from_secret(&[]), &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => ReceiptError::Expired,
                _ => ReceiptError::Invalid(e.to_string()),
            },
        )?;
    Ok(data.claims.receipt)
}
