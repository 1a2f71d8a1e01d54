//! Payment gating for resource servers.
//!
//! A [`Gate`] wraps route handling with receipt verification: extract the
//! token from inbound headers, verify it against the configured trust
//! anchor, and either hand the request through with the receipt attached or
//! answer 402 with a fresh payment request. A failed verification is
//! indistinguishable from a first unauthenticated request.

pub mod middleware;

use std::time::{Duration, Instant};

use dashmap::DashMap;

use x402_core::headers::extract_receipt;
use x402_core::receipt::{Receipt, ReceiptVerifier};
use x402_core::response::{payment_request, PublisherConfig};
use x402_core::PaymentRequest;

pub use middleware::{
    payment_required_response, payment_response_header, require_payment, require_payment_for,
};

/// Gate configuration: publisher payment parameters plus the receipt trust
/// anchor. Exactly one of `jwt_secret` / `facilitator_public_key` should be
/// set; with neither, tokens are decoded unverified and the gate must not
/// be used to protect anything real.
pub struct GateConfig {
    pub publisher: PublisherConfig,
    pub jwt_secret: Option<Vec<u8>>,
    /// ECDSA P-256 public key, SPKI PEM.
    pub facilitator_public_key: Option<String>,
    /// How long a positive verification may be served from cache.
    pub verify_ttl: Duration,
    /// Lazy-eviction trigger for the verification cache.
    pub max_cache_entries: usize,
}

impl GateConfig {
    /// Symmetric-trust gate sharing a secret with the facilitator.
    pub fn with_secret(publisher: PublisherConfig, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            publisher,
            jwt_secret: Some(secret.into()),
            facilitator_public_key: None,
            verify_ttl: Duration::from_secs(60),
            max_cache_entries: 1_000,
        }
    }

    /// Asymmetric-trust gate holding only the facilitator's public key.
    pub fn with_public_key(publisher: PublisherConfig, pem: impl Into<String>) -> Self {
        Self {
            publisher,
            jwt_secret: None,
            facilitator_public_key: Some(pem.into()),
            verify_ttl: Duration::from_secs(60),
            max_cache_entries: 1_000,
        }
    }
}

/// Outcome of gating one request.
pub enum GateDecision {
    /// Receipt verified: pass through with payment context.
    Paid(PaidContext),
    /// No or bad receipt: answer 402 with these parameters.
    Unpaid(PaymentRequest),
}

/// Handed to the wrapped handler on success.
#[derive(Debug, Clone)]
pub struct PaidContext {
    pub receipt: Receipt,
    pub content_id: String,
    pub receipt_token: String,
}

struct CachedVerification {
    receipt: Receipt,
    verified_at: Instant,
}

/// Receipt-checking gate shared across requests.
pub struct Gate {
    config: GateConfig,
    cache: DashMap<String, CachedVerification>,
}

impl Gate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            cache: DashMap::new(),
        }
    }

    /// Gate one request for `content_id`, reading headers through `lookup`.
    pub fn check(
        &self,
        content_id: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> GateDecision {
        let token = match extract_receipt(lookup) {
            Some(t) => t,
            None => return self.unpaid(content_id),
        };

        if let Some(ctx) = self.cached(&token, content_id) {
            return GateDecision::Paid(ctx);
        }

        let verifier = self.verifier(content_id);
        match verifier.verify(&token) {
            Ok(receipt) => {
                self.insert_cached(&token, &receipt);
                GateDecision::Paid(PaidContext {
                    receipt,
                    content_id: content_id.to_string(),
                    receipt_token: token,
                })
            }
            Err(e) => {
                tracing::debug!(code = e.code(), error = %e, "receipt rejected");
                self.unpaid(content_id)
            }
        }
    }

    fn unpaid(&self, content_id: &str) -> GateDecision {
        GateDecision::Unpaid(payment_request(&self.config.publisher, content_id))
    }

    fn verifier(&self, content_id: &str) -> ReceiptVerifier {
        let mut verifier = ReceiptVerifier::new().expecting_content_id(content_id);
        if let Some(secret) = &self.config.jwt_secret {
            verifier = verifier.with_secret(secret.clone());
        } else if let Some(pem) = &self.config.facilitator_public_key {
            verifier = verifier.with_public_key(pem.clone());
        }
        verifier
    }

    /// Serve a recent positive verification without re-checking the
    /// signature. Content id and receipt expiry are still enforced.
    fn cached(&self, token: &str, content_id: &str) -> Option<PaidContext> {
        let hit = self.cache.get(token)?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(u64::MAX);

        if hit.verified_at.elapsed() <= self.config.verify_ttl
            && hit.receipt.content_id == content_id
            && hit.receipt.expires_at > now
        {
            return Some(PaidContext {
                receipt: hit.receipt.clone(),
                content_id: content_id.to_string(),
                receipt_token: token.to_string(),
            });
        }
        drop(hit);
        self.cache.remove(token);
        None
    }

    fn insert_cached(&self, token: &str, receipt: &Receipt) {
        if self.cache.len() >= self.config.max_cache_entries {
            let ttl = self.config.verify_ttl;
            self.cache.retain(|_, v| v.verified_at.elapsed() <= ttl);
        }
        self.cache.insert(
            token.to_string(),
            CachedVerification {
                receipt: receipt.clone(),
                verified_at: Instant::now(),
            },
        );
    }
}
