//! The agent itself: a 402-aware HTTP client with a wallet, a budget, and
//! a receipt cache.

use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

use x402_core::eip712::{encode_signature_hex, random_nonce, signing_hash};
use x402_core::price::parse_price;
use x402_core::receipt::decode_receipt_unverified;
use x402_core::response::parse_payment_request;
use x402_core::{
    headers, ExactPayload, FacilitatorPayload, Network, PaymentRequest, SettlementResponse,
    TransferAuthorization, TransferWithAuthorization, SCHEME_EXACT, X402_VERSION,
};

use crate::budget::{BudgetManager, SpendingPolicy};
use crate::cache::ReceiptCache;
use crate::error::AgentError;
use crate::events::{EventHub, PaymentEvent};

/// Facilitator retry policy: retries only facilitator-side failures, with
/// exponential backoff `backoff_ms * 2^attempt`.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_ms: 1_000,
        }
    }
}

/// Default authorization validity window.
const AUTH_VALIDITY_SECS: u64 = 3_600;

/// Fallback receipt cache TTL when the token's expiry cannot be read.
const FALLBACK_CACHE_TTL_SECS: u64 = 86_400;

/// Headless consumer of 402-gated resources.
///
/// Single-owner by convention: budget and cache sit behind mutexes so
/// `fetch` takes `&self`, but callers issuing parallel fetches through one
/// agent accept racy budget accounting between them.
pub struct Agent {
    http: reqwest::Client,
    signer: PrivateKeySigner,
    network: Network,
    facilitator_url: Option<String>,
    budget: Mutex<BudgetManager>,
    cache: ReceiptCache,
    retry: RetryConfig,
    events: EventHub,
}

impl Agent {
    pub fn new(signer: PrivateKeySigner, network: Network) -> Self {
        Self {
            http: default_http_client(),
            signer,
            network,
            facilitator_url: None,
            budget: Mutex::new(BudgetManager::unlimited()),
            cache: ReceiptCache::new(),
            retry: RetryConfig::default(),
            events: EventHub::new(),
        }
    }

    /// Replace the unlimited default budget with a policy.
    pub fn with_policy(mut self, policy: &SpendingPolicy) -> Result<Self, AgentError> {
        self.budget = Mutex::new(BudgetManager::new(policy)?);
        Ok(self)
    }

    /// Fallback facilitator used when a 402 does not announce one.
    pub fn with_facilitator_url(mut self, url: impl Into<String>) -> Self {
        self.facilitator_url = Some(url.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Subscribe to payment lifecycle events.
    pub fn on_event(self, listener: impl Fn(&PaymentEvent) + Send + Sync + 'static) -> Self {
        self.events.subscribe(listener);
        self
    }

    /// Callback fired once when spend first crosses 80% of the total cap.
    pub fn on_budget_warning(self, cb: impl Fn(U256, U256) + Send + Sync + 'static) -> Self {
        self.budget.lock().unwrap().on_warning(cb);
        self
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn total_spent(&self) -> U256 {
        self.budget.lock().unwrap().total_spent()
    }

    /// Fetch a resource, paying for it if the server answers 402.
    ///
    /// Order per call: cache lookup → request → pay → retry with receipt.
    /// Cancellation is by dropping the returned future; no work is left
    /// running behind it.
    pub async fn fetch(
        &self,
        url: &str,
        method: reqwest::Method,
    ) -> Result<reqwest::Response, AgentError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AgentError::Network(format!("invalid url '{url}': {e}")))?;
        let domain = parsed
            .host_str()
            .ok_or_else(|| AgentError::Network(format!("url '{url}' has no host")))?
            .to_string();
        let content_id = format!("{domain}{}", parsed.path());

        // 1–2. Cached receipt, if any.
        if let Some(token) = self.cache.get(&content_id) {
            let resp = attach_receipt(self.http.request(method.clone(), url), &token)
                .send()
                .await
                .map_err(transport_error)?;
            if resp.status().as_u16() != 402 {
                return Ok(resp);
            }
            tracing::debug!(content_id = %content_id, "cached receipt rejected; evicting");
            self.cache.remove(&content_id);
        }

        // 3. Bare request.
        let resp = self
            .http
            .request(method.clone(), url)
            .send()
            .await
            .map_err(transport_error)?;
        if resp.status().as_u16() != 402 {
            return Ok(resp);
        }

        // 4. Parse payment parameters.
        let header_map = resp.headers().clone();
        let body: Option<serde_json::Value> = resp.json().await.ok();
        let request = parse_payment_request(body.as_ref(), |name| {
            header_map
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
        .ok_or(AgentError::Invalid402Response)?;

        // 5. Pay, then re-issue with the receipt.
        let token = self.pay(&request, &content_id, &domain).await?;

        attach_receipt(self.http.request(method, url), &token)
            .send()
            .await
            .map_err(transport_error)
    }

    /// The payment sub-flow: budget check, sign, submit, cache, record.
    async fn pay(
        &self,
        request: &PaymentRequest,
        content_id: &str,
        domain: &str,
    ) -> Result<String, AgentError> {
        self.events.emit(&PaymentEvent::Started {
            content_id: request.content_id.clone(),
            price: request.price.clone(),
        });

        match self.pay_inner(request, content_id, domain).await {
            Ok(token) => Ok(token),
            Err(e) => {
                self.events.emit(&PaymentEvent::Failed {
                    content_id: request.content_id.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn pay_inner(
        &self,
        request: &PaymentRequest,
        content_id: &str,
        domain: &str,
    ) -> Result<String, AgentError> {
        let amount: U256 = parse_price(&request.price)
            .map_err(|_| AgentError::Invalid402Response)?
            .parse()
            .map_err(|_| AgentError::Invalid402Response)?;

        // Budget first: rejected payments never touch the network.
        self.budget
            .lock()
            .unwrap()
            .assert_spend(amount, Some(domain))?;

        let network = resolve_network(&request.network).ok_or(AgentError::Invalid402Response)?;
        if network != self.network {
            return Err(AgentError::PaymentFailed(format!(
                "resource wants network {}, agent is configured for {}",
                request.network, self.network
            )));
        }
        let pay_to: Address = request
            .pay_to
            .parse()
            .map_err(|_| AgentError::Invalid402Response)?;

        let payload = build_signed_payload(
            &self.signer,
            network,
            pay_to,
            amount,
            &request.content_id,
        )?;

        let facilitator = request
            .facilitator_url
            .as_deref()
            .or(self.facilitator_url.as_deref())
            .ok_or_else(|| {
                AgentError::PaymentFailed("no facilitator url announced or configured".to_string())
            })?;

        let settlement = submit_payment(&self.http, facilitator, &payload, &self.retry).await?;

        let ttl = receipt_ttl(&settlement);
        self.cache.set(content_id, &settlement.receipt, ttl);

        let budget_remaining = {
            let mut budget = self.budget.lock().unwrap();
            budget.record_spend(amount, &request.content_id, domain);
            budget.remaining().map(|r| r.to_string())
        };

        tracing::info!(
            content_id = %request.content_id,
            amount = %amount,
            tx = %settlement.tx_hash,
            "payment succeeded"
        );
        self.events.emit(&PaymentEvent::Success {
            content_id: request.content_id.clone(),
            amount: amount.to_string(),
            tx_hash: settlement.tx_hash.clone(),
            budget_remaining,
        });

        Ok(settlement.receipt)
    }
}

pub(crate) fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build HTTP client")
}

fn transport_error(e: reqwest::Error) -> AgentError {
    if e.is_timeout() {
        AgentError::Timeout(e.to_string())
    } else {
        AgentError::Network(e.to_string())
    }
}

/// Accept both registry keys ("base-mainnet") and CAIP-2 ("eip155:8453").
pub(crate) fn resolve_network(s: &str) -> Option<Network> {
    Network::from_key(s).or_else(|| Network::from_caip2(s))
}

/// Set both receipt-carrying headers on an outbound request.
pub(crate) fn attach_receipt(
    builder: reqwest::RequestBuilder,
    token: &str,
) -> reqwest::RequestBuilder {
    builder
        .header(headers::RECEIPT, token)
        .header(headers::X_PAYMENT, token)
}

/// Build and sign an authorization with the default validity window
/// (`validAfter = 0`, `validBefore = now + 1h`) and a fresh nonce.
pub(crate) fn build_signed_payload(
    signer: &PrivateKeySigner,
    network: Network,
    pay_to: Address,
    amount: U256,
    resource: &str,
) -> Result<FacilitatorPayload, AgentError> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(|e| AgentError::Signing(format!("system time error: {e}")))?
        .as_secs();
    let valid_before = now + AUTH_VALIDITY_SECS;
    let nonce = random_nonce();

    let typed = TransferWithAuthorization {
        from: signer.address(),
        to: pay_to,
        value: amount,
        validAfter: U256::ZERO,
        validBefore: U256::from(valid_before),
        nonce,
    };
    let hash = signing_hash(&typed, network);
    let sig = signer
        .sign_hash_sync(&hash)
        .map_err(|e| AgentError::Signing(e.to_string()))?;

    Ok(FacilitatorPayload {
        x402_version: X402_VERSION,
        scheme: SCHEME_EXACT.to_string(),
        network: network.caip2().to_string(),
        payload: ExactPayload {
            signature: encode_signature_hex(&sig),
            authorization: TransferAuthorization {
                from: signer.address(),
                to: pay_to,
                value: amount.to_string(),
                valid_after: 0,
                valid_before,
                nonce,
            },
        },
        resource: resource.to_string(),
    })
}

/// POST the payload to the facilitator, retrying retryable failures with
/// exponential backoff. The backoff sleep is cancellable with the caller.
pub(crate) async fn submit_payment(
    http: &reqwest::Client,
    facilitator_url: &str,
    payload: &FacilitatorPayload,
    retry: &RetryConfig,
) -> Result<SettlementResponse, AgentError> {
    let mut attempt: u32 = 0;
    loop {
        match submit_once(http, facilitator_url, payload).await {
            Ok(settlement) => return Ok(settlement),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let backoff = retry.backoff_ms.saturating_mul(2u64.saturating_pow(attempt));
                tracing::warn!(
                    attempt,
                    backoff_ms = backoff,
                    error = %e,
                    "facilitator call failed; retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn submit_once(
    http: &reqwest::Client,
    facilitator_url: &str,
    payload: &FacilitatorPayload,
) -> Result<SettlementResponse, AgentError> {
    let resp = http
        .post(facilitator_url)
        .json(payload)
        .send()
        .await
        .map_err(transport_error)?;

    let status = resp.status();
    if status.is_success() {
        return resp
            .json::<SettlementResponse>()
            .await
            .map_err(|e| AgentError::Facilitator(format!("unreadable response: {e}")));
    }

    let reason = resp
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or_else(|| format!("status {status}"));

    if status.is_server_error() {
        Err(AgentError::Facilitator(reason))
    } else {
        Err(AgentError::PaymentFailed(reason))
    }
}

/// Cache TTL from the minted receipt's own expiry, falling back to a day.
fn receipt_ttl(settlement: &SettlementResponse) -> Duration {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    match decode_receipt_unverified(&settlement.receipt) {
        Ok(receipt) => Duration::from_secs(receipt.expires_at.saturating_sub(now)),
        Err(_) => Duration::from_secs(FALLBACK_CACHE_TTL_SECS),
    }
}
