//! actix-web helpers around [`Gate`].

use actix_web::{HttpRequest, HttpResponse};
use serde_json::json;

use x402_core::headers;
use x402_core::receipt::Receipt;
use x402_core::response::{response_body, response_headers};
use x402_core::PaymentRequest;

use crate::{Gate, GateDecision, PaidContext};

/// Gate a request, using the request path as the content id.
///
/// Returns the payment context on success, or a ready-to-send 402 response
/// to return directly.
pub fn require_payment(gate: &Gate, req: &HttpRequest) -> Result<PaidContext, HttpResponse> {
    require_payment_for(gate, req, req.path())
}

/// Gate a request for an explicit content id.
pub fn require_payment_for(
    gate: &Gate,
    req: &HttpRequest,
    content_id: &str,
) -> Result<PaidContext, HttpResponse> {
    let decision = gate.check(content_id, |name| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    });
    match decision {
        GateDecision::Paid(ctx) => Ok(ctx),
        GateDecision::Unpaid(request) => Err(payment_required_response(&request)),
    }
}

/// Build the 402 response: `X-402-*` headers plus the JSON body with the
/// `accepts` array.
pub fn payment_required_response(request: &PaymentRequest) -> HttpResponse {
    let mut builder = HttpResponse::PaymentRequired();
    for (name, value) in response_headers(request) {
        builder.insert_header((name, value));
    }
    match response_body(request) {
        Ok(body) => builder.json(body),
        Err(e) => {
            tracing::error!(error = %e, "failed to assemble 402 body");
            builder.json(json!({"error": "payment required"}))
        }
    }
}

/// `X-PAYMENT-RESPONSE` header to attach to protected 200 responses.
pub fn payment_response_header(receipt: &Receipt) -> (&'static str, String) {
    let value = json!({
        "receiptId": receipt.id,
        "txHash": receipt.tx_hash,
        "amount": receipt.amount,
        "payer": receipt.payer.to_string(),
    });
    (headers::PAYMENT_RESPONSE, value.to_string())
}
