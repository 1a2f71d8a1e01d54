use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::metrics;
use crate::pipeline::{self, PipelineError};
use crate::security::constant_time_eq;
use crate::state::AppState;

/// Mount every route. The settle endpoint answers on both `/` and
/// `/facilitator`; health on `/` (GET) and `/health`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::post().to(settle))
        .route("/facilitator", web::post().to(settle))
        .route("/", web::get().to(health))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics_endpoint));
}

async fn settle(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            metrics::SETTLE_REQUESTS
                .with_label_values(&["rejected"])
                .inc();
            return HttpResponse::BadRequest().json(json!({"error": "invalid JSON body"}));
        }
    };

    let start = std::time::Instant::now();

    match pipeline::settle(&state, &raw).await {
        Ok(result) => {
            let elapsed = start.elapsed().as_secs_f64();
            metrics::SETTLE_REQUESTS
                .with_label_values(&["success"])
                .inc();
            metrics::SETTLE_LATENCY
                .with_label_values(&["success"])
                .observe(elapsed);
            metrics::RECEIPTS_ISSUED.inc();
            HttpResponse::Ok().json(result)
        }
        Err(PipelineError::Reject(reason)) => {
            let elapsed = start.elapsed().as_secs_f64();
            metrics::SETTLE_REQUESTS
                .with_label_values(&["rejected"])
                .inc();
            metrics::SETTLE_LATENCY
                .with_label_values(&["rejected"])
                .observe(elapsed);
            tracing::warn!(reason = %reason, "settlement rejected");
            HttpResponse::BadRequest().json(json!({"error": reason}))
        }
        Err(PipelineError::Fail(reason)) => {
            let elapsed = start.elapsed().as_secs_f64();
            metrics::SETTLE_REQUESTS.with_label_values(&["error"]).inc();
            metrics::SETTLE_LATENCY
                .with_label_values(&["error"])
                .observe(elapsed);
            tracing::error!(reason = %reason, "settlement failed");
            HttpResponse::InternalServerError().json(json!({"error": reason}))
        }
    }
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "x402-facilitator",
        "version": env!("CARGO_PKG_VERSION"),
        "mockMode": state.config.mock_transfers,
    }))
}

async fn metrics_endpoint(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    match &state.config.metrics_token {
        Some(token) => {
            let authorized = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| constant_time_eq(t.as_bytes(), token))
                .unwrap_or(false);

            if !authorized {
                return HttpResponse::Unauthorized().json(json!({
                    "error": "unauthorized",
                    "message": "Valid Bearer token required for /metrics"
                }));
            }
        }
        None => {
            let public_metrics = std::env::var("X402_PUBLIC_METRICS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false);
            if !public_metrics {
                return HttpResponse::Forbidden().json(json!({
                    "error": "forbidden",
                    "message": "Set METRICS_TOKEN or X402_PUBLIC_METRICS=true to access /metrics"
                }));
            }
        }
    }
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::metrics_output())
}
