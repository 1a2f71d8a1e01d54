//! End-to-end agent flow against a real facilitator and a gated resource
//! server, both bound to ephemeral localhost ports.
//!
//! The facilitator runs the mock executor, so no funds move; signatures and
//! receipts are real.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use serde_json::json;

use x402_agent::{pay_once, Agent, PaymentEvent, SpendingPolicy};
use x402_core::response::PublisherConfig;
use x402_core::Network;
use x402_facilitator::config::FacilitatorConfig;
use x402_facilitator::executor::{Executor, MockExecutor};
use x402_facilitator::routes;
use x402_facilitator::state::AppState;
use x402_gate::{payment_response_header, require_payment, Gate, GateConfig};

const SECRET: &[u8] = b"agent-flow-shared-secret-32-bytes!!";

async fn spawn_facilitator() -> String {
    let state = web::Data::new(AppState {
        config: FacilitatorConfig {
            port: 0,
            jwt_secret: SECRET.to_vec(),
            fee_percent: 2.0,
            fee_bps: 200,
            facilitator_url: "http://127.0.0.1".to_string(),
            mock_transfers: true,
            private_key: None,
            rpc_url: None,
            receipt_ttl_secs: 3_600,
            rate_limit_rpm: 10_000,
            metrics_token: None,
        },
        executor: Executor::Mock(MockExecutor),
    });

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let port = server.addrs()[0].port();
    actix_rt::spawn(server.run());
    format!("http://127.0.0.1:{port}")
}

struct ResourceState {
    gate: Gate,
    hits: Arc<AtomicU32>,
}

async fn article(req: HttpRequest, state: web::Data<ResourceState>) -> HttpResponse {
    state.hits.fetch_add(1, Ordering::SeqCst);
    match require_payment(&state.gate, &req) {
        Ok(ctx) => {
            let (name, value) = payment_response_header(&ctx.receipt);
            HttpResponse::Ok()
                .insert_header((name, value))
                .json(json!({"content": "the article"}))
        }
        Err(resp) => resp,
    }
}

async fn spawn_resource(facilitator_url: &str, price: &str) -> (String, Arc<AtomicU32>) {
    let hits = Arc::new(AtomicU32::new(0));
    let hits_clone = Arc::clone(&hits);
    let facilitator_url = facilitator_url.to_string();
    let price = price.to_string();

    let server = HttpServer::new(move || {
        let gate = Gate::new(GateConfig::with_secret(
            PublisherConfig {
                pay_to: Address::ZERO,
                price: price.clone(),
                network: Network::BaseMainnet,
                facilitator_url: facilitator_url.clone(),
                description: Some("test article".to_string()),
            },
            SECRET,
        ));
        App::new()
            .app_data(web::Data::new(ResourceState {
                gate,
                hits: Arc::clone(&hits_clone),
            }))
            .route("/article", web::get().to(article))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let port = server.addrs()[0].port();
    actix_rt::spawn(server.run());
    (format!("http://127.0.0.1:{port}"), hits)
}

#[actix_rt::test]
async fn paid_fetch_end_to_end() {
    let facilitator = spawn_facilitator().await;
    let (resource, hits) = spawn_resource(&facilitator, "0.01").await;

    let events: Arc<std::sync::Mutex<Vec<String>>> = Arc::default();
    let events_clone = Arc::clone(&events);

    let agent = Agent::new(PrivateKeySigner::random(), Network::BaseMainnet).on_event(
        move |event| {
            let label = match event {
                PaymentEvent::Started { .. } => "started",
                PaymentEvent::Success { .. } => "success",
                PaymentEvent::Failed { .. } => "failed",
            };
            events_clone.lock().unwrap().push(label.to_string());
        },
    );

    let resp = agent
        .fetch(&format!("{resource}/article"), reqwest::Method::GET)
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    assert!(resp.headers().get("X-PAYMENT-RESPONSE").is_some());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["content"], "the article");

    // Bare request (402) + paid retry (200).
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    // 0.01 USDC in smallest units.
    assert_eq!(agent.total_spent().to_string(), "10000");
    assert_eq!(
        *events.lock().unwrap(),
        vec!["started".to_string(), "success".to_string()]
    );
}

#[actix_rt::test]
async fn second_fetch_reuses_cached_receipt() {
    let facilitator = spawn_facilitator().await;
    let (resource, hits) = spawn_resource(&facilitator, "0.01").await;

    let agent = Agent::new(PrivateKeySigner::random(), Network::BaseMainnet);
    let url = format!("{resource}/article");

    let first = agent.fetch(&url, reqwest::Method::GET).await.unwrap();
    assert_eq!(first.status().as_u16(), 200);

    let second = agent.fetch(&url, reqwest::Method::GET).await.unwrap();
    assert_eq!(second.status().as_u16(), 200);

    // First fetch: bare + paid. Second fetch: exactly one request, carrying
    // the cached token.
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    // Paid once, not twice.
    assert_eq!(agent.total_spent().to_string(), "10000");
}

#[actix_rt::test]
async fn per_request_limit_blocks_before_payment() {
    let facilitator = spawn_facilitator().await;
    let (resource, hits) = spawn_resource(&facilitator, "5.00").await;

    let agent = Agent::new(PrivateKeySigner::random(), Network::BaseMainnet)
        .with_policy(&SpendingPolicy {
            max_per_request: Some("1.00".to_string()),
            max_total: None,
            allowed_domains: vec![],
        })
        .unwrap();

    let err = agent
        .fetch(&format!("{resource}/article"), reqwest::Method::GET)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "PER_REQUEST_LIMIT");
    // Only the bare request reached the resource; nothing was paid.
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(agent.total_spent().to_string(), "0");
}

#[actix_rt::test]
async fn domain_allow_list_blocks_unlisted_hosts() {
    let facilitator = spawn_facilitator().await;
    let (resource, _) = spawn_resource(&facilitator, "0.01").await;

    let agent = Agent::new(PrivateKeySigner::random(), Network::BaseMainnet)
        .with_policy(&SpendingPolicy {
            max_per_request: None,
            max_total: None,
            allowed_domains: vec!["api.example.com".to_string()],
        })
        .unwrap();

    let err = agent
        .fetch(&format!("{resource}/article"), reqwest::Method::GET)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DOMAIN_NOT_ALLOWED");
}

#[actix_rt::test]
async fn standalone_pay_once_fetches() {
    let facilitator = spawn_facilitator().await;
    let (resource, _) = spawn_resource(&facilitator, "0.01").await;

    let resp = pay_once(
        &format!("{resource}/article"),
        reqwest::Method::GET,
        "0.10",
        None,
    )
    .await
    .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[actix_rt::test]
async fn standalone_pay_once_respects_max_price() {
    let facilitator = spawn_facilitator().await;
    let (resource, hits) = spawn_resource(&facilitator, "0.50").await;

    let err = pay_once(
        &format!("{resource}/article"),
        reqwest::Method::GET,
        "0.01",
        None,
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "PER_REQUEST_LIMIT");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
