use actix_web::{test, web, App};
use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use serde_json::json;

use x402_core::eip712::{encode_signature_hex, random_nonce, signing_hash};
use x402_core::receipt::ReceiptVerifier;
use x402_core::{Network, TransferWithAuthorization};
use x402_facilitator::config::FacilitatorConfig;
use x402_facilitator::executor::{Executor, MockExecutor};
use x402_facilitator::routes;
use x402_facilitator::state::AppState;

const SECRET: &[u8] = b"integration-test-secret-at-least-32b";

fn make_state(metrics_token: Option<Vec<u8>>) -> web::Data<AppState> {
    web::Data::new(AppState {
        config: FacilitatorConfig {
            port: 4020,
            jwt_secret: SECRET.to_vec(),
            fee_percent: 2.0,
            fee_bps: 200,
            facilitator_url: "http://localhost:4020".to_string(),
            mock_transfers: true,
            private_key: None,
            rpc_url: None,
            receipt_ttl_secs: 86_400,
            rate_limit_rpm: 120,
            metrics_token,
        },
        executor: Executor::Mock(MockExecutor),
    })
}

/// Sign an authorization for Base mainnet and wrap it in a facilitator body.
fn signed_body(
    signer: &PrivateKeySigner,
    to: Address,
    value: u64,
    valid_after: u64,
    valid_before: u64,
) -> serde_json::Value {
    let nonce = random_nonce();
    let auth = TransferWithAuthorization {
        from: signer.address(),
        to,
        value: U256::from(value),
        validAfter: U256::from(valid_after),
        validBefore: U256::from(valid_before),
        nonce,
    };
    let hash = signing_hash(&auth, Network::BaseMainnet);
    let sig = signer.sign_hash_sync(&hash).unwrap();

    json!({
        "x402Version": 1,
        "scheme": "exact",
        "network": "eip155:8453",
        "resource": "article-1",
        "payload": {
            "signature": encode_signature_hex(&sig),
            "authorization": {
                "from": signer.address().to_string(),
                "to": to.to_string(),
                "value": value.to_string(),
                "validAfter": valid_after,
                "validBefore": valid_before,
                "nonce": nonce.to_string(),
            }
        }
    })
}

#[actix_rt::test]
async fn happy_path_mints_receipt() {
    let state = make_state(None);
    let app =
        test::init_service(App::new().app_data(state).configure(routes::configure)).await;

    let signer = PrivateKeySigner::random();
    let payee: Address = "0x036CbD53842c5426634e7929541eC2318f3dCF7e".parse().unwrap();
    let body = signed_body(&signer, payee, 100_000, 0, 9_999_999_999);

    let req = test::TestRequest::post().uri("/").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let out: serde_json::Value = test::read_body_json(resp).await;
    let token = out["receipt"].as_str().unwrap();
    assert!(out["txHash"].as_str().unwrap().starts_with("0x"));

    let receipt = ReceiptVerifier::new()
        .with_secret(SECRET)
        .verify(token)
        .unwrap();
    assert_eq!(receipt.payer, signer.address());
    assert_eq!(receipt.payee, payee);
    assert_eq!(receipt.amount, "98000");
    assert_eq!(receipt.content_id, "article-1");
    assert_eq!(receipt.chain_id, 8453);
    assert_eq!(receipt.currency, "USDC");
    assert!(receipt.expires_at > receipt.paid_at);
}

#[actix_rt::test]
async fn facilitator_path_also_settles() {
    let state = make_state(None);
    let app =
        test::init_service(App::new().app_data(state).configure(routes::configure)).await;

    let signer = PrivateKeySigner::random();
    let body = signed_body(&signer, Address::ZERO, 1_000, 0, 9_999_999_999);

    let req = test::TestRequest::post()
        .uri("/facilitator")
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_rt::test]
async fn tampered_recipient_is_rejected() {
    let state = make_state(None);
    let app =
        test::init_service(App::new().app_data(state).configure(routes::configure)).await;

    let signer = PrivateKeySigner::random();
    let payee: Address = "0x036CbD53842c5426634e7929541eC2318f3dCF7e".parse().unwrap();
    let mut body = signed_body(&signer, payee, 100_000, 0, 9_999_999_999);
    // Mutate the recipient after signing.
    body["payload"]["authorization"]["to"] =
        json!("0x0000000000000000000000000000000000000001");

    let req = test::TestRequest::post().uri("/").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let out: serde_json::Value = test::read_body_json(resp).await;
    assert!(out["error"].as_str().unwrap().contains("Signature mismatch"));
}

#[actix_rt::test]
async fn expired_window_is_rejected() {
    let state = make_state(None);
    let app =
        test::init_service(App::new().app_data(state).configure(routes::configure)).await;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let signer = PrivateKeySigner::random();
    let body = signed_body(&signer, Address::ZERO, 1_000, 0, now - 100);

    let req = test::TestRequest::post().uri("/").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let out: serde_json::Value = test::read_body_json(resp).await;
    assert!(out["error"].as_str().unwrap().contains("expired"));
}

#[actix_rt::test]
async fn not_yet_valid_window_is_rejected() {
    let state = make_state(None);
    let app =
        test::init_service(App::new().app_data(state).configure(routes::configure)).await;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let signer = PrivateKeySigner::random();
    let body = signed_body(&signer, Address::ZERO, 1_000, now + 1_000, now + 2_000);

    let req = test::TestRequest::post().uri("/").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let out: serde_json::Value = test::read_body_json(resp).await;
    assert!(out["error"].as_str().unwrap().contains("not yet valid"));
}

#[actix_rt::test]
async fn unsupported_network_is_rejected() {
    let state = make_state(None);
    let app =
        test::init_service(App::new().app_data(state).configure(routes::configure)).await;

    let signer = PrivateKeySigner::random();
    let mut body = signed_body(&signer, Address::ZERO, 1_000, 0, 9_999_999_999);
    body["network"] = json!("eip155:1");

    let req = test::TestRequest::post().uri("/").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let out: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(out["error"], "Unsupported network: eip155:1");
}

#[actix_rt::test]
async fn missing_field_is_named() {
    let state = make_state(None);
    let app =
        test::init_service(App::new().app_data(state).configure(routes::configure)).await;

    let signer = PrivateKeySigner::random();
    let mut body = signed_body(&signer, Address::ZERO, 1_000, 0, 9_999_999_999);
    body["payload"]["authorization"]
        .as_object_mut()
        .unwrap()
        .remove("value");

    let req = test::TestRequest::post().uri("/").set_json(&body).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let out: serde_json::Value = test::read_body_json(resp).await;
    assert!(out["error"].as_str().unwrap().contains("authorization.value"));
}

#[actix_rt::test]
async fn invalid_json_body_is_rejected() {
    let state = make_state(None);
    let app =
        test::init_service(App::new().app_data(state).configure(routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("not json at all")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_rt::test]
async fn health_reports_mock_mode() {
    let state = make_state(None);
    let app =
        test::init_service(App::new().app_data(state).configure(routes::configure)).await;

    for uri in ["/", "/health"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "x402-facilitator");
        assert_eq!(body["mockMode"], true);
    }
}

#[actix_rt::test]
async fn metrics_requires_bearer_token() {
    let state = make_state(Some(b"metrics-token-123".to_vec()));
    let app =
        test::init_service(App::new().app_data(state).configure(routes::configure)).await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::get()
        .uri("/metrics")
        .insert_header(("Authorization", "Bearer wrong"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::get()
        .uri("/metrics")
        .insert_header(("Authorization", "Bearer metrics-token-123"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}
