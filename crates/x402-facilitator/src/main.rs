use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use x402_facilitator::config::FacilitatorConfig;
use x402_facilitator::executor::{Executor, MockExecutor, OnChainExecutor};
use x402_facilitator::routes;
use x402_facilitator::state::AppState;

/// Permissive CORS per the protocol: any origin may POST authorizations.
fn build_cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![
            "content-type",
            "authorization",
            "x-402-receipt",
            "x-payment",
        ])
        .max_age(86_400)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match FacilitatorConfig::from_env() {
        Ok(c) => c,
        Err(reason) => {
            tracing::error!("{reason}");
            std::process::exit(1);
        }
    };

    let executor = if config.mock_transfers {
        tracing::info!("mock transfers enabled — no funds will move");
        Executor::Mock(MockExecutor)
    } else {
        // from_env guarantees both values in on-chain mode
        let key = config.private_key.clone().unwrap();
        let rpc_url = config.rpc_url.clone().unwrap();

        let signer: PrivateKeySigner = match key.parse() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("invalid FACILITATOR_PRIVATE_KEY: {e}");
                std::process::exit(1);
            }
        };
        tracing::info!(address = %signer.address(), "on-chain mode");

        let url = match rpc_url.parse() {
            Ok(u) => u,
            Err(e) => {
                tracing::error!("invalid RPC_URL: {e}");
                std::process::exit(1);
            }
        };
        let provider = ProviderBuilder::new()
            .wallet(alloy::network::EthereumWallet::from(signer))
            .connect_http(url);
        Executor::OnChain(OnChainExecutor::new(provider))
    };

    let port = config.port;
    let rate_limit_rpm = config.rate_limit_rpm;

    tracing::info!("x402 facilitator listening on port {port}");
    tracing::info!("fee: {}% ({} bps)", config.fee_percent, config.fee_bps);
    tracing::info!("  POST http://localhost:{port}/");
    tracing::info!("  GET  http://localhost:{port}/health");

    let state = web::Data::new(AppState { config, executor });

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm)
        .finish()
        .expect("failed to build rate limiter config");

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors())
            .wrap(Governor::new(&governor_conf))
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(65_536))
            .configure(routes::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
