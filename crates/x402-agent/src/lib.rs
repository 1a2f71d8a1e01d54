//! Headless x402 agent.
//!
//! Consumes 402-gated resources programmatically: on a 402 it signs an
//! EIP-3009 authorization with the held key, submits it to the announced
//! facilitator, caches the returned receipt per content id, and re-issues
//! the original request. A spending policy bounds what the key can spend.
//!
//! # Quick example
//!
//! ```no_run
//! use alloy::signers::local::PrivateKeySigner;
//! use x402_agent::{Agent, SpendingPolicy};
//! use x402_core::Network;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let signer = PrivateKeySigner::random();
//! let agent = Agent::new(signer, Network::BaseSepolia)
//!     .with_policy(&SpendingPolicy {
//!         max_per_request: Some("0.10".into()),
//!         max_total: Some("5.00".into()),
//!         allowed_domains: vec![],
//!     })
//!     .unwrap();
//!
//! let resp = agent.fetch("https://api.example.com/report", reqwest::Method::GET)
//!     .await
//!     .unwrap();
//! # }
//! ```

pub mod budget;
pub mod cache;
pub mod client;
pub mod error;
pub mod events;
pub mod standalone;

pub use budget::{BudgetManager, PaymentRecord, SpendCheck, SpendingPolicy};
pub use cache::ReceiptCache;
pub use client::{Agent, RetryConfig};
pub use error::AgentError;
pub use events::PaymentEvent;
pub use standalone::pay_once;
