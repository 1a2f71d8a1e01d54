//! x402 payment protocol primitives.
//!
//! Implements HTTP 402 pay-per-request using EIP-3009 signed authorizations
//! for a USDC stablecoin on Base, plus the signed receipts that gate
//! protected resources after settlement.
//!
//! # Three-party model
//!
//! - **Agent** — signs `TransferWithAuthorization` payloads and submits them
//! - **Facilitator** — verifies signatures, settles the transfer, mints a receipt
//! - **Resource server** — returns 402 with pricing, accepts receipts in lieu of re-payment
//!
//! This crate holds everything all three parties agree on: wire formats, the
//! EIP-712 domain, price ↔ smallest-unit conversion, the `X-402-*` header
//! set, and the receipt token.

pub mod error;
pub mod headers;
pub mod network;
pub mod price;
pub mod receipt;

pub mod eip712;
pub mod payment;
pub mod response;

use alloy::sol;

// EIP-3009 struct signed by the payer. Field order is fixed by the USDC
// contract's type hash; do not reorder.
sol! {
    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

// Re-exports
pub use error::{CoreError, ReceiptError};
pub use network::{Network, CURRENCY, USDC_DECIMALS};
pub use payment::*;
pub use receipt::{Receipt, ReceiptVerifier};
pub use response::{parse_payment_request, payment_request, PublisherConfig};

/// Protocol version carried in every facilitator payload.
pub const X402_VERSION: u32 = 1;

/// The single payment scheme this protocol speaks.
pub const SCHEME_EXACT: &str = "exact";
