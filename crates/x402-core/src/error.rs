use thiserror::Error;

/// Errors from protocol primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("signature error: {0}")]
    Signature(String),

    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("invalid payment: {0}")]
    InvalidPayment(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors from receipt minting and verification.
///
/// Each variant maps to a stable programmatic code via [`ReceiptError::code`].
#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("receipt expired")]
    Expired,

    #[error("invalid receipt: {0}")]
    Invalid(String),

    #[error("no receipt provided")]
    Missing,
}

impl ReceiptError {
    /// Stable identifier for programmatic error handling.
    pub fn code(&self) -> &'static str {
        match self {
            ReceiptError::Expired => "RECEIPT_EXPIRED",
            ReceiptError::Invalid(_) => "RECEIPT_INVALID",
            ReceiptError::Missing => "RECEIPT_MISSING",
        }
    }
}
