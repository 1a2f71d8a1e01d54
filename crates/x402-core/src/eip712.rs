//! EIP-712 typed-data signing for `TransferWithAuthorization`.
//!
//! Provides:
//! - The USDC signing domain per network ([`transfer_domain`])
//! - Signing hashes ([`signing_hash`])
//! - Signer recovery with EIP-2 malleability protection ([`recover_signer`])
//! - Cryptographically secure nonce generation ([`random_nonce`])

use alloy::primitives::{Address, FixedBytes, Signature, B256, U256};
use alloy::sol_types::SolStruct;

use crate::error::CoreError;
use crate::network::Network;
use crate::TransferWithAuthorization;

/// Build the EIP-712 domain for USDC on the given network.
///
/// USDC publishes `{name: "USD Coin", version: "2"}` on every chain; the
/// domain is separated per chain by `chainId` and the token address.
pub fn transfer_domain(network: Network) -> alloy::sol_types::Eip712Domain {
    alloy::sol_types::Eip712Domain {
        name: Some(std::borrow::Cow::Borrowed("USD Coin")),
        version: Some(std::borrow::Cow::Borrowed("2")),
        chain_id: Some(U256::from(network.chain_id())),
        verifying_contract: Some(network.usdc_address()),
        salt: None,
    }
}

/// Compute the EIP-712 signing hash for an authorization on a network.
pub fn signing_hash(auth: &TransferWithAuthorization, network: Network) -> B256 {
    auth.eip712_signing_hash(&transfer_domain(network))
}

/// secp256k1 curve order N / 2 — signatures with s > this are malleable (EIP-2).
const SECP256K1_N_DIV_2: U256 = U256::from_limbs([
    0xBFD25E8CD0364140,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0x7FFFFFFFFFFFFFFF,
]);

/// Recover the signer address from a 65-byte signature over the
/// authorization's EIP-712 hash. Rejects high-s signatures.
pub fn recover_signer(
    auth: &TransferWithAuthorization,
    signature_bytes: &[u8],
    network: Network,
) -> Result<Address, CoreError> {
    if signature_bytes.len() != 65 {
        return Err(CoreError::Signature(format!(
            "signature must be 65 bytes, got {}",
            signature_bytes.len()
        )));
    }

    let sig = Signature::from_raw(signature_bytes)
        .map_err(|e| CoreError::Signature(format!("invalid signature: {e}")))?;

    if sig.s() > SECP256K1_N_DIV_2 {
        return Err(CoreError::Signature(
            "high-s signature rejected (EIP-2 malleability)".to_string(),
        ));
    }

    let hash = signing_hash(auth, network);
    sig.recover_address_from_prehash(&hash)
        .map_err(|e| CoreError::Signature(format!("recovery failed: {e}")))
}

/// Generate a 32-byte nonce straight from the OS CSPRNG.
pub fn random_nonce() -> FixedBytes<32> {
    let mut bytes = [0u8; 32];
    rand::fill(&mut bytes);
    FixedBytes::new(bytes)
}

/// Encode a signature to a hex string with 0x prefix (65 bytes -> 0x + 130 hex).
pub fn encode_signature_hex(sig: &Signature) -> String {
    format!("0x{}", alloy::hex::encode(sig.as_bytes()))
}

/// Decode a 0x-prefixed hex signature into raw bytes.
pub fn decode_signature_hex(sig: &str) -> Result<Vec<u8>, CoreError> {
    alloy::hex::decode(sig.strip_prefix("0x").unwrap_or(sig))
        .map_err(|e| CoreError::Signature(format!("invalid hex signature: {e}")))
}
