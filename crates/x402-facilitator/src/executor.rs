//! Pluggable transfer execution.
//!
//! The pipeline hands a verified authorization to a [`TransferExecutor`].
//! The mock executor settles nothing and fabricates a deterministic
//! transaction hash from the nonce; the on-chain executor broadcasts the
//! stablecoin's `transferWithAuthorization` call.

use alloy::network::EthereumWallet;
use alloy::primitives::{keccak256, FixedBytes};
use alloy::providers::{
    fillers::{
        BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
    },
    Identity, Provider, RootProvider,
};
use alloy::sol;
use thiserror::Error;
use tokio::sync::Mutex;

use x402_core::{Network, TransferWithAuthorization};

// EIP-3009 surface of the stablecoin contract.
sol! {
    #[sol(rpc)]
    interface Usdc {
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external;
    }
}

/// Concrete provider type from `ProviderBuilder::new().wallet(...).connect_http(...)`.
pub type WalletProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider,
>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("chain error: {0}")]
    Chain(String),
}

/// Result of a transfer attempt.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub success: bool,
    pub tx_hash: String,
}

/// Executes a verified authorization against some settlement backend.
pub trait TransferExecutor: Send + Sync {
    fn execute(
        &self,
        auth: &TransferWithAuthorization,
        signature: &[u8],
        network: Network,
    ) -> impl std::future::Future<Output = Result<TransferOutcome, ExecutorError>> + Send;
}

/// Stateless executor for development and tests. Always succeeds with a
/// transaction hash derived from the authorization nonce, so repeated
/// submissions of the same authorization produce the same hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockExecutor;

impl TransferExecutor for MockExecutor {
    async fn execute(
        &self,
        auth: &TransferWithAuthorization,
        _signature: &[u8],
        _network: Network,
    ) -> Result<TransferOutcome, ExecutorError> {
        let tx_hash = keccak256(auth.nonce.as_slice()).to_string();
        Ok(TransferOutcome {
            success: true,
            tx_hash,
        })
    }
}

/// Executor that broadcasts `transferWithAuthorization` through a wallet
/// provider. All submissions go through one signing key, so a mutex
/// serializes them to keep chain nonces ordered.
pub struct OnChainExecutor<P> {
    provider: P,
    submit_lock: Mutex<()>,
}

impl<P> OnChainExecutor<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            submit_lock: Mutex::new(()),
        }
    }
}

impl<P> TransferExecutor for OnChainExecutor<P>
where
    P: Provider + Send + Sync,
{
    async fn execute(
        &self,
        auth: &TransferWithAuthorization,
        signature: &[u8],
        network: Network,
    ) -> Result<TransferOutcome, ExecutorError> {
        if signature.len() != 65 {
            return Err(ExecutorError::Chain(format!(
                "signature must be 65 bytes, got {}",
                signature.len()
            )));
        }
        let r = FixedBytes::<32>::from_slice(&signature[0..32]);
        let s = FixedBytes::<32>::from_slice(&signature[32..64]);
        // Accept both parity (0/1) and Electrum (27/28) encodings.
        let v = if signature[64] < 27 {
            signature[64] + 27
        } else {
            signature[64]
        };

        let contract = Usdc::new(network.usdc_address(), &self.provider);

        let _guard = self.submit_lock.lock().await;

        let pending = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            contract
                .transferWithAuthorization(
                    auth.from,
                    auth.to,
                    auth.value,
                    auth.validAfter,
                    auth.validBefore,
                    auth.nonce,
                    v,
                    r,
                    s,
                )
                .send(),
        )
        .await
        .map_err(|_| ExecutorError::Chain("transferWithAuthorization send timed out".to_string()))?
        .map_err(|e| ExecutorError::Chain(format!("transferWithAuthorization send failed: {e}")))?;

        let receipt =
            tokio::time::timeout(std::time::Duration::from_secs(60), pending.get_receipt())
                .await
                .map_err(|_| {
                    ExecutorError::Chain("transferWithAuthorization receipt timed out".to_string())
                })?
                .map_err(|e| {
                    ExecutorError::Chain(format!("transferWithAuthorization receipt failed: {e}"))
                })?;

        if !receipt.status() {
            return Err(ExecutorError::Chain(
                "transferWithAuthorization reverted".to_string(),
            ));
        }

        Ok(TransferOutcome {
            success: true,
            tx_hash: receipt.transaction_hash.to_string(),
        })
    }
}

/// Executor selection made at startup from `MOCK_TRANSFERS`.
pub enum Executor {
    Mock(MockExecutor),
    OnChain(OnChainExecutor<WalletProvider>),
}

impl Executor {
    pub async fn execute(
        &self,
        auth: &TransferWithAuthorization,
        signature: &[u8],
        network: Network,
    ) -> Result<TransferOutcome, ExecutorError> {
        match self {
            Executor::Mock(inner) => inner.execute(auth, signature, network).await,
            Executor::OnChain(inner) => inner.execute(auth, signature, network).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use x402_core::eip712::random_nonce;

    fn sample_auth(nonce: FixedBytes<32>) -> TransferWithAuthorization {
        TransferWithAuthorization {
            from: Address::ZERO,
            to: Address::ZERO,
            value: U256::from(1_000u64),
            validAfter: U256::ZERO,
            validBefore: U256::from(u64::MAX),
            nonce,
        }
    }

    #[tokio::test]
    async fn mock_hash_is_deterministic() {
        let nonce = random_nonce();
        let auth = sample_auth(nonce);

        let a = MockExecutor
            .execute(&auth, &[0u8; 65], Network::BaseMainnet)
            .await
            .unwrap();
        let b = MockExecutor
            .execute(&auth, &[0u8; 65], Network::BaseMainnet)
            .await
            .unwrap();

        assert!(a.success);
        assert_eq!(a.tx_hash, b.tx_hash);
        assert!(a.tx_hash.starts_with("0x"));
        assert_eq!(a.tx_hash.len(), 66);
    }

    #[tokio::test]
    async fn mock_hash_differs_per_nonce() {
        let a = MockExecutor
            .execute(&sample_auth(random_nonce()), &[0u8; 65], Network::BaseMainnet)
            .await
            .unwrap();
        let b = MockExecutor
            .execute(&sample_auth(random_nonce()), &[0u8; 65], Network::BaseMainnet)
            .await
            .unwrap();
        assert_ne!(a.tx_hash, b.tx_hash);
    }
}
