//! Closed registry of supported chains.
//!
//! Each network carries its numeric chain id, CAIP-2 identifier, and the
//! USDC contract address deployed on that chain. One stablecoin per network.

use alloy::primitives::Address;

/// USDC has 6 decimal places on every supported chain.
pub const USDC_DECIMALS: u32 = 6;

/// Currency symbol announced in 402 responses and receipts.
pub const CURRENCY: &str = "USDC";

/// USDC on Base mainnet.
const USDC_BASE_MAINNET: Address = Address::new([
    0x83, 0x35, 0x89, 0xfc, 0xd6, 0xed, 0xb6, 0xe0, 0x8f, 0x4c, 0x7c, 0x32, 0xd4, 0xf7, 0x1b, 0x54,
    0xbd, 0xa0, 0x29, 0x13,
]);

/// USDC on Base Sepolia.
const USDC_BASE_SEPOLIA: Address = Address::new([
    0x03, 0x6c, 0xbd, 0x53, 0x84, 0x2c, 0x54, 0x26, 0x63, 0x4e, 0x79, 0x29, 0x54, 0x1e, 0xc2, 0x31,
    0x8f, 0x3d, 0xcf, 0x7e,
]);

/// A chain the facilitator can settle on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    BaseMainnet,
    BaseSepolia,
}

impl Network {
    /// Every supported network, in registry order.
    pub const ALL: [Network; 2] = [Network::BaseMainnet, Network::BaseSepolia];

    /// Numeric EVM chain id.
    pub fn chain_id(self) -> u64 {
        match self {
            Network::BaseMainnet => 8453,
            Network::BaseSepolia => 84532,
        }
    }

    /// CAIP-2 identifier (`eip155:<chainId>`), used on the wire.
    pub fn caip2(self) -> &'static str {
        match self {
            Network::BaseMainnet => "eip155:8453",
            Network::BaseSepolia => "eip155:84532",
        }
    }

    /// Human registry key, used in 402 headers and publisher config.
    pub fn key(self) -> &'static str {
        match self {
            Network::BaseMainnet => "base-mainnet",
            Network::BaseSepolia => "base-sepolia",
        }
    }

    /// USDC contract address on this chain.
    pub fn usdc_address(self) -> Address {
        match self {
            Network::BaseMainnet => USDC_BASE_MAINNET,
            Network::BaseSepolia => USDC_BASE_SEPOLIA,
        }
    }

    /// Resolve a CAIP-2 string (`eip155:8453`) from the registry.
    pub fn from_caip2(s: &str) -> Option<Network> {
        Network::ALL.into_iter().find(|n| n.caip2() == s)
    }

    /// Resolve a registry key (`base-mainnet`) from the registry.
    pub fn from_key(s: &str) -> Option<Network> {
        Network::ALL.into_iter().find(|n| n.key() == s)
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
