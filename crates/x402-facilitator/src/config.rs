//! Environment-driven facilitator configuration.

/// Facilitator runtime configuration, loaded once at startup and read-only
/// afterwards.
#[derive(Debug, Clone)]
pub struct FacilitatorConfig {
    pub port: u16,
    /// HMAC key for receipt signing. Mandatory.
    pub jwt_secret: Vec<u8>,
    /// Fee percentage in [0, 50].
    pub fee_percent: f64,
    /// Basis points derived from `fee_percent` at load time.
    pub fee_bps: u32,
    /// External URL stamped into receipts.
    pub facilitator_url: String,
    /// When true (the default), transfers run through the mock executor.
    pub mock_transfers: bool,
    pub private_key: Option<String>,
    pub rpc_url: Option<String>,
    /// Receipt validity in seconds.
    pub receipt_ttl_secs: u64,
    pub rate_limit_rpm: u64,
    /// Bearer token guarding /metrics.
    pub metrics_token: Option<Vec<u8>>,
}

/// Default receipt TTL: 24 hours.
pub const DEFAULT_RECEIPT_TTL_SECS: u64 = 86_400;

impl FacilitatorConfig {
    /// Read configuration from the environment. Returns a human-readable
    /// reason on the first invalid or missing value.
    pub fn from_env() -> Result<Self, String> {
        let port: u16 = match std::env::var("PORT") {
            Ok(p) => p.parse().map_err(|_| format!("invalid PORT '{p}'"))?,
            Err(_) => 4020,
        };

        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .map(String::into_bytes)
            .ok_or_else(|| {
                "JWT_SECRET is required — set it to a secure random value \
                 (e.g. `openssl rand -hex 32`)"
                    .to_string()
            })?;
        if jwt_secret.len() < 32 {
            tracing::warn!(
                "JWT_SECRET is only {} bytes (minimum 32 recommended)",
                jwt_secret.len()
            );
        }

        let fee_percent: f64 = match std::env::var("FEE_PERCENT") {
            Ok(f) => f
                .parse()
                .map_err(|_| format!("invalid FEE_PERCENT '{f}'"))?,
            Err(_) => 2.0,
        };
        if !(0.0..=50.0).contains(&fee_percent) {
            return Err(format!(
                "FEE_PERCENT must be between 0 and 50, got {fee_percent}"
            ));
        }
        let fee_bps = (fee_percent * 100.0).round() as u32;

        let facilitator_url = std::env::var("FACILITATOR_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"));

        let mock_transfers = std::env::var("MOCK_TRANSFERS")
            .map(|v| v != "false")
            .unwrap_or(true);

        let private_key = std::env::var("FACILITATOR_PRIVATE_KEY")
            .ok()
            .filter(|s| !s.is_empty());
        let rpc_url = std::env::var("RPC_URL").ok().filter(|s| !s.is_empty());

        if !mock_transfers {
            if private_key.is_none() {
                return Err(
                    "FACILITATOR_PRIVATE_KEY is required when MOCK_TRANSFERS=false".to_string()
                );
            }
            if rpc_url.is_none() {
                return Err("RPC_URL is required when MOCK_TRANSFERS=false".to_string());
            }
        }

        let receipt_ttl_secs: u64 = std::env::var("RECEIPT_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RECEIPT_TTL_SECS);

        let rate_limit_rpm: u64 = std::env::var("RATE_LIMIT_RPM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120);

        let metrics_token = std::env::var("METRICS_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .map(String::into_bytes);

        Ok(Self {
            port,
            jwt_secret,
            fee_percent,
            fee_bps,
            facilitator_url,
            mock_transfers,
            private_key,
            rpc_url,
            receipt_ttl_secs,
            rate_limit_rpm,
            metrics_token,
        })
    }
}
