//! Client-side spending policy enforcement.

use alloy::primitives::U256;

use x402_core::price::{format_price, parse_price};

use crate::error::AgentError;

/// User-supplied spending limits, in human-readable amounts.
#[derive(Debug, Clone, Default)]
pub struct SpendingPolicy {
    /// Upper bound per single payment.
    pub max_per_request: Option<String>,
    /// Cumulative lifetime cap.
    pub max_total: Option<String>,
    /// When non-empty, payments are restricted to these domains.
    pub allowed_domains: Vec<String>,
}

/// One completed payment, kept for the lifetime of the manager.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub content_id: String,
    /// Smallest-unit amount.
    pub amount: String,
    pub domain: String,
    pub timestamp: u64,
}

/// Result of a pre-payment policy check.
#[derive(Debug, Clone)]
pub struct SpendCheck {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
}

#[derive(Debug, Clone)]
pub enum DenyReason {
    DomainNotAllowed(String),
    PerRequestLimit(String),
    BudgetExceeded(String),
}

type WarningCallback = Box<dyn Fn(U256, U256) + Send + Sync>;

/// Tracks cumulative spend against a [`SpendingPolicy`].
///
/// Single-owner: the agent wraps this in a mutex; the manager itself does
/// no locking.
pub struct BudgetManager {
    max_per_request: Option<U256>,
    max_total: Option<U256>,
    allowed_domains: Vec<String>,
    total_spent: U256,
    history: Vec<PaymentRecord>,
    warned: bool,
    warning: Option<WarningCallback>,
}

impl BudgetManager {
    /// Build a manager from a policy, parsing the human amounts once.
    pub fn new(policy: &SpendingPolicy) -> Result<Self, AgentError> {
        let parse = |p: &str| -> Result<U256, AgentError> {
            parse_price(p)
                .map_err(|e| AgentError::PaymentFailed(format!("invalid policy amount: {e}")))?
                .parse()
                .map_err(|e| AgentError::PaymentFailed(format!("invalid policy amount: {e}")))
        };

        Ok(Self {
            max_per_request: policy.max_per_request.as_deref().map(parse).transpose()?,
            max_total: policy.max_total.as_deref().map(parse).transpose()?,
            allowed_domains: policy.allowed_domains.clone(),
            total_spent: U256::ZERO,
            history: Vec::new(),
            warned: false,
            warning: None,
        })
    }

    /// Unlimited manager (no policy).
    pub fn unlimited() -> Self {
        Self::new(&SpendingPolicy::default()).expect("empty policy always parses")
    }

    /// Register a callback invoked once when cumulative spend first crosses
    /// 80% of the total cap.
    pub fn on_warning(&mut self, cb: impl Fn(U256, U256) + Send + Sync + 'static) {
        self.warning = Some(Box::new(cb));
    }

    /// Check a prospective payment against the policy, in order: domain,
    /// per-request, total.
    pub fn check_spend(&self, amount: U256, domain: Option<&str>) -> SpendCheck {
        if !self.allowed_domains.is_empty() {
            if let Some(domain) = domain {
                if !self.allowed_domains.iter().any(|d| d == domain) {
                    return SpendCheck {
                        allowed: false,
                        reason: Some(DenyReason::DomainNotAllowed(format!(
                            "domain '{domain}' is not in the allow-list"
                        ))),
                    };
                }
            }
        }

        if let Some(max) = self.max_per_request {
            if amount > max {
                return SpendCheck {
                    allowed: false,
                    reason: Some(DenyReason::PerRequestLimit(format!(
                        "amount {} exceeds per-request limit {}",
                        display(amount),
                        display(max)
                    ))),
                };
            }
        }

        if let Some(max) = self.max_total {
            if self.total_spent + amount > max {
                return SpendCheck {
                    allowed: false,
                    reason: Some(DenyReason::BudgetExceeded(format!(
                        "spending {} would exceed total budget {} (spent {})",
                        display(amount),
                        display(max),
                        display(self.total_spent)
                    ))),
                };
            }
        }

        SpendCheck {
            allowed: true,
            reason: None,
        }
    }

    /// Like [`check_spend`](Self::check_spend) but maps each denial to its
    /// typed error.
    pub fn assert_spend(&self, amount: U256, domain: Option<&str>) -> Result<(), AgentError> {
        match self.check_spend(amount, domain).reason {
            None => Ok(()),
            Some(DenyReason::DomainNotAllowed(msg)) => Err(AgentError::DomainNotAllowed(msg)),
            Some(DenyReason::PerRequestLimit(msg)) => Err(AgentError::PerRequestLimit(msg)),
            Some(DenyReason::BudgetExceeded(msg)) => Err(AgentError::BudgetExceeded(msg)),
        }
    }

    /// Record a completed payment and fire the 80% warning on first crossing.
    pub fn record_spend(&mut self, amount: U256, content_id: &str, domain: &str) {
        self.total_spent += amount;
        self.history.push(PaymentRecord {
            content_id: content_id.to_string(),
            amount: amount.to_string(),
            domain: domain.to_string(),
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        });

        if let Some(max) = self.max_total {
            let threshold = max * U256::from(4) / U256::from(5);
            if !self.warned && self.total_spent >= threshold {
                self.warned = true;
                tracing::warn!(
                    spent = %self.total_spent,
                    max = %max,
                    "budget 80% threshold crossed"
                );
                if let Some(cb) = &self.warning {
                    cb(self.total_spent, max);
                }
            }
        }
    }

    pub fn total_spent(&self) -> U256 {
        self.total_spent
    }

    pub fn history(&self) -> &[PaymentRecord] {
        &self.history
    }

    /// Remaining budget under the total cap, if one is set.
    pub fn remaining(&self) -> Option<U256> {
        self.max_total
            .map(|max| max.saturating_sub(self.total_spent))
    }
}

fn display(amount: U256) -> String {
    format_price(&amount.to_string(), 6, false).unwrap_or_else(|_| amount.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(per: &str, total: &str) -> SpendingPolicy {
        SpendingPolicy {
            max_per_request: Some(per.to_string()),
            max_total: Some(total.to_string()),
            allowed_domains: vec![],
        }
    }

    #[test]
    fn per_request_limit_enforced() {
        let budget = BudgetManager::new(&policy("1.00", "100.00")).unwrap();
        let err = budget
            .assert_spend(U256::from(5_000_000u64), None)
            .unwrap_err();
        assert_eq!(err.code(), "PER_REQUEST_LIMIT");
    }

    #[test]
    fn total_cap_counts_history() {
        let mut budget = BudgetManager::new(&policy("10.00", "2.00")).unwrap();
        budget.record_spend(U256::from(1_500_000u64), "a", "example.com");
        let err = budget
            .assert_spend(U256::from(1_000_000u64), None)
            .unwrap_err();
        assert_eq!(err.code(), "BUDGET_EXCEEDED");
        // A smaller payment still fits.
        assert!(budget.assert_spend(U256::from(500_000u64), None).is_ok());
    }

    #[test]
    fn domain_allow_list_checked_first() {
        let budget = BudgetManager::new(&SpendingPolicy {
            max_per_request: Some("0.01".to_string()),
            max_total: None,
            allowed_domains: vec!["api.example.com".to_string()],
        })
        .unwrap();

        // Over the per-request limit AND a bad domain: the domain wins.
        let err = budget
            .assert_spend(U256::from(1_000_000u64), Some("evil.example.com"))
            .unwrap_err();
        assert_eq!(err.code(), "DOMAIN_NOT_ALLOWED");

        assert!(budget
            .assert_spend(U256::from(1_000u64), Some("api.example.com"))
            .is_ok());
    }

    #[test]
    fn totals_are_monotonic() {
        let mut budget = BudgetManager::unlimited();
        let amounts = [1_000u64, 2_000, 3_000, 4_000];
        for (i, a) in amounts.iter().enumerate() {
            budget.record_spend(U256::from(*a), &format!("c{i}"), "example.com");
        }
        assert_eq!(budget.total_spent(), U256::from(10_000u64));
        assert_eq!(budget.history().len(), amounts.len());
    }

    #[test]
    fn warning_fires_once_on_crossing() {
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = Arc::clone(&fired);

        let mut budget = BudgetManager::new(&policy("10.00", "1.00")).unwrap();
        budget.on_warning(move |_, _| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        // 0.50 of 1.00 — below 80%
        budget.record_spend(U256::from(500_000u64), "a", "d");
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        // 0.85 cumulative — crossing
        budget.record_spend(U256::from(350_000u64), "b", "d");
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Still above threshold — fires no more
        budget.record_spend(U256::from(100_000u64), "c", "d");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remaining_tracks_cap() {
        let mut budget = BudgetManager::new(&policy("10.00", "1.00")).unwrap();
        assert_eq!(budget.remaining(), Some(U256::from(1_000_000u64)));
        budget.record_spend(U256::from(400_000u64), "a", "d");
        assert_eq!(budget.remaining(), Some(U256::from(600_000u64)));
    }
}
