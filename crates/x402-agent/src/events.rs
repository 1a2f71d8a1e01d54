//! Payment lifecycle events.
//!
//! Listeners run synchronously on the flow that emits them. A panicking
//! listener is caught and logged; it never breaks the payment flow.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;

/// Emitted around the payment sub-flow.
#[derive(Debug, Clone)]
pub enum PaymentEvent {
    Started {
        content_id: String,
        price: String,
    },
    Success {
        content_id: String,
        /// Smallest-unit amount paid.
        amount: String,
        tx_hash: String,
        /// Remaining total budget in smallest units, when a cap is set.
        budget_remaining: Option<String>,
    },
    Failed {
        content_id: String,
        error: String,
    },
}

type Listener = Box<dyn Fn(&PaymentEvent) + Send + Sync>;

/// Keyless listener table with synchronous delivery.
#[derive(Default)]
pub struct EventHub {
    listeners: Mutex<Vec<Listener>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&PaymentEvent) + Send + Sync + 'static) {
        self.listeners.lock().unwrap().push(Box::new(listener));
    }

    pub fn emit(&self, event: &PaymentEvent) {
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!("payment event listener panicked; continuing");
            }
        }
    }
}
