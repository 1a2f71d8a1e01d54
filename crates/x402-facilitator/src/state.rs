use crate::config::FacilitatorConfig;
use crate::executor::Executor;

/// Shared application state. Read-only after startup; per-request pipeline
/// state is strictly local.
pub struct AppState {
    pub config: FacilitatorConfig,
    pub executor: Executor,
}
