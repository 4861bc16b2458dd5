//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::transfer::TransferOrchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    transfer: TransferOrchestrator,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let transfer = TransferOrchestrator::new(
            config.transfer.chunk_separator.clone(),
            config.transfer.copy_buffer_size,
        );

        Self {
            inner: Arc::new(AppStateInner { config, transfer }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the transfer orchestrator
    pub fn transfer(&self) -> &TransferOrchestrator {
        &self.inner.transfer
    }
}
