use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::Store;
use crate::gateway::AnalysisGateway;

/// Shared per-process dependencies handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn AnalysisGateway>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        gateway: Arc<dyn AnalysisGateway>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            gateway,
        }
    }
}
