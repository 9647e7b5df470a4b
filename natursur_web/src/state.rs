use std::sync::Arc;

use natursur::{application::Services, NatursurConfig};

/// ハンドラーで共有する状態
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub config: Arc<NatursurConfig>,
}

impl AppState {
    pub fn new(config: NatursurConfig, services: Services) -> Self {
        Self {
            services: Arc::new(services),
            config: Arc::new(config),
        }
    }

    pub fn debug(&self) -> bool {
        self.config.server.debug
    }
}
