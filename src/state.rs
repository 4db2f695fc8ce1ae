use std::sync::Arc;

use crate::config::{AppConfig, JwtConfig};
use crate::directory::{InMemoryDirectory, UserDirectory};

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn UserDirectory>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Builds the process-wide state: config from the environment and the
    /// directory seeded with the demo accounts. Owned by the application
    /// root and handed out by reference from here on.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let directory =
            Arc::new(InMemoryDirectory::with_default_users().await?) as Arc<dyn UserDirectory>;
        Ok(Self::from_parts(directory, config))
    }

    pub fn from_parts(directory: Arc<dyn UserDirectory>, config: Arc<AppConfig>) -> Self {
        Self { directory, config }
    }

    /// State with an empty directory and fixed JWT config, for unit tests.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_hours: 1,
            },
        });
        let directory = Arc::new(InMemoryDirectory::new()) as Arc<dyn UserDirectory>;
        Self::from_parts(directory, config)
    }
}
