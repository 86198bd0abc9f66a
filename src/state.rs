use crate::config::AppConfig;
use crate::store::{MemoryStore, PgStore, Store};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match &config.db.url {
            Some(url) => {
                let pg = PgStore::connect(url, &config.db).await?;
                if let Err(e) = pg.migrate().await {
                    warn!(error = %e, "migration failed; continuing");
                }
                info!("using postgres store");
                Arc::new(pg) as Arc<dyn Store>
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory store, data is lost on exit");
                Arc::new(MemoryStore::new()) as Arc<dyn Store>
            }
        };

        Ok(Self::from_parts(store, config))
    }

    pub fn from_parts(store: Arc<dyn Store>, config: Arc<AppConfig>) -> Self {
        Self { store, config }
    }

    /// In-memory state for tests; the concrete store is returned so tests can
    /// inspect rows and inject conflicts.
    #[cfg(test)]
    pub fn fake() -> (Self, Arc<MemoryStore>) {
        Self::fake_with(AppConfig::for_tests())
    }

    #[cfg(test)]
    pub fn fake_with(config: AppConfig) -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = Self::from_parts(store.clone(), Arc::new(config));
        (state, store)
    }
}
