//! Application state shared by every handler: settings, the examiner client and
//! the durable store.
//!
//! The HTTP proxy endpoints are stateless and only use the examiner. Each
//! WebSocket connection builds its own `DefenseSession` from these parts.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::gemini::{Examiner, GeminiClient};
use crate::session::DefenseSession;
use crate::store::{FileStore, KvStore, MemoryStore, PersistenceGateway};

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub examiner: Arc<dyn Examiner>,
    pub store: Arc<dyn KvStore>,
}

impl AppState {
    /// Build state from settings: open the file store and the examiner client.
    /// An unusable store file degrades to an in-memory store.
    #[instrument(level = "info", skip_all)]
    pub fn new(settings: Settings) -> Result<Self, Box<dyn std::error::Error>> {
        let client = GeminiClient::new(&settings)?;
        info!(
            target: "sempro_backend",
            base_url = %client.base_url,
            model = %client.model,
            api_key_present = client.has_api_key(),
            "Examiner client ready"
        );

        let store: Arc<dyn KvStore> = match FileStore::open(&settings.store_path) {
            Ok(fs) => {
                info!(target: "store", path = %fs.path().display(), "Using file store");
                Arc::new(fs)
            }
            Err(e) => {
                warn!(target: "store", path = %settings.store_path.display(), error = %e, "File store unavailable; falling back to memory (data will not survive restarts)");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::from_parts(settings, Arc::new(client), store))
    }

    pub fn from_parts(settings: Settings, examiner: Arc<dyn Examiner>, store: Arc<dyn KvStore>) -> Self {
        Self { settings, examiner, store }
    }

    pub fn gateway(&self) -> PersistenceGateway {
        PersistenceGateway::new(self.store.clone())
    }

    pub fn new_session(&self) -> DefenseSession {
        DefenseSession::new(self.examiner.clone(), self.gateway())
    }
}
