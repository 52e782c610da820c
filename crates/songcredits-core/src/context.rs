//! Application context.
//!
//! Built once at startup and passed by reference to everything that needs the
//! configuration or the engine.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ConfigStore, SinkConfig};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::provider::{ProviderKind, create_provider};

pub struct AppContext {
    store: Arc<ConfigStore>,
    engine: Engine,
}

impl AppContext {
    /// Load the configuration at `path` and build an idle engine
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Arc::new(ConfigStore::load(path)?);
        Self::new(store)
    }

    pub fn new(store: Arc<ConfigStore>) -> Result<Self> {
        let engine = Engine::new(Arc::clone(&store))?;
        debug!("Context ready ({} output(s))", engine.sink_count());
        Ok(Self { store, engine })
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn active_provider(&self) -> Option<ProviderKind> {
        self.store.snapshot().sources.active
    }

    /// Build and authorize the configured provider without starting polling
    pub fn activate(&self) -> Result<ProviderKind> {
        let kind = self.active_provider().ok_or(Error::NoProvider)?;
        let provider = create_provider(kind, &self.store)?;
        provider.authorize()?;
        self.engine.set_provider(provider);
        info!("Using {}", kind);
        Ok(kind)
    }

    /// Activate the configured provider and start polling
    pub fn start(&self) -> Result<()> {
        self.activate()?;
        self.engine.start()
    }

    pub fn add_sink(&self, sink: SinkConfig) -> Result<()> {
        self.store.add_sink(sink)?;
        self.store.save()?;
        self.engine.reload_outputs()
    }

    pub fn remove_sink(&self, file: &Path) -> Result<SinkConfig> {
        let removed = self.store.remove_sink(file)?;
        self.store.save()?;
        self.engine.reload_outputs()?;
        Ok(removed)
    }

    pub fn shutdown(&self) {
        self.engine.stop();
        if let Some(provider) = self.engine.provider() {
            provider.close();
        }
    }
}
