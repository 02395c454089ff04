use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{ProviderError, Result};
use crate::Provider;

/// Concurrent-safe `providerId -> Provider` registry (§4.E, §9 "shared
/// mutable registries": reader-biased lock, snapshots for `list`).
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: impl Into<String>, provider: Arc<dyn Provider>) -> Result<()> {
        let id = id.into();
        let mut providers = self.providers.write().await;
        if providers.contains_key(&id) {
            return Err(ProviderError::DuplicateName(id));
        }
        providers.insert(id, provider);
        Ok(())
    }

    pub async fn lookup(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<String> {
        self.providers.read().await.keys().cloned().collect()
    }
}
