//! Adapter registry keyed by provider

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::SyncAdapter;
use crate::models::Provider;

/// Fixed set of adapters, assembled before the engine is built
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Provider, Arc<dyn SyncAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own provider, replacing any previous one
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn SyncAdapter>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn SyncAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    /// Registered providers, in declaration order
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.adapters.keys().copied().collect();
        providers.sort();
        providers
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AdapterRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::clock::SystemClock;

    #[test]
    fn registry_resolves_registered_providers_only() {
        let registry = AdapterRegistry::new()
            .with_adapter(Arc::new(MemoryAdapter::new(Arc::new(SystemClock))));

        assert!(registry.get(Provider::Memory).is_some());
        assert!(registry.get(Provider::Notion).is_none());
        assert_eq!(registry.providers(), vec![Provider::Memory]);
        assert!(format!("{registry:?}").contains("Memory"));
    }
}
