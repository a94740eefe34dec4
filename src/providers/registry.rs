//! Ordered registry of provider adapters.

use std::collections::HashSet;
use std::sync::Arc;

use super::base::ProviderAdapter;
use super::command::CommandProvider;
use super::http::HttpProvider;
use crate::types::config::{Config, ProviderConfig, ProviderKind};
use crate::{XfaasError, XfaasResult};

/// Builds the adapter described by a provider entry.
pub fn build_provider(config: &ProviderConfig) -> XfaasResult<Arc<dyn ProviderAdapter>> {
    let adapter: Arc<dyn ProviderAdapter> = match config.kind {
        ProviderKind::Command => Arc::new(CommandProvider::from_config(config)),
        ProviderKind::Http => Arc::new(HttpProvider::from_config(config)?),
    };
    Ok(adapter)
}

/// Providers of one orchestrator, in registration order.
///
/// Registration order is dispatch order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from the enabled providers of a configuration.
    pub fn from_config(config: &Config) -> XfaasResult<Self> {
        config.validate()?;

        let mut registry = Self::new();
        for provider in config.enabled_providers() {
            registry.register(build_provider(provider)?)?;
        }

        tracing::debug!(providers = ?registry.ids(), "Provider registry built");
        Ok(registry)
    }

    /// Registers a provider. Ids are unique.
    pub fn register(&mut self, provider: Arc<dyn ProviderAdapter>) -> XfaasResult<()> {
        if self.get(provider.id()).is_some() {
            return Err(XfaasError::DuplicateProvider(provider.id().to_string()));
        }

        tracing::debug!(
            provider = provider.id(),
            kind = provider.kind(),
            "Registering provider"
        );
        self.providers.push(provider);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, provider: Arc<dyn ProviderAdapter>) -> XfaasResult<Self> {
        self.register(provider)?;
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn ProviderAdapter>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    /// All providers, in dispatch order.
    pub fn all(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.providers
    }

    pub fn ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Picks a subset of providers, in the order requested.
    pub fn select<S: AsRef<str>>(&self, ids: &[S]) -> XfaasResult<Vec<Arc<dyn ProviderAdapter>>> {
        let mut seen = HashSet::new();
        ids.iter()
            .map(|id| {
                let id = id.as_ref();
                if !seen.insert(id) {
                    return Err(XfaasError::DuplicateProvider(id.to_string()));
                }
                self.get(id)
                    .cloned()
                    .ok_or_else(|| XfaasError::UnknownProvider(id.to_string()))
            })
            .collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config() {
        let registry = ProviderRegistry::from_config(&Config::default_config()).unwrap();
        assert_eq!(registry.ids(), vec!["aws", "azure", "gcp"]);
        assert_eq!(registry.get("aws").unwrap().kind(), "command");
        assert_eq!(registry.get("gcp").unwrap().kind(), "http");
    }

    #[test]
    fn test_disabled_providers_are_skipped() {
        let mut config = Config::default_config();
        config.providers[1].enabled = false;

        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.ids(), vec!["aws", "gcp"]);
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(CommandProvider::new("aws", "aws")))
            .unwrap();

        let err = registry
            .register(Arc::new(CommandProvider::new("aws", "aws2")))
            .unwrap_err();
        assert!(matches!(err, XfaasError::DuplicateProvider(id) if id == "aws"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_select_keeps_requested_order() {
        let registry = ProviderRegistry::from_config(&Config::default_config()).unwrap();

        let picked = registry.select(&["gcp", "aws"]).unwrap();
        let ids: Vec<_> = picked.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["gcp", "aws"]);

        assert!(matches!(
            registry.select(&["ibm"]),
            Err(XfaasError::UnknownProvider(_))
        ));
        assert!(matches!(
            registry.select(&["aws", "aws"]),
            Err(XfaasError::DuplicateProvider(_))
        ));
    }
}
