pub mod bitstamp_yadio;
pub mod coingecko;
pub mod coinpaprika;
pub mod index;
#[cfg(test)]
pub(crate) mod mock;
pub mod util;

use crate::core::config::ProvidersConfig;
use crate::core::{RateError, RateProvider};
use bitstamp_yadio::BitstampYadioProvider;
use coingecko::CoinGeckoProvider;
use coinpaprika::CoinPaprikaProvider;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Provider used when a configured name is unknown. It should serve history.
pub const DEFAULT_PROVIDER: &str = CoinGeckoProvider::NAME;

pub type ProviderFactory = Arc<dyn Fn() -> Arc<dyn RateProvider> + Send + Sync>;

/// Name to constructor mapping, populated once at startup.
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
    default_name: String,
}

impl ProviderRegistry {
    /// An empty registry. `default_name` should be registered before use.
    pub fn new(default_name: &str) -> Self {
        ProviderRegistry {
            factories: BTreeMap::new(),
            default_name: default_name.to_string(),
        }
    }

    /// Registry of the built-in providers wired to `config`.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, RateError> {
        let client = util::http_client()?;
        let mut registry = Self::new(DEFAULT_PROVIDER);

        let (cfg, http) = (config.coingecko.clone(), client.clone());
        registry.register(CoinGeckoProvider::NAME, move || {
            Arc::new(CoinGeckoProvider::new(cfg.clone(), http.clone()))
        });
        let (cfg, http) = (config.coinpaprika.clone(), client.clone());
        registry.register(CoinPaprikaProvider::NAME, move || {
            Arc::new(CoinPaprikaProvider::new(cfg.clone(), http.clone()))
        });
        let (cfg, http) = (config.bitstamp_yadio.clone(), client);
        registry.register(BitstampYadioProvider::NAME, move || {
            Arc::new(BitstampYadioProvider::new(cfg.clone(), http.clone()))
        });
        Ok(registry)
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn RateProvider> + Send + Sync + 'static,
    {
        debug!("Registering rate provider {}", name);
        self.factories.insert(name.to_string(), Arc::new(factory));
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RateProvider>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Looks up `name`, substituting the default provider for unknown names.
    /// `None` only when the default itself is not registered.
    pub fn resolve(&self, name: &str) -> Option<(String, Arc<dyn RateProvider>)> {
        if let Some(provider) = self.get(name) {
            return Some((name.to_string(), provider));
        }
        debug!(
            "Unknown rate provider {}, using {}",
            name, self.default_name
        );
        self.get(&self.default_name)
            .map(|provider| (self.default_name.clone(), provider))
    }
}
