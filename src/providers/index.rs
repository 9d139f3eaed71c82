//! Static provider to currency index.
//!
//! The index is produced offline by [`CurrencyIndex::generate`] and shipped as
//! `data/currencies.json`. Runtime code only loads it.

use super::ProviderRegistry;
use anyhow::{Context, Result};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

const BUNDLED_INDEX: &str = include_str!("../../data/currencies.json");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyIndex {
    providers: BTreeMap<String, BTreeSet<String>>,
}

impl CurrencyIndex {
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_INDEX).context("Bundled currency index is invalid")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read currency index: {}", path.as_ref().display())
        })?;
        Self::from_json(&text).with_context(|| {
            format!("Failed to parse currency index: {}", path.as_ref().display())
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn insert(&mut self, provider: &str, currencies: impl IntoIterator<Item = String>) {
        self.providers
            .insert(provider.to_string(), currencies.into_iter().collect());
    }

    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn currencies_of(&self, provider: &str) -> Option<&BTreeSet<String>> {
        self.providers.get(provider)
    }

    /// Currency to providers. With `history`, providers are listed under the
    /// currencies they serve history for, and index names missing from the
    /// registry are skipped.
    pub fn providers_by_currency(
        &self,
        registry: &ProviderRegistry,
        history: bool,
    ) -> BTreeMap<String, Vec<String>> {
        let mut by_ccy: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, currencies) in &self.providers {
            if !history {
                for ccy in currencies {
                    by_ccy.entry(ccy.clone()).or_default().push(name.clone());
                }
                continue;
            }
            let Some(provider) = registry.get(name) else {
                debug!("Currency index lists unknown provider {}", name);
                continue;
            };
            for ccy in provider.historical_currencies() {
                by_ccy
                    .entry((*ccy).to_string())
                    .or_default()
                    .push(name.clone());
            }
        }
        by_ccy
    }

    /// Probes every registered provider. This goes out to the network and is
    /// meant for offline regeneration of the bundled index only.
    pub async fn generate(registry: &ProviderRegistry, on_probe: impl Fn(&str, bool)) -> Self {
        let probes = registry.names().map(|name| async move {
            let result = match registry.get(name) {
                Some(provider) => provider.list_currencies().await,
                None => Ok(BTreeSet::new()),
            };
            (name.to_string(), result)
        });

        let mut index = CurrencyIndex::default();
        for (name, result) in join_all(probes).await {
            match result {
                Ok(currencies) => {
                    on_probe(&name, true);
                    index.insert(&name, currencies);
                }
                Err(e) => {
                    on_probe(&name, false);
                    warn!("Skipping {} in currency index: {}", name, e);
                }
            }
        }
        index
    }
}
