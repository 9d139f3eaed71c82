pub mod cli;
pub mod core;
pub mod fx;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::fx::FxCoordinator;
use crate::providers::ProviderRegistry;
use crate::providers::index::CurrencyIndex;
use crate::store::{FileSettings, HistoryCache};
use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    /// Show the spot rate, optionally switching currency or provider first.
    Quote {
        currency: Option<String>,
        provider: Option<String>,
    },
    /// Coins to fiat, at the spot rate or the rate of `date`.
    Convert {
        amount: Decimal,
        date: Option<NaiveDate>,
    },
    /// Fiat to coins at the spot rate.
    ToAmount { fiat: Decimal },
    History { date: NaiveDate },
    Currencies { history: bool },
    GenerateIndex { output: Option<String> },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fiatfx starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let registry = Arc::new(ProviderRegistry::from_config(&config.providers)?);

    let fx = || build_coordinator(&config, Arc::clone(&registry));
    match command {
        AppCommand::Quote { currency, provider } => {
            cli::rates::quote(&fx()?, currency.as_deref(), provider.as_deref()).await
        }
        AppCommand::Convert { amount, date } => cli::rates::convert(&fx()?, amount, date).await,
        AppCommand::ToAmount { fiat } => cli::rates::to_amount(&fx()?, fiat).await,
        AppCommand::History { date } => cli::rates::history(&fx()?, date).await,
        AppCommand::Currencies { history } => cli::currencies::run(&fx()?, history),
        AppCommand::GenerateIndex { output } => {
            cli::index::run(&registry, output.as_deref()).await
        }
    }
}

/// Wires the coordinator to the settings file and cache under the data path.
pub fn build_coordinator(
    config: &AppConfig,
    registry: Arc<ProviderRegistry>,
) -> Result<FxCoordinator> {
    let index = match &config.currency_index {
        Some(path) => CurrencyIndex::load_from_path(path)?,
        None => CurrencyIndex::bundled()?,
    };
    let settings = FileSettings::open(config.settings_path()?)?;
    let cache = HistoryCache::new(config.cache_dir()?);

    FxCoordinator::new(
        config.network,
        Arc::new(settings),
        registry,
        Arc::new(index),
        Arc::new(cache),
        Arc::new(cli::LogNotifier),
    )
}
