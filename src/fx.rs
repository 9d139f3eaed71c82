//! Fiat rate coordinator.
//!
//! [`FxCoordinator`] owns the user's currency and provider selection, drives
//! periodic background refreshes of spot quotes and history, and answers rate
//! queries from whatever the last refresh stored.

use crate::core::config::Network;
use crate::core::format::{DEFAULT_PRECISION, NO_DATA, ccy_amount_str};
use crate::core::settings::{self, DEFAULT_CURRENCY, DEFAULT_ENABLED, SettingsExt, SettingsStore};
use crate::core::{COIN, HistorySeries, Quote, RateProvider};
use crate::providers::ProviderRegistry;
use crate::providers::index::CurrencyIndex;
use crate::store::history::{CachedHistory, HistoryCache};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How often [`FxCoordinator::run`] ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Minimum spacing between two refreshes.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(150);

/// Missing history within this many days of today is filled with the spot rate.
const SPOT_FALLBACK_DAYS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FxEvent {
    Quotes,
    History,
}

impl FxEvent {
    pub fn callback_name(&self) -> &'static str {
        match self {
            FxEvent::Quotes => "on_quotes",
            FxEvent::History => "on_history",
        }
    }
}

/// Receives rate updates. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: FxEvent);
}

impl Notifier for broadcast::Sender<FxEvent> {
    fn notify(&self, event: FxEvent) {
        // no subscribers is fine
        let _ = self.send(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FxState {
    Disabled,
    Idle,
    Refreshing,
}

#[derive(Clone)]
struct HistoryEntry {
    series: Arc<HistorySeries>,
    fetched_at: SystemTime,
}

/// The selected provider and the rates it has produced so far. Replaced
/// wholesale on provider switch, so late results from a previous provider
/// land in a detached instance.
struct ActiveProvider {
    name: String,
    provider: Arc<dyn RateProvider>,
    quotes: RwLock<Arc<Quote>>,
    history: RwLock<Arc<HashMap<String, HistoryEntry>>>,
}

impl ActiveProvider {
    fn new(name: String, provider: Arc<dyn RateProvider>) -> Self {
        Self {
            name,
            provider,
            quotes: RwLock::new(Arc::new(Quote::new())),
            history: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    fn quotes(&self) -> Arc<Quote> {
        Arc::clone(&self.quotes.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn replace_quotes(&self, quote: Quote) {
        *self.quotes.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(quote);
    }

    fn history_for(&self, ccy: &str) -> Option<(Arc<HistorySeries>, SystemTime)> {
        let history = Arc::clone(&self.history.read().unwrap_or_else(PoisonError::into_inner));
        history
            .get(ccy)
            .map(|entry| (Arc::clone(&entry.series), entry.fetched_at))
    }

    fn store_history(&self, ccy: &str, cached: CachedHistory) {
        let mut guard = self.history.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = (**guard).clone();
        next.insert(
            ccy.to_string(),
            HistoryEntry {
                series: Arc::new(cached.series),
                fetched_at: cached.fetched_at,
            },
        );
        *guard = Arc::new(next);
    }
}

/// Counts one refresh task as in flight until dropped, then sends `event`.
/// Dropped on unwind too, so a panicking provider still ends the cycle.
struct InFlight {
    count: Arc<AtomicUsize>,
    notifier: Arc<dyn Notifier>,
    event: Option<FxEvent>,
}

impl InFlight {
    fn start(count: &Arc<AtomicUsize>, notifier: &Arc<dyn Notifier>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self {
            count: Arc::clone(count),
            notifier: Arc::clone(notifier),
            event: None,
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
        if let Some(event) = self.event {
            self.notifier.notify(event);
        }
    }
}

/// Background tasks started by one tick.
pub struct RefreshHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits for every task of this refresh to finish.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Rate refresh task failed: {}", e);
            }
        }
    }
}

pub struct FxCoordinator {
    network: Network,
    settings: Arc<dyn SettingsStore>,
    registry: Arc<ProviderRegistry>,
    index: Arc<CurrencyIndex>,
    cache: Arc<HistoryCache>,
    notifier: Arc<dyn Notifier>,
    runtime: Handle,
    ccy: RwLock<String>,
    active: RwLock<Arc<ActiveProvider>>,
    /// `None` forces a refresh on the next tick.
    deadline: Mutex<Option<Instant>>,
    in_flight: Arc<AtomicUsize>,
    history_used_spot: AtomicBool,
}

impl FxCoordinator {
    /// Builds the coordinator from persisted settings. Must be called from
    /// within a tokio runtime; refresh tasks are spawned on it.
    pub fn new(
        network: Network,
        settings: Arc<dyn SettingsStore>,
        registry: Arc<ProviderRegistry>,
        index: Arc<CurrencyIndex>,
        cache: Arc<HistoryCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().context("Rate coordinator needs a tokio runtime")?;
        let ccy = settings.get_string(settings::CURRENCY, DEFAULT_CURRENCY);
        let configured = settings.get_string(settings::USE_EXCHANGE, registry.default_name());
        let (name, provider) = registry.resolve(&configured).with_context(|| {
            format!(
                "Default rate provider {} is not registered",
                registry.default_name()
            )
        })?;

        let coordinator = Self {
            network,
            settings,
            registry,
            index,
            cache,
            notifier,
            runtime,
            ccy: RwLock::new(ccy),
            active: RwLock::new(Arc::new(ActiveProvider::new(name, provider))),
            deadline: Mutex::new(None),
            in_flight: Arc::new(AtomicUsize::new(0)),
            history_used_spot: AtomicBool::new(false),
        };
        coordinator.set_provider(&configured);
        Ok(coordinator)
    }

    fn active(&self) -> Arc<ActiveProvider> {
        Arc::clone(&self.active.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn force_refresh(&self) {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn state(&self) -> FxState {
        if !self.is_enabled() {
            FxState::Disabled
        } else if self.in_flight.load(Ordering::SeqCst) > 0 {
            FxState::Refreshing
        } else {
            FxState::Idle
        }
    }

    /// Starts a refresh when one is due. Never waits on the network.
    pub fn tick(&self) -> Option<RefreshHandle> {
        if !self.is_enabled() {
            return None;
        }
        {
            let mut deadline = self.deadline.lock().unwrap_or_else(PoisonError::into_inner);
            if deadline.is_some_and(|at| Instant::now() < at) {
                return None;
            }
            *deadline = Some(Instant::now() + REFRESH_INTERVAL);
        }

        let active = self.active();
        let ccy = self.currency();
        let mut tasks = vec![self.spawn_quotes(Arc::clone(&active), ccy.clone())];

        let history_stale = active
            .history_for(&ccy)
            .is_none_or(|(_, fetched_at)| self.cache.is_stale(fetched_at));
        if self.show_history() && history_stale {
            tasks.push(self.spawn_history(active, ccy));
        }
        Some(RefreshHandle { tasks })
    }

    /// Clears the refresh deadline and ticks.
    pub fn refresh_now(&self) -> Option<RefreshHandle> {
        self.force_refresh();
        self.tick()
    }

    /// Ticks forever at [`TICK_INTERVAL`].
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            self.tick();
        }
    }

    fn spawn_quotes(&self, active: Arc<ActiveProvider>, ccy: String) -> JoinHandle<()> {
        let mut guard = InFlight::start(&self.in_flight, &self.notifier);
        guard.event = Some(FxEvent::Quotes);
        self.runtime.spawn(async move {
            let _guard = guard;
            debug!("Getting fx quotes for {} from {}", ccy, active.name);
            match active.provider.fetch_current_rates(&ccy).await {
                Ok(quote) => {
                    debug!("Received {} fx quotes", quote.len());
                    active.replace_quotes(quote);
                }
                Err(e) => warn!("Failed fx quotes from {}: {}", active.name, e),
            }
        })
    }

    fn spawn_history(&self, active: Arc<ActiveProvider>, ccy: String) -> JoinHandle<()> {
        let cache = Arc::clone(&self.cache);
        let mut guard = InFlight::start(&self.in_flight, &self.notifier);
        self.runtime.spawn(async move {
            if let Some(cached) = cache.ensure_fresh(active.provider.as_ref(), &ccy).await {
                debug!("History rates of length {} for {}", cached.series.len(), ccy);
                active.store_history(&ccy, cached);
                guard.event = Some(FxEvent::History);
            }
        })
    }

    /// Fiat is only offered on mainnet.
    pub fn is_supported(&self) -> bool {
        self.network.supports_fiat()
    }

    pub fn is_enabled(&self) -> bool {
        self.is_supported()
            && self
                .settings
                .get_bool(settings::USE_EXCHANGE_RATE, DEFAULT_ENABLED)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.settings
            .set(settings::USE_EXCHANGE_RATE, json!(enabled), true);
    }

    pub fn history_config(&self) -> bool {
        self.settings.get_bool(settings::HISTORY_RATES, false)
    }

    pub fn set_history_config(&self, enabled: bool) {
        self.settings
            .set(settings::HISTORY_RATES, json!(enabled), true);
    }

    pub fn fiat_address_config(&self) -> bool {
        self.settings.get_bool(settings::FIAT_ADDRESS, false)
    }

    pub fn set_fiat_address_config(&self, enabled: bool) {
        self.settings
            .set(settings::FIAT_ADDRESS, json!(enabled), true);
    }

    /// The selected currency code.
    pub fn currency(&self) -> String {
        self.ccy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The provider name stored in settings, which may not be registered.
    pub fn config_provider(&self) -> String {
        self.settings
            .get_string(settings::USE_EXCHANGE, self.registry.default_name())
    }

    /// Name of the provider currently serving rates.
    pub fn provider_name(&self) -> String {
        self.active().name.clone()
    }

    pub fn show_history(&self) -> bool {
        self.is_enabled()
            && self.history_config()
            && self.active().provider.has_history_for(&self.currency())
    }

    pub fn set_currency(&self, ccy: &str) {
        *self.ccy.write().unwrap_or_else(PoisonError::into_inner) = ccy.to_string();
        if self.settings.get_string(settings::CURRENCY, DEFAULT_CURRENCY) != ccy {
            self.settings.set(settings::CURRENCY, json!(ccy), true);
        }
        self.force_refresh();
        self.notifier.notify(FxEvent::Quotes);
    }

    /// Switches provider. Unknown names fall back to the default provider, as
    /// does any provider without history for the selected currency while
    /// history display is on.
    pub fn set_provider(&self, name: &str) {
        let Some((resolved, provider)) = self.registry.resolve(name) else {
            warn!("No rate provider available for {}", name);
            return;
        };
        if self.config_provider() != resolved {
            self.settings
                .set(settings::USE_EXCHANGE, json!(resolved), true);
        }

        let default = self.registry.default_name().to_string();
        let ccy = self.currency();
        if self.history_config() && !provider.has_history_for(&ccy) && resolved != default {
            debug!("{} has no history for {}, trying {}", resolved, ccy, default);
            self.set_provider(&default);
            return;
        }

        info!("Using rate provider {}", resolved);
        *self.active.write().unwrap_or_else(PoisonError::into_inner) =
            Arc::new(ActiveProvider::new(resolved, provider));
        self.force_refresh();
    }

    /// Spot price of one coin in the selected currency.
    pub fn current_rate(&self) -> Option<Decimal> {
        self.active().quotes().get(&self.currency()).copied()
    }

    /// Price on `date`. Recent dates without history use the spot rate.
    pub fn historical_rate(&self, date: NaiveDate) -> Option<Decimal> {
        self.historical_rate_on(date, Local::now().date_naive())
    }

    pub(crate) fn historical_rate_on(&self, date: NaiveDate, today: NaiveDate) -> Option<Decimal> {
        let ccy = self.currency();
        let recorded = self
            .active()
            .history_for(&ccy)
            .and_then(|(series, _)| series.get(&date).copied());
        if recorded.is_some() {
            return recorded;
        }
        // today's price usually only shows up in history tomorrow
        if (today - date).num_days() <= SPOT_FALLBACK_DAYS {
            let spot = self.current_rate();
            if spot.is_some() {
                self.history_used_spot.store(true, Ordering::SeqCst);
            }
            return spot;
        }
        None
    }

    /// Whether a historical lookup was served from the spot rate since the
    /// last call. Clears the flag.
    pub fn take_history_used_spot(&self) -> bool {
        self.history_used_spot.swap(false, Ordering::SeqCst)
    }

    pub fn historical_value(&self, amount: i64, date: NaiveDate) -> Option<Decimal> {
        fiat_value(amount, self.historical_rate(date)?)
    }

    /// Historical rate for the local calendar day of a unix timestamp.
    pub fn timestamp_rate(&self, timestamp: i64) -> Option<Decimal> {
        let date = DateTime::from_timestamp(timestamp, 0)?
            .with_timezone(&Local)
            .date_naive();
        self.historical_rate(date)
    }

    /// Renders `amount` smallest units at `rate`, or [`NO_DATA`].
    pub fn value_str(
        &self,
        amount: Option<i64>,
        rate: Option<Decimal>,
        default_prec: u32,
        is_diff: bool,
        commas: bool,
    ) -> String {
        match amount.zip(rate).and_then(|(amount, rate)| fiat_value(amount, rate)) {
            Some(value) => ccy_amount_str(value, &self.currency(), commas, default_prec, is_diff),
            None => NO_DATA.to_string(),
        }
    }

    /// Fiat value of `amount` at the spot rate, or at the rate of `date`.
    pub fn convert_to_fiat(&self, amount: i64, date: Option<NaiveDate>) -> String {
        let rate = match date {
            Some(date) => self.historical_rate(date),
            None => self.current_rate(),
        };
        self.value_str(Some(amount), rate, DEFAULT_PRECISION, false, true)
    }

    /// Smallest units buying `fiat` at the spot rate, truncated.
    pub fn convert_from_fiat(&self, fiat: Decimal) -> Option<i64> {
        let rate = self.current_rate()?;
        fiat.checked_div(rate)?
            .checked_mul(Decimal::from(COIN))?
            .trunc()
            .to_i64()
    }

    /// Empty when no spot rate is available.
    pub fn format_amount(&self, amount: i64, is_diff: bool, commas: bool) -> String {
        match self.current_rate() {
            Some(rate) => {
                self.value_str(Some(amount), Some(rate), DEFAULT_PRECISION, is_diff, commas)
            }
            None => String::new(),
        }
    }

    pub fn format_amount_and_units(&self, amount: i64, is_diff: bool, commas: bool) -> String {
        let amount_str = self.format_amount(amount, is_diff, commas);
        if amount_str.is_empty() {
            amount_str
        } else {
            format!("{} {}", amount_str, self.currency())
        }
    }

    /// Status bar text pricing one `base_unit`, where a unit is
    /// 10^`decimal_point` smallest units.
    pub fn fiat_status_text(&self, base_unit: &str, decimal_point: u32) -> String {
        let Some(rate) = self.current_rate() else {
            return "  (No FX rate available)".to_string();
        };
        // bits are tiny, show more digits
        let default_prec = if decimal_point == 2 { 4 } else { DEFAULT_PRECISION };
        let unit = 10i64.pow(decimal_point.min(8));
        format!(
            " 1 {}~{} {}",
            base_unit,
            self.value_str(Some(unit), Some(rate), default_prec, false, true),
            self.currency()
        )
    }

    /// Known currencies, or only those with history.
    pub fn currencies(&self, history: bool) -> Vec<String> {
        self.index
            .providers_by_currency(&self.registry, history)
            .into_keys()
            .collect()
    }

    pub fn providers_for_currency(&self, ccy: &str, history: bool) -> Vec<String> {
        self.index
            .providers_by_currency(&self.registry, history)
            .remove(ccy)
            .unwrap_or_default()
    }
}

fn fiat_value(amount: i64, rate: Decimal) -> Option<Decimal> {
    Decimal::from(amount)
        .checked_div(Decimal::from(COIN))?
        .checked_mul(rate)
}
