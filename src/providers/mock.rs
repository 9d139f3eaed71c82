//! Scriptable provider for unit tests.

use crate::core::{HistorySeries, Quote, RateError, RateProvider};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct MockProvider {
    pub name: &'static str,
    pub history_ccys: &'static [&'static str],
    quote: Mutex<Option<Quote>>,
    history: Mutex<Option<HistorySeries>>,
    panics: AtomicBool,
    pub spot_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &'static str, history_ccys: &'static [&'static str]) -> Self {
        Self {
            name,
            history_ccys,
            quote: Mutex::new(None),
            history: Mutex::new(None),
            panics: AtomicBool::new(false),
            spot_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
        }
    }

    /// `None` makes the next fetches fail with a 503.
    pub fn set_quote(&self, quote: Option<Quote>) {
        *self.quote.lock().unwrap() = quote;
    }

    pub fn set_history(&self, history: Option<HistorySeries>) {
        *self.history.lock().unwrap() = history;
    }

    /// Makes every fetch panic mid-flight.
    pub fn set_panics(&self, panics: bool) {
        self.panics.store(panics, Ordering::SeqCst);
    }

    fn check_panic(&self) {
        if self.panics.load(Ordering::SeqCst) {
            panic!("{} blew up", self.name);
        }
    }

    fn unavailable() -> RateError {
        RateError::Status {
            url: "http://mock".to_string(),
            status: 503,
        }
    }
}

#[async_trait]
impl RateProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_current_rates(&self, _ccy_hint: &str) -> Result<Quote, RateError> {
        self.spot_calls.fetch_add(1, Ordering::SeqCst);
        self.check_panic();
        self.quote.lock().unwrap().clone().ok_or_else(Self::unavailable)
    }

    /// Hands out whatever was scripted, empty series included.
    async fn fetch_historical_series(&self, _ccy: &str) -> Result<HistorySeries, RateError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.check_panic();
        self.history.lock().unwrap().clone().ok_or_else(Self::unavailable)
    }

    fn historical_currencies(&self) -> &'static [&'static str] {
        self.history_ccys
    }
}
