//! Core rate abstractions and shared helpers

pub mod config;
pub mod decimal;
pub mod format;
pub mod log;
pub mod rate;
pub mod settings;

// Re-export main types for cleaner imports
pub use rate::{COIN, HistorySeries, Quote, RateError, RateProvider};
