//! Persisted user preferences

use serde_json::Value;

pub const USE_EXCHANGE_RATE: &str = "use_exchange_rate";
pub const CURRENCY: &str = "currency";
pub const USE_EXCHANGE: &str = "use_exchange";
pub const HISTORY_RATES: &str = "history_rates";
pub const FIAT_ADDRESS: &str = "fiat_address";

pub const DEFAULT_ENABLED: bool = true;
pub const DEFAULT_CURRENCY: &str = "USD";

/// Key-value preference store owned by the wallet.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value`; with `persist` the store writes through to its backing medium.
    fn set(&self, key: &str, value: Value, persist: bool);
}

/// Typed accessors over any [`SettingsStore`].
pub trait SettingsExt: SettingsStore {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_i64().map_or(default, |n| n != 0),
            _ => default,
        }
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s,
            _ => default.to_string(),
        }
    }
}

impl<T: SettingsStore + ?Sized> SettingsExt for T {}
