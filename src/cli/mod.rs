pub mod currencies;
pub mod index;
pub mod rates;
pub mod setup;
pub mod ui;

use crate::fx::{FxEvent, Notifier};
use tracing::debug;

/// Notifier for one-shot commands, which poll instead of subscribing.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: FxEvent) {
        debug!("Fx callback {}", event.callback_name());
    }
}
