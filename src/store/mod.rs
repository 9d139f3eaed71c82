//! Storage backends: user settings and the on-disk history cache.

pub mod disk;
pub mod history;
pub mod memory;

pub use disk::FileSettings;
pub use history::{CachedHistory, HistoryCache};
pub use memory::MemorySettings;
