use crate::core::settings::SettingsStore;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Settings backed by a JSON object on disk.
pub struct FileSettings {
    path: PathBuf,
    values: RwLock<Map<String, Value>>,
}

impl FileSettings {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings: {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse settings: {}", path.display()))?
        } else {
            debug!("No settings at {}, starting empty", path.display());
            Map::new()
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    /// Writes all values to disk.
    pub fn flush(&self) -> Result<()> {
        let text = {
            let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*values)?
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(&self.path, text)
            .with_context(|| format!("Failed to write settings: {}", self.path.display()))?;
        debug!("Settings flushed to {}", self.path.display());
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: Value, persist: bool) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        if persist && let Err(e) = self.flush() {
            warn!("Could not persist setting {}: {:#}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::settings::SettingsExt;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_persisted_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = FileSettings::open(&path).unwrap();
        assert!(settings.get("currency").is_none());
        settings.set("currency", json!("EUR"), true);
        settings.set("history_rates", json!(true), true);

        let reopened = FileSettings::open(&path).unwrap();
        assert_eq!(reopened.get_string("currency", "USD"), "EUR");
        assert!(reopened.get_bool("history_rates", false));
    }

    #[test]
    fn test_unpersisted_values_stay_in_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = FileSettings::open(&path).unwrap();
        settings.set("currency", json!("JPY"), false);
        assert_eq!(settings.get_string("currency", "USD"), "JPY");
        assert!(!path.exists());

        settings.flush().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_corrupt_settings_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileSettings::open(&path).err().unwrap();
        assert!(err.to_string().contains("Failed to parse settings"));
    }
}
