//! Disk cache of historical series, one JSON file per provider and currency.

use crate::core::{HistorySeries, RateError, RateProvider};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

/// Upstream history has daily granularity.
pub const STALE_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct CachedHistory {
    pub series: HistorySeries,
    pub fetched_at: SystemTime,
}

pub struct HistoryCache {
    dir: PathBuf,
    max_age: Duration,
}

impl HistoryCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("Could not create cache directory {}: {}", dir.display(), e);
        }
        Self {
            dir,
            max_age: STALE_AFTER,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn path_for(&self, provider: &str, ccy: &str) -> PathBuf {
        self.dir.join(format!("{provider}_{ccy}"))
    }

    /// Reads a cached series. Missing, unreadable, corrupt or empty files all
    /// come back as `(None, UNIX_EPOCH)`.
    pub async fn read(&self, provider: &str, ccy: &str) -> (Option<HistorySeries>, SystemTime) {
        let path = self.path_for(provider, ccy);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            debug!("Cache MISS for {}", path.display());
            return (None, SystemTime::UNIX_EPOCH);
        }
        match Self::try_read(&path).await {
            Ok((series, _)) if series.is_empty() => (None, SystemTime::UNIX_EPOCH),
            Ok((series, modified)) => {
                debug!("Cache HIT for {}", path.display());
                (Some(series), modified)
            }
            Err(e) => {
                warn!("Ignoring cached history: {}", e);
                (None, SystemTime::UNIX_EPOCH)
            }
        }
    }

    async fn try_read(path: &Path) -> Result<(HistorySeries, SystemTime), RateError> {
        let cache_error = |reason: String| RateError::Cache {
            path: path.display().to_string(),
            reason,
        };
        let modified = fs::metadata(path)
            .await
            .and_then(|meta| meta.modified())
            .map_err(|e| cache_error(e.to_string()))?;
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| cache_error(e.to_string()))?;
        let series = serde_json::from_str(&text).map_err(|e| cache_error(e.to_string()))?;
        Ok((series, modified))
    }

    /// Replaces the cached series. Failures are logged and reported as `false`.
    pub async fn write(&self, provider: &str, ccy: &str, series: &HistorySeries) -> bool {
        let path = self.path_for(provider, ccy);
        match Self::try_write(&path, series).await {
            Ok(bytes) => {
                info!("Wrote {} bytes of history to {}", bytes, path.display());
                true
            }
            Err(e) => {
                warn!("Could not cache history: {}", e);
                false
            }
        }
    }

    async fn try_write(path: &Path, series: &HistorySeries) -> Result<usize, RateError> {
        let cache_error = |reason: String| RateError::Cache {
            path: path.display().to_string(),
            reason,
        };
        let text = serde_json::to_string(series).map_err(|e| cache_error(e.to_string()))?;
        // readers never observe a partially written file
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &text)
            .await
            .map_err(|e| cache_error(e.to_string()))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| cache_error(e.to_string()))?;
        Ok(text.len())
    }

    pub fn is_stale(&self, fetched_at: SystemTime) -> bool {
        SystemTime::now()
            .duration_since(fetched_at)
            .map(|age| age >= self.max_age)
            .unwrap_or(false)
    }

    /// Returns the cached series, refetching it when absent or stale.
    ///
    /// A failed or empty fetch falls back to whatever the cache held, even
    /// if stale. Empty series are never written.
    pub async fn ensure_fresh(
        &self,
        provider: &dyn RateProvider,
        ccy: &str,
    ) -> Option<CachedHistory> {
        let (cached, fetched_at) = self.read(provider.name(), ccy).await;
        if let Some(series) = &cached
            && !self.is_stale(fetched_at)
        {
            return Some(CachedHistory {
                series: series.clone(),
                fetched_at,
            });
        }

        debug!("Requesting {} history for {}", provider.name(), ccy);
        let fetched = match provider.fetch_historical_series(ccy).await {
            Ok(series) if series.is_empty() => Err(RateError::EmptyResult {
                currency: ccy.to_string(),
            }),
            other => other,
        };

        match fetched {
            Ok(series) => {
                debug!("Received {} history points for {}", series.len(), ccy);
                self.write(provider.name(), ccy, &series).await;
                Some(CachedHistory {
                    series,
                    fetched_at: SystemTime::now(),
                })
            }
            Err(e) => {
                warn!("Failed {} history for {}: {}", provider.name(), ccy, e);
                cached.map(|series| CachedHistory { series, fetched_at })
            }
        }
    }
}
