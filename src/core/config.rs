use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

/// Chain the wallet is attached to. Fiat rates only make sense on mainnet.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn supports_fiat(&self) -> bool {
        matches!(self, Network::Mainnet)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CoinGeckoConfig {
    pub api_url: String,
    /// Coin whose `current_price` table is quoted.
    pub coin_id: String,
    /// Explorer serving the base asset's price in units of `coin_id`.
    pub explorer_url: Option<String>,
    pub base_symbol: String,
}

impl Default for CoinGeckoConfig {
    fn default() -> Self {
        CoinGeckoConfig {
            api_url: "https://api.coingecko.com".to_string(),
            coin_id: "tether".to_string(),
            explorer_url: Some("https://explorer.ergon.network".to_string()),
            base_symbol: "XRG".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CoinPaprikaConfig {
    pub api_url: String,
    pub ticker_id: String,
    /// First day requested from the historical endpoint.
    pub history_start: String,
}

impl Default for CoinPaprikaConfig {
    fn default() -> Self {
        CoinPaprikaConfig {
            api_url: "https://api.coinpaprika.com".to_string(),
            ticker_id: "xrg-ergon".to_string(),
            history_start: "2021-07-08".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BitstampYadioConfig {
    pub bitstamp_url: String,
    pub yadio_url: String,
    pub pair: String,
}

impl Default for BitstampYadioConfig {
    fn default() -> Self {
        BitstampYadioConfig {
            bitstamp_url: "https://www.bitstamp.net".to_string(),
            yadio_url: "https://api.yadio.io".to_string(),
            pair: "bchusd".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub coingecko: CoinGeckoConfig,
    #[serde(default)]
    pub coinpaprika: CoinPaprikaConfig,
    #[serde(default)]
    pub bitstamp_yadio: BitstampYadioConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Overrides the bundled provider/currency index.
    pub currency_index: Option<String>,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "fiatfx", "fiatfx")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "fiatfx", "fiatfx")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        Ok(self.default_data_path()?.join("cache"))
    }

    pub fn settings_path(&self) -> Result<PathBuf> {
        Ok(self.default_data_path()?.join("settings.json"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
