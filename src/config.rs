use crate::models::Loader;
use serde::Deserialize;

/// Engine configuration, read from `MERGER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Concurrent fetch+parse operations per deep-analysis batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Assumed minecraft version when a standard pack reveals nothing
    #[serde(default = "default_minecraft_version")]
    pub default_minecraft_version: String,

    /// Assumed loader when a standard pack reveals nothing
    #[serde(default = "default_loader")]
    pub default_loader: String,
}

fn default_batch_size() -> usize {
    5
}

fn default_http_timeout_secs() -> u64 {
    300
}

fn default_minecraft_version() -> String {
    "1.20.1".to_string()
}

fn default_loader() -> String {
    "fabric".to_string()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let config = envy::prefixed("MERGER_").from_env::<Config>()?;

        if config.batch_size == 0 {
            anyhow::bail!("MERGER_BATCH_SIZE must be at least 1");
        }

        Ok(config)
    }

    pub fn fallback_loader(&self) -> Loader {
        Loader::parse(&self.default_loader)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            http_timeout_secs: default_http_timeout_secs(),
            default_minecraft_version: default_minecraft_version(),
            default_loader: default_loader(),
        }
    }
}
