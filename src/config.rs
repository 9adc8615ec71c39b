//! Service configuration.
//!
//! Endpoints, timeouts, client identity and the cache freshness window.
//! Defaults point at the public production services; a TOML file can
//! override any field (useful for pointing the ingest clients at a local
//! fixture server during development).

use serde::Deserialize;
use std::path::Path;

/// Default `User-Agent` sent to every upstream service. Nominatim's usage
/// policy requires an identifying client string.
pub const DEFAULT_USER_AGENT: &str = "CivisPlusApp/1.0";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Client identifier header value.
    pub user_agent: String,
    /// Reverse-geocoding base, e.g. `https://nominatim.openstreetmap.org`.
    pub nominatim_base: String,
    /// Address-lookup base, e.g. `https://viacep.com.br`.
    pub viacep_base: String,
    /// Statistics aggregation base (agregados v3 API).
    pub ibge_agregados_base: String,
    /// Census names base (nomes v2 API).
    pub ibge_nomes_base: String,
    /// Language requested from Nominatim.
    pub accept_language: String,
    /// Connect/read timeout for the geocode and postal-resolution calls.
    pub geocode_timeout_secs: u64,
    /// Connect/read timeout for the IBGE statistics calls.
    pub ibge_timeout_secs: u64,
    /// Cached profile age below which no refresh is triggered.
    pub cache_freshness_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            nominatim_base: "https://nominatim.openstreetmap.org".to_string(),
            viacep_base: "https://viacep.com.br".to_string(),
            ibge_agregados_base: "https://servicodados.ibge.gov.br/api/v3".to_string(),
            ibge_nomes_base: "https://servicodados.ibge.gov.br/api/v2".to_string(),
            accept_language: "pt-BR".to_string(),
            geocode_timeout_secs: 10,
            ibge_timeout_secs: 15,
            cache_freshness_minutes: 15,
        }
    }
}

impl Config {
    /// Parses a TOML document. Unknown keys are ignored; absent keys take
    /// the compiled defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist. A present-but-invalid file is an error: a typo
    /// should not silently send traffic to the wrong endpoint.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&raw)
            .map_err(|e| ConfigError::Parse(path.display().to_string(), e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(String, String),
    #[error("failed to parse config file {0}: {1}")]
    Parse(String, String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
