use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

/// External services that need credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    OpenWeather,
    Gemini,
}

impl ServiceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::OpenWeather => "openweather",
            ServiceId::Gemini => "gemini",
        }
    }

    /// Environment variable that overrides the configured API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ServiceId::OpenWeather => "OPENWEATHER_API_KEY",
            ServiceId::Gemini => "GEMINI_API_KEY",
        }
    }

    pub const fn all() -> &'static [ServiceId] {
        &[ServiceId::OpenWeather, ServiceId::Gemini]
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServiceId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ServiceId::OpenWeather),
            "gemini" => Ok(ServiceId::Gemini),
            _ => Err(anyhow!("Unknown service '{value}'. Supported services: openweather, gemini.")),
        }
    }
}

/// Credentials and overrides for a single service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub api_key: String,

    /// Alternative endpoint, mostly useful for tests and proxies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model name, only meaningful for generative services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherSettings {
    pub cache_ttl_secs: u64,
    /// ISO 3166 code appended to city lookups.
    pub country_code: String,
    /// Country name used in "city not found" messages.
    pub country_name: String,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 1800,
            country_code: "CI".to_string(),
            country_name: "Côte d'Ivoire".to_string(),
        }
    }
}

impl WeatherSettings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub session_ttl_secs: u64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self { session_ttl_secs: 24 * 3600 }
    }
}

impl ChatSettings {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Example TOML:
    /// [services.openweather]
    /// api_key = "..."
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,

    #[serde(default)]
    pub weather: WeatherSettings,

    #[serde(default)]
    pub chat: ChatSettings,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid configuration TOML")
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "agrismart", "agrismart")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Apply `OPENWEATHER_API_KEY` / `GEMINI_API_KEY` from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply API key overrides from an arbitrary lookup; empty values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        for &id in ServiceId::all() {
            if let Some(key) = lookup(id.api_key_env()).filter(|k| !k.trim().is_empty()) {
                self.services.entry(id.as_str().to_string()).or_default().api_key = key;
            }
        }
        self
    }

    pub fn service_config(&self, id: ServiceId) -> Option<&ServiceConfig> {
        self.services.get(id.as_str())
    }

    /// Set or replace a service API key, keeping its other settings.
    pub fn upsert_service_api_key(&mut self, id: ServiceId, api_key: String) {
        self.services.entry(id.as_str().to_string()).or_default().api_key = api_key;
    }

    /// Returns the API key for a service, if present and non-empty.
    pub fn service_api_key(&self, id: ServiceId) -> Option<&str> {
        self.service_config(id).map(|cfg| cfg.api_key.as_str()).filter(|k| !k.is_empty())
    }

    pub fn is_service_configured(&self, id: ServiceId) -> bool {
        self.service_api_key(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_id_as_str_roundtrip() {
        for id in ServiceId::all() {
            let parsed = ServiceId::try_from(id.as_str()).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
        assert_eq!(ServiceId::try_from("OpenWeather").unwrap(), ServiceId::OpenWeather);
    }

    #[test]
    fn unknown_service_error() {
        let err = ServiceId::try_from("darksky").unwrap_err();
        assert!(err.to_string().contains("Unknown service"));
    }

    #[test]
    fn empty_config_has_defaults() {
        let cfg = Config::from_toml_str("").unwrap();

        assert!(!cfg.is_service_configured(ServiceId::OpenWeather));
        assert_eq!(cfg.weather.cache_ttl(), Duration::from_secs(1800));
        assert_eq!(cfg.weather.country_code, "CI");
        assert_eq!(cfg.chat.session_ttl_secs, 86_400);
    }

    #[test]
    fn parses_services_and_partial_sections() {
        let cfg = Config::from_toml_str(
            r#"
            [services.openweather]
            api_key = "OW"

            [services.gemini]
            api_key = "GM"
            model = "gemini-2.5-flash"

            [weather]
            cache_ttl_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(cfg.service_api_key(ServiceId::OpenWeather), Some("OW"));
        assert_eq!(
            cfg.service_config(ServiceId::Gemini).and_then(|s| s.model.as_deref()),
            Some("gemini-2.5-flash")
        );
        assert_eq!(cfg.weather.cache_ttl_secs, 60);
        assert_eq!(cfg.weather.country_name, "Côte d'Ivoire");
    }

    #[test]
    fn largest_cache_ttl_is_storable() {
        use crate::store::{InMemoryStore, Store};

        let cfg = Config::from_toml_str("[weather]\ncache_ttl_secs = 9223372036854775807").unwrap();
        let store = InMemoryStore::new();
        store.set("weather_5.3600_-4.0083", 1, cfg.weather.cache_ttl());

        assert_eq!(store.get("weather_5.3600_-4.0083"), Some(1));
    }

    #[test]
    fn upsert_keeps_other_settings() {
        let mut cfg = Config::default();
        cfg.services.insert(
            "gemini".into(),
            ServiceConfig { api_key: "OLD".into(), base_url: None, model: Some("m".into()) },
        );

        cfg.upsert_service_api_key(ServiceId::Gemini, "NEW".into());

        let gemini = cfg.service_config(ServiceId::Gemini).unwrap();
        assert_eq!(gemini.api_key, "NEW");
        assert_eq!(gemini.model.as_deref(), Some("m"));
    }

    #[test]
    fn overrides_replace_keys_and_ignore_blanks() {
        let mut cfg = Config::default();
        cfg.upsert_service_api_key(ServiceId::OpenWeather, "FILE".into());

        let cfg = cfg.with_overrides_from(|name| match name {
            "OPENWEATHER_API_KEY" => Some("ENV".to_string()),
            "GEMINI_API_KEY" => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(cfg.service_api_key(ServiceId::OpenWeather), Some("ENV"));
        assert!(!cfg.is_service_configured(ServiceId::Gemini));
    }

    #[test]
    fn empty_key_counts_as_unconfigured() {
        let mut cfg = Config::default();
        cfg.upsert_service_api_key(ServiceId::OpenWeather, String::new());
        assert!(!cfg.is_service_configured(ServiceId::OpenWeather));
    }

    #[test]
    fn toml_roundtrip_preserves_keys() {
        let mut cfg = Config::default();
        cfg.upsert_service_api_key(ServiceId::OpenWeather, "OW".into());

        let text = toml::to_string_pretty(&cfg).unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back.service_api_key(ServiceId::OpenWeather), Some("OW"));
    }
}
