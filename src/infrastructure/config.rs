use crate::application::data_fetcher::FetcherSettings;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub sources: SourceSettings,
    pub cache: CacheSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceSettings {
    #[serde(default)]
    pub query_endpoint: Option<String>,
    #[serde(default)]
    pub graphql_endpoint: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    pub ttl_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub dir: String,
    pub autosave_debounce_ms: u64,
}

impl AppConfig {
    pub fn fetcher_settings(&self) -> FetcherSettings {
        FetcherSettings {
            cache_ttl: Duration::from_millis(self.cache.ttl_ms),
            graphql_endpoint: self.sources.graphql_endpoint.clone(),
        }
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.sources.timeout_ms)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.storage.autosave_debounce_ms)
    }
}

fn builder_with_defaults() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(config::Config::builder()
        .set_default("server.addr", "0.0.0.0:8080")?
        .set_default("sources.timeout_ms", 15_000_i64)?
        .set_default("cache.ttl_ms", 60_000_i64)?
        .set_default("storage.dir", "data/dashboards")?
        .set_default("storage.autosave_debounce_ms", 1_000_i64)?)
}

/// Defaults, then `config/dashboard.*` if present, then `DASHBOARD__SECTION__KEY` env vars
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let settings = builder_with_defaults()?
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("DASHBOARD")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize() {
        let config: AppConfig = builder_with_defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.addr, "0.0.0.0:8080");
        assert_eq!(config.fetcher_settings().cache_ttl, Duration::from_millis(60_000));
        assert!(config.sources.query_endpoint.is_none());
        assert_eq!(config.autosave_debounce(), Duration::from_secs(1));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config: AppConfig = builder_with_defaults()
            .unwrap()
            .add_source(config::File::from_str(
                "[sources]\nquery_endpoint = \"http://localhost:3001/api/query\"\ntimeout_ms = 500\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(
            config.sources.query_endpoint.as_deref(),
            Some("http://localhost:3001/api/query")
        );
        assert_eq!(config.source_timeout(), Duration::from_millis(500));
    }
}
