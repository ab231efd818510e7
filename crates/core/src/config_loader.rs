use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by layering a TOML file and `SENTINEL_`-prefixed
    /// environment variables over the defaults. Nested keys use `__` in the
    /// environment, e.g. `SENTINEL_INFLUX__TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a value fails to
    /// deserialize.
    pub fn load(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SENTINEL_").split("__"))
            .extract()?;

        tracing::debug!(path, "Configuration resolved");
        Ok(config)
    }
}
