use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use std::path::Path;

/// Environment prefix for overrides, e.g. `BOT_RISK__CAPITAL=50000`.
pub const ENV_PREFIX: &str = "BOT_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by layering the TOML file, `BOT_` environment
    /// variables and a sibling JSON file over the built-in defaults.
    ///
    /// Missing files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be parsed or the merged
    /// configuration fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let config: AppConfig = Self::figment(path)
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration with a profile overlay (`Config.<profile>.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be parsed or the merged
    /// configuration fails validation.
    pub fn load_with_profile(path: impl AsRef<Path>, profile: &str) -> Result<AppConfig> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Config");
        let profile_path = path.with_file_name(format!("{stem}.{profile}.toml"));

        let config: AppConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Toml::file(&profile_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file(path.with_extension("json")))
            .extract()
            .with_context(|| {
                format!(
                    "failed to load configuration from {} (profile {profile})",
                    path.display()
                )
            })?;

        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file(path.with_extension("json")))
    }
}
