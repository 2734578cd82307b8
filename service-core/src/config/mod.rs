use config::{Config as Cfg, ConfigError, Environment, File};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Settings every server binary shares.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolve a crate's `config/` directory whether the process runs from the
/// workspace root or from inside the crate.
pub fn configuration_directory(crate_dir: &str) -> Result<PathBuf, ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        ConfigError::Message(format!("Failed to determine the current directory: {}", e))
    })?;

    if base_path.ends_with(crate_dir) {
        Ok(base_path.join("config"))
    } else {
        Ok(base_path.join(crate_dir).join("config"))
    }
}

/// Load `base.yaml` from `directory`, overlaid with `APP_`-prefixed
/// environment variables (`APP_SECTION__KEY`).
pub fn load_layered<T: DeserializeOwned>(directory: &Path) -> Result<T, ConfigError> {
    dotenvy::dotenv().ok();

    let settings = Cfg::builder()
        .add_source(File::from(directory.join("base.yaml")).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize::<T>()
}
