use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub library_service: LibraryServiceSettings,
    #[serde(default)]
    pub library: LibrarySettings,
    #[serde(default)]
    pub polling: PollingSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub upload: UploadSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LibraryServiceSettings {
    /// Base URL of the library service (e.g. http://localhost:8090).
    pub url: String,
    /// Sent as `X-CSRFToken` on every request when set.
    #[serde(default)]
    pub csrf_token: Option<Secret<String>>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl LibraryServiceSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            csrf_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Deserialize, Clone, Debug)]
pub struct LibrarySettings {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_initial_page")]
    pub initial_page: u32,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            initial_page: default_initial_page(),
        }
    }
}

fn default_page_size() -> u32 {
    10
}

fn default_initial_page() -> u32 {
    1
}

#[derive(Deserialize, Clone, Debug)]
pub struct PollingSettings {
    #[serde(default = "default_polling_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_polling_interval_ms(),
            enabled: true,
        }
    }
}

fn default_polling_interval_ms() -> u64 {
    4000
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Clone, Debug)]
pub struct SearchSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl SearchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct UploadSettings {
    /// A PDF to upload once at startup by the CLI watcher.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let configuration_directory =
        service_core::config::configuration_directory("library-client")?;
    service_core::config::load_layered(&configuration_directory)
}
