use serde::Deserialize;
use service_core::config as core_config;

#[derive(Debug, Clone, Deserialize)]
pub struct MockServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    #[serde(default)]
    pub library: SeedConfig,
}

/// Shape of the library the service starts with.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_documents")]
    pub documents: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            documents: default_documents(),
            seed: default_seed(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_documents() -> usize {
    25
}

fn default_seed() -> u64 {
    42
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

impl MockServiceConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let directory = core_config::configuration_directory("mock-library-service")?;
        core_config::load_layered(&directory)
    }
}
