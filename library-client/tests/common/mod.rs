use library_client::config::{LibraryServiceSettings, LibrarySettings, PollingSettings};
use library_client::models::StatusUpdate;
use library_client::services::HttpLibraryClient;
use library_client::{DocumentLibrary, LibraryStateStore, PollingCoordinator};
use mock_library_service::config::{MockServiceConfig, SeedConfig};
use mock_library_service::startup::Application;
use mock_library_service::state::MockLibrary;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;

pub const POLL_INTERVAL_MS: u64 = 50;

pub struct TestApp {
    pub address: String,
    pub library: MockLibrary,
    pub client: Arc<HttpLibraryClient>,
}

impl TestApp {
    pub async fn spawn(library: MockLibrary) -> Self {
        let config = MockServiceConfig {
            common: CoreConfig {
                port: 0,
                log_level: "debug".to_string(),
                otlp_endpoint: None,
            },
            library: SeedConfig::default(),
        };

        let app = Application::build(&config, library.clone())
            .await
            .expect("Failed to build mock library service");
        let address = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let probe = reqwest::Client::new();
        for _ in 0..50 {
            if probe.get(format!("{}/health", address)).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }

        let client = Arc::new(
            HttpLibraryClient::new(LibraryServiceSettings::new(address.clone()))
                .expect("Failed to build library client"),
        );

        TestApp {
            address,
            library,
            client,
        }
    }

    pub fn polling_settings(&self) -> PollingSettings {
        PollingSettings {
            interval_ms: POLL_INTERVAL_MS,
            enabled: true,
        }
    }

    /// A mounted library view model backed by the real HTTP client.
    pub fn mount(&self) -> DocumentLibrary {
        let library_settings = LibrarySettings::default();
        let polling = self.polling_settings();
        let store = Arc::new(LibraryStateStore::new(self.client.clone(), &library_settings));
        let coordinator = Arc::new(PollingCoordinator::new(
            self.client.clone(),
            polling.interval(),
            Arc::new(|_: Vec<StatusUpdate>| {}),
        ));
        DocumentLibrary::mount(store, coordinator, &library_settings, &polling)
    }
}
