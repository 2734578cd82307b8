use mock_library_service::config::{MockServiceConfig, SeedConfig};
use mock_library_service::startup::Application;
use mock_library_service::state::MockLibrary;
use service_core::config::Config as CoreConfig;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub library: MockLibrary,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn(library: MockLibrary) -> Self {
        let config = MockServiceConfig {
            common: CoreConfig {
                port: 0,
                log_level: "debug".to_string(),
                otlp_endpoint: None,
            },
            library: SeedConfig {
                max_upload_bytes: 1024 * 1024,
                ..Default::default()
            },
        };

        let app = Application::build(&config, library.clone())
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            library,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}
