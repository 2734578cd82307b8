use mock_library_service::config::MockServiceConfig;
use mock_library_service::startup::Application;
use mock_library_service::state::MockLibrary;
use service_core::observability::init_tracing;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = MockServiceConfig::load().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "mock-library-service",
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    );

    let library = MockLibrary::seeded(config.library.documents, config.library.seed);
    let app = Application::build(&config, library).await?;

    tokio::select! {
        result = app.run_until_stopped() => result?,
        _ = shutdown_signal() => {}
    }

    tracing::info!("Mock library service stopped");
    Ok(())
}
