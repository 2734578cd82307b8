use dotenvy::dotenv;
use library_client::config::get_configuration;
use library_client::models::{StatusUpdate, UploadFile};
use library_client::services::metrics::gather_metrics;
use library_client::services::HttpLibraryClient;
use library_client::{DocumentLibrary, LibraryStateStore, LibraryView, PollingCoordinator};
use service_core::observability::init_tracing;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "library-client",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    );

    let client = Arc::new(HttpLibraryClient::new(configuration.library_service.clone())?);
    info!(url = %client.base_url(), "Watching document library");

    let store = Arc::new(LibraryStateStore::new(client.clone(), &configuration.library));
    let coordinator = Arc::new(PollingCoordinator::new(
        client.clone(),
        configuration.polling.interval(),
        Arc::new(|_: Vec<StatusUpdate>| {}),
    ));
    let library = DocumentLibrary::mount(
        store.clone(),
        coordinator,
        &configuration.library,
        &configuration.polling,
    );

    if let Err(e) = library.load().await {
        tracing::error!(error = %e, "Failed to load library");
    }
    log_view(&library.view());

    if let Some(path) = &configuration.upload.path {
        let file = UploadFile::from_path(path).await.map_err(|e| {
            tracing::error!(path = %path, error = %e, "Failed to read upload file");
            anyhow::anyhow!("Failed to read {}: {}", path, e)
        })?;
        let flow = library.upload_flow(client.clone());
        flow.select_file(file);
        let state = flow.start().await;
        info!(status = ?state.status, message = ?state.message, "Upload finished");
        log_view(&library.view());
    }

    let mut pending = store.subscribe_pending();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            changed = pending.changed() => {
                if changed.is_err() {
                    break;
                }
                let remaining = pending.borrow_and_update().len();
                log_view(&library.view());
                if remaining == 0 {
                    info!("No documents on this page are processing");
                }
            }
        }
    }

    library.unmount();
    tracing::debug!(metrics = %gather_metrics(), "Final client metrics");
    Ok(())
}

fn log_view(view: &LibraryView) {
    info!(
        page = view.current_page,
        total_pages = view.total_pages,
        total_count = view.total_count,
        error = ?view.error,
        "Library page"
    );
    for document in &view.documents {
        info!(
            document_id = %document.id,
            title = %document.title,
            status = ?document.status,
            progress = document.progress,
            error_message = ?document.error_message,
            "Document"
        );
    }
}
