use crate::config::MockServiceConfig;
use crate::handlers;
use crate::state::MockLibrary;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::request_id_middleware;
use std::future::IntoFuture;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Multipart framing on top of the file itself.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub library: MockLibrary,
    pub max_upload_bytes: usize,
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(BODY_LIMIT_SLACK);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/library/documents", get(handlers::list_documents))
        .route("/api/library/search", get(handlers::search_documents))
        .route("/api/documents/statuses", get(handlers::document_statuses))
        .route("/api/documents/:document_id/status", get(handlers::document_status))
        .route("/api/documents/upload/", post(handlers::upload_document))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    library: MockLibrary,
}

impl Application {
    /// Bind the listener and prepare the server around `library`. Port 0
    /// picks a free port.
    pub async fn build(config: &MockServiceConfig, library: MockLibrary) -> Result<Self, AppError> {
        let state = AppState {
            library: library.clone(),
            max_upload_bytes: config.library.max_upload_bytes,
        };
        let app = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port, documents = library.len(), "Mock library service listening");

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            library,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn library(&self) -> &MockLibrary {
        &self.library
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
