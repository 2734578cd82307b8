use crate::dtos::{
    DocumentListParams, DocumentListResponse, SearchParams, SearchResponse, StatusDto,
    StatusQueryParams, UploadResponse,
};
use crate::startup::AppState;
use crate::state::Endpoint;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

pub const UPLOAD_FIELD: &str = "pdf_file";
pub const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded successfully. Processing has started.";
const DEFAULT_PAGE_SIZE: u32 = 10;

/// Turn an injected status code into the matching error response.
fn injected(endpoint: Endpoint, status: u16) -> AppError {
    tracing::info!(?endpoint, status, "Returning injected failure");
    let message = format!("Injected failure ({status})");
    match status {
        400 => AppError::BadRequest(anyhow::anyhow!(message)),
        401 => AppError::Unauthorized(anyhow::anyhow!(message)),
        403 => AppError::Forbidden(anyhow::anyhow!(message)),
        404 => AppError::NotFound(anyhow::anyhow!(message)),
        413 => AppError::PayloadTooLarge(message),
        415 => AppError::UnsupportedMediaType(message),
        503 => AppError::ServiceUnavailable,
        _ => AppError::InternalError(anyhow::anyhow!(message)),
    }
}

fn begin(state: &AppState, endpoint: Endpoint) -> Result<(), AppError> {
    match state.library.record_request(endpoint) {
        Some(status) => Err(injected(endpoint, status)),
        None => Ok(()),
    }
}

pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<DocumentListParams>,
) -> Result<Json<DocumentListResponse>, AppError> {
    begin(&state, Endpoint::ListDocuments)?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let response = state.library.page(page, limit);

    tracing::debug!(
        page = response.current_page,
        limit = response.page_size,
        returned = response.documents.len(),
        "Listed documents"
    );
    Ok(Json(response))
}

pub async fn document_statuses(
    State(state): State<AppState>,
    Query(params): Query<StatusQueryParams>,
) -> Result<Json<Vec<StatusDto>>, AppError> {
    begin(&state, Endpoint::Statuses)?;

    let ids = params.id_list();
    if ids.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("ids is required")));
    }

    let statuses = state.library.advance_statuses(&ids);
    tracing::debug!(requested = ids.len(), returned = statuses.len(), "Reported statuses");
    Ok(Json(statuses))
}

pub async fn document_status(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<StatusDto>, AppError> {
    begin(&state, Endpoint::Status)?;

    state
        .library
        .advance_status(&document_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document not found")))
}

pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    begin(&state, Endpoint::Upload)?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("document.pdf").to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let is_pdf = content_type == "application/pdf"
            || file_name.to_lowercase().ends_with(".pdf");
        if !is_pdf {
            return Err(AppError::UnsupportedMediaType(
                "Only PDF files are supported.".to_string(),
            ));
        }

        let data = field.bytes().await.map_err(multipart_error)?;
        if data.len() > state.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File too large (max {}MB)",
                state.max_upload_bytes / (1024 * 1024)
            )));
        }

        let document = state.library.upload(&file_name);
        tracing::info!(
            document_id = %document.id,
            file_name = %file_name,
            size = data.len(),
            "Accepted upload"
        );

        return Ok((
            StatusCode::OK,
            Json(UploadResponse {
                success: true,
                message: UPLOAD_SUCCESS_MESSAGE.to_string(),
                document_id: document.id,
            }),
        ));
    }

    Err(AppError::BadRequest(anyhow::anyhow!("No file uploaded")))
}

pub async fn search_documents(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    begin(&state, Endpoint::Search)?;

    let keyword = params.keyword.unwrap_or_default();
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Ok(Json(SearchResponse {
            documents: Vec::new(),
        }));
    }

    let documents = state.library.search(keyword, params.sort_by);
    tracing::debug!(keyword, results = documents.len(), "Searched library");
    Ok(Json(SearchResponse { documents }))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("File too large".to_string())
    } else {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart body: {}", err))
    }
}
