use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use crate::observability::{REQUEST_ID_HEADER, extract_request_id};

/// Tags every request and response with an `x-request-id`, generating one
/// when the caller did not send it.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id =
        extract_request_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, header_value);
    }

    response
}
