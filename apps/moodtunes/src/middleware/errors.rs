//! Exposure of internal error details in development.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::config::Config;
use crate::error::{ErrorDetail, ErrorResponse};

/// Copies the [`ErrorDetail`] of a 5xx response into its `message` when
/// `server.expose_errors` is enabled. Otherwise responses pass untouched.
pub async fn expose_error_details(
    State(config): State<Arc<Config>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !config.server.expose_errors {
        return response;
    }

    let Some(detail) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let body = ErrorResponse {
        success: false,
        error: detail.code.to_string(),
        message: Some(detail.detail),
    };
    (response.status(), Json(body)).into_response()
}
