//! JSON envelope shared by every API response.
//!
//! Payloads are serialized to a `serde_json::Value` first so the resolver can
//! upgrade `http://` URLs when the server is published over https.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::services::PathResolver;

/// `{success, data?, count?, message?}`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            count: None,
            message: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Serializes with status 200.
    pub fn render(self, resolver: &PathResolver) -> Result<JsonResponse> {
        self.render_with_status(StatusCode::OK, resolver)
    }

    pub fn render_with_status(
        self,
        status: StatusCode,
        resolver: &PathResolver,
    ) -> Result<JsonResponse> {
        let mut body = serde_json::to_value(&self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize response: {}", e)))?;
        resolver.secure_json(&mut body);
        Ok(JsonResponse { status, body })
    }
}

/// A rendered envelope.
#[derive(Debug)]
pub struct JsonResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for JsonResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
