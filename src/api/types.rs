//! Request/response types and error mapping for the HTTP API

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;

// ============ Request Types ============

/// Query of the folder listing
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub folder: String,
}

/// Query naming a single object or folder
#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

/// Copy or move request
#[derive(Debug, Deserialize, Serialize)]
pub struct CopyMoveRequest {
    pub path: String,
    pub new_path: String,
}

// ============ Response Types ============

/// Plain acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Upload or folder creation response
#[derive(Debug, Serialize)]
pub struct PathResponse {
    pub message: String,
    pub path: String,
}

/// Copy or move response
#[derive(Debug, Serialize)]
pub struct CopyMoveResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Signed download link
#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub download_url: String,
}

/// Bucket creation response
#[derive(Debug, Serialize)]
pub struct BucketCreatedResponse {
    pub message: String,
    pub bucket: serde_json::Value,
}

/// Bucket listing
#[derive(Debug, Serialize)]
pub struct BucketListResponse {
    pub buckets: Vec<serde_json::Value>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============ Errors ============

/// An error rendered as `{"error": ...}` with a matching status
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Convert a crate error, prefixing server-side failures with `context`
    pub fn with_context(error: Error, context: &str) -> Self {
        let mut api = Self::from(error);
        if api.status.is_server_error() {
            api.message = format!("{}: {}", context, api.message);
        }
        api
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let status = match &error {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!("Request failed: {}", self.message);
        } else {
            tracing::debug!("Request rejected ({}): {}", self.status, self.message);
        }
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

// ============ Extractors ============

/// Text form fields from either a multipart or a urlencoded body
#[derive(Debug, Default)]
pub struct FormFields(pub HashMap<String, String>);

impl FormFields {
    /// Value of a field, empty when absent
    pub fn get(&self, name: &str) -> &str {
        self.0.get(name).map(String::as_str).unwrap_or("")
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("multipart/form-data"))
            .unwrap_or(false);

        if !is_multipart {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            return Ok(FormFields(fields));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
            fields.insert(name, value);
        }

        Ok(FormFields(fields))
    }
}
