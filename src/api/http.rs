//! HTTP API Server
//!
//! REST surface for file, folder and bucket management. Handlers translate
//! requests into `FileManager` calls and render `{"error": ...}` bodies on
//! failure.

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::HeaderValue,
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::types::*;
use crate::config::FilegateConfig;
use crate::error::{Error, Result};
use crate::folder::StorageItem;
use crate::manager::FileManager;

const HEALTH_MESSAGE: &str = "filegate is running. All good!";

/// Shared application state
pub struct AppState {
    /// File operations over the injected store
    pub manager: FileManager,
    /// Bucket listed when the request names none
    pub default_bucket: String,
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// HTTP API server
pub struct HttpServer {
    config: FilegateConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server around a file manager
    pub fn new(config: FilegateConfig, manager: FileManager) -> Self {
        let state = Arc::new(AppState {
            manager,
            default_bucket: config.api.default_bucket.clone(),
        });

        Self { config, state }
    }

    /// Build the router with middleware applied
    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.state))
            .layer(DefaultBodyLimit::max(self.config.max_upload_bytes()))
            .layer(cors_layer(&self.config.api.cors_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Start the HTTP server and run until `shutdown` resolves
    pub async fn start<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&self.config.server.bind_address).await?;
        tracing::info!(
            "HTTP API listening on {} (backend: {})",
            self.config.server.bind_address,
            self.state.manager.backend_kind()
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Internal(format!("HTTP server error: {}", e)))?;

        tracing::info!("HTTP API stopped");
        Ok(())
    }
}

/// Create the route table
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Folder contents
        .route("/", get(handle_list))
        .route("/upload/:bucket", post(handle_upload))
        .route("/create_folder/:bucket", post(handle_create_folder))
        .route("/delete_file/:bucket", delete(handle_delete_file))
        .route("/delete_folder/:bucket", delete(handle_delete_folder))
        .route("/copy_file/:bucket", post(handle_copy))
        .route("/move_file/:bucket", post(handle_move))
        .route("/download/:bucket", get(handle_download))
        // Buckets
        .route("/create_bucket", post(handle_create_bucket))
        .route("/delete_bucket/:bucket_name", delete(handle_delete_bucket))
        .route("/list_buckets", get(handle_list_buckets))
        // Liveness
        .route("/health/", get(handle_health))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// CORS restricted to the configured origins; `*` allows any origin without credentials
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

// ============ Handlers ============

async fn handle_list(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Vec<StorageItem>> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let bucket = query
        .bucket
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| state.default_bucket.clone());

    let items = state
        .manager
        .list_folder(&bucket, &query.folder)
        .await
        .map_err(|e| ApiError::with_context(e, "Error fetching contents"))?;

    Ok(Json(items))
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    multipart: std::result::Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> ApiResult<PathResponse> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut folder = String::new();
    let mut file: Option<(String, Option<String>, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        match field.name().map(str::to_string).as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                file = Some((filename, content_type, data));
            }
            Some("folder") => {
                folder = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
            }
            _ => {}
        }
    }

    let Some((filename, content_type, data)) = file else {
        return Err(ApiError::bad_request("No file selected"));
    };

    let path = state
        .manager
        .upload(&bucket, &folder, &filename, data, content_type)
        .await?;

    Ok(Json(PathResponse {
        message: format!("File '{}' uploaded successfully", filename),
        path,
    }))
}

async fn handle_create_folder(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    form: FormFields,
) -> ApiResult<PathResponse> {
    let name = form.get("folder_name");
    let path = state
        .manager
        .create_folder(&bucket, name, form.get("parent_folder"))
        .await?;

    Ok(Json(PathResponse {
        message: format!("Folder '{}' created successfully", name),
        path,
    }))
}

async fn handle_delete_file(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    query: std::result::Result<Query<PathQuery>, QueryRejection>,
) -> ApiResult<MessageResponse> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    state.manager.delete_file(&bucket, &query.path).await?;

    Ok(Json(MessageResponse {
        message: format!("File '{}' deleted successfully", query.path),
    }))
}

async fn handle_delete_folder(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    query: std::result::Result<Query<PathQuery>, QueryRejection>,
) -> ApiResult<MessageResponse> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    state.manager.delete_folder(&bucket, &query.path).await?;

    Ok(Json(MessageResponse {
        message: format!("Folder '{}' deleted successfully", query.path),
    }))
}

async fn handle_copy(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    payload: std::result::Result<Json<CopyMoveRequest>, JsonRejection>,
) -> ApiResult<CopyMoveResponse> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    state.manager.copy(&bucket, &req.path, &req.new_path).await?;

    Ok(Json(CopyMoveResponse {
        message: format!("File copied to '{}' successfully", req.new_path),
        warning: None,
        error: None,
    }))
}

async fn handle_move(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    payload: std::result::Result<Json<CopyMoveRequest>, JsonRejection>,
) -> ApiResult<CopyMoveResponse> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let outcome = state
        .manager
        .move_object(&bucket, &req.path, &req.new_path)
        .await?;

    let warning = outcome
        .source_removal_error
        .as_ref()
        .map(|_| "Failed to delete original".to_string());

    Ok(Json(CopyMoveResponse {
        message: format!("File moved to '{}' successfully", req.new_path),
        warning,
        error: outcome.source_removal_error,
    }))
}

async fn handle_download(
    State(state): State<Arc<AppState>>,
    Path(bucket): Path<String>,
    query: std::result::Result<Query<PathQuery>, QueryRejection>,
) -> ApiResult<DownloadResponse> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let download_url = state.manager.download_url(&bucket, &query.path).await?;
    Ok(Json(DownloadResponse { download_url }))
}

async fn handle_create_bucket(
    State(state): State<Arc<AppState>>,
    form: FormFields,
) -> ApiResult<BucketCreatedResponse> {
    let (name, bucket) = state
        .manager
        .create_bucket(form.get("bucket_name"))
        .await
        .map_err(|e| ApiError::with_context(e, "Error creating bucket"))?;

    Ok(Json(BucketCreatedResponse {
        message: format!("Bucket '{}' created successfully", name),
        bucket,
    }))
}

async fn handle_delete_bucket(
    State(state): State<Arc<AppState>>,
    Path(bucket_name): Path<String>,
) -> ApiResult<MessageResponse> {
    let name = state
        .manager
        .delete_bucket(&bucket_name)
        .await
        .map_err(|e| ApiError::with_context(e, "Error deleting bucket"))?;

    Ok(Json(MessageResponse {
        message: format!("Bucket '{}' deleted successfully", name),
    }))
}

async fn handle_list_buckets(State(state): State<Arc<AppState>>) -> ApiResult<BucketListResponse> {
    let buckets = state
        .manager
        .list_buckets()
        .await
        .map_err(|e| ApiError::with_context(e, "Error listing buckets"))?;

    Ok(Json(BucketListResponse { buckets }))
}

async fn handle_health() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: HEALTH_MESSAGE.to_string(),
    })
}
