//! HTTP API Module
//!
//! Provides the REST surface for file, folder and bucket management.

mod http;
mod types;

pub use http::{AppState, HttpServer};
pub use types::{ApiError, CopyMoveRequest, CopyMoveResponse, ErrorResponse};
