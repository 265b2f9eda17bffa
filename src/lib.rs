//! Filegate - REST File Manager for Object Storage
//!
//! A thin HTTP façade over a Supabase-compatible storage service. Every
//! endpoint maps to one or two backend calls; the service keeps no state
//! of its own beyond the injected backend handle.
//!
//! # Architecture
//!
//! - `storage`: the `ObjectStore` trait, the Supabase REST client and an
//!   in-memory store, plus normalization of the backend's reply shapes
//! - `folder`: the `.keep` marker convention and listing classification
//! - `manager`: validation and the file/bucket operations
//! - `api`: the axum router, handlers and error rendering

pub mod api;
pub mod config;
pub mod error;
pub mod folder;
pub mod manager;
pub mod storage;

pub use config::FilegateConfig;
pub use error::{Error, Result};
