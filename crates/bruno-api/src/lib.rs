//! Axum HTTP API server for the soundtrack pipeline.
//!
//! This crate provides:
//! - Upload, SSE progress streaming and output download endpoints
//! - Per-caller admission budgets and per-IP burst limiting
//! - Security headers and request logging
//! - Prometheus metrics

pub mod admission;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod upload;

pub use admission::{Admission, AdmissionController};
pub use config::{AdmissionConfig, ApiConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
