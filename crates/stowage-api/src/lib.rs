//! Stowage API library
//!
//! HTTP surface, upload/reconciliation services and process setup. Also used
//! by `stowage-cli` for the reconciliation service.

pub mod api_doc;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use services::{IncomingFile, ReconciliationService, UploadService};
pub use state::AppState;
