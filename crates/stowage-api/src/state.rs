//! Application state shared by all handlers.

use crate::services::UploadService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadService>,
}

impl AppState {
    pub fn new(uploads: Arc<UploadService>) -> Self {
        Self { uploads }
    }
}
