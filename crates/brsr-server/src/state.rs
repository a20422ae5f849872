use brsr_core::service::ReportService;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReportService>,
}

impl AppState {
    pub fn new(service: Arc<ReportService>) -> Self {
        Self { service }
    }
}
