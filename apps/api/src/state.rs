use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::ChatTransport;
use crate::render::PdfRenderer;
use crate::reports::ReportStore;

/// Shared application state injected into all route handlers via Axum extractors.
/// Holds nothing per-user: credentials arrive with each request.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Connection-pooled HTTP transport, shared by every run's `LlmClient`.
    pub transport: Arc<dyn ChatTransport>,
    pub reports: ReportStore,
    pub pdf: PdfRenderer,
}
