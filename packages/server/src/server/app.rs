//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use scrape_pipeline::{Dispatcher, Extractor, PipelineStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::{CycleLock, ScrapeQueue};
use crate::server::middleware::{auth_middleware, AuthSecrets, CRON_SECRET_HEADER};
use crate::server::routes::{
    agent_run_handler, get_settings_handler, health_handler, import_csv_handler,
    job_status_handler, process_handler, submit_batch_handler, update_settings_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PipelineStore>,
    pub extractor: Arc<dyn Extractor>,
    pub dispatcher: Arc<Dispatcher>,
    /// Held by the cron tick, the manual trigger or the queue worker while it works
    pub cycle_lock: CycleLock,
    /// Present in queue mode only
    pub queue: Option<ScrapeQueue>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        extractor: Arc<dyn Extractor>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            store,
            extractor,
            dispatcher,
            cycle_lock: CycleLock::default(),
            queue: None,
        }
    }

    pub fn with_queue(mut self, queue: ScrapeQueue) -> Self {
        self.queue = Some(queue);
        self
    }
}

/// Build the Axum application router
pub fn build_app(app_state: AppState, secrets: AuthSecrets) -> Router {
    // CORS configuration - allow any origin for development
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(CRON_SECRET_HEADER),
        ]);

    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Scrape jobs
        .route("/api/scrape/batch", post(submit_batch_handler))
        .route("/api/scrape/process", post(process_handler))
        .route("/api/scrape/:job_id", get(job_status_handler))
        // Settings (PATCH is operator only)
        .route(
            "/api/settings",
            get(get_settings_handler).patch(update_settings_handler),
        )
        // Imports (operator only)
        .route("/api/import/csv", post(import_csv_handler))
        .route("/api/agent/run", post(agent_run_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            auth_middleware(secrets.clone(), req, next)
        }))
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
