// Main entry point for API server

use std::sync::Arc;

use anyhow::{Context, Result};
use scrape_pipeline::{
    Dispatcher, Extractor, FirecrawlExtractor, MemoryStore, PipelineStore, PostgresStore,
    ServiceCredentials,
};
use server_core::kernel::{start_scheduler, QueueConfig, ScrapeQueue};
use server_core::server::{build_app, AppState, AuthSecrets};
use server_core::{Config, DispatchMode};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,server_core=debug,scrape_pipeline=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting scrape pipeline API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(dispatch_mode = ?config.dispatch_mode, "Configuration loaded");

    // Connect to storage
    let store: Arc<dyn PipelineStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let store = PostgresStore::new(database_url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Database connected, schema ready");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on exit)");
            Arc::new(MemoryStore::new())
        }
    };

    let shutdown = CancellationToken::new();

    // Extraction service client
    let mut credentials = ServiceCredentials::new(config.firecrawl_api_key.expose());
    if let Some(url) = &config.firecrawl_api_url {
        credentials = credentials.with_base_url(url.clone());
    }
    let extractor: Arc<dyn Extractor> = Arc::new(
        FirecrawlExtractor::new(credentials)
            .context("Failed to create extraction client")?
            .with_shutdown(shutdown.clone()),
    );

    let dispatcher = Arc::new(
        Dispatcher::new(store.clone(), extractor.clone()).with_shutdown(shutdown.clone()),
    );
    let mut app_state = AppState::new(store, extractor, dispatcher.clone());

    // Triggers. The cron cycle runs in both modes; in queue mode it picks up
    // entries whose messages were dropped.
    let mut scheduler = start_scheduler(
        dispatcher.clone(),
        app_state.cycle_lock.clone(),
        &config.cron_schedule,
    )
    .await
    .context("Failed to start scheduler")?;

    let mut worker_handle = None;
    if config.dispatch_mode == DispatchMode::Queue {
        let (queue, worker) = ScrapeQueue::channel(
            dispatcher.clone(),
            app_state.cycle_lock.clone(),
            QueueConfig::default(),
        );
        let worker_shutdown = shutdown.clone();
        worker_handle = Some(tokio::spawn(async move {
            if let Err(e) = worker.run(worker_shutdown).await {
                tracing::error!(error = %e, "Scrape queue worker exited with error");
            }
        }));

        // Messages enqueued before a restart were held in memory only
        queue
            .requeue_unsettled(&*app_state.store)
            .await
            .context("Failed to re-enqueue unsettled jobs")?;
        app_state = app_state.with_queue(queue);
    }

    // Build application
    let app = build_app(
        app_state,
        AuthSecrets {
            operator_token: config.operator_token.clone(),
            cron_secret: config.cron_secret.clone(),
        },
    );

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
        signal.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .context("Server error")?;

    scheduler
        .shutdown()
        .await
        .context("Failed to stop scheduler")?;
    if let Some(handle) = worker_handle {
        let _ = handle.await;
    }

    tracing::info!("Server stopped");
    Ok(())
}
