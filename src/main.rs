//! kyc-verify-engine — core processing engine for Indonesian KTP/NPWP
//! document verification.
//!
//! Reads config from env vars (see `config::Config::from_env`); at
//! minimum `DATABASE_URL` and `REVIEWER_HMAC_SECRET` must be set.

mod auth;
mod blob;
mod callback;
mod config;
mod db;
mod decision;
mod error;
mod forwarder;
mod handlers;
mod mask;
mod parsers;
mod queue;
mod router;
mod scoring;
mod startup;
mod state;
mod worker;

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::sync::watch;

use blob::S3BlobStore;
use callback::CallbackReceiver;
use config::{Config, OcrEngine as ConfiguredOcrEngine};
use db::{DocumentRepo, ManualReviewRepo, UserRepo};
use decision::DecisionRouter;
use forwarder::{CircuitBreaker, HttpReviewForwarder, RetryDrainer, RetryQueue};
use queue::{QueueFamily, QueueSubstrate};
use router::build_router;
use worker::ocr::{GpuWithCpuFallback, OcrEngine, SubprocessOcrEngine};
use worker::{JobWorker, Reaper, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kyc_verify_engine=debug".into()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|e| anyhow::anyhow!("failed to connect to database: {e}"))?;
    tracing::info!("connected to database");

    let documents = DocumentRepo::new(pool.clone());
    let users = UserRepo::new(pool.clone());
    let manual_reviews = ManualReviewRepo::new(pool.clone());

    let queue_family = match config.ocr_engine {
        ConfiguredOcrEngine::Cpu => QueueFamily::Cpu,
        ConfiguredOcrEngine::Gpu => QueueFamily::Gpu,
    };
    let queue = QueueSubstrate::new(pool.clone(), config.queue_prefix.clone(), queue_family);

    // Startup recovery must complete before the worker pool starts
    // claiming jobs or the HTTP listener accepts traffic.
    startup::recover(&documents, &queue).await?;

    let blobs: Arc<dyn blob::BlobStore> = Arc::new(
        S3BlobStore::from_env(std::env::var("BLOB_BUCKET").unwrap_or_else(|_| "kyc-documents".to_string()))
            .await?,
    );

    let breaker = Arc::new(CircuitBreaker::new());
    let retry_queue = RetryQueue::new(pool.clone());
    let forwarder = Arc::new(HttpReviewForwarder::new(
        Arc::clone(&breaker),
        retry_queue.clone(),
        config.reviewer_api_url.clone(),
        config.reviewer_api_key.clone(),
    )?);

    let decision_router = DecisionRouter::new(
        documents.clone(),
        manual_reviews.clone(),
        users.clone(),
        forwarder.clone(),
        config.reviewer_callback_url.clone(),
    );

    let callback_receiver = CallbackReceiver::new(
        manual_reviews.clone(),
        documents.clone(),
        users.clone(),
        config.reviewer_hmac_secret.clone(),
        config.reviewer_hmac_secret_legacy.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ocr: Arc<dyn OcrEngine> = match config.ocr_engine {
        ConfiguredOcrEngine::Cpu => Arc::new(SubprocessOcrEngine::cpu("ind")),
        ConfiguredOcrEngine::Gpu => Arc::new(GpuWithCpuFallback::new("ind", config.ocr_autofallback)),
    };

    let worker_config = WorkerConfig {
        lock_ttl: config.processing_timeout,
        max_attempts: config.max_processing_attempts,
    };
    for worker_id in 0..config.worker_pool_size {
        let worker = JobWorker::new(
            worker_id,
            queue.clone(),
            documents.clone(),
            Arc::clone(&blobs),
            Arc::clone(&ocr),
            decision_router.clone(),
            worker_config,
        );
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { worker.run(rx).await });
    }
    tracing::info!(workers = config.worker_pool_size, "worker pool spawned");

    let reaper = Reaper::new(
        queue.clone(),
        documents.clone(),
        config.reaper_interval,
        config.stuck_timeout,
        config.max_processing_attempts,
    );
    let reaper_rx = shutdown_rx.clone();
    tokio::spawn(async move { reaper.run(reaper_rx).await });

    let retry_sweep_queue = queue.clone();
    let retry_sweep_interval = config.retry_sweep_interval;
    let retry_sweep_rx = shutdown_rx.clone();
    tokio::spawn(async move {
        worker::retry_sweep::run(retry_sweep_queue, retry_sweep_interval, retry_sweep_rx).await
    });

    let drainer = RetryDrainer::new(
        Arc::clone(&forwarder),
        manual_reviews.clone(),
        config.max_forwarder_envelope_attempts,
        config.retry_sweep_interval.max(std::time::Duration::from_secs(5)),
    );
    let drainer_rx = shutdown_rx.clone();
    tokio::spawn(async move { drainer.run(drainer_rx).await });

    let state = state::AppState {
        documents,
        users,
        manual_reviews,
        blobs,
        queue,
        decision_router,
        callback_receiver,
        forwarder_breaker: breaker,
        forwarder_retry_queue: retry_queue,
        config: Arc::clone(&config),
    };

    let app = build_router(state);
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind to {}: {e}", config.bind_addr))?;
    tracing::info!("kyc-verify-engine listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received, stopping background tasks");
            let _ = shutdown_tx.send(true);
        })
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))?;

    Ok(())
}
