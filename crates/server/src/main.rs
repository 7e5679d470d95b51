mod config;
mod http;
mod signature;
mod state;

use std::sync::Arc;
use std::time::Duration;

use adapter::{CredentialRefresher, GraphClient, GraphConfig};
use anyhow::Context;
use domain::{Clock, SystemClock};
use dotenvy::dotenv;
use engine::{
    CommentProcessor, DeliveryExecutor, DeliveryLimits, DispatchScheduler, IngestPool,
    LocalWorkQueue, QueueClass, RateLimiter, RetryPolicy, RuleMatcher, TaskOptions, WorkerConfig,
};
use storage::{CachedCredentialResolver, CoordinationStore, Db, MemoryStore, RedisStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Settings;
use http::router::build_router;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,server=debug,engine=debug")),
        )
        .init();

    let settings = Settings::new().context("Failed to load configuration")?;

    let db = Db::new(&settings.database.url).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let kv: Arc<dyn CoordinationStore> = match &settings.redis.url {
        Some(url) => Arc::new(RedisStore::connect(url).await?),
        None => {
            warn!("No redis.url configured, using in-process coordination store");
            Arc::new(MemoryStore::new())
        }
    };

    let resolver = CachedCredentialResolver::new(db.clone(), kv.clone(), clock.clone());

    let graph = Arc::new(GraphClient::new(GraphConfig {
        graph_base_url: settings.platform.graph_base_url.clone(),
        refresh_base_url: settings.platform.refresh_base_url.clone(),
        api_version: settings.platform.api_version.clone(),
        request_timeout_secs: settings.platform.request_timeout_secs,
    })?);

    let cancel = CancellationToken::new();

    // 投递端
    let work_queue = LocalWorkQueue::new();
    let executor = DeliveryExecutor::new(
        RateLimiter::new(kv.clone(), clock.clone()),
        graph.clone(),
        DeliveryLimits {
            max_per_hour: settings.limits.max_per_hour,
            max_per_day: settings.limits.max_per_day,
            dm_cooldown: Duration::from_secs(settings.limits.dm_cooldown_secs),
        },
    );
    let worker_config = WorkerConfig {
        concurrency: settings.queue.concurrency,
        retry: RetryPolicy {
            initial: Duration::from_millis(settings.queue.retry_initial_ms),
            max: Duration::from_secs(settings.queue.retry_max_secs),
        },
    };
    let worker = tokio::spawn(work_queue.clone().run(
        Arc::new(executor),
        worker_config,
        cancel.clone(),
    ));

    // 接收端
    let scheduler = DispatchScheduler::new(Arc::new(work_queue.clone()), clock.clone()).with_options(
        TaskOptions {
            class: QueueClass::Default,
            max_retry: settings.queue.max_retry,
            timeout: Duration::from_secs(settings.queue.timeout_secs),
            process_in: Duration::ZERO,
        },
    );
    let processor = CommentProcessor::new(
        Arc::new(resolver.clone()),
        RuleMatcher::new(kv.clone(), Arc::new(db.clone())),
        scheduler,
    )
    .with_fallback_credential(settings.platform.fallback_token.clone());
    let (ingest, ingest_handle) = IngestPool::start(
        Arc::new(processor),
        settings.queue.ingest_capacity,
        settings.queue.ingest_inflight,
        cancel.clone(),
    );

    if settings.platform.app_secret.is_empty() {
        warn!("platform.app_secret is empty, webhook signatures are NOT verified");
    }

    let state = AppState {
        ingest,
        refresher: CredentialRefresher::new(db, graph, resolver, clock),
        app_secret: settings.platform.app_secret.clone(),
        verify_token: settings.platform.verify_token.clone(),
        admin_token: settings.security.admin_token.clone(),
    };

    let app = build_router(state);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    let _ = ingest_handle.await;
    let _ = worker.await;
    info!(pending = work_queue.pending_len(), "Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
