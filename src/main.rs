use std::sync::Arc;

use ksa_notams::{
    Config, NotamService,
    api::{self, AppState},
    cache::ExpiringCache,
    scheduler::Scheduler,
    source,
    store::NotamStore,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ksa_notams=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {e}");
        }
    }
    let config = Config::from_env()?;

    let service = Arc::new(NotamService::new(
        NotamStore::new(&config.data_file),
        source::from_config(&config)?,
        config.fetch_timeout,
    ));
    match service.bootstrap().await {
        Ok(snapshot) => info!("Serving {} NOTAMs", snapshot.notams.len()),
        Err(e) => error!("Failed to load initial NOTAM data, starting empty: {e}"),
    }

    let cache = Arc::new(ExpiringCache::new());
    let scheduler = Arc::new(if config.scheduler_enabled {
        Scheduler::start(service.clone(), cache.clone(), &config)
    } else {
        info!("Scheduled NOTAM jobs are disabled");
        Scheduler::new()
    });

    let state = AppState {
        service,
        cache,
        cache_ttl: config.cache_ttl,
        scheduler: scheduler.clone(),
    };
    let app = match &config.static_dir {
        Some(dir) => api::router_with_client(state, dir),
        None => api::router(state),
    };

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    info!("Server has been shut down.");
    Ok(())
}

/// Resolves when a termination signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Termination signal received, starting graceful shutdown...");
}
