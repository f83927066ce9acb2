use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use strato::cache::{CacheConfig, CacheService, RemoteCache};
use strato::config::{self, CliArgs};
use strato::infra::error::InfraError;
use strato::infra::http::{self, OpsState};
use strato::infra::telemetry;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        report_startup_error(&err);
        process::exit(1);
    }
}

fn report_startup_error(err: &InfraError) {
    if tracing::dispatcher::has_been_set() {
        error!(error = %err, "application error");
    } else {
        eprintln!("strato: {err}");
    }
}

async fn run() -> Result<(), InfraError> {
    let cli_args = CliArgs::parse();
    let settings =
        config::load(&cli_args).map_err(|err| InfraError::configuration(err.to_string()))?;

    telemetry::init(&settings.logging)?;

    let cache_config = CacheConfig::from(&settings.cache);
    let remote = match (settings.remote.enabled, &settings.remote.url) {
        (true, Some(url)) => RemoteCache::connect(url, &cache_config),
        _ => {
            info!("remote cache layer not configured; running memory-only");
            RemoteCache::disabled()
        }
    };

    let cache = Arc::new(CacheService::new(cache_config, remote));

    let maintenance = spawn_maintenance(
        Arc::clone(&cache),
        Duration::from_secs(settings.server.maintenance_interval_secs.max(1)),
    );

    let router = http::router(OpsState {
        cache: Arc::clone(&cache),
    });

    let listener = tokio::net::TcpListener::bind(settings.server.listen)
        .await
        .map_err(InfraError::Io)?;
    info!(listen = %settings.server.listen, "strato operational surface listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InfraError::Io)?;

    // Drain pending invalidations and stop the queue worker before exit.
    maintenance.abort();
    cache.shutdown().await;
    info!("strato stopped");

    Ok(())
}

/// Periodic sweep: purge expired memory entries and probe the remote layer
/// so long-term unavailability flips back once the server recovers.
fn spawn_maintenance(cache: Arc<CacheService>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                info!(purged, "maintenance sweep removed expired entries");
            }
            if cache.layered().remote().is_configured() {
                cache.remote_ping().await;
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
    }
}
