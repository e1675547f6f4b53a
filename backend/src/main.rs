//! Service entry-point: loads settings, migrates the database, starts the
//! device monitors and serves the REST API and status stream.

mod server;

use std::io;
use std::sync::Arc;

use actix_web::web;
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(not(feature = "metrics"))]
use spoolkeeper::domain::ports::NoOpReconciliationMetrics;
use spoolkeeper::domain::ports::ReconciliationMetrics;
use spoolkeeper::inbound::http::health::HealthState;
#[cfg(feature = "metrics")]
use spoolkeeper::outbound::metrics::PrometheusReconciliationMetrics;
use spoolkeeper::outbound::moonraker::MoonrakerStatusSource;
use spoolkeeper::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};
use spoolkeeper::outbound::spoolman::SpoolmanInventory;

use server::{AppSettings, ServerConfig, ServiceSettings, build_services, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load_from_iter(std::env::args_os())
        .map_err(|e| io::Error::other(format!("failed to load settings: {e}")))?
        .validate()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    run_pending_migrations(&settings.database_url)
        .await
        .map_err(io::Error::other)?;
    let pool = DbPool::new(PoolConfig::new(settings.database_url.clone()))
        .await
        .map_err(io::Error::other)?;

    let source = MoonrakerStatusSource::new(
        settings.monitor.status_timeout,
        settings.monitor.download.overall_timeout,
    )
    .map_err(io::Error::other)?;
    let inventory = SpoolmanInventory::new(
        settings.inventory_url.clone(),
        settings.inventory_timeout,
    )
    .map_err(io::Error::other)?;

    #[cfg(feature = "metrics")]
    let registry = prometheus::Registry::new();
    #[cfg(feature = "metrics")]
    let metrics: Arc<dyn ReconciliationMetrics> = Arc::new(
        PrometheusReconciliationMetrics::new(&registry)
            .map_err(|e| io::Error::other(format!("reconciliation metrics: {e}")))?,
    );
    #[cfg(not(feature = "metrics"))]
    let metrics: Arc<dyn ReconciliationMetrics> = Arc::new(NoOpReconciliationMetrics);

    let services = build_services(
        server::diesel_adapters(&pool, Arc::new(inventory), Arc::new(source), metrics),
        ServiceSettings {
            monitor: settings.monitor,
            pairing_ttl: settings.pairing_ttl,
            ws_allowed_origins: settings.ws_allowed_origins.clone(),
        },
        Arc::new(DefaultClock),
    );

    let monitored = services
        .start_monitors()
        .await
        .map_err(|e| io::Error::other(format!("failed to start device monitors: {e}")))?;
    info!(devices = monitored, "device monitors started");

    let (sweeper_stop, sweeper_rx) = watch::channel(false);
    let pairing = Arc::clone(&services.pairing);
    let sweep_interval = settings.pairing_sweep;
    let sweeper = tokio::spawn(async move { pairing.run_sweeper(sweep_interval, sweeper_rx).await });

    let config = ServerConfig::new(settings.bind_addr, services.http_state, services.ws_state);
    #[cfg(feature = "metrics")]
    let config = config.with_metrics(server::request_metrics(&registry));

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state.clone(), config)?;
    let handle = server.handle();
    info!(addr = %settings.bind_addr, "listening");

    let served = tokio::select! {
        result = server => result,
        signal = shutdown_signal() => {
            if let Err(e) = signal {
                warn!(error = %e, "signal listener failed");
            }
            info!("shutdown requested");
            health_state.mark_unhealthy();
            handle.stop(true).await;
            Ok(())
        }
    };

    health_state.mark_unhealthy();
    if sweeper_stop.send(true).is_err() {
        warn!("pairing sweeper already stopped");
    }
    if let Err(e) = sweeper.await {
        warn!(error = %e, "pairing sweeper ended abnormally");
    }
    services.monitor.shutdown().await;
    info!("shutdown complete");
    served
}

/// Resolve on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
