use anyhow::{Context, Result};
use domain::services::{
    EmergencyStore, LocationCache, MockNotificationService, SlaStore, TechnicianStore,
};
use persistence::{
    InMemoryEmergencyStore, InMemoryLocationCache, InMemorySlaStore, InMemoryTechnicianStore,
    PgEmergencyStore, PgSlaStore, PgTechnicianStore, RedisLocationCache,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use rescue_dispatch_api::{
    app,
    config::Config,
    jobs::{JobScheduler, LocationCacheSweepJob, PoolMetricsJob, SlaMonitorJob},
    middleware::{init_logging, init_metrics},
    services::{Collaborators, EmergencyService, TrackingSettings},
};

/// Page size when picking up interrupted dispatch runs at startup.
const RESUME_PAGE_SIZE: usize = 500;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    init_logging(&config.logging)?;
    init_metrics()?;

    info!("Starting Rescue Dispatch v{}", env!("CARGO_PKG_VERSION"));

    let mut scheduler = JobScheduler::new();

    let (emergencies, technicians, sla): (
        Arc<dyn EmergencyStore>,
        Arc<dyn TechnicianStore>,
        Arc<dyn SlaStore>,
    ) = if config.database.is_configured() {
        let pool = persistence::db::create_pool(&config.database.pool_config())
            .await
            .context("connecting to database")?;
        info!("Running database migrations...");
        persistence::db::run_migrations(&pool).await?;
        info!("Migrations completed");
        scheduler.register(PoolMetricsJob::new(pool.clone()));
        (
            Arc::new(PgEmergencyStore::new(pool.clone())),
            Arc::new(PgTechnicianStore::new(pool.clone())),
            Arc::new(PgSlaStore::new(pool)),
        )
    } else {
        warn!("No database configured, using in-memory stores");
        (
            Arc::new(InMemoryEmergencyStore::new()),
            Arc::new(InMemoryTechnicianStore::new()),
            Arc::new(InMemorySlaStore::new()),
        )
    };

    let locations: Arc<dyn LocationCache> = if config.cache.url.is_empty() {
        Arc::new(InMemoryLocationCache::new())
    } else {
        Arc::new(
            RedisLocationCache::connect(&config.cache.url, config.cache.key_prefix.clone())
                .await
                .context("connecting to location cache")?,
        )
    };

    let service = Arc::new(EmergencyService::new(
        Collaborators {
            emergencies: emergencies.clone(),
            technicians,
            sla: sla.clone(),
            locations: locations.clone(),
            notifier: Arc::new(MockNotificationService::new()),
        },
        config.pricing.engine()?,
        config.dispatch.policy(),
        TrackingSettings {
            policy: config.tracking.policy(),
            location_ttl: config.cache.location_ttl(),
            hub_capacity: config.tracking.hub_capacity,
        },
    ));

    service.resume_dispatch(RESUME_PAGE_SIZE).await?;

    scheduler.register(SlaMonitorJob::new(emergencies, sla));
    scheduler.register(LocationCacheSweepJob::new(
        locations,
        service.tracking().hub().clone(),
    ));
    scheduler.start();

    let addr = config.socket_addr()?;
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    let app = app::create_app(config, service.clone());

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    service.dispatch().registry().shutdown();
    scheduler.shutdown();
    scheduler.wait_for_shutdown(shutdown_timeout).await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
