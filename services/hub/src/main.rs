use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use hub::config::Settings;
use hub::db;
use hub::kv::SharedKv;
use hub::registry;
use hub::state::AppState;

#[tokio::main]
async fn main() {
    let settings = Settings::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(settings.log_level.clone()))
        .init();

    info!("connecting to database...");
    let pool = db::create_pool(&settings.database_url).await;
    db::run_migrations(&pool).await;
    info!("migrations applied");

    // No terminals are connected at startup; clean up any stale
    // is_active=true left behind by an unclean shutdown.
    sqlx::query("UPDATE terminals SET is_active = false WHERE is_active = true")
        .execute(&pool)
        .await
        .expect("failed to reset terminal active status");

    info!("connecting to redis...");
    let kv = SharedKv::connect(&settings.redis_url)
        .await
        .expect("failed to connect to redis");

    let bind_addr = settings.bind_addr.clone();
    let heartbeat_interval = settings.heartbeat_interval;
    let state = AppState::new(pool, settings, kv.clone());

    tokio::spawn(registry::spawn_health_monitor(
        state.registry.clone(),
        kv.clone(),
        state.event_bus.clone(),
        heartbeat_interval,
    ));
    tokio::spawn(spawn_metrics_mirror(state.clone(), kv));

    let router = hub::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await.expect("failed to bind");
    info!(addr = %bind_addr, "hub listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    info!("hub shut down gracefully");
}

/// Mirrors the metrics snapshot to Redis on a throttled cadence (at most
/// once a second).
async fn spawn_metrics_mirror(state: AppState, kv: SharedKv) {
    let mut throttle = hub::kv::MetricsExportThrottle::new();
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        ticker.tick().await;
        if throttle.should_export(std::time::Instant::now()) {
            let snapshot = state.metrics.snapshot();
            if let Err(err) = kv.mirror_metrics(&snapshot).await {
                tracing::warn!(error = %err, "failed to mirror metrics to redis");
            }
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
