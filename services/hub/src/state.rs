//! Shared application state (§5): one struct holding the DB pool and every
//! long-lived in-process collaborator, cloned cheaply (`Arc` internals)
//! into every connection task and HTTP handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Settings;
use crate::event_bus::EventBus;
use crate::kv::SharedKv;
use crate::metrics::Metrics;
use crate::pending::PendingContextMap;
use crate::registry::DeviceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Arc<Settings>,
    pub registry: Arc<DeviceRegistry>,
    pub event_bus: Arc<EventBus>,
    pub metrics: Arc<Metrics>,
    pub kv: SharedKv,
    pub pending: Arc<PendingContextMap>,
}

impl AppState {
    pub fn new(pool: PgPool, settings: Settings, kv: SharedKv) -> Self {
        Self {
            pool,
            settings: Arc::new(settings),
            registry: Arc::new(DeviceRegistry::new()),
            event_bus: Arc::new(EventBus::new(256)),
            metrics: Arc::new(Metrics::new()),
            kv,
            pending: Arc::new(PendingContextMap::new()),
        }
    }

    /// True when the database, the shared KV store and the event bus are
    /// all reachable -- the composite condition the `/healthz` endpoint
    /// checks (§A.4).
    pub async fn is_healthy(&self) -> bool {
        let db_ok = sqlx::query("SELECT 1").execute(&self.pool).await.is_ok();
        let kv_ok = self.kv.ping().await.is_ok();
        let bus_ok = self.event_bus.is_healthy();
        db_ok && kv_ok && bus_ok
    }
}

// AppState construction needs a reachable Postgres and Redis (sqlx's lazy
// pool covers the former, but `SharedKv::connect` does not have a lazy
// mode) -- exercised in services/hub/tests with testcontainers instead of
// here.
