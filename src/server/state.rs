use crate::config::GatewayConfig;
use crate::limiter::Limiter;
use crate::proxy::Dispatcher;
use crate::registry::{ServiceRegistry, StaticProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Shared gateway state, cheaply cloneable — one copy per connection task.
#[derive(Clone)]
pub struct GatewayState {
    pub limiter: Arc<Limiter>,
    pub registry: Arc<ServiceRegistry>,
    pub dispatcher: Arc<Dispatcher>,
}

impl GatewayState {
    /// Wire up limiter, registry and dispatcher from the configuration and
    /// perform the initial registry load. A failed initial load is logged
    /// and the gateway starts with an empty map (lookups will fail until a
    /// refresh succeeds) — the original behavior.
    pub fn new(cfg: &GatewayConfig) -> Self {
        let limiter = Arc::new(Limiter::new(cfg.limiter.clone()));

        let registry = Arc::new(ServiceRegistry::new(
            Arc::new(StaticProvider::new(cfg.services.clone())),
            Duration::from_secs(cfg.router.registry_expire_secs),
            cfg.router.enable_service_discovery,
        ));
        if let Err(e) = registry.reload_once() {
            error!("registry: initial load failed: {}", e);
        }

        let dispatcher = Arc::new(Dispatcher::new(cfg, Arc::clone(&registry)));

        Self {
            limiter,
            registry,
            dispatcher,
        }
    }

    /// Spawn the long-lived background tasks: the per-IP counter reaper and,
    /// when service discovery is enabled, the registry refresher.
    pub fn start_background_tasks(&self) {
        self.limiter.start_reaper();
        self.registry.start_background_refresh();
    }
}
