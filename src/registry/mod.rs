pub mod provider;

pub use provider::{ServiceProvider, StaticProvider};

use crate::error::GatewayError;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// One backend the gateway may forward to. `weight` only matters under the
/// weighted balance policy and is interpreted on a nominal scale of 100.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub host: String,
    pub port: String,
    #[serde(default)]
    pub weight: u32,
}

impl ServiceInstance {
    /// An instance without host/port carries no routable target — produced
    /// by the weighted balancer when the draw lands past the total weight.
    pub fn is_empty(&self) -> bool {
        self.host.is_empty() || self.port.is_empty()
    }
}

/// Service name → ordered backend instances.
pub type ServiceMap = HashMap<String, Vec<ServiceInstance>>;

const STATUS_READY: u8 = 0;
const STATUS_LOADING: u8 = 1;

/// Refreshable snapshot of the service map.
///
/// Two full-map snapshots are kept: `primary` (active) and `cache`
/// (last-known-good). During a reload the status flag flips to LOADING and
/// readers are served from the cache, so a lookup never observes the window
/// between reload start and the successful swap. A failed reload leaves both
/// maps untouched.
pub struct ServiceRegistry {
    provider: Arc<dyn ServiceProvider>,
    primary: ArcSwap<ServiceMap>,
    cache: ArcSwap<ServiceMap>,
    status: AtomicU8,
    last_update: RwLock<Option<Instant>>,
    expire: Duration,
    discovery_enabled: bool,
}

impl ServiceRegistry {
    pub fn new(provider: Arc<dyn ServiceProvider>, expire: Duration, discovery_enabled: bool) -> Self {
        Self {
            provider,
            primary: ArcSwap::from_pointee(ServiceMap::new()),
            cache: ArcSwap::from_pointee(ServiceMap::new()),
            status: AtomicU8::new(STATUS_READY),
            last_update: RwLock::new(None),
            expire,
            discovery_enabled,
        }
    }

    /// One reload cycle: fetch from the provider and, on success, swap both
    /// the primary and the cache to the new map. On failure both maps keep
    /// their previous contents and the error is surfaced.
    pub fn reload_once(&self) -> Result<(), GatewayError> {
        self.status.store(STATUS_LOADING, Ordering::SeqCst);
        let result = match self.provider.retrieve() {
            Ok(map) => {
                let map = Arc::new(map);
                self.primary.store(Arc::clone(&map));
                self.cache.store(map);
                *self.last_update.write().unwrap() = Some(Instant::now());
                Ok(())
            }
            Err(e) => Err(e),
        };
        self.status.store(STATUS_READY, Ordering::SeqCst);
        result
    }

    /// Instances for a service, from the primary map when READY, from the
    /// last-known-good cache while a reload is in flight.
    pub fn lookup(&self, service_name: &str) -> Option<Vec<ServiceInstance>> {
        let map = if self.status.load(Ordering::SeqCst) == STATUS_READY {
            self.primary.load()
        } else {
            self.cache.load()
        };
        map.get(service_name).cloned()
    }

    /// Current primary map, for introspection endpoints.
    pub fn snapshot(&self) -> Arc<ServiceMap> {
        self.primary.load_full()
    }

    pub fn last_update(&self) -> Option<Instant> {
        *self.last_update.read().unwrap()
    }

    /// Spawn the periodic refresh task. A no-op unless service discovery is
    /// enabled. Reload failures are logged and the previous map stays live.
    pub fn start_background_refresh(self: &Arc<Self>) {
        if !self.discovery_enabled {
            return;
        }
        let registry = Arc::clone(self);
        info!(
            "registry: background refresh every {}s",
            registry.expire.as_secs()
        );
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(registry.expire).await;
                if let Err(e) = registry.reload_once() {
                    warn!("registry: refresh failed: {}", e);
                }
            }
        });
    }
}
