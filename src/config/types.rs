use crate::registry::ServiceMap;
use serde::{Deserialize, Serialize};

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// TCP port the gateway handler listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Per-connection header-read deadline.
    #[serde(default = "default_io_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Upstream round-trip deadline while producing the response.
    #[serde(default = "default_io_timeout_secs")]
    pub write_timeout_secs: u64,

    #[serde(default)]
    pub limiter: LimiterConfig,

    #[serde(default)]
    pub router: RouterConfig,

    /// Static service table served by the default registry provider:
    /// service name → backend instances.
    #[serde(default)]
    pub services: ServiceMap,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            read_timeout_secs: default_io_timeout_secs(),
            write_timeout_secs: default_io_timeout_secs(),
            limiter: LimiterConfig::default(),
            router: RouterConfig::default(),
            services: ServiceMap::default(),
        }
    }
}

fn default_listen_port() -> u16 {
    8888
}

fn default_io_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Max admitted requests per sliding second across all clients.
    /// 0 rejects every request.
    #[serde(default = "default_rps_global")]
    pub rps_global: u32,

    /// Same, per client IP. 0 disables the per-IP gate.
    #[serde(default)]
    pub rps_per_ip: u32,

    /// Slots in the sliding-window ring.
    #[serde(default = "default_window_slots")]
    pub window_slots: usize,

    /// Width of one slot in milliseconds.
    #[serde(default = "default_slot_ms")]
    pub slot_ms: u64,

    /// How long a rejected IP stays on the reject list. 0 disables it.
    #[serde(default = "default_reject_ttl_secs")]
    pub reject_ttl_secs: i64,

    /// Auto-insert IPs that exceed the per-IP rate into the reject list.
    #[serde(default = "default_true")]
    pub add_to_reject_list: bool,

    /// IPs seeded into the whitelist at startup.
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// IPs seeded into the blacklist at startup.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            rps_global: default_rps_global(),
            rps_per_ip: 0,
            window_slots: default_window_slots(),
            slot_ms: default_slot_ms(),
            reject_ttl_secs: default_reject_ttl_secs(),
            add_to_reject_list: true,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

fn default_rps_global() -> u32 {
    10
}

fn default_window_slots() -> usize {
    10
}

fn default_slot_ms() -> u64 {
    100
}

fn default_reject_ttl_secs() -> i64 {
    60
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub balance_policy: BalancePolicy,

    /// Background registry refresh interval.
    #[serde(default = "default_registry_expire_secs")]
    pub registry_expire_secs: u64,

    /// Enables the background refresh task.
    #[serde(default)]
    pub enable_service_discovery: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            balance_policy: BalancePolicy::default(),
            registry_expire_secs: default_registry_expire_secs(),
            enable_service_discovery: false,
        }
    }
}

fn default_registry_expire_secs() -> u64 {
    600
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalancePolicy {
    #[default]
    #[serde(rename = "roundRobin")]
    RoundRobin,
    #[serde(rename = "weighted")]
    Weighted,
}
