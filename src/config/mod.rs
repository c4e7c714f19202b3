pub mod types;


pub use types::*;

use anyhow::Result;
use std::path::Path;

impl GatewayConfig {
    /// Load configuration from a file (if it exists) and apply environment
    /// variable overrides. When the file does not exist, built-in defaults
    /// are used — the gateway starts with zero configuration for local
    /// development.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: GatewayConfig = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => toml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                Some(ext) => anyhow::bail!("unsupported config format: .{ext}, use .toml or .json"),
                None => anyhow::bail!("config file has no extension, use .toml or .json"),
            }
        } else {
            tracing::info!("config file not found at {}, using defaults", path.display());
            GatewayConfig::default()
        };

        config.apply_env_overrides();

        config.validate()?;
        tracing::info!("loaded gateway configuration");
        Ok(config)
    }

    /// Apply environment variable overrides for deploy-time settings.
    /// The service table itself is file-only.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PYLON_LISTEN_PORT") {
            if let Ok(n) = v.parse::<u16>() {
                self.listen_port = n;
            }
        }
        if let Ok(v) = std::env::var("PYLON_RPS_GLOBAL") {
            if let Ok(n) = v.parse::<u32>() {
                self.limiter.rps_global = n;
            }
        }
        if let Ok(v) = std::env::var("PYLON_RPS_PER_IP") {
            if let Ok(n) = v.parse::<u32>() {
                self.limiter.rps_per_ip = n;
            }
        }
        if let Ok(v) = std::env::var("PYLON_BALANCE_POLICY") {
            match v.as_str() {
                "roundRobin" => self.router.balance_policy = BalancePolicy::RoundRobin,
                "weighted" => self.router.balance_policy = BalancePolicy::Weighted,
                other => tracing::warn!("ignoring unknown PYLON_BALANCE_POLICY: {}", other),
            }
        }
        if let Ok(v) = std::env::var("PYLON_REGISTRY_EXPIRE_SECS") {
            if let Ok(n) = v.parse::<u64>() {
                self.router.registry_expire_secs = n;
            }
        }
        if let Ok(v) = std::env::var("PYLON_ENABLE_SERVICE_DISCOVERY") {
            self.router.enable_service_discovery = v == "true" || v == "1";
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.limiter.window_slots == 0 {
            anyhow::bail!("limiter.window_slots must be at least 1");
        }
        if self.limiter.slot_ms == 0 {
            anyhow::bail!("limiter.slot_ms must be at least 1");
        }
        if self.router.registry_expire_secs == 0 {
            anyhow::bail!("router.registry_expire_secs must be at least 1");
        }
        for (name, instances) in &self.services {
            if name.is_empty() {
                anyhow::bail!("service name cannot be empty");
            }
            for inst in instances {
                if inst.host.is_empty() || inst.port.is_empty() {
                    anyhow::bail!("service '{}' has an instance with empty host/port", name);
                }
            }
        }
        Ok(())
    }
}
