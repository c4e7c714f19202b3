use super::ServiceMap;
use crate::error::GatewayError;

/// Source of truth for the service map. The registry treats it as opaque:
/// anything that can produce a full `ServiceMap` snapshot can back the
/// gateway — a static config table, a discovery client, a control plane.
pub trait ServiceProvider: Send + Sync {
    fn retrieve(&self) -> Result<ServiceMap, GatewayError>;
}

/// Provider over a fixed service table (the config file's `[services]`).
pub struct StaticProvider {
    services: ServiceMap,
}

impl StaticProvider {
    pub fn new(services: ServiceMap) -> Self {
        Self { services }
    }
}

impl ServiceProvider for StaticProvider {
    fn retrieve(&self) -> Result<ServiceMap, GatewayError> {
        Ok(self.services.clone())
    }
}
