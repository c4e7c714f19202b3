use crate::config::BalancePolicy;
use crate::error::GatewayError;
use crate::registry::ServiceInstance;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Mutex;

/// Weights are interpreted on a nominal scale of 100.
const WEIGHT_SCALE: u32 = 100;

/// Picks one instance per request under the configured policy.
///
/// Round-robin keeps a per-service cursor; the cursor map is the only
/// mutable state and is serialized by one mutex. Weighted random is
/// stateless beyond the thread-local RNG.
pub struct Balancer {
    policy: BalancePolicy,
    cursors: Mutex<HashMap<String, usize>>,
}

impl Balancer {
    pub fn new(policy: BalancePolicy) -> Self {
        Self {
            policy,
            cursors: Mutex::new(HashMap::new()),
        }
    }

    pub fn pick(
        &self,
        service_name: &str,
        instances: &[ServiceInstance],
    ) -> Result<ServiceInstance, GatewayError> {
        if service_name.is_empty() {
            return Err(GatewayError::ServiceNameEmpty);
        }
        if instances.is_empty() {
            return Err(GatewayError::ServiceNotFound(service_name.to_string()));
        }

        match self.policy {
            BalancePolicy::RoundRobin => Ok(self.round_robin(service_name, instances)),
            BalancePolicy::Weighted => {
                let r = rand::thread_rng().gen_range(1..=WEIGHT_SCALE);
                Ok(weighted_pick(instances, r))
            }
        }
    }

    fn round_robin(&self, service_name: &str, instances: &[ServiceInstance]) -> ServiceInstance {
        let mut cursors = self.cursors.lock().unwrap();
        let cursor = cursors.entry(service_name.to_string()).or_insert(0);
        let mut ind = *cursor;
        if ind >= instances.len() {
            ind = 0;
        }
        *cursor = ind + 1;
        instances[ind].clone()
    }
}

/// Walk the instance list accumulating prefix sums of weight; the draw `r`
/// selects the first instance whose range covers it. A draw past the total
/// weight (weights summing to less than the scale) yields an empty instance —
/// callers turn an empty host/port into a proxy error.
fn weighted_pick(instances: &[ServiceInstance], r: u32) -> ServiceInstance {
    let mut sum = 0u32;
    for inst in instances {
        if r > sum && r <= sum + inst.weight {
            return inst.clone();
        }
        sum += inst.weight;
    }
    ServiceInstance::default()
}
