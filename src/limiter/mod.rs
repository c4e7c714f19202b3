pub mod reject;
pub mod set;
pub mod window;

use crate::config::LimiterConfig;
use crate::error::GatewayError;
use reject::RejectList;
use set::ConcurrentSet;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use window::{unix_ms, WindowedCounter};

/// Number of per-IP lock shards. An IP's shard is `crc32(ip) mod SHARD_COUNT`.
const SHARD_COUNT: usize = 256;

/// Per-IP counters idle for this long are reclaimed.
const IDLE_EXPIRE_MS: i64 = 60_000;
/// The reaper wakes up this often.
const REAP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// A shard owns every per-IP counter whose IP hashes to it. The shard mutex
/// covers both map access and the counter arithmetic behind it.
struct Shard {
    counters: Mutex<HashMap<String, WindowedCounter>>,
}

/// Admission control: a global sliding-window gate followed by per-client-IP
/// gates, with white/black lists and a TTL'd reject list in between.
///
/// The global check strictly precedes per-IP work: a passing `admit` has
/// charged the global counter and, when per-IP limiting is active, the IP
/// counter. A global rejection charges neither per-IP structure.
///
/// Locks are short and never held across I/O or each other.
pub struct Limiter {
    cfg: LimiterConfig,
    whitelist: ConcurrentSet,
    blacklist: ConcurrentSet,
    reject_list: RejectList,
    global: Mutex<WindowedCounter>,
    shards: Vec<Shard>,
}

impl Limiter {
    pub fn new(cfg: LimiterConfig) -> Self {
        let whitelist = ConcurrentSet::new();
        whitelist.add_all(cfg.whitelist.iter().cloned());
        let blacklist = ConcurrentSet::new();
        blacklist.add_all(cfg.blacklist.iter().cloned());

        let global = Mutex::new(WindowedCounter::new(cfg.window_slots, cfg.slot_ms));
        let shards = (0..SHARD_COUNT)
            .map(|_| Shard {
                counters: Mutex::new(HashMap::new()),
            })
            .collect();

        Self {
            cfg,
            whitelist,
            blacklist,
            reject_list: RejectList::new(),
            global,
            shards,
        }
    }

    /// Decide whether to admit one request from `client_ip`.
    pub fn admit(&self, client_ip: Option<IpAddr>) -> Result<(), GatewayError> {
        self.check(client_ip.map(|ip| ip.to_string()), unix_secs())
    }

    fn check(&self, client_ip: Option<String>, now_secs: i64) -> Result<(), GatewayError> {
        if self.cfg.rps_global == 0 {
            return Err(GatewayError::ServiceBusy);
        }

        {
            let mut counter = self.global.lock().unwrap();
            if !counter.admit(self.cfg.rps_global) {
                return Err(GatewayError::ServiceBusy);
            }
        }

        let ip = match client_ip {
            Some(ip) if !ip.is_empty() => ip,
            _ => return Err(GatewayError::ClientIpUnknown),
        };

        if self.whitelist.contains(&ip) {
            return Ok(());
        }
        if self.blacklist.contains(&ip) {
            return Err(GatewayError::Blacklisted(ip));
        }

        if let Some(expiry) = self.reject_list.get(&ip) {
            if expiry > now_secs {
                return Err(GatewayError::RateLimited(ip));
            }
            // Expired entry: drop it and fall through to the per-IP gate.
            self.reject_list.remove(&ip);
        }

        if self.cfg.rps_per_ip > 0 && !self.ip_counter_admit(&ip) {
            if self.cfg.add_to_reject_list && self.cfg.reject_ttl_secs > 0 {
                self.reject_list
                    .add(ip.clone(), now_secs + self.cfg.reject_ttl_secs);
            }
            return Err(GatewayError::RateLimited(ip));
        }

        Ok(())
    }

    fn shard_for(&self, ip: &str) -> &Shard {
        let idx = crc32fast::hash(ip.as_bytes()) as usize % SHARD_COUNT;
        &self.shards[idx]
    }

    fn ip_counter_admit(&self, ip: &str) -> bool {
        let mut counters = self.shard_for(ip).counters.lock().unwrap();
        let counter = counters
            .entry(ip.to_string())
            .or_insert_with(|| WindowedCounter::new(self.cfg.window_slots, self.cfg.slot_ms));
        counter.admit(self.cfg.rps_per_ip)
    }

    /// Spawn the background task that reclaims idle per-IP counters.
    /// Call once after construction; the task lives for the process.
    pub fn start_reaper(self: &Arc<Self>) {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(REAP_INTERVAL).await;
                let removed = limiter.reap_idle(unix_ms());
                if removed > 0 {
                    tracing::debug!("limiter: reaped {} idle ip counters", removed);
                }
            }
        });
    }

    /// One reap pass: drop counters whose head slot has not moved for
    /// `IDLE_EXPIRE_MS`. Takes one shard lock at a time, never the global
    /// mutex.
    fn reap_idle(&self, now_ms: i64) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut counters = shard.counters.lock().unwrap();
            let before = counters.len();
            counters.retain(|_, c| now_ms - c.head_start_ms() < IDLE_EXPIRE_MS);
            removed += before - counters.len();
        }
        removed
    }

    /// Number of live per-IP counters across all shards.
    pub fn ip_counter_count(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.counters.lock().unwrap().len())
            .sum()
    }

    // Admin operations.

    pub fn add_white_list(&self, ips: Vec<String>) {
        self.whitelist.add_all(ips);
    }

    pub fn remove_white_list(&self, ips: &[String]) {
        self.whitelist.remove_all(ips.iter().map(|s| s.as_str()));
    }

    pub fn add_black_list(&self, ips: Vec<String>) {
        self.blacklist.add_all(ips);
    }

    pub fn remove_black_list(&self, ips: &[String]) {
        self.blacklist.remove_all(ips.iter().map(|s| s.as_str()));
    }
}

fn unix_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
