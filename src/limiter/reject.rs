use std::collections::HashMap;
use std::sync::RwLock;

/// TTL'd blocklist: IP → Unix-seconds expiry. Entries are written when the
/// per-IP rate is exceeded and dropped lazily by the limiter once the wall
/// clock passes the expiry. One read/write lock guards the whole map.
pub struct RejectList {
    entries: RwLock<HashMap<String, i64>>,
}

impl RejectList {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, ip: &str) -> Option<i64> {
        self.entries.read().unwrap().get(ip).copied()
    }

    pub fn add(&self, ip: String, expiry_epoch: i64) {
        self.entries.write().unwrap().insert(ip, expiry_epoch);
    }

    pub fn remove(&self, ip: &str) {
        self.entries.write().unwrap().remove(ip);
    }

    /// Point-in-time copy of the whole list, for admin introspection.
    pub fn snapshot(&self) -> HashMap<String, i64> {
        self.entries.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RejectList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_get_remove() {
        let rl = RejectList::new();
        assert!(rl.get("10.0.0.1").is_none());

        rl.add("10.0.0.1".to_string(), 1_700_000_060);
        assert_eq!(rl.get("10.0.0.1"), Some(1_700_000_060));

        rl.remove("10.0.0.1");
        assert!(rl.get("10.0.0.1").is_none());
        assert!(rl.is_empty());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let rl = RejectList::new();
        rl.add("10.0.0.1".to_string(), 100);
        let snap = rl.snapshot();
        rl.add("10.0.0.2".to_string(), 200);
        assert_eq!(snap.len(), 1);
        assert_eq!(rl.len(), 2);
    }
}
