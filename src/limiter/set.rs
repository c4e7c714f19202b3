use std::collections::HashSet;
use std::sync::RwLock;

/// Concurrent set of IP strings backing the white and black lists.
/// A single read/write lock; membership tests take the read side.
pub struct ConcurrentSet {
    items: RwLock<HashSet<String>>,
}

impl ConcurrentSet {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashSet::new()),
        }
    }

    pub fn add(&self, element: String) {
        self.items.write().unwrap().insert(element);
    }

    pub fn add_all<I: IntoIterator<Item = String>>(&self, elements: I) {
        let mut items = self.items.write().unwrap();
        for e in elements {
            items.insert(e);
        }
    }

    pub fn remove(&self, element: &str) {
        self.items.write().unwrap().remove(element);
    }

    pub fn remove_all<'a, I: IntoIterator<Item = &'a str>>(&self, elements: I) {
        let mut items = self.items.write().unwrap();
        for e in elements {
            items.remove(e);
        }
    }

    pub fn contains(&self, element: &str) -> bool {
        self.items.read().unwrap().contains(element)
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unordered snapshot of the members.
    pub fn all(&self) -> Vec<String> {
        self.items.read().unwrap().iter().cloned().collect()
    }
}

impl Default for ConcurrentSet {
    fn default() -> Self {
        Self::new()
    }
}
