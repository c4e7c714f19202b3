/// Bucketed sliding-window counter — a ring of fixed-width time slots whose
/// sum approximates the number of admitted events in the trailing window
/// (10 slots × 100 ms = one second by default).
///
/// The `blocked` flag is a sticky rejection for the remainder of the current
/// slot: once the sum has crossed the threshold, further calls in the same
/// slot short-circuit without re-summing. Advancing to a new slot clears it.
///
/// Not internally synchronized — callers wrap it in a mutex.
pub struct WindowedCounter {
    slots: Vec<u32>,
    /// Index of the currently-advancing slot.
    head: usize,
    /// Wall-clock start of the head slot, floored to a slot boundary.
    /// 0 means "never used" (first call initializes).
    head_start_ms: i64,
    blocked: bool,
    slot_ms: i64,
}

impl WindowedCounter {
    pub fn new(window_slots: usize, slot_ms: u64) -> Self {
        Self {
            slots: vec![0; window_slots],
            head: 0,
            head_start_ms: 0,
            blocked: false,
            slot_ms: slot_ms as i64,
        }
    }

    /// Account for one event at the current wall-clock time and decide
    /// whether to accept it: `true` admits (and charges a slot), `false`
    /// rejects without charging.
    pub fn admit(&mut self, threshold: u32) -> bool {
        self.admit_at(unix_ms(), threshold)
    }

    /// Time-injected form of [`admit`] — the whole algorithm, driven by an
    /// explicit `now_ms` so tests control the clock.
    pub fn admit_at(&mut self, now_ms: i64, threshold: u32) -> bool {
        let n = self.slots.len();
        let span = n as i64 * self.slot_ms;
        let slot_start = now_ms - now_ms % self.slot_ms;
        let index = ((now_ms % span) / self.slot_ms) as usize;

        if self.head_start_ms == 0 {
            self.head_start_ms = slot_start;
            self.head = index;
            self.slots[self.head] += 1;
            return true;
        }

        let gap_ms = now_ms - self.head_start_ms;

        if gap_ms < self.slot_ms {
            // Same slot.
            if self.blocked {
                return false;
            }
            let sum: u32 = self.slots.iter().sum();
            if sum >= threshold {
                self.blocked = true;
                return false;
            }
            self.slots[self.head] += 1;
        } else {
            // The head advanced, possibly skipping slots. Zero everything the
            // window slid past; a gap of a full window is a total reset.
            self.blocked = false;
            self.head_start_ms = slot_start;

            let gap = (gap_ms / self.slot_ms) as usize;
            if gap >= n {
                self.slots.fill(0);
            } else {
                for i in 1..=gap {
                    let idx = (self.head + i) % n;
                    self.slots[idx] = 0;
                }
            }
            self.head = index;

            let sum: u32 = self.slots.iter().sum();
            if sum >= threshold {
                self.blocked = true;
                return false;
            }
            self.slots[self.head] = 1;
        }

        true
    }

    /// Start time of the head slot — 0 until the first `admit`.
    /// The reaper uses this as the idleness criterion.
    pub fn head_start_ms(&self) -> i64 {
        self.head_start_ms
    }
}

/// Wall-clock milliseconds since the Unix epoch.
pub(crate) fn unix_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // A slot-aligned base time well past the epoch (divisible by 1000).
    const T0: i64 = 1_700_000_000_000;

    #[test]
    fn test_first_call_admits_and_initializes() {
        let mut w = WindowedCounter::new(10, 100);
        assert!(w.admit_at(T0 + 237, 5));
        assert_eq!(w.head_start_ms(), T0 + 200);
    }

    #[test]
    fn test_same_slot_threshold() {
        let mut w = WindowedCounter::new(10, 100);
        for i in 0..5 {
            assert!(w.admit_at(T0 + i, 5), "request {} should be admitted", i);
        }
        assert!(!w.admit_at(T0 + 50, 5), "request 6 should be rejected");
    }

    #[test]
    fn test_sticky_block_within_slot() {
        let mut w = WindowedCounter::new(10, 100);
        for i in 0..3 {
            assert!(w.admit_at(T0 + i, 3));
        }
        // First rejection sets the block; later calls in the slot hit it.
        assert!(!w.admit_at(T0 + 10, 3));
        assert!(!w.admit_at(T0 + 99, 3));
        // Next slot clears it, but the window still holds 3 hits.
        assert!(!w.admit_at(T0 + 100, 3));
        // That rejection re-arms the block for the rest of the slot, even
        // against a higher threshold.
        assert!(!w.admit_at(T0 + 150, 4));
        // A fresh slot clears the block and the sum (3) fits under 4.
        assert!(w.admit_at(T0 + 200, 4));
    }

    #[test]
    fn test_window_slides_and_frees_capacity() {
        let mut w = WindowedCounter::new(10, 100);
        for i in 0..4 {
            assert!(w.admit_at(T0 + i, 4));
        }
        assert!(!w.admit_at(T0 + 10, 4));
        // 1 s later the ring has slid a full cycle past those hits.
        assert!(w.admit_at(T0 + 1_000, 4));
    }

    #[test]
    fn test_gap_of_full_window_resets() {
        let mut w = WindowedCounter::new(10, 100);
        for i in 0..4 {
            assert!(w.admit_at(T0 + i, 4));
        }
        assert!(!w.admit_at(T0 + 20, 4));
        // ≥ 10 slots of silence behaves like a fresh counter.
        let mut fresh = WindowedCounter::new(10, 100);
        for i in 0..4 {
            assert_eq!(
                w.admit_at(T0 + 3_000 + i, 4),
                fresh.admit_at(T0 + 3_000 + i, 4),
                "call {} should match a fresh counter",
                i
            );
        }
    }

    #[test]
    fn test_partial_gap_zeroes_skipped_slots_only() {
        let mut w = WindowedCounter::new(10, 100);
        // 2 hits in slot 0, 2 in slot 1.
        assert!(w.admit_at(T0, 10));
        assert!(w.admit_at(T0 + 1, 10));
        assert!(w.admit_at(T0 + 100, 10));
        assert!(w.admit_at(T0 + 101, 10));
        // Jump to slot 4: slots 2..4 are zeroed, slots 0 and 1 survive.
        // Sum is 4, so a threshold of 5 rejects the 6th admit attempt after
        // one more hit lands.
        assert!(w.admit_at(T0 + 400, 5));
        assert!(!w.admit_at(T0 + 401, 5), "window should still count old slots");
    }

    #[test]
    fn test_admitted_in_any_trailing_second_at_most_threshold() {
        let mut w = WindowedCounter::new(10, 100);
        let threshold = 10;
        let mut admitted = 0;
        // 30 arrivals spread over 50 ms.
        for i in 0..30 {
            if w.admit_at(T0 + i, threshold) {
                admitted += 1;
            }
        }
        assert_eq!(admitted, threshold, "exactly {} should pass", threshold);
        // The next second admits again.
        assert!(w.admit_at(T0 + 1_050, threshold));
    }
}
