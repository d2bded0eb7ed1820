//! Lock-free event counters.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// A fixed set of named atomic counters.
///
/// The key set is decided at construction; bumping an unknown key is a
/// no-op so hot paths never allocate or lock.
pub struct StatsCounter<K> {
    counters: HashMap<K, AtomicU64>,
}

impl<K: Copy + Eq + Hash> StatsCounter<K> {
    pub fn new(keys: &[K]) -> Self {
        let counters = keys.iter().map(|&k| (k, AtomicU64::new(0))).collect();
        Self { counters }
    }

    pub fn increment(&self, key: K) {
        self.add(key, 1);
    }

    pub fn add(&self, key: K, value: u64) {
        if let Some(counter) = self.counters.get(&key) {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, key: K) -> u64 {
        self.counters
            .get(&key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<K, u64> {
        self.counters
            .iter()
            .map(|(&k, v)| (k, v.load(Ordering::Relaxed)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    enum Event {
        Sent,
        Dropped,
        Unregistered,
    }

    #[test]
    fn counts_registered_keys() {
        let stats = StatsCounter::new(&[Event::Sent, Event::Dropped]);
        stats.increment(Event::Sent);
        stats.increment(Event::Sent);
        stats.add(Event::Dropped, 5);
        assert_eq!(stats.get(Event::Sent), 2);
        assert_eq!(stats.get(Event::Dropped), 5);
    }

    #[test]
    fn unregistered_keys_are_ignored() {
        let stats = StatsCounter::new(&[Event::Sent]);
        stats.increment(Event::Unregistered);
        assert_eq!(stats.get(Event::Unregistered), 0);
        assert_eq!(stats.snapshot().len(), 1);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let stats = std::sync::Arc::new(StatsCounter::new(&[Event::Sent]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = std::sync::Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.increment(Event::Sent);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.get(Event::Sent), 4000);
    }
}
