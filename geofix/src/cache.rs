//! Single-slot cache for the most recent qualifying location sample.
//!
//! The cache holds at most one [`LocationSample`] together with the maximum
//! age for which it may be served. Staleness is evaluated lazily at read
//! time; nothing sweeps the entry in the background.
//!
//! # Replace Policy
//!
//! A write replaces the cached sample when any of these hold:
//! - the cache is empty
//! - the new sample's accuracy is numerically <= the cached one
//! - the cached sample is older than the max age
//!
//! A stale entry is therefore always replaceable, even by a worse (or
//! itself stale) sample.
//!
//! # Thread Safety
//!
//! The cache is shared by every in-flight request. The entry lives behind a
//! `parking_lot::Mutex` held only for the compare-and-replace; hit/miss
//! statistics are lock-free atomics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::location::LocationSample;

/// Default maximum age for serving a cached sample (60 seconds).
pub const DEFAULT_MAX_CACHE_AGE: Duration = Duration::from_secs(60);

/// The cache's single entry.
#[derive(Debug, Clone)]
struct CacheEntry {
    sample: Option<LocationSample>,
    max_age: Duration,
}

impl CacheEntry {
    fn is_stale(&self, sample: &LocationSample) -> bool {
        sample.age() > self.max_age
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that returned a sample.
    pub hits: u64,
    /// Reads that returned nothing (empty, stale or not accurate enough).
    pub misses: u64,
    /// Writes that replaced the entry.
    pub replacements: u64,
    /// Writes rejected by the replace policy.
    pub rejections: u64,
}

/// Shared single-slot location cache.
#[derive(Debug)]
pub struct LocationCache {
    entry: Mutex<CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    replacements: AtomicU64,
    rejections: AtomicU64,
}

impl Default for LocationCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHE_AGE)
    }
}

impl LocationCache {
    /// Create an empty cache serving samples up to `max_age` old.
    pub fn new(max_age: Duration) -> Self {
        Self {
            entry: Mutex::new(CacheEntry {
                sample: None,
                max_age,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            replacements: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    /// Read the cached sample if it is within `max_age` and at least as
    /// precise as `desired_accuracy`.
    ///
    /// A refused read leaves the entry in place.
    pub fn read(&self, desired_accuracy: f64, max_age: Duration) -> Option<LocationSample> {
        let sample = self.entry.lock().sample;

        let usable = sample.filter(|s| s.age() <= max_age && s.satisfies(desired_accuracy));
        match usable {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        usable
    }

    /// Read using the configured max age.
    pub fn lookup(&self, desired_accuracy: f64) -> Option<LocationSample> {
        self.read(desired_accuracy, self.max_age())
    }

    /// Offer a sample to the cache.
    ///
    /// Returns true if the sample replaced the entry.
    pub fn write(&self, sample: LocationSample) -> bool {
        let mut entry = self.entry.lock();

        let replace = match &entry.sample {
            None => true,
            Some(cached) => sample.accuracy <= cached.accuracy || entry.is_stale(cached),
        };

        if replace {
            entry.sample = Some(sample);
            self.replacements.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejections.fetch_add(1, Ordering::Relaxed);
        }
        drop(entry);

        debug!(
            accuracy = sample.accuracy,
            replaced = replace,
            "Location cache write"
        );
        replace
    }

    /// The configured max age.
    pub fn max_age(&self) -> Duration {
        self.entry.lock().max_age
    }

    /// Change the max age. Applies to subsequent reads and writes.
    pub fn set_max_age(&self, max_age: Duration) {
        self.entry.lock().max_age = max_age;
    }

    /// The cached sample regardless of age or accuracy.
    pub fn cached_location(&self) -> Option<LocationSample> {
        self.entry.lock().sample
    }

    /// Age of the cached sample, if any.
    pub fn cached_location_age(&self) -> Option<Duration> {
        self.cached_location().map(|s| s.age())
    }

    /// Drop the cached sample.
    pub fn clear(&self) {
        self.entry.lock().sample = None;
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            replacements: self.replacements.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Coordinates;
    use proptest::prelude::*;

    fn sample(accuracy: f64) -> LocationSample {
        LocationSample::new(Coordinates::new(53.55, 9.99), accuracy)
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_within_age() {
        let cache = LocationCache::new(Duration::from_secs(60));
        let s = sample(50.0);
        assert!(cache.write(s));

        assert_eq!(cache.read(50.0, Duration::from_secs(60)), Some(s));
        assert_eq!(cache.read(100.0, Duration::from_secs(60)), Some(s));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_refuses_stale_sample_without_evicting() {
        let cache = LocationCache::new(Duration::from_secs(60));
        let s = sample(50.0);
        cache.write(s);

        tokio::time::advance(Duration::from_secs(61)).await;

        assert_eq!(cache.read(100.0, Duration::from_secs(60)), None);
        assert_eq!(cache.cached_location(), Some(s));
        assert_eq!(cache.cached_location_age(), Some(Duration::from_secs(61)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_refuses_insufficient_accuracy() {
        let cache = LocationCache::default();
        cache.write(sample(50.0));

        assert_eq!(cache.lookup(10.0), None);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worse_sample_does_not_replace_fresh_entry() {
        let cache = LocationCache::new(Duration::from_secs(60));
        let s1 = sample(20.0);
        cache.write(s1);

        assert!(!cache.write(sample(80.0)));
        assert_eq!(cache.cached_location(), Some(s1));
        assert_eq!(cache.stats().rejections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_equal_accuracy_replaces() {
        let cache = LocationCache::default();
        cache.write(sample(20.0));

        tokio::time::advance(Duration::from_secs(1)).await;
        let newer = sample(20.0);
        assert!(cache.write(newer));
        assert_eq!(cache.cached_location(), Some(newer));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_replaced_regardless_of_accuracy() {
        let cache = LocationCache::new(Duration::from_secs(60));
        cache.write(sample(5.0));

        tokio::time::advance(Duration::from_secs(61)).await;
        let worse = sample(500.0);
        assert!(cache.write(worse));
        assert_eq!(cache.cached_location(), Some(worse));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_max_age_applies_to_lookup() {
        let cache = LocationCache::new(Duration::from_secs(60));
        cache.write(sample(10.0));
        tokio::time::advance(Duration::from_secs(30)).await;

        assert!(cache.lookup(10.0).is_some());
        cache.set_max_age(Duration::from_secs(10));
        assert_eq!(cache.max_age(), Duration::from_secs(10));
        assert!(cache.lookup(10.0).is_none());
    }

    #[test]
    fn test_clear() {
        let cache = LocationCache::default();
        cache.write(sample(10.0));
        cache.clear();
        assert!(cache.cached_location().is_none());
        assert!(cache.cached_location_age().is_none());
    }

    proptest! {
        #[test]
        fn prop_fresh_entry_keeps_best_accuracy(
            accuracies in proptest::collection::vec(1.0f64..5_000.0, 1..20)
        ) {
            let cache = LocationCache::new(Duration::from_secs(3600));
            for accuracy in &accuracies {
                cache.write(sample(*accuracy));
            }

            let best = accuracies.iter().cloned().fold(f64::INFINITY, f64::min);
            let cached = cache.cached_location().unwrap();
            prop_assert_eq!(cached.accuracy, best);
        }
    }
}
