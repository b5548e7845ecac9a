//! Short-lived freshness markers for durable cache entries.
//!
//! A marker says "the durable entry for `(table, key)` was written recently
//! enough to trust". Markers never carry payloads; an expired marker reads the
//! same as a missing one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::store::CacheTable;
use crate::sync::lock;

/// Cloneable TTL marker table.
#[derive(Clone)]
pub struct ValidityTracker {
    ttl: Duration,
    markers: Arc<Mutex<HashMap<(CacheTable, String), Instant>>>,
}

impl ValidityTracker {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, markers: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_valid(&self, table: CacheTable, key: &str) -> bool {
        self.is_valid_at(table, key, Instant::now())
    }

    /// Check a marker against an explicit clock reading.
    ///
    /// An expired marker is removed as a side effect.
    pub fn is_valid_at(&self, table: CacheTable, key: &str, now: Instant) -> bool {
        let mut markers = lock(&self.markers);
        let marker_key = (table, key.to_string());
        match markers.get(&marker_key) {
            Some(expires_at) if now < *expires_at => true,
            Some(_) => {
                markers.remove(&marker_key);
                false
            }
            None => false,
        }
    }

    pub fn mark_valid(&self, table: CacheTable, key: &str) {
        self.mark_valid_at(table, key, Instant::now());
    }

    /// Set a marker expiring `ttl` after `now`.
    pub fn mark_valid_at(&self, table: CacheTable, key: &str, now: Instant) {
        lock(&self.markers).insert((table, key.to_string()), now + self.ttl);
    }

    pub fn invalidate(&self, table: CacheTable, key: &str) {
        lock(&self.markers).remove(&(table, key.to_string()));
    }

    pub fn invalidate_table(&self, table: CacheTable) {
        lock(&self.markers).retain(|(t, _), _| *t != table);
    }

    pub fn clear(&self) {
        lock(&self.markers).clear();
    }
}
