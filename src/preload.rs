//! Per-coin preload deduplication and capacity control.
//!
//! A coin is *in flight* between [`PreloadTracker::start_preload`] and
//! [`PreloadTracker::finish_preload`], and *preloaded* once a preload
//! succeeded. When in-flight plus preloaded coins reach the capacity, the
//! earliest admitted preloaded coin is evicted. Eviction is by admission
//! order (FIFO), not by last access.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::sync::lock;

/// Result of asking to start a preload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadStart {
    /// Admitted. `evicted` names a preloaded coin whose full details must be
    /// dropped from the cache to make room.
    Started { evicted: Option<String> },
    /// The coin already has a preload running; nothing was changed.
    AlreadyInFlight,
}

/// Bookkeeping for in-flight and completed preloads.
#[derive(Debug)]
pub struct PreloadTracker {
    max_preloaded: usize,
    in_flight: HashSet<String>,
    /// In-flight and preloaded coins, in admission order.
    order: VecDeque<String>,
    preloaded: HashSet<String>,
    /// In-flight coins that were already preloaded when re-admitted.
    reloading: HashSet<String>,
}

impl PreloadTracker {
    pub fn new(max_preloaded: usize) -> Self {
        Self {
            max_preloaded,
            in_flight: HashSet::new(),
            order: VecDeque::new(),
            preloaded: HashSet::new(),
            reloading: HashSet::new(),
        }
    }

    /// Admit `coin_id` as in flight unless it already is.
    ///
    /// Re-preloading an already preloaded coin moves it to the back of the
    /// eviction order. Its cached details still exist, so it stays tracked
    /// even if the new preload fails.
    pub fn start_preload(&mut self, coin_id: &str) -> PreloadStart {
        if self.in_flight.contains(coin_id) {
            debug!(coin_id, "preload already in flight");
            return PreloadStart::AlreadyInFlight;
        }

        if self.preloaded.remove(coin_id) {
            self.order.retain(|c| c != coin_id);
            self.reloading.insert(coin_id.to_string());
        }

        let evicted = if self.in_flight.len() + self.preloaded.len() >= self.max_preloaded {
            self.evict_oldest()
        } else {
            None
        };

        self.in_flight.insert(coin_id.to_string());
        self.order.push_back(coin_id.to_string());
        PreloadStart::Started { evicted }
    }

    /// Mark the preload of `coin_id` as finished.
    ///
    /// On success the coin becomes preloaded. On failure it is forgotten,
    /// unless it was preloaded before this attempt, in which case it returns
    /// to the preloaded set. Returns `false` if the coin was not in flight.
    pub fn finish_preload(&mut self, coin_id: &str, succeeded: bool) -> bool {
        if !self.in_flight.remove(coin_id) {
            warn!(coin_id, "finish_preload without matching start_preload");
            return false;
        }
        let reloaded = self.reloading.remove(coin_id);
        if succeeded || reloaded {
            if !succeeded {
                debug!(coin_id, "re-preload failed; keeping earlier details");
            }
            self.preloaded.insert(coin_id.to_string());
        } else {
            self.order.retain(|c| c != coin_id);
        }
        true
    }

    pub fn is_in_flight(&self, coin_id: &str) -> bool {
        self.in_flight.contains(coin_id)
    }

    pub fn is_preloaded(&self, coin_id: &str) -> bool {
        self.preloaded.contains(coin_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Preloaded coins, oldest first.
    pub fn preloaded_coins(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|c| self.preloaded.contains(*c))
            .cloned()
            .collect()
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let position = self.order.iter().position(|c| self.preloaded.contains(c))?;
        let coin = self.order.remove(position)?;
        self.preloaded.remove(&coin);
        debug!(coin_id = %coin, "evicting preloaded coin");
        Some(coin)
    }
}

// ---------------------------------------------------------------------------
// PreloadDedup / PreloadGuard
// ---------------------------------------------------------------------------

/// Shared, cloneable form of [`PreloadTracker`].
#[derive(Clone)]
pub struct PreloadDedup {
    tracker: Arc<Mutex<PreloadTracker>>,
}

impl PreloadDedup {
    pub fn new(max_preloaded: usize) -> Self {
        Self { tracker: Arc::new(Mutex::new(PreloadTracker::new(max_preloaded))) }
    }

    /// Start a preload and return a guard that finishes it exactly once.
    ///
    /// Returns `None` when the coin is already in flight. The second tuple
    /// element names a coin evicted to make room.
    pub fn begin(&self, coin_id: &str) -> Option<(PreloadGuard, Option<String>)> {
        match lock(&self.tracker).start_preload(coin_id) {
            PreloadStart::AlreadyInFlight => None,
            PreloadStart::Started { evicted } => Some((
                PreloadGuard {
                    tracker: self.tracker.clone(),
                    coin_id: coin_id.to_string(),
                    succeeded: false,
                },
                evicted,
            )),
        }
    }

    pub fn is_in_flight(&self, coin_id: &str) -> bool {
        lock(&self.tracker).is_in_flight(coin_id)
    }

    pub fn is_preloaded(&self, coin_id: &str) -> bool {
        lock(&self.tracker).is_preloaded(coin_id)
    }

    pub fn preloaded_coins(&self) -> Vec<String> {
        lock(&self.tracker).preloaded_coins()
    }
}

/// Finishes its preload when dropped: as a success if
/// [`complete`](Self::complete) was called, as a failure otherwise.
pub struct PreloadGuard {
    tracker: Arc<Mutex<PreloadTracker>>,
    coin_id: String,
    succeeded: bool,
}

impl PreloadGuard {
    pub fn coin_id(&self) -> &str {
        &self.coin_id
    }

    /// Finish the preload as successful.
    pub fn complete(mut self) {
        self.succeeded = true;
    }
}

impl Drop for PreloadGuard {
    fn drop(&mut self) {
        lock(&self.tracker).finish_preload(&self.coin_id, self.succeeded);
    }
}
