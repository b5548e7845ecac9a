//! Global cache freshness.
//!
//! The server issues a cache version; the client remembers the version it last
//! reset against and when. The whole cache is trusted only while the versions
//! match and the last reset is younger than the freshness window.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The row persisted in the `globalCacheInfo` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalCacheInfo {
    pub version: Option<String>,
    pub last_reset: Option<DateTime<Utc>>,
}

impl GlobalCacheInfo {
    /// Info recorded right after a reset against `version`.
    pub fn reset_now(version: &str, now: DateTime<Utc>) -> Self {
        Self { version: Some(version.to_string()), last_reset: Some(now) }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FreshnessPolicy {
    window: Duration,
}

impl FreshnessPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether the cache described by `info` may still be trusted.
    ///
    /// A last reset in the future (clock skew) is treated as stale.
    pub fn evaluate(
        &self,
        info: &GlobalCacheInfo,
        server_version: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if info.version.as_deref() != Some(server_version) {
            return false;
        }
        let Some(last_reset) = info.last_reset else {
            return false;
        };
        match now.signed_duration_since(last_reset).to_std() {
            Ok(elapsed) => elapsed < self.window,
            Err(_) => false,
        }
    }
}
