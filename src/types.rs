//! Core types for the subscription store.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the store assigns to one stored subscription.
///
/// Ids start at 1, only ever grow, and are never handed out twice by the
/// same store.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    pub fn next(self) -> Self {
        SubscriptionId(self.0 + 1)
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request for location updates from one provider.
///
/// Equality is structural over all three fields. The same triple is used to
/// register a request and later to cancel one instance of it, so a NaN
/// `min_distance` equals another NaN.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Location source, e.g. `"gps"` or `"network"`. Opaque to the store.
    pub provider: String,
    /// Longest acceptable gap between updates, in milliseconds.
    pub max_delay: u64,
    /// Smallest movement worth reporting, in meters.
    pub min_distance: f64,
}

impl SubscriptionRequest {
    pub fn new(provider: impl Into<String>, max_delay: u64, min_distance: f64) -> Self {
        Self {
            provider: provider.into(),
            max_delay,
            min_distance,
        }
    }

    /// Check the request is something a provider could honor.
    ///
    /// Rejects an empty provider and a negative, NaN or infinite distance.
    /// A negative delay cannot be expressed.
    pub fn validate(&self) -> Result<()> {
        if self.provider.is_empty() {
            return Err(StoreError::InvalidRequest("provider is empty".into()));
        }
        if !self.min_distance.is_finite() || self.min_distance < 0.0 {
            return Err(StoreError::InvalidRequest(format!(
                "min_distance must be a finite, non-negative number of meters (got {})",
                self.min_distance
            )));
        }
        Ok(())
    }
}

impl PartialEq for SubscriptionRequest {
    fn eq(&self, other: &Self) -> bool {
        self.provider == other.provider
            && self.max_delay == other.max_delay
            && (self.min_distance == other.min_distance
                || (self.min_distance.is_nan() && other.min_distance.is_nan()))
    }
}

impl fmt::Display for SubscriptionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} every {}ms / {}m",
            self.provider, self.max_delay, self.min_distance
        )
    }
}

/// A subscription request as held by the store.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredSubscription {
    pub id: SubscriptionId,
    pub request: SubscriptionRequest,
}

/// Store statistics.
#[derive(Clone, Debug, Default)]
pub struct StoreStats {
    /// Records currently in the table.
    pub active: u64,
    /// Id the next insert will receive.
    pub next_id: u64,
    /// Frames in the journal since its last compaction (0 when in memory).
    pub journal_entries: u64,
    /// Journal size on disk (0 when in memory).
    pub journal_bytes: u64,
}
