//! Watch types for foremost change notifications.

use crate::types::SubscriptionRequest;

/// Configuration for a watcher.
#[derive(Clone, Debug)]
pub struct WatchConfig {
    /// Max buffered events before dropping the watcher.
    /// Default: 64
    pub buffer_size: usize,

    /// Only report these providers (None = all providers).
    pub providers: Option<Vec<String>>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            providers: None,
        }
    }
}

impl WatchConfig {
    /// Watch specific providers.
    pub fn providers(providers: Vec<String>) -> Self {
        Self {
            providers: Some(providers),
            ..Default::default()
        }
    }

    /// Check if this config wants events for `provider`.
    pub fn matches(&self, provider: &str) -> bool {
        match self.providers {
            Some(ref providers) => providers.iter().any(|p| p == provider),
            None => true,
        }
    }
}

/// Events delivered to watchers.
#[derive(Clone, Debug, PartialEq)]
pub enum ForemostEvent {
    /// The foremost configuration of `provider` changed.
    /// `None` means the provider has no subscribers left.
    Changed {
        provider: String,
        foremost: Option<SubscriptionRequest>,
    },

    /// The watcher was removed and will receive nothing further.
    Dropped { reason: DropReason },
}

/// Why a watcher was dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Events arrived faster than they were consumed.
    BufferOverflow,
    /// `unwatch` was called.
    Unsubscribed,
    /// The store was closed.
    StoreClosed,
}

/// Unique identifier for a watcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Handle to receive foremost change events.
pub struct WatchHandle {
    pub id: WatchId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<ForemostEvent>,
}

impl WatchHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<ForemostEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<ForemostEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<ForemostEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
