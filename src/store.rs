//! Main store tying the table, journal and watchers together.

use crate::error::{Result, StoreError};
use crate::journal::{Journal, JournalEntry};
use crate::table::SubscriptionTable;
use crate::types::{StoreStats, StoredSubscription, SubscriptionId, SubscriptionRequest};
use crate::watch::{DropReason, WatchConfig, WatchHandle, WatchId, WatchManager};
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Journal file name inside the store directory.
const JOURNAL_FILE: &str = "subscriptions.journal";

/// Lock file name inside the store directory.
const LOCK_FILE: &str = "LOCK";

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory holding the journal and lock file.
    pub path: PathBuf,

    /// Discard every stored subscription right after opening, e.g. when the
    /// host has just booted and no requester from before is still alive.
    pub reset_all: bool,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Reject malformed requests on insert instead of storing them as-is.
    ///
    /// When off, a request with a NaN `min_distance` is still found and
    /// deleted by an identical NaN request.
    pub validate_requests: bool,

    /// fsync the journal after every mutation.
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./subscriptions"),
            reset_all: false,
            create_if_missing: true,
            validate_requests: true,
            sync_writes: true,
        }
    }
}

/// State guarded by the store lock.
struct Inner {
    table: SubscriptionTable,

    /// None for in-memory stores and after close.
    journal: Option<Journal>,

    /// Held for exclusive access to the directory.
    lock_file: Option<File>,

    closed: bool,
}

impl Inner {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Table of active location subscription requests.
///
/// Every operation is atomic with respect to every other: writers take the
/// store lock exclusively, readers share it. `delete` resolves the request
/// to a row and removes that row under the same exclusive lock.
///
/// Share between requesters with `Arc<SubscriptionStore>`.
pub struct SubscriptionStore {
    /// Store directory (None when in memory).
    path: Option<PathBuf>,

    validate_requests: bool,

    inner: RwLock<Inner>,

    watchers: WatchManager,
}

impl SubscriptionStore {
    /// Open the store in `config.path`, replaying its journal.
    ///
    /// With `reset_all` the table is cleared once it is open.
    pub fn open(config: StoreConfig) -> Result<Self> {
        if !config.path.exists() {
            if !config.create_if_missing {
                return Err(StoreError::NotInitialized);
            }
            fs::create_dir_all(&config.path)?;
        }

        let lock_file = Self::acquire_lock(&config.path)?;

        let (mut journal, table) =
            Journal::open(config.path.join(JOURNAL_FILE), config.sync_writes)?;
        journal.compact(&table)?;

        info!(
            path = %config.path.display(),
            active = table.len(),
            next_id = table.next_id().0,
            "opened subscription store"
        );

        let store = Self {
            path: Some(config.path),
            validate_requests: config.validate_requests,
            inner: RwLock::new(Inner {
                table,
                journal: Some(journal),
                lock_file: Some(lock_file),
                closed: false,
            }),
            watchers: WatchManager::new(),
        };

        if config.reset_all {
            store.clear()?;
        }

        Ok(store)
    }

    /// Open a store that keeps nothing on disk.
    pub fn open_in_memory(validate_requests: bool) -> Self {
        Self {
            path: None,
            validate_requests,
            inner: RwLock::new(Inner {
                table: SubscriptionTable::new(),
                journal: None,
                lock_file: None,
                closed: false,
            }),
            watchers: WatchManager::new(),
        }
    }

    // --- Mutations ---

    /// Register a request. Always creates a new row, even when an identical
    /// request is already stored.
    pub fn insert(&self, request: SubscriptionRequest) -> Result<SubscriptionId> {
        if self.validate_requests {
            request.validate()?;
        }

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.ensure_open()?;

        let provider = request.provider.clone();
        let before = self.watched_foremost(&inner.table, &provider);

        let id = inner.table.next_id();
        if let Some(journal) = inner.journal.as_mut() {
            journal.append(&JournalEntry::insert(id, &request))?;
        }
        inner.table.insert_with_id(id, request);

        debug!(id = id.0, provider = %provider, "inserted subscription");
        self.notify(&inner.table, &provider, before);

        Ok(id)
    }

    /// Cancel one instance of `request`: the oldest stored row equal to it.
    ///
    /// Returns the number of rows removed, 0 or 1.
    pub fn delete(&self, request: &SubscriptionRequest) -> Result<usize> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.ensure_open()?;

        let id = match inner.table.find_matching_id(request) {
            Some(id) => id,
            None => return Ok(0),
        };

        let before = self.watched_foremost(&inner.table, &request.provider);

        if let Some(journal) = inner.journal.as_mut() {
            journal.append(&JournalEntry::Delete { id })?;
        }
        inner.table.remove(id);

        debug!(id = id.0, provider = %request.provider, "deleted subscription");
        self.notify(&inner.table, &request.provider, before);

        Ok(1)
    }

    /// Remove every stored subscription.
    pub fn clear(&self) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.ensure_open()?;

        let providers = inner.table.providers();

        if let Some(journal) = inner.journal.as_mut() {
            journal.append(&JournalEntry::Clear)?;
        }
        let removed = inner.table.clear();

        // The Clear entry already made this durable; compaction only
        // reclaims space.
        if let Some(journal) = inner.journal.as_mut() {
            if let Err(e) = journal.compact(&inner.table) {
                warn!(error = %e, "failed to compact journal after clear");
            }
        }

        info!(removed, "cleared subscriptions");

        for provider in providers {
            self.watchers.broadcast_change(&provider, None);
        }

        Ok(())
    }

    // --- Queries ---

    /// Id of the oldest row equal to `request`.
    pub fn find_matching_id(&self, request: &SubscriptionRequest) -> Result<Option<SubscriptionId>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        Ok(inner.table.find_matching_id(request))
    }

    /// Foremost configuration for `provider`: the smallest delay and the
    /// smallest distance over all of its rows, taken independently.
    ///
    /// `None` means no subscriber is left and the provider can be released.
    pub fn foremost(&self, provider: &str) -> Result<Option<SubscriptionRequest>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        Ok(inner.table.foremost(provider))
    }

    /// Copy of every stored row in id order.
    pub fn subscriptions(&self) -> Result<Vec<StoredSubscription>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        Ok(inner.table.snapshot())
    }

    /// Providers that currently have at least one subscriber, sorted.
    pub fn providers(&self) -> Result<Vec<String>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        Ok(inner.table.providers())
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.inner.read().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().table.is_empty()
    }

    /// Get store statistics.
    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        let (journal_entries, journal_bytes) = inner
            .journal
            .as_ref()
            .map(|j| (j.entries(), j.size()))
            .unwrap_or((0, 0));

        StoreStats {
            active: inner.table.len() as u64,
            next_id: inner.table.next_id().0,
            journal_entries,
            journal_bytes,
        }
    }

    // --- Watchers ---

    /// Receive an event whenever a provider's foremost configuration changes.
    pub fn watch(&self, config: WatchConfig) -> WatchHandle {
        self.watchers.watch(config)
    }

    /// Stop a watcher.
    pub fn unwatch(&self, id: WatchId) {
        self.watchers.unwatch(id)
    }

    // --- Lifecycle ---

    /// Force journal writes to disk. Only needed with `sync_writes` off.
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        if let Some(journal) = inner.journal.as_ref() {
            journal.sync()?;
        }
        Ok(())
    }

    /// Release the journal and the directory lock.
    ///
    /// Idempotent. Failures are logged and never returned; later operations
    /// fail with `StoreError::Closed`.
    pub fn close(&self) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        if inner.closed {
            return;
        }
        inner.closed = true;

        if let Some(mut journal) = inner.journal.take() {
            if let Err(e) = journal.compact(&inner.table) {
                warn!(path = %journal.path().display(), error = %e, "failed to compact journal on close");
            }
        }

        if let Some(lock_file) = inner.lock_file.take() {
            if let Err(e) = FileExt::unlock(&lock_file) {
                warn!(error = %e, "failed to release store lock");
            }
        }

        self.watchers.drop_all(DropReason::StoreClosed);

        debug!(active = inner.table.len(), "closed subscription store");
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Get the store path (None when in memory).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // --- Private Helpers ---

    /// Foremost value before a mutation, only computed when someone watches.
    fn watched_foremost(
        &self,
        table: &SubscriptionTable,
        provider: &str,
    ) -> Option<Option<SubscriptionRequest>> {
        if self.watchers.is_empty() {
            None
        } else {
            Some(table.foremost(provider))
        }
    }

    fn notify(
        &self,
        table: &SubscriptionTable,
        provider: &str,
        before: Option<Option<SubscriptionRequest>>,
    ) {
        if let Some(before) = before {
            let after = table.foremost(provider);
            if after != before {
                self.watchers.broadcast_change(provider, after);
            }
        }
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join(LOCK_FILE);
        let lock_file = File::create(lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }
}

impl Drop for SubscriptionStore {
    fn drop(&mut self) {
        self.close();
    }
}
