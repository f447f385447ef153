//! Arena of stored subscriptions.

use crate::foremost::fold_foremost;
use crate::types::{StoredSubscription, SubscriptionId, SubscriptionRequest};
use std::collections::{BTreeMap, BTreeSet};

/// Table of active subscription requests.
///
/// Not synchronized; the owning store serializes access.
#[derive(Clone, Debug)]
pub struct SubscriptionTable {
    /// Active rows, ordered by id (oldest first).
    rows: BTreeMap<SubscriptionId, SubscriptionRequest>,

    /// Next id to assign. Never decreases, not even on clear.
    next_id: SubscriptionId,
}

impl SubscriptionTable {
    /// Create an empty table whose first id is 1.
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: SubscriptionId(1),
        }
    }

    /// Id the next insert will receive.
    pub fn next_id(&self) -> SubscriptionId {
        self.next_id
    }

    /// Make sure no id below `id` is handed out again.
    pub fn advance_next_id(&mut self, id: SubscriptionId) {
        if id > self.next_id {
            self.next_id = id;
        }
    }

    /// Insert a request under a freshly allocated id.
    ///
    /// Identical requests are not merged; each call creates a new row.
    #[cfg(test)]
    pub(crate) fn insert(&mut self, request: SubscriptionRequest) -> SubscriptionId {
        let id = self.next_id;
        self.insert_with_id(id, request);
        id
    }

    /// Insert a row whose id was decided elsewhere (journal replay, or an id
    /// reserved with `next_id` before journaling).
    pub fn insert_with_id(&mut self, id: SubscriptionId, request: SubscriptionRequest) {
        self.rows.insert(id, request);
        self.advance_next_id(id.next());
    }

    /// Smallest id whose request equals `request` exactly.
    pub fn find_matching_id(&self, request: &SubscriptionRequest) -> Option<SubscriptionId> {
        self.rows
            .iter()
            .find(|(_, stored)| *stored == request)
            .map(|(id, _)| *id)
    }

    /// Remove a row by id.
    pub fn remove(&mut self, id: SubscriptionId) -> Option<SubscriptionRequest> {
        self.rows.remove(&id)
    }

    /// Remove the oldest row matching `request`, if any.
    #[cfg(test)]
    pub(crate) fn delete(&mut self, request: &SubscriptionRequest) -> Option<SubscriptionId> {
        let id = self.find_matching_id(request)?;
        self.rows.remove(&id);
        Some(id)
    }

    /// Foremost configuration for `provider`, or `None` without subscribers.
    pub fn foremost(&self, provider: &str) -> Option<SubscriptionRequest> {
        fold_foremost(provider, self.rows.values())
    }

    /// Drop every row. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.rows.len();
        self.rows.clear();
        removed
    }

    /// Distinct providers with at least one row, sorted.
    pub fn providers(&self) -> Vec<String> {
        self.rows
            .values()
            .map(|request| request.provider.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Iterate rows in id order.
    pub fn iter(&self) -> impl Iterator<Item = (SubscriptionId, &SubscriptionRequest)> + '_ {
        self.rows.iter().map(|(id, request)| (*id, request))
    }

    /// Owned copy of every row in id order.
    pub fn snapshot(&self) -> Vec<StoredSubscription> {
        self.iter()
            .map(|(id, request)| StoredSubscription {
                id,
                request: request.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for SubscriptionTable {
    fn default() -> Self {
        Self::new()
    }
}
