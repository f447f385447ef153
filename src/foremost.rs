//! Folding many requests for one provider into the foremost configuration.
//!
//! The foremost configuration is the least restrictive one that still
//! satisfies every active requester: the smallest delay anyone asked for and
//! the smallest distance anyone asked for. The two minima are taken
//! independently, so the result need not equal any single stored request.

use crate::types::SubscriptionRequest;

/// Running minimum over a set of requests.
///
/// `merge` is associative and commutative, so any iteration order and any
/// grouping of partial folds gives the same result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Foremost {
    pub max_delay: u64,
    pub min_distance: f64,
}

impl Foremost {
    /// Accumulator seeded from a single request.
    pub fn of(request: &SubscriptionRequest) -> Self {
        Self {
            max_delay: request.max_delay,
            min_distance: request.min_distance,
        }
    }

    /// Combine two partial results.
    pub fn merge(self, other: Self) -> Self {
        Self {
            max_delay: self.max_delay.min(other.max_delay),
            min_distance: self.min_distance.min(other.min_distance),
        }
    }

    /// Materialize as a synthetic request for `provider`.
    pub fn into_request(self, provider: impl Into<String>) -> SubscriptionRequest {
        SubscriptionRequest {
            provider: provider.into(),
            max_delay: self.max_delay,
            min_distance: self.min_distance,
        }
    }
}

/// Fold every request for `provider` into its foremost configuration.
///
/// Provider names are compared exactly. Returns `None` when no request
/// names the provider, meaning nobody needs updates from it any more.
pub fn fold_foremost<'a, I>(provider: &str, requests: I) -> Option<SubscriptionRequest>
where
    I: IntoIterator<Item = &'a SubscriptionRequest>,
{
    requests
        .into_iter()
        .filter(|request| request.provider == provider)
        .map(Foremost::of)
        .reduce(Foremost::merge)
        .map(|acc| acc.into_request(provider))
}
