//! Dependency Registry
//!
//! Maps `(container, key)` to the ordered set of effects subscribed to it.
//!
//! The registry is keyed by [`TargetId`], an arena index handed out when a
//! container is created. It never owns effects or containers: buckets hold
//! [`EffectId`]s, and a container removes its whole entry through
//! [`DepRegistry::release`] when its last handle is dropped. Empty buckets are
//! pruned eagerly so that a churn of short-lived effects does not leave a trail
//! of empty sets behind.

use std::collections::HashMap;

use indexmap::IndexSet;

use super::subscriber::{DepKey, EffectId, TargetId};

/// Subscriber buckets of a single container, by property key.
type Buckets = HashMap<String, IndexSet<EffectId>>;

/// The `(target, key) -> subscribers` map.
#[derive(Debug, Default)]
pub(crate) struct DepRegistry {
    targets: HashMap<TargetId, Buckets>,
}

impl DepRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `effect` to the bucket for `dep`, creating the bucket if absent.
    ///
    /// Returns `true` if the effect was not already a member.
    pub fn subscribe(&mut self, dep: &DepKey, effect: EffectId) -> bool {
        self.targets
            .entry(dep.target)
            .or_default()
            .entry(dep.key.clone())
            .or_default()
            .insert(effect)
    }

    /// Remove `effect` from the bucket for `dep`.
    pub fn unsubscribe(&mut self, dep: &DepKey, effect: EffectId) {
        let Some(buckets) = self.targets.get_mut(&dep.target) else {
            return;
        };
        if let Some(bucket) = buckets.get_mut(&dep.key) {
            bucket.shift_remove(&effect);
            if bucket.is_empty() {
                buckets.remove(&dep.key);
            }
        }
        if buckets.is_empty() {
            self.targets.remove(&dep.target);
        }
    }

    /// Snapshot the members of `dep`'s bucket, in subscription order.
    ///
    /// Returns `None` when no bucket exists.
    pub fn subscribers(&self, dep: &DepKey) -> Option<Vec<EffectId>> {
        self.targets
            .get(&dep.target)?
            .get(&dep.key)
            .map(|bucket| bucket.iter().copied().collect())
    }

    /// Number of effects in `dep`'s bucket.
    pub fn bucket_len(&self, dep: &DepKey) -> usize {
        self.targets
            .get(&dep.target)
            .and_then(|buckets| buckets.get(&dep.key))
            .map_or(0, IndexSet::len)
    }

    /// Drop every bucket belonging to `target`. Returns how many were dropped.
    pub fn release(&mut self, target: TargetId) -> usize {
        self.targets.remove(&target).map_or(0, |buckets| buckets.len())
    }

    /// Number of containers that currently have at least one bucket.
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_creates_bucket_once() {
        let mut registry = DepRegistry::new();
        let dep = DepKey::new(TargetId::new(), "count");
        let effect = EffectId::new();

        assert!(registry.subscribe(&dep, effect));
        assert!(!registry.subscribe(&dep, effect));
        assert_eq!(registry.bucket_len(&dep), 1);
    }

    #[test]
    fn subscribers_preserve_order() {
        let mut registry = DepRegistry::new();
        let dep = DepKey::new(TargetId::new(), "count");
        let ids: Vec<_> = (0..4).map(|_| EffectId::new()).collect();
        for id in ids.iter().rev() {
            registry.subscribe(&dep, *id);
        }

        let expected: Vec<_> = ids.iter().rev().copied().collect();
        assert_eq!(registry.subscribers(&dep), Some(expected));
    }

    #[test]
    fn missing_bucket_is_none() {
        let registry = DepRegistry::new();
        assert!(registry.subscribers(&DepKey::new(TargetId::new(), "x")).is_none());
    }

    #[test]
    fn unsubscribe_prunes_empty_buckets() {
        let mut registry = DepRegistry::new();
        let dep = DepKey::new(TargetId::new(), "count");
        let effect = EffectId::new();

        registry.subscribe(&dep, effect);
        assert_eq!(registry.target_count(), 1);

        registry.unsubscribe(&dep, effect);
        assert_eq!(registry.target_count(), 0);
        assert!(registry.subscribers(&dep).is_none());
    }

    #[test]
    fn release_drops_all_keys_of_a_target() {
        let mut registry = DepRegistry::new();
        let target = TargetId::new();
        let other = DepKey::new(TargetId::new(), "a");
        let effect = EffectId::new();

        registry.subscribe(&DepKey::new(target, "a"), effect);
        registry.subscribe(&DepKey::new(target, "b"), effect);
        registry.subscribe(&other, effect);

        assert_eq!(registry.release(target), 2);
        assert_eq!(registry.target_count(), 1);
        assert_eq!(registry.bucket_len(&other), 1);
    }
}
