// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-holder cache of computed permission and meta data.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tracing::trace;
use warden_core::QueryOptions;

use crate::calculator::PermissionData;
use crate::holder::HolderId;
use crate::meta::MetaData;

/// Kind of a cached result.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Permission,
    Meta,
}

type Key = (HolderId, QueryOptions);

type Slot<V> = Arc<OnceLock<Arc<V>>>;

#[derive(Debug)]
struct Slots<V>(Mutex<HashMap<Key, Slot<V>>>);

impl<V> Default for Slots<V> {
    fn default() -> Self {
        Self(Mutex::new(HashMap::new()))
    }
}

impl<V> Slots<V> {
    fn lock(&self) -> MutexGuard<'_, HashMap<Key, Slot<V>>> {
        self.0.lock().expect("acquire exclusive access on cache slots")
    }

    /// Returns the slot for a key, creating an empty one if needed.
    fn slot(&self, holder: &HolderId, query: &QueryOptions) -> Slot<V> {
        self.lock()
            .entry((holder.clone(), query.clone()))
            .or_default()
            .clone()
    }

    fn is_filled(&self, holder: &HolderId, query: &QueryOptions) -> bool {
        self.lock()
            .get(&(holder.clone(), query.clone()))
            .is_some_and(|slot| slot.get().is_some())
    }

    fn retain<F>(&self, predicate: F) -> usize
    where
        F: Fn(&HolderId) -> bool,
    {
        let mut slots = self.lock();
        let before = slots.len();
        slots.retain(|(holder, _), _| predicate(holder));
        before - slots.len()
    }
}

/// Cache of resolved results keyed by holder and query.
///
/// Structurally equal queries share one entry. The map lock is only held to look up or create an
/// entry, the computation itself runs outside of it. Concurrent requests for the same missing
/// entry converge on one computation, the other callers wait for its result.
///
/// An entry dropped while its value is being computed is not refilled, the computing caller still
/// receives its result.
#[derive(Debug, Default)]
pub struct ResolvedDataCache {
    permissions: Slots<PermissionData>,
    meta: Slots<MetaData>,
    computations: AtomicU64,
}

impl ResolvedDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached permission data or computes and caches it.
    pub fn get_or_compute_permissions<F>(
        &self,
        holder: &HolderId,
        query: &QueryOptions,
        compute: F,
    ) -> Arc<PermissionData>
    where
        F: FnOnce() -> PermissionData,
    {
        let slot = self.permissions.slot(holder, query);
        slot.get_or_init(|| self.compute(holder, CacheKind::Permission, compute))
            .clone()
    }

    /// Returns the cached meta data or computes and caches it.
    pub fn get_or_compute_meta<F>(
        &self,
        holder: &HolderId,
        query: &QueryOptions,
        compute: F,
    ) -> Arc<MetaData>
    where
        F: FnOnce() -> MetaData,
    {
        let slot = self.meta.slot(holder, query);
        slot.get_or_init(|| self.compute(holder, CacheKind::Meta, compute))
            .clone()
    }

    fn compute<V, F>(&self, holder: &HolderId, kind: CacheKind, compute: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        trace!(%holder, ?kind, "computing cache entry");
        self.computations.fetch_add(1, Ordering::Relaxed);
        Arc::new(compute())
    }

    pub fn is_cached(&self, holder: &HolderId, query: &QueryOptions, kind: CacheKind) -> bool {
        match kind {
            CacheKind::Permission => self.permissions.is_filled(holder, query),
            CacheKind::Meta => self.meta.is_filled(holder, query),
        }
    }

    /// Drops all entries of one holder, returns how many were dropped.
    pub fn invalidate_holder(&self, holder: &HolderId) -> usize {
        let removed = self.permissions.retain(|id| id != holder) + self.meta.retain(|id| id != holder);
        if removed > 0 {
            trace!(%holder, removed, "cache entries invalidated");
        }
        removed
    }

    /// Drops the entries of all users.
    pub fn invalidate_users(&self) -> usize {
        self.permissions.retain(|id| !id.is_user()) + self.meta.retain(|id| !id.is_user())
    }

    pub fn invalidate_all(&self) -> usize {
        self.permissions.retain(|_| false) + self.meta.retain(|_| false)
    }

    /// Number of computations performed since this cache was created.
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }
}
