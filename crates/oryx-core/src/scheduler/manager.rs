//! Live activity registry and the wait-for graph

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::activity::{ActivityHandle, ActivityId};
use crate::{RuntimeError, RuntimeResult};

/// Activity statistics
#[derive(Debug, Clone, Default)]
pub struct ActivityStats {
    /// Total activities created (attached or spawned)
    pub activities_created: u64,

    /// Total activities that have finished
    pub activities_finished: u64,

    /// Currently live activities
    pub live_activities: usize,

    /// Waits refused because they would have deadlocked
    pub deadlocks_detected: u64,
}

/// Tracks live activities and who is waiting on whom
pub struct ActivityManager {
    live: DashMap<ActivityId, ActivityHandle>,
    /// waiter → producer; an activity waits on at most one other at a time
    wait_for: Mutex<FxHashMap<ActivityId, ActivityId>>,
    name_prefix: String,
    deadlock_detection: bool,
    created: AtomicU64,
    finished: AtomicU64,
    deadlocks: AtomicU64,
}

impl ActivityManager {
    /// Create a manager naming its activities `<prefix>-<id>`
    pub fn new(name_prefix: &str, deadlock_detection: bool) -> Self {
        Self {
            live: DashMap::new(),
            wait_for: Mutex::new(FxHashMap::default()),
            name_prefix: name_prefix.to_string(),
            deadlock_detection,
            created: AtomicU64::new(0),
            finished: AtomicU64::new(0),
            deadlocks: AtomicU64::new(0),
        }
    }

    /// Register a fresh activity handle
    pub(crate) fn create_handle(&self) -> ActivityHandle {
        let id = ActivityId::new();
        let handle = ActivityHandle::new(id, format!("{}-{}", self.name_prefix, id.as_u64()));
        self.live.insert(id, handle.clone());
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!(activity = %id, "activity created");
        handle
    }

    /// Forget a finished activity
    pub(crate) fn retire(&self, id: ActivityId) {
        if self.live.remove(&id).is_some() {
            self.finished.fetch_add(1, Ordering::Relaxed);
            debug!(activity = %id, "activity finished");
        }
        self.wait_for.lock().remove(&id);
    }

    /// Look up a live activity
    pub fn get(&self, id: ActivityId) -> Option<ActivityHandle> {
        self.live.get(&id).map(|entry| entry.value().clone())
    }

    /// Number of live activities
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Whether `consumer` waiting on `producer` would close a cycle, i.e.
    /// whether the chain of waits starting at `producer` reaches `consumer`.
    pub fn probe_deadlock(&self, producer: ActivityId, consumer: ActivityId) -> bool {
        let graph = self.wait_for.lock();
        Self::reaches(&graph, producer, consumer)
    }

    fn reaches(
        graph: &FxHashMap<ActivityId, ActivityId>,
        from: ActivityId,
        target: ActivityId,
    ) -> bool {
        let mut current = from;
        // each activity has one outgoing edge, so a walk longer than the
        // graph is a cycle not involving `target`
        for _ in 0..=graph.len() {
            if current == target {
                return true;
            }
            match graph.get(&current) {
                Some(next) => current = *next,
                None => return false,
            }
        }
        false
    }

    /// Record that `waiter` is about to block on `producer`.
    ///
    /// Fails with a deadlock error, leaving the graph unchanged, when the
    /// wait would close a cycle.
    pub(crate) fn begin_wait(&self, waiter: ActivityId, producer: ActivityId) -> RuntimeResult<()> {
        let mut graph = self.wait_for.lock();
        if self.deadlock_detection && Self::reaches(&graph, producer, waiter) {
            self.deadlocks.fetch_add(1, Ordering::Relaxed);
            warn!(waiter = %waiter, producer = %producer, "deadlock detected");
            return Err(RuntimeError::Deadlock { waiter, producer });
        }
        graph.insert(waiter, producer);
        Ok(())
    }

    /// Remove the wait edge of `waiter`
    pub(crate) fn end_wait(&self, waiter: ActivityId) {
        self.wait_for.lock().remove(&waiter);
    }

    /// Remove the edge `waiter → producer`, if that is still the edge of
    /// `waiter`. Called by the releasing side before it wakes the waiter, so
    /// a released activity never counts as waiting; the waiter's own
    /// `end_wait_on` after waking is then a no-op.
    pub(crate) fn end_wait_on(&self, waiter: ActivityId, producer: ActivityId) {
        let mut graph = self.wait_for.lock();
        if graph.get(&waiter) == Some(&producer) {
            graph.remove(&waiter);
        }
    }

    /// Activity `id` is currently waiting on, if any
    pub fn waiting_on(&self, id: ActivityId) -> Option<ActivityId> {
        self.wait_for.lock().get(&id).copied()
    }

    /// Get statistics
    pub fn stats(&self) -> ActivityStats {
        ActivityStats {
            activities_created: self.created.load(Ordering::Relaxed),
            activities_finished: self.finished.load(Ordering::Relaxed),
            live_activities: self.live.len(),
            deadlocks_detected: self.deadlocks.load(Ordering::Relaxed),
        }
    }
}
