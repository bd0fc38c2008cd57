//! Registry of live sliding window counters.

use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use super::counter::{SlidingWindowCounter, WindowSettings};
use super::key::WindowKey;

/// A registered counter together with the task that rotates it.
struct Slot {
    counter: Arc<SlidingWindowCounter>,
    rotation: JoinHandle<()>,
}

struct RegistryInner {
    counters: DashMap<WindowKey, Slot>,
    settings: WindowSettings,
}

impl RegistryInner {
    /// Remove `counter` from the map if it is still the one registered under
    /// `key` and is still idle.
    ///
    /// Returns `true` when the rotation task should stop: either the counter
    /// expired, or it is no longer registered at all.
    fn expire(&self, key: &WindowKey, counter: &Arc<SlidingWindowCounter>) -> bool {
        // `remove_if` holds the shard lock while the predicate runs, the same
        // lock `WindowRegistry::record` holds while incrementing.
        let removed = self
            .counters
            .remove_if(key, |_, slot| {
                Arc::ptr_eq(&slot.counter, counter) && counter.try_expire()
            });

        if removed.is_some() {
            debug!(key = %key, "Expired idle counter");
            return true;
        }

        !self
            .counters
            .get(key)
            .is_some_and(|slot| Arc::ptr_eq(&slot.counter, counter))
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        for slot in self.counters.iter() {
            slot.rotation.abort();
        }
    }
}

/// A concurrent map from [`WindowKey`] to its live [`SlidingWindowCounter`].
///
/// At most one counter is registered per key. Each registered counter has
/// exactly one rotation task running on the Tokio runtime; the task removes
/// its counter once a rotation leaves it idle. Cloning the registry yields
/// another handle to the same map.
///
/// Creating counters spawns tasks, so the registry must be used from within
/// a Tokio runtime.
#[derive(Clone)]
pub struct WindowRegistry {
    inner: Arc<RegistryInner>,
}

impl WindowRegistry {
    /// Create an empty registry.
    pub fn new(settings: WindowSettings) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                counters: DashMap::new(),
                settings,
            }),
        }
    }

    /// Timing parameters used for new counters.
    pub fn settings(&self) -> WindowSettings {
        self.inner.settings
    }

    /// Return the counter registered for `key`, creating it if needed.
    ///
    /// Incrementing the returned counter directly can race with its expiry
    /// and be lost; count events through [`WindowRegistry::record`].
    pub fn get_or_create(&self, key: &WindowKey) -> Arc<SlidingWindowCounter> {
        Arc::clone(&self.slot(key).counter)
    }

    /// Record one event for `key` and return its counter.
    ///
    /// The increment happens while the map entry is locked, so it can never
    /// land on a counter that is concurrently being expired.
    pub fn record(&self, key: &WindowKey) -> Arc<SlidingWindowCounter> {
        let slot = self.slot(key);
        slot.counter.increment();
        Arc::clone(&slot.counter)
    }

    /// Evict whatever counter is registered for `key` and stop its rotation
    /// task. Returns whether an entry existed.
    pub fn remove(&self, key: &WindowKey) -> bool {
        match self.inner.counters.remove(key) {
            Some((_, slot)) => {
                slot.rotation.abort();
                debug!(key = %key, "Removed counter");
                true
            }
            None => false,
        }
    }

    /// The counter registered for `key`, if any. Never creates one.
    pub fn get(&self, key: &WindowKey) -> Option<Arc<SlidingWindowCounter>> {
        self.inner
            .counters
            .get(key)
            .map(|slot| Arc::clone(&slot.counter))
    }

    /// Whether a counter is currently registered for `key`.
    pub fn contains(&self, key: &WindowKey) -> bool {
        self.inner.counters.contains_key(key)
    }

    /// Number of registered counters.
    pub fn len(&self) -> usize {
        self.inner.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.counters.is_empty()
    }

    fn slot(&self, key: &WindowKey) -> RefMut<'_, WindowKey, Slot> {
        self.inner
            .counters
            .entry(key.clone())
            .or_insert_with(|| self.spawn_slot(key))
    }

    fn spawn_slot(&self, key: &WindowKey) -> Slot {
        let settings = self.inner.settings;
        let counter = Arc::new(SlidingWindowCounter::new(settings.length));

        debug!(
            key = %key,
            window_ms = settings.length.as_millis() as u64,
            "Creating new sliding window counter"
        );

        let rotation = tokio::spawn(rotate(
            Arc::downgrade(&self.inner),
            key.clone(),
            Arc::clone(&counter),
            settings,
        ));

        Slot { counter, rotation }
    }
}

impl Default for WindowRegistry {
    fn default() -> Self {
        Self::new(WindowSettings::default())
    }
}

impl std::fmt::Debug for WindowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowRegistry")
            .field("counters", &self.len())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

/// Rotation loop for a single counter. Ends once the counter expires, or
/// when the registry that owns it is gone.
async fn rotate(
    registry: Weak<RegistryInner>,
    key: WindowKey,
    counter: Arc<SlidingWindowCounter>,
    settings: WindowSettings,
) {
    let mut ticker = time::interval_at(Instant::now() + settings.tick, settings.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !counter.rotate_if_due(Instant::now()) {
            continue;
        }
        trace!(key = %key, previous = counter.previous_count(), "Rotated window");

        if !counter.is_idle() {
            continue;
        }

        let Some(inner) = registry.upgrade() else {
            return;
        };
        if inner.expire(&key, &counter) {
            return;
        }
    }
}
