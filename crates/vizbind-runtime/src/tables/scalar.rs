#![forbid(unsafe_code)]

//! Deduplicating table of scalar mappings.
//!
//! Any number of adapters may ask for structurally equal mappings; the
//! first one registered becomes the controller and the rest duplicate it.
//! Only controllers are pushed to the display, since the display can bind
//! a single control per quantity and axis.
//!
//! # Invariants
//!
//! 1. At most one controller per mapping key.
//! 2. Every key in the table maps to an adapter whose own mapping has that key.
//! 3. Removing a duplicate leaves the table unchanged.
//! 4. Removing a controller that still has live duplicates promotes the
//!    oldest of them instead of dropping the binding.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, warn};

use crate::updater::Waker;
use vizbind_core::{
    AdapterId, ChangeEvent, Display, DisplayError, ListenerId, ScalarMapAdapter, ScalarMapping,
    lock,
};

#[derive(Debug)]
struct Registration {
    adapter: Weak<ScalarMapAdapter>,
    listener: ListenerId,
}

#[derive(Debug, Default)]
struct ScalarInner {
    map: BTreeMap<ScalarMapping, Weak<ScalarMapAdapter>>,
    /// Every accepted adapter, controller or duplicate, oldest first.
    registered: BTreeMap<AdapterId, Registration>,
    changed: bool,
}

impl ScalarInner {
    fn is_controller(&self, key: &ScalarMapping, adapter: &Arc<ScalarMapAdapter>) -> bool {
        self.map
            .get(key)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(adapter)))
    }

    /// Hand `key` to the oldest live registered adapter still bound to it.
    /// Returns `true` if someone took over.
    fn promote(&mut self, key: &ScalarMapping) -> bool {
        let candidates: Vec<Arc<ScalarMapAdapter>> = self
            .registered
            .values()
            .filter_map(|reg| reg.adapter.upgrade())
            .filter(|adapter| adapter.mapping() == *key)
            .collect();
        let Some(heir) = candidates.first() else {
            return false;
        };
        heir.become_controller();
        for other in &candidates[1..] {
            other.duplicate(heir);
        }
        debug!(
            adapter = heir.id().get(),
            quantity = %key.quantity,
            axis = %key.axis,
            "scalar mapping controller promoted"
        );
        self.map.insert(heir.mapping(), Arc::downgrade(heir));
        true
    }
}

/// Table of scalar mappings keyed by `(quantity, axis)`.
#[derive(Debug)]
pub struct ScalarMapTable {
    inner: Mutex<ScalarInner>,
    waker: Waker,
    weak_self: Weak<ScalarMapTable>,
}

impl ScalarMapTable {
    pub fn new(waker: Waker) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            inner: Mutex::new(ScalarInner::default()),
            waker,
            weak_self: weak_self.clone(),
        })
    }

    /// Register `adapter` and return the controller for its mapping.
    ///
    /// If an equal mapping is already registered, `adapter` duplicates that
    /// mapping's controller, which is returned. Otherwise `adapter` becomes
    /// the controller. Either way the table follows later changes to
    /// `adapter`'s mapping.
    pub fn accept(&self, adapter: &Arc<ScalarMapAdapter>) -> Arc<ScalarMapAdapter> {
        let already = lock(&self.inner).registered.contains_key(&adapter.id());
        if !already {
            let weak = self.weak_self.clone();
            let listener = adapter.add_listener(move |event| {
                if let (Some(table), ChangeEvent::ScalarMap { source, old, .. }) =
                    (weak.upgrade(), event)
                {
                    table.renegotiate(*source, old);
                }
            });
            let replaced = lock(&self.inner).registered.insert(
                adapter.id(),
                Registration {
                    adapter: Arc::downgrade(adapter),
                    listener,
                },
            );
            if let Some(previous) = replaced {
                // Lost a race with a concurrent accept of the same adapter.
                adapter.remove_listener(previous.listener);
            }
        }
        self.resolve(adapter, None)
    }

    /// Unregister `adapter`.
    ///
    /// The table changes only if `adapter` controls its mapping.
    pub fn remove(&self, adapter: &Arc<ScalarMapAdapter>) {
        let changed = {
            let mut inner = lock(&self.inner);
            if let Some(reg) = inner.registered.remove(&adapter.id()) {
                adapter.remove_listener(reg.listener);
            }
            let key = adapter.mapping();
            if inner.is_controller(&key, adapter) {
                inner.map.remove(&key);
                inner.promote(&key);
                inner.changed = true;
                debug!(
                    adapter = adapter.id().get(),
                    quantity = %key.quantity,
                    axis = %key.axis,
                    "scalar mapping controller removed"
                );
                true
            } else {
                false
            }
        };
        if changed {
            self.waker.update();
        }
    }

    /// Re-resolve an adapter whose mapping changed from `old`.
    fn renegotiate(&self, source: AdapterId, old: &ScalarMapping) {
        let adapter = lock(&self.inner)
            .registered
            .get(&source)
            .and_then(|reg| reg.adapter.upgrade());
        match adapter {
            Some(adapter) => {
                self.resolve(&adapter, Some(old));
            }
            None => warn!(adapter = source.get(), "change from unregistered scalar adapter"),
        }
    }

    fn resolve(
        &self,
        source: &Arc<ScalarMapAdapter>,
        old: Option<&ScalarMapping>,
    ) -> Arc<ScalarMapAdapter> {
        let (controller, changed) = {
            let mut inner = lock(&self.inner);
            let mut changed = false;

            if let Some(old) = old
                && inner.is_controller(old, source)
            {
                inner.map.remove(old);
                let key = source.mapping();
                // A range change keeps the key; the source stays in charge.
                if key != *old {
                    inner.promote(old);
                }
                changed = true;
            }

            let key = source.mapping();
            let existing = inner.map.get(&key).and_then(Weak::upgrade);
            let controller = match existing {
                Some(existing) if !Arc::ptr_eq(&existing, source) => {
                    source.duplicate(&existing);
                    debug!(
                        adapter = source.id().get(),
                        controller = existing.id().get(),
                        quantity = %key.quantity,
                        axis = %key.axis,
                        "scalar mapping coalesced"
                    );
                    existing
                }
                Some(existing) => existing,
                None => {
                    source.become_controller();
                    inner.map.insert(key, Arc::downgrade(source));
                    changed = true;
                    Arc::clone(source)
                }
            };
            if changed {
                inner.changed = true;
            }
            (controller, changed)
        };
        if changed {
            self.waker.update();
        }
        controller
    }

    /// Whether the table changed since the last `set_display`.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        lock(&self.inner).changed
    }

    /// Controller registered for `mapping`'s key.
    #[must_use]
    pub fn controller_for(&self, mapping: &ScalarMapping) -> Option<Arc<ScalarMapAdapter>> {
        lock(&self.inner).map.get(mapping).and_then(Weak::upgrade)
    }

    /// Current controller mappings, ordered by key.
    #[must_use]
    pub fn mappings(&self) -> Vec<ScalarMapping> {
        lock(&self.inner)
            .map
            .values()
            .filter_map(Weak::upgrade)
            .map(|adapter| adapter.mapping())
            .collect()
    }

    /// Number of distinct mapping keys.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of accepted adapters, duplicates included.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        lock(&self.inner).registered.len()
    }

    /// Push every controller mapping to the display and clear the dirty flag.
    ///
    /// Called by the updater only.
    pub fn set_display(&self, display: &mut dyn Display) -> Result<(), DisplayError> {
        let mut inner = lock(&self.inner);

        inner
            .registered
            .retain(|_, reg| reg.adapter.strong_count() > 0);
        let dead: Vec<ScalarMapping> = inner
            .map
            .iter()
            .filter(|(_, weak)| weak.strong_count() == 0)
            .map(|(key, _)| key.clone())
            .collect();
        for key in dead {
            warn!(
                quantity = %key.quantity,
                axis = %key.axis,
                "scalar mapping controller dropped without removal"
            );
            inner.map.remove(&key);
            inner.promote(&key);
        }

        for adapter in inner.map.values().filter_map(Weak::upgrade) {
            adapter.set_display(display)?;
        }
        inner.changed = false;
        Ok(())
    }
}
