#![forbid(unsafe_code)]

//! Display-wide constant bindings.
//!
//! Each registered [`ConstantMaps`] set contributes its members to one
//! aggregate that goes to the display in a single call. An axis may be
//! bound by at most one registered set; a set that would bind an axis
//! already bound by a different set is rejected and the table is left as
//! it was.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, warn};

use crate::updater::Waker;
use vizbind_core::{
    AdapterId, BindingError, ConstantMapping, ConstantMaps, Display, DisplayAxis, DisplayError,
    ListenerId, lock,
};

/// Registration-ordered collection of constant sets with axis exclusivity.
#[derive(Debug, Default)]
pub struct ConstantMapComposite {
    sets: Vec<(AdapterId, Weak<ConstantMaps>)>,
}

impl ConstantMapComposite {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `maps` is registered.
    #[must_use]
    pub fn contains(&self, maps: &ConstantMaps) -> bool {
        self.sets.iter().any(|(id, _)| *id == maps.id())
    }

    /// Axes bound by live registered sets other than `except`.
    fn bound_axes(&self, except: Option<AdapterId>) -> BTreeSet<DisplayAxis> {
        self.sets
            .iter()
            .filter(|(id, _)| Some(*id) != except)
            .filter_map(|(_, weak)| weak.upgrade())
            .flat_map(|maps| maps.axes())
            .collect()
    }

    /// Fail if `maps` binds an axis some other registered set binds.
    pub fn check(&self, maps: &ConstantMaps) -> Result<(), BindingError> {
        let bound = self.bound_axes(Some(maps.id()));
        match maps.axes().into_iter().find(|axis| bound.contains(axis)) {
            Some(axis) => Err(BindingError::DuplicateAxis { axis }),
            None => Ok(()),
        }
    }

    /// Register `maps`. Returns `false` if it was already registered.
    pub fn add(&mut self, maps: &Arc<ConstantMaps>) -> Result<bool, BindingError> {
        self.check(maps)?;
        if self.contains(maps) {
            return Ok(false);
        }
        self.sets.push((maps.id(), Arc::downgrade(maps)));
        Ok(true)
    }

    /// Register every set in `batch`, or none of them.
    ///
    /// Sets in the batch are checked against the table and against each
    /// other. Returns the sets that were not already registered.
    pub fn add_all(
        &mut self,
        batch: &[Arc<ConstantMaps>],
    ) -> Result<Vec<Arc<ConstantMaps>>, BindingError> {
        let mut claimed = BTreeMap::new();
        for maps in batch {
            self.check(maps)?;
            for axis in maps.axes() {
                if let Some(owner) = claimed.insert(axis.clone(), maps.id())
                    && owner != maps.id()
                {
                    return Err(BindingError::DuplicateAxis { axis });
                }
            }
        }
        let mut added = Vec::new();
        for maps in batch {
            if !self.contains(maps) {
                self.sets.push((maps.id(), Arc::downgrade(maps)));
                added.push(Arc::clone(maps));
            }
        }
        Ok(added)
    }

    /// Unregister `maps`. Returns `false` if it was not registered.
    pub fn remove(&mut self, maps: &ConstantMaps) -> bool {
        let before = self.sets.len();
        self.sets.retain(|(id, _)| *id != maps.id());
        self.sets.len() != before
    }

    /// Drop sets whose last handle is gone. Returns how many were dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.sets.len();
        self.sets.retain(|(_, weak)| weak.strong_count() > 0);
        before - self.sets.len()
    }

    /// Every binding of every live set, in registration order.
    ///
    /// A member value change can make two sets bind the same axis after both
    /// were registered. The earlier set keeps the axis.
    #[must_use]
    pub fn aggregated(&self) -> Vec<ConstantMapping> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for (id, weak) in &self.sets {
            let Some(maps) = weak.upgrade() else {
                continue;
            };
            for mapping in maps.mappings() {
                if seen.insert(mapping.axis.clone()) {
                    out.push(mapping);
                } else {
                    warn!(
                        set = id.get(),
                        axis = %mapping.axis,
                        "constant axis bound by an earlier set; binding skipped"
                    );
                }
            }
        }
        out
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[derive(Debug, Default)]
struct ConstantInner {
    composite: ConstantMapComposite,
    listeners: BTreeMap<AdapterId, ListenerId>,
    changed: bool,
}

/// Table of constant bindings shared by everything on one display.
#[derive(Debug)]
pub struct ConstantMapTable {
    inner: Mutex<ConstantInner>,
    waker: Waker,
    weak_self: Weak<ConstantMapTable>,
}

impl ConstantMapTable {
    pub fn new(waker: Waker) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            inner: Mutex::new(ConstantInner::default()),
            waker,
            weak_self: weak_self.clone(),
        })
    }

    /// Register a constant set.
    ///
    /// Fails with [`BindingError::DuplicateAxis`] if another registered set
    /// binds one of its axes; the table is unchanged in that case.
    pub fn add(&self, maps: &Arc<ConstantMaps>) -> Result<(), BindingError> {
        {
            let mut inner = lock(&self.inner);
            if !inner.composite.add(maps)? {
                return Ok(());
            }
            let listener = self.listen(maps);
            inner.listeners.insert(maps.id(), listener);
            inner.changed = true;
        }
        debug!(set = maps.id().get(), axes = maps.len(), "constant set added");
        self.waker.update();
        Ok(())
    }

    /// Register several constant sets atomically.
    pub fn add_all(&self, batch: &[Arc<ConstantMaps>]) -> Result<(), BindingError> {
        {
            let mut inner = lock(&self.inner);
            let added = inner.composite.add_all(batch)?;
            if added.is_empty() {
                return Ok(());
            }
            for maps in &added {
                let listener = self.listen(maps);
                inner.listeners.insert(maps.id(), listener);
            }
            inner.changed = true;
            debug!(sets = added.len(), "constant sets added");
        }
        self.waker.update();
        Ok(())
    }

    /// Unregister a constant set and detach from it.
    pub fn remove(&self, maps: &Arc<ConstantMaps>) {
        let removed = {
            let mut inner = lock(&self.inner);
            if let Some(listener) = inner.listeners.remove(&maps.id()) {
                maps.remove_listener(listener);
            }
            let removed = inner.composite.remove(maps);
            if removed {
                inner.changed = true;
            }
            removed
        };
        if removed {
            debug!(set = maps.id().get(), "constant set removed");
            self.waker.update();
        }
    }

    fn listen(&self, maps: &Arc<ConstantMaps>) -> ListenerId {
        let weak = self.weak_self.clone();
        maps.add_listener(move |_| {
            if let Some(table) = weak.upgrade() {
                table.mark_changed();
            }
        })
    }

    fn mark_changed(&self) {
        lock(&self.inner).changed = true;
        self.waker.update();
    }

    /// Whether the table changed since the last `set_display`.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        lock(&self.inner).changed
    }

    /// The bindings the next pass will send, in registration order.
    #[must_use]
    pub fn aggregated(&self) -> Vec<ConstantMapping> {
        lock(&self.inner).composite.aggregated()
    }

    /// Number of registered sets.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.inner).composite.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push the aggregate binding set to the display and clear the dirty flag.
    ///
    /// Called by the updater only. An empty aggregate makes no display call.
    pub fn set_display(&self, display: &mut dyn Display) -> Result<(), DisplayError> {
        let mut inner = lock(&self.inner);
        let pruned = inner.composite.prune();
        if pruned > 0 {
            warn!(pruned, "constant sets dropped without removal");
            let live: BTreeSet<AdapterId> =
                inner.composite.sets.iter().map(|(id, _)| *id).collect();
            inner.listeners.retain(|id, _| live.contains(id));
        }
        let aggregate = inner.composite.aggregated();
        if !aggregate.is_empty() {
            display.add_constant_maps(&aggregate)?;
        }
        inner.changed = false;
        Ok(())
    }
}
