#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use super::MapAdapter;
use crate::axis::DisplayAxis;
use crate::error::BindingError;
use crate::event::{ChangeEvent, ListenerId, Listeners};
use crate::id::{AdapterId, IdAllocator};
use crate::lock;
use crate::mapping::ConstantMapping;

/// Adapter around a single constant binding.
#[derive(Debug)]
pub struct ConstantMapAdapter {
    base: MapAdapter,
    value: Mutex<f64>,
}

impl ConstantMapAdapter {
    pub fn new(ids: &IdAllocator, axis: DisplayAxis, value: f64) -> Arc<Self> {
        Arc::new(Self {
            base: MapAdapter::new(ids.next_id(), axis),
            value: Mutex::new(value),
        })
    }

    #[must_use]
    pub fn id(&self) -> AdapterId {
        self.base.id()
    }

    #[must_use]
    pub fn axis(&self) -> &DisplayAxis {
        self.base.axis()
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        *lock(&self.value)
    }

    #[must_use]
    pub fn mapping(&self) -> ConstantMapping {
        ConstantMapping::new(self.axis().clone(), self.value())
    }

    /// Change the value; listeners hear about it only if it differs.
    pub fn set_value(&self, value: f64) {
        let old = {
            let mut current = lock(&self.value);
            if current.to_bits() == value.to_bits() {
                return;
            }
            std::mem::replace(&mut *current, value)
        };
        self.base.fire_change(&ChangeEvent::ConstantMap {
            source: self.id(),
            axis: self.axis().clone(),
            old,
            new: value,
        });
    }

    pub fn add_listener(&self, f: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> ListenerId {
        self.base.add_listener(f)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.base.remove_listener(id)
    }
}

#[derive(Debug)]
struct Member {
    adapter: Arc<ConstantMapAdapter>,
    listener: ListenerId,
}

/// A set of constant bindings with at most one value per axis.
///
/// Changes to any member are re-announced as
/// [`ChangeEvent::ConstantMaps`] with this set as the source.
#[derive(Debug)]
pub struct ConstantMaps {
    id: AdapterId,
    ids: IdAllocator,
    weak_self: Weak<ConstantMaps>,
    members: Mutex<BTreeMap<DisplayAxis, Member>>,
    listeners: Listeners,
}

impl ConstantMaps {
    /// An empty set.
    pub fn new(ids: &IdAllocator) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            id: ids.next_id(),
            ids: ids.clone(),
            weak_self: weak_self.clone(),
            members: Mutex::new(BTreeMap::new()),
            listeners: Listeners::new(),
        })
    }

    /// A set holding one constant.
    pub fn single(ids: &IdAllocator, axis: DisplayAxis, value: f64) -> Arc<Self> {
        let maps = Self::new(ids);
        maps.attach(ConstantMapAdapter::new(ids, axis, value));
        maps
    }

    /// A set built from plain mappings; fails if two share an axis.
    pub fn from_mappings(
        ids: &IdAllocator,
        mappings: impl IntoIterator<Item = ConstantMapping>,
    ) -> Result<Arc<Self>, BindingError> {
        let maps = Self::new(ids);
        for mapping in mappings {
            maps.insert(ConstantMapAdapter::new(ids, mapping.axis, mapping.value))?;
        }
        Ok(maps)
    }

    #[must_use]
    pub fn id(&self) -> AdapterId {
        self.id
    }

    /// Add a member. Fails if its axis is already bound in this set.
    pub fn insert(&self, adapter: Arc<ConstantMapAdapter>) -> Result<(), BindingError> {
        let listener = self.forward_from(&adapter);
        {
            let mut members = lock(&self.members);
            if members.contains_key(adapter.axis()) {
                drop(members);
                adapter.remove_listener(listener);
                return Err(BindingError::DuplicateAxis {
                    axis: adapter.axis().clone(),
                });
            }
            members.insert(adapter.axis().clone(), Member { adapter, listener });
        }
        self.fire();
        Ok(())
    }

    /// Set the value for `axis`, adding a member if the axis is unbound.
    pub fn set(&self, axis: DisplayAxis, value: f64) {
        let existing = lock(&self.members)
            .get(&axis)
            .map(|member| Arc::clone(&member.adapter));
        match existing {
            // The member's own event is forwarded by the attached listener.
            Some(adapter) => adapter.set_value(value),
            None => {
                self.attach(ConstantMapAdapter::new(&self.ids, axis, value));
                self.fire();
            }
        }
    }

    /// Unbind `axis`. Returns `false` if it was not bound here.
    pub fn remove_axis(&self, axis: &DisplayAxis) -> bool {
        let removed = lock(&self.members).remove(axis);
        match removed {
            Some(member) => {
                member.adapter.remove_listener(member.listener);
                self.fire();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn value(&self, axis: &DisplayAxis) -> Option<f64> {
        lock(&self.members)
            .get(axis)
            .map(|member| member.adapter.value())
    }

    /// Snapshot of the bindings, ordered by axis.
    #[must_use]
    pub fn mappings(&self) -> Vec<ConstantMapping> {
        lock(&self.members)
            .values()
            .map(|member| member.adapter.mapping())
            .collect()
    }

    #[must_use]
    pub fn axes(&self) -> Vec<DisplayAxis> {
        lock(&self.members).keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.members).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add_listener(&self, f: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> ListenerId {
        self.listeners.add(f)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn attach(&self, adapter: Arc<ConstantMapAdapter>) {
        let listener = self.forward_from(&adapter);
        let replaced =
            lock(&self.members).insert(adapter.axis().clone(), Member { adapter, listener });
        if let Some(member) = replaced {
            member.adapter.remove_listener(member.listener);
        }
    }

    fn forward_from(&self, adapter: &ConstantMapAdapter) -> ListenerId {
        let weak = self.weak_self.clone();
        adapter.add_listener(move |_| {
            if let Some(maps) = weak.upgrade() {
                maps.fire();
            }
        })
    }

    fn fire(&self) {
        self.listeners
            .fire(&ChangeEvent::ConstantMaps { source: self.id });
    }
}

impl Drop for ConstantMaps {
    fn drop(&mut self) {
        // Members may outlive the set; do not leave forwarding listeners behind.
        let members = std::mem::take(
            self.members
                .get_mut()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        for member in members.into_values() {
            member.adapter.remove_listener(member.listener);
        }
    }
}
