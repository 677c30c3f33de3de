#![forbid(unsafe_code)]

//! Ordered groups of displayables.
//!
//! A [`CompositeDisplayable`] is itself a [`Displayable`], so groups nest.
//! It owns no adapters; everything it does is forwarded to its children:
//!
//! - properties set on the group are recorded and pushed to every child
//! - constant maps added to the group are given to every child, now and
//!   whenever one is added later
//! - its scalar map set is the union of the children's, kept current as
//!   children change or leave
//!
//! Changes to the child list are announced to list listeners as
//! [`ListEvent`]s with inclusive index bounds.

use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use vizbind_core::{
    AdapterId, Binding, ConstantMapping, IdAllocator, ListenerId, Listeners, ScalarMapSet,
    TaggedEvent, lock,
};
use vizbind_runtime::DisplayAdapter;

use crate::animation::merge_times;
use crate::displayable::{Displayable, DisplayableEvent, DisplayableListener};
use crate::error::DisplayableError;
use crate::property::{DisplayProperties, Property};

/// Change to a composite's child list. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEvent {
    IntervalAdded {
        source: AdapterId,
        lower: usize,
        upper: usize,
    },
    IntervalRemoved {
        source: AdapterId,
        lower: usize,
        upper: usize,
    },
}

impl TaggedEvent for ListEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::IntervalAdded { .. } => "interval_added",
            Self::IntervalRemoved { .. } => "interval_removed",
        }
    }

    fn source(&self) -> AdapterId {
        match self {
            Self::IntervalAdded { source, .. } | Self::IntervalRemoved { source, .. } => *source,
        }
    }
}

#[derive(Debug)]
struct Child {
    displayable: Arc<dyn Displayable>,
    listener: ListenerId,
}

impl Child {
    fn release(self) -> Arc<dyn Displayable> {
        self.displayable.unsubscribe(self.listener);
        self.displayable
    }
}

#[derive(Debug, Default)]
struct CompositeState {
    children: Vec<Child>,
    properties: DisplayProperties,
    constants: Vec<ConstantMapping>,
    scalar_maps: ScalarMapSet,
    display: Option<Arc<DisplayAdapter>>,
    destroyed: bool,
}

impl CompositeState {
    fn check_alive(&self) -> Result<(), DisplayableError> {
        if self.destroyed {
            Err(DisplayableError::Destroyed)
        } else {
            Ok(())
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn Displayable>> {
        self.children
            .iter()
            .map(|child| Arc::clone(&child.displayable))
            .collect()
    }
}

/// A displayable made of other displayables.
#[derive(Debug)]
pub struct CompositeDisplayable {
    id: AdapterId,
    label: String,
    weak_self: Weak<CompositeDisplayable>,
    /// Held across every change to the child list, so a replace is one step.
    /// Never held while list or displayable listeners run.
    structure: Mutex<()>,
    state: Mutex<CompositeState>,
    listeners: Listeners<DisplayableEvent>,
    list_listeners: Listeners<ListEvent>,
}

impl CompositeDisplayable {
    pub fn new(ids: &IdAllocator, label: impl Into<String>) -> Arc<Self> {
        let label = label.into();
        Arc::new_cyclic(|weak_self| Self {
            id: ids.next_id(),
            label,
            weak_self: weak_self.clone(),
            structure: Mutex::new(()),
            state: Mutex::new(CompositeState::default()),
            listeners: Listeners::new(),
            list_listeners: Listeners::new(),
        })
    }

    /// Append `child` and return its index.
    pub fn add_displayable(&self, child: Arc<dyn Displayable>) -> Result<usize, DisplayableError> {
        let (index, replaced) = {
            let _structure = lock(&self.structure);
            let index = self.displayable_count();
            (index, self.place(index, child)?)
        };
        self.announce(index, replaced);
        Ok(index)
    }

    /// Put `child` at `index`, replacing the child already there.
    ///
    /// `index` may equal the current count, which appends.
    pub fn set_displayable(
        &self,
        index: usize,
        child: Arc<dyn Displayable>,
    ) -> Result<(), DisplayableError> {
        let replaced = {
            let _structure = lock(&self.structure);
            self.place(index, child)?
        };
        self.announce(index, replaced);
        Ok(())
    }

    /// Remove and return the child at `index`. The child is detached from
    /// the display.
    pub fn remove_displayable_at(
        &self,
        index: usize,
    ) -> Result<Arc<dyn Displayable>, DisplayableError> {
        let child = {
            let _structure = lock(&self.structure);
            self.take_at(index)?
        };
        self.fire_removed(index, index);
        self.refresh_scalar_maps();
        Ok(child)
    }

    /// Remove `child`. Returns `false` if it is not a child of this group.
    pub fn remove_displayable(&self, child: &dyn Displayable) -> bool {
        let index = {
            let _structure = lock(&self.structure);
            let Some(index) = self.index_of(child) else {
                return false;
            };
            if self.take_at(index).is_err() {
                return false;
            }
            index
        };
        self.fire_removed(index, index);
        self.refresh_scalar_maps();
        true
    }

    /// Remove every child.
    pub fn clear_displayables(&self) {
        let count = {
            let _structure = lock(&self.structure);
            let removed = std::mem::take(&mut lock(&self.state).children);
            let count = removed.len();
            for child in removed {
                child.release().detach();
            }
            count
        };
        if count == 0 {
            return;
        }
        self.fire_removed(0, count - 1);
        self.refresh_scalar_maps();
    }

    /// Insert `child` at `index`, taking out the child already there.
    /// Returns whether one was replaced. Caller holds `structure`.
    fn place(&self, index: usize, child: Arc<dyn Displayable>) -> Result<bool, DisplayableError> {
        let len = {
            let state = lock(&self.state);
            state.check_alive()?;
            state.children.len()
        };
        if index > len {
            return Err(DisplayableError::IndexOutOfBounds { index, len });
        }
        let replaced = index < len;
        if replaced {
            self.take_at(index)?;
        }

        let (constants, display) = {
            let state = lock(&self.state);
            (state.constants.clone(), state.display.clone())
        };
        for mapping in constants {
            child.add_constant_map(mapping)?;
        }
        if let Some(display) = display {
            child.attach(&display)?;
        }

        let weak = self.weak_self.clone();
        let listener = child.subscribe(Box::new(move |event: &DisplayableEvent| {
            if matches!(event, DisplayableEvent::ScalarMapSet { .. })
                && let Some(parent) = weak.upgrade()
            {
                parent.refresh_scalar_maps();
            }
        }));
        lock(&self.state).children.insert(
            index,
            Child {
                displayable: Arc::clone(&child),
                listener,
            },
        );
        debug!(
            composite = self.id.get(),
            child = child.id().get(),
            index,
            replaced,
            "displayable added"
        );
        Ok(replaced)
    }

    /// Take out the child at `index` and detach it. Caller holds
    /// `structure`.
    fn take_at(&self, index: usize) -> Result<Arc<dyn Displayable>, DisplayableError> {
        let child = {
            let mut state = lock(&self.state);
            let len = state.children.len();
            if index >= len {
                return Err(DisplayableError::IndexOutOfBounds { index, len });
            }
            state.children.remove(index)
        };
        let child = child.release();
        child.detach();
        debug!(
            composite = self.id.get(),
            child = child.id().get(),
            index,
            "displayable removed"
        );
        Ok(child)
    }

    fn announce(&self, index: usize, replaced: bool) {
        if replaced {
            self.fire_removed(index, index);
        }
        self.list_listeners.fire(&ListEvent::IntervalAdded {
            source: self.id,
            lower: index,
            upper: index,
        });
        self.refresh_scalar_maps();
    }

    fn fire_removed(&self, lower: usize, upper: usize) {
        self.list_listeners.fire(&ListEvent::IntervalRemoved {
            source: self.id,
            lower,
            upper,
        });
    }

    #[must_use]
    pub fn displayable(&self, index: usize) -> Option<Arc<dyn Displayable>> {
        lock(&self.state)
            .children
            .get(index)
            .map(|child| Arc::clone(&child.displayable))
    }

    #[must_use]
    pub fn last_displayable(&self) -> Option<Arc<dyn Displayable>> {
        lock(&self.state)
            .children
            .last()
            .map(|child| Arc::clone(&child.displayable))
    }

    #[must_use]
    pub fn displayables(&self) -> Vec<Arc<dyn Displayable>> {
        lock(&self.state).snapshot()
    }

    #[must_use]
    pub fn displayable_count(&self) -> usize {
        lock(&self.state).children.len()
    }

    #[must_use]
    pub fn index_of(&self, child: &dyn Displayable) -> Option<usize> {
        let id = child.id();
        lock(&self.state)
            .children
            .iter()
            .position(|entry| entry.displayable.id() == id)
    }

    /// Show or hide the children at `lower..=upper`.
    pub fn set_visible_range(
        &self,
        visible: bool,
        lower: usize,
        upper: usize,
    ) -> Result<(), DisplayableError> {
        let children = lock(&self.state).snapshot();
        let len = children.len();
        if upper >= len {
            return Err(DisplayableError::IndexOutOfBounds { index: upper, len });
        }
        if lower > upper {
            return Err(DisplayableError::IndexOutOfBounds { index: lower, len });
        }
        for child in children[lower..=upper]
            .iter()
            .filter(|child| !child.is_destroyed())
        {
            child.set_property(Property::Visible(visible))?;
        }
        Ok(())
    }

    pub fn set_visible_at(&self, visible: bool, index: usize) -> Result<(), DisplayableError> {
        self.set_visible_range(visible, index, index)
    }

    pub fn add_list_listener(
        &self,
        f: impl Fn(&ListEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.list_listeners.add(f)
    }

    pub fn remove_list_listener(&self, id: ListenerId) -> bool {
        self.list_listeners.remove(id)
    }

    /// Recompute the union of the children's scalar map sets and announce
    /// it if it changed.
    fn refresh_scalar_maps(&self) {
        let children = lock(&self.state).snapshot();
        let mut union = ScalarMapSet::new();
        for child in &children {
            union.merge(&child.scalar_map_set());
        }
        {
            let mut state = lock(&self.state);
            if state.scalar_maps == union {
                return;
            }
            state.scalar_maps = union.clone();
        }
        self.listeners.fire(&DisplayableEvent::ScalarMapSet {
            source: self.id,
            maps: union,
        });
    }
}

impl Displayable for CompositeDisplayable {
    fn id(&self) -> AdapterId {
        self.id
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn bindings(&self) -> Vec<Binding> {
        self.displayables()
            .iter()
            .flat_map(|child| child.bindings())
            .collect()
    }

    fn scalar_map_set(&self) -> ScalarMapSet {
        lock(&self.state).scalar_maps.clone()
    }

    /// Children may have diverged from the group (see
    /// [`set_visible_range`](Self::set_visible_range)), so the property is
    /// pushed to all of them even when the group's own value is unchanged.
    /// Children destroyed on their own are skipped.
    fn set_property(&self, property: Property) -> Result<(), DisplayableError> {
        let (changed, children) = {
            let mut state = lock(&self.state);
            state.check_alive()?;
            (state.properties.set(property.clone()), state.snapshot())
        };
        for child in children.iter().filter(|child| !child.is_destroyed()) {
            child.set_property(property.clone())?;
        }
        if changed {
            self.listeners.fire(&DisplayableEvent::Property {
                source: self.id,
                property,
            });
        }
        Ok(())
    }

    fn properties(&self) -> DisplayProperties {
        lock(&self.state).properties.clone()
    }

    fn attach(&self, display: &Arc<DisplayAdapter>) -> Result<(), DisplayableError> {
        let children = {
            let mut state = lock(&self.state);
            state.check_alive()?;
            state.display = Some(Arc::clone(display));
            state.snapshot()
        };
        for child in children.iter().filter(|child| !child.is_destroyed()) {
            child.attach(display)?;
        }
        Ok(())
    }

    fn detach(&self) {
        let children = {
            let mut state = lock(&self.state);
            if state.display.take().is_none() {
                return;
            }
            state.snapshot()
        };
        for child in &children {
            child.detach();
        }
    }

    fn is_attached(&self) -> bool {
        lock(&self.state).display.is_some()
    }

    fn add_constant_map(&self, mapping: ConstantMapping) -> Result<(), DisplayableError> {
        let children = {
            let mut state = lock(&self.state);
            state.check_alive()?;
            state.constants.retain(|existing| existing.axis != mapping.axis);
            state.constants.push(mapping.clone());
            state.snapshot()
        };
        for child in children.iter().filter(|child| !child.is_destroyed()) {
            child.add_constant_map(mapping.clone())?;
        }
        Ok(())
    }

    fn animation_times(&self, force: bool) -> Vec<f64> {
        let (enabled, children) = {
            let state = lock(&self.state);
            (state.properties.use_times_in_animation(), state.snapshot())
        };
        if !force && !enabled {
            return Vec::new();
        }
        merge_times(children.iter().map(|child| child.animation_times(force)))
    }

    fn subscribe(&self, listener: DisplayableListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Destroy every child, then this group.
    fn destroy(&self) {
        let count = {
            let _structure = lock(&self.structure);
            let removed = {
                let mut state = lock(&self.state);
                if state.destroyed {
                    return;
                }
                state.destroyed = true;
                state.display = None;
                state.scalar_maps = ScalarMapSet::new();
                std::mem::take(&mut state.children)
            };
            let count = removed.len();
            for child in removed {
                child.release().destroy();
            }
            count
        };
        if count > 0 {
            self.fire_removed(0, count - 1);
        }
        debug!(composite = self.id.get(), children = count, "composite destroyed");
    }

    fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }
}
