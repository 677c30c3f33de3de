#![forbid(unsafe_code)]

//! The displayable capability.
//!
//! A displayable is anything that can put bindings on a display: a
//! [`Layer`](crate::Layer) owning its own adapters, or a
//! [`CompositeDisplayable`](crate::CompositeDisplayable) grouping others.
//! Displayables never talk to a display directly; they register adapters
//! with a [`DisplayAdapter`] and let its updater do the rest.

use std::sync::Arc;

use vizbind_core::{AdapterId, Binding, ConstantMapping, ListenerId, ScalarMapSet, TaggedEvent};
use vizbind_runtime::DisplayAdapter;

use crate::error::DisplayableError;
use crate::property::{DisplayProperties, Property};

/// Change notification from a displayable.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayableEvent {
    /// The set of scalar mappings the displayable needs changed.
    ScalarMapSet { source: AdapterId, maps: ScalarMapSet },
    /// A property took a new value.
    Property { source: AdapterId, property: Property },
}

impl TaggedEvent for DisplayableEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::ScalarMapSet { .. } => "scalar_map_set",
            Self::Property { .. } => "property",
        }
    }

    fn source(&self) -> AdapterId {
        match self {
            Self::ScalarMapSet { source, .. } | Self::Property { source, .. } => *source,
        }
    }
}

/// Callback registered with [`Displayable::subscribe`].
pub type DisplayableListener = Box<dyn Fn(&DisplayableEvent) + Send + Sync>;

/// Something that contributes bindings to a display.
pub trait Displayable: Send + Sync + std::fmt::Debug {
    fn id(&self) -> AdapterId;

    fn label(&self) -> String;

    /// Everything currently contributed: scalar maps, constants, data.
    fn bindings(&self) -> Vec<Binding>;

    fn scalar_map_set(&self) -> ScalarMapSet;

    /// Record and apply a property.
    fn set_property(&self, property: Property) -> Result<(), DisplayableError>;

    fn properties(&self) -> DisplayProperties;

    /// Register this displayable's adapters with `display`, detaching from
    /// any previous one first.
    fn attach(&self, display: &Arc<DisplayAdapter>) -> Result<(), DisplayableError>;

    /// Withdraw everything from the attached display, if any.
    fn detach(&self);

    fn is_attached(&self) -> bool;

    /// Add or replace a constant binding on this displayable's data.
    fn add_constant_map(&self, mapping: ConstantMapping) -> Result<(), DisplayableError>;

    /// Times this displayable can be animated over.
    ///
    /// With `force` unset, a displayable that opted out of animation
    /// returns nothing.
    fn animation_times(&self, force: bool) -> Vec<f64>;

    fn subscribe(&self, listener: DisplayableListener) -> ListenerId;

    fn unsubscribe(&self, id: ListenerId) -> bool;

    /// Detach and refuse further changes.
    fn destroy(&self);

    fn is_destroyed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizbind_core::IdAllocator;

    #[test]
    fn event_tags() {
        let source = IdAllocator::new().next_id();
        let event = DisplayableEvent::Property {
            source,
            property: Property::Visible(true),
        };
        assert_eq!(event.kind(), "property");
        assert_eq!(event.source(), source);

        let event = DisplayableEvent::ScalarMapSet {
            source,
            maps: ScalarMapSet::new(),
        };
        assert_eq!(event.kind(), "scalar_map_set");
    }
}
