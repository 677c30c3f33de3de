#![forbid(unsafe_code)]

//! Adapters handed by client code to a display.
//!
//! Each adapter wraps one kind of binding and announces changes to it
//! through a [`Listeners`] registry. Adapters are shared as `Arc`s: the
//! client owns them, the engine's tables only hold weak references.

mod constant;
mod data;
mod scalar;

pub use constant::{ConstantMapAdapter, ConstantMaps};
pub use data::{DataAdapter, DatumRef};
pub use scalar::ScalarMapAdapter;

use crate::axis::DisplayAxis;
use crate::event::{ChangeEvent, ListenerId, Listeners};
use crate::id::AdapterId;

/// Identity, axis and change notification shared by the single-axis adapters.
#[derive(Debug)]
pub struct MapAdapter {
    id: AdapterId,
    axis: DisplayAxis,
    listeners: Listeners,
}

impl MapAdapter {
    pub fn new(id: AdapterId, axis: DisplayAxis) -> Self {
        Self {
            id,
            axis,
            listeners: Listeners::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> AdapterId {
        self.id
    }

    /// The display slot this adapter binds. Never changes.
    #[must_use]
    pub fn axis(&self) -> &DisplayAxis {
        &self.axis
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

    /// Deliver `event` synchronously. Must not be called with adapter state locked.
    pub fn fire_change(&self, event: &ChangeEvent) {
        self.listeners.fire(event);
    }
}
