#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use super::MapAdapter;
use crate::axis::{DisplayAxis, Quantity};
use crate::display::Display;
use crate::error::DisplayError;
use crate::event::{ChangeEvent, ListenerId};
use crate::id::{AdapterId, IdAllocator};
use crate::lock;
use crate::mapping::{Range, ScalarMapping};

#[derive(Debug)]
struct ScalarState {
    mapping: ScalarMapping,
    /// Set when this adapter adopted another adapter's equal mapping.
    controller: Option<Weak<ScalarMapAdapter>>,
}

/// Adapter around one scalar mapping.
///
/// The axis is fixed at construction; the quantity and range may change.
/// When a table finds an equal mapping already registered, the newcomer is
/// told to [`duplicate`](Self::duplicate) the registered controller and from
/// then on reports the controller's mapping.
#[derive(Debug)]
pub struct ScalarMapAdapter {
    base: MapAdapter,
    state: Mutex<ScalarState>,
}

impl ScalarMapAdapter {
    pub fn new(ids: &IdAllocator, mapping: ScalarMapping) -> Arc<Self> {
        Arc::new(Self {
            base: MapAdapter::new(ids.next_id(), mapping.axis.clone()),
            state: Mutex::new(ScalarState {
                mapping,
                controller: None,
            }),
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

    /// This adapter's own mapping.
    #[must_use]
    pub fn mapping(&self) -> ScalarMapping {
        lock(&self.state).mapping.clone()
    }

    /// The mapping actually bound on the display.
    ///
    /// For a duplicate whose controller is alive and still bound to an equal
    /// mapping this is the controller's mapping (range included).
    #[must_use]
    pub fn effective_mapping(&self) -> ScalarMapping {
        let (own, controller) = {
            let state = lock(&self.state);
            (state.mapping.clone(), state.controller.clone())
        };
        match controller.and_then(|weak| weak.upgrade()) {
            Some(controller) => {
                let theirs = controller.mapping();
                if theirs == own { theirs } else { own }
            }
            None => own,
        }
    }

    /// The adapter this one duplicates, if it is alive.
    #[must_use]
    pub fn controller(&self) -> Option<Arc<ScalarMapAdapter>> {
        let weak = lock(&self.state).controller.clone()?;
        weak.upgrade()
    }

    /// Whether this adapter currently defers to another controller.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        self.controller().is_some()
    }

    /// Adopt `controller`'s mapping. Does not notify listeners: the key is
    /// unchanged, only the range and the responsibility move.
    pub fn duplicate(&self, controller: &Arc<ScalarMapAdapter>) {
        if std::ptr::eq(self, Arc::as_ptr(controller)) {
            self.become_controller();
            return;
        }
        let adopted = controller.mapping();
        let mut state = lock(&self.state);
        debug!(
            adapter = self.id().get(),
            controller = controller.id().get(),
            quantity = %adopted.quantity,
            axis = %adopted.axis,
            "scalar adapter duplicates controller"
        );
        state.mapping = adopted;
        state.controller = Some(Arc::downgrade(controller));
    }

    /// Drop any controller link; this adapter answers for its own mapping.
    pub fn become_controller(&self) {
        lock(&self.state).controller = None;
    }

    /// Rebind to a different quantity on the same axis.
    pub fn rebind(&self, quantity: impl Into<Quantity>) {
        let quantity = quantity.into();
        self.replace(|mapping| {
            mapping.quantity = quantity;
            mapping.range = None;
        });
    }

    /// Change the data range.
    ///
    /// A duplicate forwards the change to its controller, since both share
    /// one live binding.
    pub fn set_range(&self, range: Range) {
        if let Some(controller) = self.controller()
            && controller.mapping() == self.mapping()
        {
            controller.set_range(range);
            lock(&self.state).mapping.range = Some(range);
            return;
        }
        self.replace(|mapping| mapping.range = Some(range));
    }

    fn replace(&self, f: impl FnOnce(&mut ScalarMapping)) {
        let event = {
            let mut state = lock(&self.state);
            let old = state.mapping.clone();
            f(&mut state.mapping);
            if old.same_as(&state.mapping) {
                return;
            }
            if old != state.mapping {
                // A new key is negotiated from scratch by the table.
                state.controller = None;
            }
            ChangeEvent::ScalarMap {
                source: self.id(),
                old,
                new: state.mapping.clone(),
            }
        };
        self.base.fire_change(&event);
    }

    pub fn add_listener(&self, f: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> ListenerId {
        self.base.add_listener(f)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.base.remove_listener(id)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.base.listener_count()
    }

    /// Bind this adapter's mapping on the live display.
    pub fn set_display(&self, display: &mut dyn Display) -> Result<(), DisplayError> {
        let mapping = self.mapping();
        display.add_scalar_map(&mapping)
    }
}
