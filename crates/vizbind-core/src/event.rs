#![forbid(unsafe_code)]

//! Change events and the listener registry behind every adapter.
//!
//! # Design
//!
//! Adapters announce changes with a [`ChangeEvent`], a closed set of tagged
//! variants. The [`Listeners`] registry is created lazily on first
//! [`Listeners::add`], so adapters nobody watches never allocate one. The
//! registry is generic over any [`TaggedEvent`], which lets higher layers
//! reuse it for their own event types.
//!
//! # Dispatch
//!
//! [`Listeners::fire`] is synchronous: by the time it returns every listener
//! has run on the calling thread. The registry snapshots its callbacks and
//! releases its lock before invoking them, and adapters release their own
//! state lock before firing, so a listener may call back into the emitting
//! adapter, add or remove listeners, or take a table lock.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. A listener removed before `fire` starts is never invoked by it.
//! 3. `ListenerId`s are never reused within one registry.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::trace;

use crate::axis::DisplayAxis;
use crate::id::AdapterId;
use crate::lock;
use crate::mapping::ScalarMapping;

/// A change announced by an adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A scalar adapter's mapping was replaced.
    ScalarMap {
        source: AdapterId,
        old: ScalarMapping,
        new: ScalarMapping,
    },
    /// A single constant changed value.
    ConstantMap {
        source: AdapterId,
        axis: DisplayAxis,
        old: f64,
        new: f64,
    },
    /// Some member of a constant-map set changed, or the set itself did.
    ConstantMaps { source: AdapterId },
    /// A datum's bindings or contents changed.
    Datum { source: AdapterId },
}

/// An event that names its kind and its emitter, for dispatch logging.
pub trait TaggedEvent {
    /// Short tag for logs.
    fn kind(&self) -> &'static str;

    fn source(&self) -> AdapterId;
}

impl TaggedEvent for ChangeEvent {
    fn kind(&self) -> &'static str {
        ChangeEvent::kind(self)
    }

    fn source(&self) -> AdapterId {
        ChangeEvent::source(self)
    }
}

impl ChangeEvent {
    #[must_use]
    pub fn source(&self) -> AdapterId {
        match self {
            Self::ScalarMap { source, .. }
            | Self::ConstantMap { source, .. }
            | Self::ConstantMaps { source }
            | Self::Datum { source } => *source,
        }
    }

    /// Short tag for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ScalarMap { .. } => "scalar_map",
            Self::ConstantMap { .. } => "constant_map",
            Self::ConstantMaps { .. } => "constant_maps",
            Self::Datum { .. } => "datum",
        }
    }
}

/// Handle returned by [`Listeners::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Callback<E>)>>,
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }
}

/// Lazily created, thread-safe list of change listeners.
pub struct Listeners<E = ChangeEvent> {
    registry: OnceLock<Registry<E>>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

impl<E: TaggedEvent> Listeners<E> {
    /// Deliver `event` to every listener on the calling thread.
    pub fn fire(&self, event: &E) {
        let Some(registry) = self.registry.get() else {
            return;
        };
        let callbacks: Vec<Callback<E>> = lock(&registry.entries)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        if callbacks.is_empty() {
            return;
        }
        trace!(
            kind = event.kind(),
            source = event.source().get(),
            listeners = callbacks.len(),
            "dispatching change event"
        );
        for cb in &callbacks {
            cb(event);
        }
    }
}

impl<E> Listeners<E> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            registry: OnceLock::new(),
        }
    }

    /// Register a listener.
    pub fn add(&self, f: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        let registry = self.registry.get_or_init(Registry::default);
        let id = ListenerId(registry.next.fetch_add(1, Ordering::Relaxed));
        lock(&registry.entries).push((id, Arc::new(f)));
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let Some(registry) = self.registry.get() else {
            return false;
        };
        let mut entries = lock(&registry.entries);
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry
            .get()
            .map_or(0, |registry| lock(&registry.entries).len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the registry has been allocated.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.registry.get().is_some()
    }
}
