#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::ConstantMaps;
use crate::display::Display;
use crate::error::DisplayError;
use crate::event::{ChangeEvent, ListenerId, Listeners};
use crate::id::{AdapterId, IdAllocator};
use crate::lock;
use crate::mapping::ConstantMapping;

/// What the display sees of a datum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatumRef {
    pub id: AdapterId,
    pub name: Arc<str>,
    /// Bumped on every change to the datum.
    pub version: u64,
}

#[derive(Debug)]
struct Attached {
    maps: Arc<ConstantMaps>,
    listener: ListenerId,
}

/// A data object attached to a display together with its own constants.
#[derive(Debug)]
pub struct DataAdapter {
    id: AdapterId,
    name: Arc<str>,
    version: AtomicU64,
    weak_self: Weak<DataAdapter>,
    constants: Mutex<Option<Attached>>,
    listeners: Listeners,
}

impl DataAdapter {
    pub fn new(ids: &IdAllocator, name: impl Into<Arc<str>>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|weak_self| Self {
            id: ids.next_id(),
            name,
            version: AtomicU64::new(0),
            weak_self: weak_self.clone(),
            constants: Mutex::new(None),
            listeners: Listeners::new(),
        })
    }

    /// A datum rendered with `maps`; changes to `maps` mark the datum changed.
    pub fn with_constants(
        ids: &IdAllocator,
        name: impl Into<Arc<str>>,
        maps: Arc<ConstantMaps>,
    ) -> Arc<Self> {
        let adapter = Self::new(ids, name);
        adapter.attach(maps);
        adapter
    }

    #[must_use]
    pub fn id(&self) -> AdapterId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn datum_ref(&self) -> DatumRef {
        DatumRef {
            id: self.id,
            name: Arc::clone(&self.name),
            version: self.version(),
        }
    }

    #[must_use]
    pub fn constant_maps(&self) -> Option<Arc<ConstantMaps>> {
        lock(&self.constants)
            .as_ref()
            .map(|attached| Arc::clone(&attached.maps))
    }

    /// Per-datum constants, empty if none are attached.
    #[must_use]
    pub fn constants(&self) -> Vec<ConstantMapping> {
        self.constant_maps()
            .map(|maps| maps.mappings())
            .unwrap_or_default()
    }

    /// Replace the attached constants and announce the change.
    pub fn set_constant_maps(&self, maps: Option<Arc<ConstantMaps>>) {
        self.detach();
        if let Some(maps) = maps {
            self.attach(maps);
        }
        self.mark_changed();
    }

    /// Record that the datum's contents changed and announce it.
    pub fn mark_changed(&self) {
        self.version.fetch_add(1, Ordering::AcqRel);
        self.listeners.fire(&ChangeEvent::Datum { source: self.id });
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

    /// Attach (or re-attach) this datum to the live display.
    pub fn add_to(&self, display: &mut dyn Display) -> Result<(), DisplayError> {
        display.add_reference(&self.datum_ref(), &self.constants())
    }

    fn attach(&self, maps: Arc<ConstantMaps>) {
        let weak = self.weak_self.clone();
        let listener = maps.add_listener(move |_| {
            if let Some(datum) = weak.upgrade() {
                datum.mark_changed();
            }
        });
        *lock(&self.constants) = Some(Attached { maps, listener });
    }

    fn detach(&self) {
        let previous = lock(&self.constants).take();
        if let Some(attached) = previous {
            attached.maps.remove_listener(attached.listener);
        }
    }
}

impl Drop for DataAdapter {
    fn drop(&mut self) {
        let attached = self
            .constants
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(attached) = attached {
            attached.maps.remove_listener(attached.listener);
        }
    }
}
