#![forbid(unsafe_code)]

//! Lifecycle of data attached to a display.
//!
//! ```text
//!   add ──► New ──pass──► Extant ◄──pass── Changed
//!            │              │   └──change──►  │
//!            │           obsolete         obsolete
//!         obsolete          ▼                 │
//!        (dropped)      Obsolete ◄────────────┘
//!                           │
//!                         pass (removed from display, forgotten)
//! ```
//!
//! Every registered datum is in exactly one state. The change listener is
//! attached only once a datum has been shown and is detached as soon as it
//! goes obsolete, so setup and teardown produce no stray change events.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, warn};

use crate::updater::Waker;
use vizbind_core::{
    AdapterId, ChangeEvent, DataAdapter, DatumRef, Display, DisplayError, ListenerId, lock,
};

/// Where a datum stands relative to the live display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatumState {
    /// Added, never shown.
    New,
    /// Shown and unchanged since.
    Extant,
    /// Shown, but changed since it was last sent.
    Changed,
    /// Shown, to be withdrawn by the next pass.
    Obsolete,
}

/// Number of registered data per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatumCounts {
    pub new: usize,
    pub extant: usize,
    pub changed: usize,
    pub obsolete: usize,
}

impl DatumCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.new + self.extant + self.changed + self.obsolete
    }
}

#[derive(Debug)]
struct Entry {
    adapter: Weak<DataAdapter>,
    /// What the display was last given, used to withdraw it.
    shown: Option<DatumRef>,
    state: DatumState,
    listener: Option<ListenerId>,
}

#[derive(Debug, Default)]
struct DatumInner {
    entries: BTreeMap<AdapterId, Entry>,
    changed: bool,
}

/// Table of data attached through one display adapter.
#[derive(Debug)]
pub struct DatumTable {
    inner: Mutex<DatumInner>,
    waker: Waker,
    weak_self: Weak<DatumTable>,
}

impl DatumTable {
    pub fn new(waker: Waker) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            inner: Mutex::new(DatumInner::default()),
            waker,
            weak_self: weak_self.clone(),
        })
    }

    /// Register a datum for display.
    ///
    /// A datum that is already shown is sent again with the next pass. A
    /// datum added back while obsolete is kept on the display and refreshed.
    pub fn add(&self, adapter: &Arc<DataAdapter>) {
        let id = adapter.id();
        {
            let mut inner = lock(&self.inner);
            match inner.entries.get(&id).map(|entry| entry.state) {
                None => {
                    inner.entries.insert(
                        id,
                        Entry {
                            adapter: Arc::downgrade(adapter),
                            shown: None,
                            state: DatumState::New,
                            listener: None,
                        },
                    );
                    debug!(datum = id.get(), name = adapter.name(), "datum new");
                }
                Some(DatumState::New | DatumState::Changed) => return,
                Some(DatumState::Extant) => {
                    if let Some(entry) = inner.entries.get_mut(&id) {
                        entry.state = DatumState::Changed;
                    }
                    debug!(datum = id.get(), "datum re-added while shown");
                }
                Some(DatumState::Obsolete) => {
                    let listener = self.listen(adapter);
                    if let Some(entry) = inner.entries.get_mut(&id) {
                        entry.state = DatumState::Changed;
                        entry.listener = Some(listener);
                    }
                    debug!(datum = id.get(), "obsolete datum revived");
                }
            }
            inner.changed = true;
        }
        self.waker.update();
    }

    /// Mark a shown datum as changed. Ignored in any other state.
    pub fn set_changed(&self, id: AdapterId) {
        {
            let mut inner = lock(&self.inner);
            let Some(entry) = inner.entries.get_mut(&id) else {
                return;
            };
            if entry.state != DatumState::Extant {
                return;
            }
            entry.state = DatumState::Changed;
            inner.changed = true;
        }
        debug!(datum = id.get(), "datum changed");
        self.waker.update();
    }

    /// Withdraw a datum.
    ///
    /// A datum that was never shown is forgotten without any display call.
    /// A shown datum stops being listened to and is removed by the next pass.
    pub fn set_obsolete(&self, adapter: &Arc<DataAdapter>) {
        let id = adapter.id();
        {
            let mut inner = lock(&self.inner);
            let Some(entry) = inner.entries.get_mut(&id) else {
                return;
            };
            match entry.state {
                DatumState::New => {
                    inner.entries.remove(&id);
                    debug!(datum = id.get(), "unshown datum dropped");
                    return;
                }
                DatumState::Obsolete => return,
                DatumState::Extant | DatumState::Changed => {
                    if let Some(listener) = entry.listener.take() {
                        adapter.remove_listener(listener);
                    }
                    entry.state = DatumState::Obsolete;
                    inner.changed = true;
                }
            }
        }
        debug!(datum = id.get(), "datum obsolete");
        self.waker.update();
    }

    fn listen(&self, adapter: &DataAdapter) -> ListenerId {
        let weak = self.weak_self.clone();
        adapter.add_listener(move |event| {
            if let (Some(table), ChangeEvent::Datum { source }) = (weak.upgrade(), event) {
                table.set_changed(*source);
            }
        })
    }

    /// Whether the table changed since the last `set_display`.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        lock(&self.inner).changed
    }

    /// Current state of a registered datum.
    #[must_use]
    pub fn state_of(&self, id: AdapterId) -> Option<DatumState> {
        lock(&self.inner).entries.get(&id).map(|entry| entry.state)
    }

    #[must_use]
    pub fn counts(&self) -> DatumCounts {
        let inner = lock(&self.inner);
        let mut counts = DatumCounts::default();
        for entry in inner.entries.values() {
            match entry.state {
                DatumState::New => counts.new += 1,
                DatumState::Extant => counts.extant += 1,
                DatumState::Changed => counts.changed += 1,
                DatumState::Obsolete => counts.obsolete += 1,
            }
        }
        counts
    }

    /// Apply the table to the display and clear the dirty flag.
    ///
    /// `wiped` says the pass cleared every reference from the display, in
    /// which case shown data are sent again and obsolete data need no
    /// removal. Called by the updater only.
    pub fn set_display(&self, display: &mut dyn Display, wiped: bool) -> Result<(), DisplayError> {
        let mut inner = lock(&self.inner);

        for (id, entry) in &mut inner.entries {
            if entry.state != DatumState::Obsolete && entry.adapter.strong_count() == 0 {
                warn!(datum = id.get(), "datum dropped without removal");
                entry.listener = None;
                entry.state = DatumState::Obsolete;
            }
        }
        // Never-shown data that died leave nothing behind.
        inner
            .entries
            .retain(|_, entry| entry.state != DatumState::Obsolete || entry.shown.is_some());

        if wiped {
            for entry in inner.entries.values_mut() {
                if entry.state != DatumState::Extant {
                    continue;
                }
                if let Some(adapter) = entry.adapter.upgrade() {
                    adapter.add_to(display)?;
                    entry.shown = Some(adapter.datum_ref());
                }
            }
        } else {
            let obsolete: Vec<AdapterId> = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.state == DatumState::Obsolete)
                .map(|(id, _)| *id)
                .collect();
            for id in obsolete {
                if let Some(shown) = inner.entries.get(&id).and_then(|entry| entry.shown.clone()) {
                    display.remove_reference(&shown)?;
                }
                // Forget each one as it goes so a failure mid-way does not
                // repeat the removals already made.
                inner.entries.remove(&id);
            }
        }
        inner
            .entries
            .retain(|_, entry| entry.state != DatumState::Obsolete);

        for entry in inner.entries.values_mut() {
            if entry.state != DatumState::Changed {
                continue;
            }
            if let Some(adapter) = entry.adapter.upgrade() {
                adapter.add_to(display)?;
                entry.shown = Some(adapter.datum_ref());
                entry.state = DatumState::Extant;
            }
        }

        let ids: Vec<AdapterId> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.state == DatumState::New)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            let Some(adapter) = inner
                .entries
                .get(&id)
                .and_then(|entry| entry.adapter.upgrade())
            else {
                continue;
            };
            adapter.add_to(display)?;
            let listener = self.listen(&adapter);
            if let Some(entry) = inner.entries.get_mut(&id) {
                entry.shown = Some(adapter.datum_ref());
                entry.state = DatumState::Extant;
                entry.listener = Some(listener);
            }
        }

        inner.changed = false;
        Ok(())
    }
}
