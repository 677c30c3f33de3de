#![forbid(unsafe_code)]

//! vizbind core types.
//!
//! This crate holds everything the reconciliation engine talks about but
//! does not own: the identity allocator, axis and quantity types, the
//! scalar and constant mappings, change events, the adapters that client
//! code hands to a display, and the [`Display`] capability that the live
//! rendering target implements.
//!
//! # Role in vizbind
//! `vizbind-runtime` consumes these types in its tables and updater,
//! `vizbind-display` builds displayable trees on top of the adapters, and
//! `vizbind-harness` implements [`Display`] for tests.

pub mod adapter;
pub mod axis;
pub mod display;
pub mod error;
pub mod event;
pub mod id;
pub mod mapping;

pub use adapter::{
    ConstantMapAdapter, ConstantMaps, DataAdapter, DatumRef, MapAdapter, ScalarMapAdapter,
};
pub use axis::{Dimensionality, DisplayAxis, Quantity};
pub use display::{ComponentHandle, Display};
pub use error::{BindingError, DisplayError};
pub use event::{ChangeEvent, ListenerId, Listeners, TaggedEvent};
pub use id::{AdapterId, IdAllocator};
pub use mapping::{Binding, ConstantMapping, Range, ScalarMapSet, ScalarMapping};

/// Recover the guard from a poisoned lock.
///
/// Every lock in vizbind protects bookkeeping that stays consistent across a
/// panicking listener, so poisoning is not treated as fatal.
pub fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
