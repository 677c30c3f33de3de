#![forbid(unsafe_code)]

//! The live display capability.
//!
//! A [`Display`] is the rendering target the reconciliation engine feeds.
//! Only the engine's rebuild pass calls the mutating methods; client code
//! never touches a display that has been handed to the engine.

use crate::adapter::DatumRef;
use crate::axis::Dimensionality;
use crate::error::DisplayError;
use crate::mapping::{ConstantMapping, ScalarMapping};

/// Opaque handle to the UI component that hosts a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentHandle(pub u64);

/// A rendering target that accepts mappings and data references.
pub trait Display: Send {
    fn dimensionality(&self) -> Dimensionality;

    fn component(&self) -> ComponentHandle;

    /// Suspend automatic redraw while the engine rewires the display.
    fn disable_action(&mut self) -> Result<(), DisplayError>;

    /// Resume automatic redraw.
    fn enable_action(&mut self) -> Result<(), DisplayError>;

    /// Drop every data reference from the scene.
    fn remove_all_references(&mut self) -> Result<(), DisplayError>;

    /// Drop every scalar and constant mapping.
    fn clear_maps(&mut self) -> Result<(), DisplayError>;

    fn add_constant_maps(&mut self, maps: &[ConstantMapping]) -> Result<(), DisplayError>;

    fn add_scalar_map(&mut self, map: &ScalarMapping) -> Result<(), DisplayError>;

    /// Attach a datum, rendered with the given per-datum constants.
    fn add_reference(
        &mut self,
        datum: &DatumRef,
        constants: &[ConstantMapping],
    ) -> Result<(), DisplayError>;

    fn remove_reference(&mut self, datum: &DatumRef) -> Result<(), DisplayError>;
}

impl<D: Display + ?Sized> Display for Box<D> {
    fn dimensionality(&self) -> Dimensionality {
        (**self).dimensionality()
    }

    fn component(&self) -> ComponentHandle {
        (**self).component()
    }

    fn disable_action(&mut self) -> Result<(), DisplayError> {
        (**self).disable_action()
    }

    fn enable_action(&mut self) -> Result<(), DisplayError> {
        (**self).enable_action()
    }

    fn remove_all_references(&mut self) -> Result<(), DisplayError> {
        (**self).remove_all_references()
    }

    fn clear_maps(&mut self) -> Result<(), DisplayError> {
        (**self).clear_maps()
    }

    fn add_constant_maps(&mut self, maps: &[ConstantMapping]) -> Result<(), DisplayError> {
        (**self).add_constant_maps(maps)
    }

    fn add_scalar_map(&mut self, map: &ScalarMapping) -> Result<(), DisplayError> {
        (**self).add_scalar_map(map)
    }

    fn add_reference(
        &mut self,
        datum: &DatumRef,
        constants: &[ConstantMapping],
    ) -> Result<(), DisplayError> {
        (**self).add_reference(datum, constants)
    }

    fn remove_reference(&mut self, datum: &DatumRef) -> Result<(), DisplayError> {
        (**self).remove_reference(datum)
    }
}
