#![forbid(unsafe_code)]

//! Displayable trees for vizbind.
//!
//! Client code rarely wants to juggle individual adapters. This crate
//! groups them: a [`Layer`] is one datum with the scalar and constant
//! bindings it is drawn with, and a [`CompositeDisplayable`] is an ordered
//! group of displayables that forwards properties, inherited constants and
//! display attachment to its children.
//!
//! ```rust,ignore
//! let adapter = Arc::new(DisplayAdapter::new(display)?);
//! let group = CompositeDisplayable::new(adapter.ids(), "weather");
//! group.add_displayable(
//!     Layer::builder(adapter.ids(), "temperature")
//!         .scalar(ScalarMapping::new("Temperature", DisplayAxis::Rgb))
//!         .build()?,
//! )?;
//! group.attach(&adapter)?;
//! group.set_property(Property::LineWidth(2.0))?;
//! ```

pub mod animation;
pub mod composite;
pub mod displayable;
pub mod error;
pub mod layer;
pub mod property;

pub use animation::merge_times;
pub use composite::{CompositeDisplayable, ListEvent};
pub use displayable::{Displayable, DisplayableEvent, DisplayableListener};
pub use error::DisplayableError;
pub use layer::{Layer, LayerBuilder};
pub use property::{DisplayProperties, Property, PropertyKey, Rgba};
