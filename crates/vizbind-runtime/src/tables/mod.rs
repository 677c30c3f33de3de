#![forbid(unsafe_code)]

//! The three reconciliation tables.
//!
//! Each table serializes its own bookkeeping behind one mutex, keeps a
//! table-level dirty flag, and wakes the updater whenever it becomes dirty.
//! Only the updater calls `set_display`, which pushes the table's state to
//! the live display and clears the flag.
//!
//! Tables hold weak references to the client's adapters and detach their
//! listeners eagerly on removal.

mod constant;
mod datum;
mod scalar;

pub use constant::{ConstantMapComposite, ConstantMapTable};
pub use datum::{DatumCounts, DatumState, DatumTable};
pub use scalar::ScalarMapTable;
