#![forbid(unsafe_code)]

//! vizbind public facade crate.
//!
//! Re-exports the types most client code needs from the member crates and
//! offers a prelude. With the `tracing-json` feature it can also install a
//! JSON log formatter.

use std::fmt;

// --- Core re-exports -------------------------------------------------------

pub use vizbind_core::{
    AdapterId, Binding, BindingError, ChangeEvent, ComponentHandle, ConstantMapAdapter,
    ConstantMapping, ConstantMaps, DataAdapter, DatumRef, Dimensionality, Display, DisplayAxis,
    DisplayError, IdAllocator, ListenerId, Quantity, Range, ScalarMapAdapter, ScalarMapSet,
    ScalarMapping,
};

// --- Runtime re-exports ----------------------------------------------------

pub use vizbind_runtime::{
    DatumState, DisplayAdapter, DisplayAdapterBuilder, EngineConfig, EngineError, PassReport,
    UpdateMode, UpdaterConfig, UpdaterStats,
};

// --- Display re-exports ----------------------------------------------------

#[cfg(feature = "display")]
pub use vizbind_display::{
    CompositeDisplayable, Displayable, DisplayableError, DisplayableEvent, Layer, ListEvent,
    Property, Rgba,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for vizbind applications.
#[derive(Debug)]
pub enum Error {
    /// Failure in the reconciliation engine.
    Engine(EngineError),
    /// Failure in a displayable tree.
    #[cfg(feature = "display")]
    Displayable(DisplayableError),
    /// A global log subscriber could not be installed.
    Logging(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(err) => write!(f, "{err}"),
            #[cfg(feature = "display")]
            Self::Displayable(err) => write!(f, "{err}"),
            Self::Logging(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Engine(err) => Some(err),
            #[cfg(feature = "display")]
            Self::Displayable(err) => Some(err),
            Self::Logging(_) => None,
        }
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

#[cfg(feature = "display")]
impl From<DisplayableError> for Error {
    fn from(err: DisplayableError) -> Self {
        Self::Displayable(err)
    }
}

/// Standard result type for vizbind APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Logging ---------------------------------------------------------------

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "VIZBIND_LOG";

/// Install a global JSON log formatter.
///
/// The filter is read from `VIZBIND_LOG` and defaults to `info`. Fails if a
/// global subscriber is already set.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .try_init()
        .map_err(|err| Error::Logging(err.to_string()))
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        ConstantMapping, ConstantMaps, DataAdapter, Display, DisplayAdapter, DisplayAxis,
        EngineConfig, Error, IdAllocator, Range, Result, ScalarMapAdapter, ScalarMapping,
    };

    #[cfg(feature = "display")]
    pub use crate::{CompositeDisplayable, Displayable, Layer, Property, Rgba};

    pub use crate::{core, runtime};

    #[cfg(feature = "display")]
    pub use crate::display;
}

pub use vizbind_core as core;
#[cfg(feature = "display")]
pub use vizbind_display as display;
pub use vizbind_runtime as runtime;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use vizbind_harness::RecordingDisplay;

    #[test]
    fn prelude_drives_a_display() -> Result<()> {
        let display = RecordingDisplay::new();
        let adapter = DisplayAdapter::builder()
            .display(display.clone())
            .config(EngineConfig::manual())
            .build()?;
        let _temperature = adapter.bind_scalar(ScalarMapping::new("Temperature", DisplayAxis::Rgb));
        adapter.flush()?;
        assert_eq!(display.scene().scalar_maps.len(), 1);
        Ok(())
    }

    #[cfg(feature = "display")]
    #[test]
    fn displayable_errors_convert() {
        let err: Error = crate::DisplayableError::Destroyed.into();
        assert_eq!(err.to_string(), "displayable has been destroyed");
    }

    #[test]
    fn engine_errors_keep_their_source() {
        let err: Error = crate::EngineError::MissingDisplay.into();
        assert!(std::error::Error::source(&err).is_some());
    }
}
