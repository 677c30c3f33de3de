#![forbid(unsafe_code)]

use thiserror::Error;

use crate::config::ConfigError;
use vizbind_core::{BindingError, DisplayError};

/// Errors surfaced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The adapter was built without a display to drive.
    #[error("display adapter requires a display")]
    MissingDisplay,

    /// The updater thread could not be started.
    #[error("failed to spawn updater thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Display(#[from] DisplayError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Whether this is a rejected constant binding.
    #[must_use]
    pub fn is_duplicate_axis(&self) -> bool {
        matches!(self, Self::Binding(BindingError::DuplicateAxis { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vizbind_core::DisplayAxis;

    #[test]
    fn duplicate_axis_is_detected() {
        let err: EngineError = BindingError::DuplicateAxis {
            axis: DisplayAxis::Z,
        }
        .into();
        assert!(err.is_duplicate_axis());
        assert!(!EngineError::MissingDisplay.is_duplicate_axis());
    }

    #[test]
    fn missing_display_message() {
        assert_eq!(
            EngineError::MissingDisplay.to_string(),
            "display adapter requires a display"
        );
    }
}
