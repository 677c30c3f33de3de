use thiserror::Error;

use vizbind_core::BindingError;
use vizbind_runtime::EngineError;

/// Errors from displayables and composites.
#[derive(Debug, Error)]
pub enum DisplayableError {
    /// The displayable was destroyed and can no longer be changed.
    #[error("displayable has been destroyed")]
    Destroyed,

    #[error("index {index} out of bounds for {len} children")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<BindingError> for DisplayableError {
    fn from(err: BindingError) -> Self {
        Self::Engine(EngineError::Binding(err))
    }
}
