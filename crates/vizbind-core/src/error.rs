#![forbid(unsafe_code)]

use thiserror::Error;

use crate::axis::DisplayAxis;

/// Failure reported by the live display.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DisplayError {
    #[error("display rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    #[error("display is unavailable")]
    Unavailable,
}

impl DisplayError {
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            reason: reason.into(),
        }
    }
}

/// Failure while binding mappings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// A second constant value was offered for an axis that already has one.
    #[error("axis {axis} already has a constant binding")]
    DuplicateAxis { axis: DisplayAxis },

    #[error(transparent)]
    Display(#[from] DisplayError),
}
