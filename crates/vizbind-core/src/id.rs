#![forbid(unsafe_code)]

//! Adapter identity and the injected identifier allocator.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::axis::Quantity;

/// Identity of a single adapter.
///
/// Identifiers are allocated in increasing order, so ordering by
/// `AdapterId` is ordering by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdapterId(u64);

impl AdapterId {
    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocator for adapter identities and private quantity names.
///
/// One allocator is scoped to one display adapter. Clones share the same
/// counter, so handing a clone to every displayable attached to that display
/// keeps identifiers unique without any process-wide state.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: Arc<AtomicU64>,
}

impl IdAllocator {
    /// Create an allocator starting at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate the next adapter identity.
    pub fn next_id(&self) -> AdapterId {
        AdapterId(self.bump())
    }

    /// Allocate a quantity named `"{base}_{n}"`.
    ///
    /// Mappings on a unique quantity never coalesce with anyone else's, which
    /// is how a displayable asks for a binding (and control) of its own.
    pub fn unique_quantity(&self, base: &str) -> Quantity {
        Quantity::new(format!("{base}_{}", self.bump()))
    }

    fn bump(&self) -> u64 {
        // Zero is never handed out; a default-constructed allocator starts at 0.
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        if n == 0 {
            self.next.fetch_add(1, Ordering::Relaxed)
        } else {
            n
        }
    }
}
