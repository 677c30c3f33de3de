#![forbid(unsafe_code)]

//! vizbind runtime: the mapping reconciliation engine.
//!
//! A [`DisplayAdapter`] sits between client code and one live [`Display`].
//! Clients register scalar mappings, constant bindings and data; three
//! tables record what should be on the display and an [`Updater`] applies
//! it in coalesced rebuild passes, constant maps first, then scalar maps,
//! then data.
//!
//! # Key Components
//!
//! - [`ScalarMapTable`] - deduplicates structurally equal scalar mappings
//!   behind one controller
//! - [`ConstantMapTable`] - aggregates constant sets, one value per axis
//! - [`DatumTable`] - the new / extant / changed / obsolete data lifecycle
//! - [`Updater`] - the single writer to the display
//! - [`EngineConfig`] - updater scheduling, loadable from TOML or JSON
//!   with the `config` feature
//!
//! [`Display`]: vizbind_core::Display

pub mod config;
pub mod display_adapter;
pub mod error;
pub mod tables;
pub mod updater;

pub use config::{ConfigError, EngineConfig, MAX_COALESCE_WINDOW_MS, UpdateMode, UpdaterConfig};
pub use display_adapter::{DisplayAdapter, DisplayAdapterBuilder};
pub use error::EngineError;
pub use tables::{
    ConstantMapComposite, ConstantMapTable, DatumCounts, DatumState, DatumTable, ScalarMapTable,
};
pub use updater::{PassFlags, PassReport, Updater, UpdaterStats, Waker};
