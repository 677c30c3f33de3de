#![forbid(unsafe_code)]

//! Test fixtures for vizbind.
//!
//! - [`RecordingDisplay`] implements [`vizbind_core::Display`], records every
//!   call in order, keeps a model of what the scene holds, and can be told
//!   to fail specific operations.
//! - [`wait_until`] polls a condition against a deadline, for tests that
//!   drive a background updater.

pub mod recording;
pub mod wait;

pub use recording::{DisplayCall, RecordingDisplay, SceneState};
pub use wait::{DEFAULT_WAIT, wait_until};
