#![forbid(unsafe_code)]

//! The deferred-redraw updater.
//!
//! Tables never touch the live display. They mark themselves dirty and call
//! [`Waker::update`]; the updater later runs one rebuild pass that applies
//! whatever the tables hold at that moment. The updater is the only code
//! that mutates the display, so a display handed to the engine has exactly
//! one writer.
//!
//! # Coalescing Rules
//!
//! - A wake sets a single pending flag. Any number of wakes before the
//!   worker picks the flag up produce one pass.
//! - A pass applies the latest state of every table, never a replay of the
//!   individual mutations.
//! - With a non-zero coalescing window the worker waits that long after a
//!   wake and absorbs wakes that arrive meanwhile.
//!
//! # Apply Order
//!
//! Constant maps, then scalar maps, then data. Axes and controls have to
//! exist on the display before the data that uses them is attached.
//!
//! # Failure Policy
//!
//! A pass that fails is logged at `error` and abandoned. It is not retried
//! and no caller hears about it; tables that were not applied stay dirty
//! and go out with the next pass. Auto-redraw is re-enabled even when the
//! pass fails midway.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bitflags::bitflags;
use tracing::{debug, error, info_span, trace};
use web_time::Instant;

use crate::config::{UpdateMode, UpdaterConfig};
use crate::error::EngineError;
use crate::tables::{ConstantMapTable, DatumTable, ScalarMapTable};
use vizbind_core::{Display, lock};

bitflags! {
    /// Which tables were dirty when a pass started.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PassFlags: u8 {
        const CONSTANT_MAPS = 0b001;
        const SCALAR_MAPS   = 0b010;
        const DATA          = 0b100;
    }
}

impl PassFlags {
    /// Whether this pass had to clear the display before reapplying.
    #[must_use]
    pub fn requires_wipe(self) -> bool {
        self.intersects(Self::CONSTANT_MAPS | Self::SCALAR_MAPS)
    }
}

/// Outcome of one rebuild pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassReport {
    pub flags: PassFlags,
    /// The display was cleared and rebuilt from scratch.
    pub wiped: bool,
    pub duration: Duration,
}

/// Cumulative updater counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdaterStats {
    /// Calls to [`Waker::update`].
    pub wakes: u64,
    /// Passes that applied something.
    pub passes: u64,
    /// Passes abandoned on error.
    pub failures: u64,
    pub last: Option<PassReport>,
}

#[derive(Debug, Default)]
struct SignalState {
    pending: bool,
    running: bool,
    shutdown: bool,
    stats: UpdaterStats,
}

#[derive(Debug, Default)]
struct Signal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl Signal {
    fn lock(&self) -> MutexGuard<'_, SignalState> {
        lock(&self.state)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, SignalState>) -> MutexGuard<'a, SignalState> {
        self.cond
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle the tables use to request a pass.
#[derive(Debug, Clone, Default)]
pub struct Waker {
    signal: Arc<Signal>,
}

impl Waker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a pass. Never blocks beyond a short critical section.
    pub fn update(&self) {
        let mut state = self.signal.lock();
        state.pending = true;
        state.stats.wakes += 1;
        drop(state);
        self.signal.cond.notify_all();
    }

    /// Whether a wake is waiting to be picked up.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.signal.lock().pending
    }

    #[must_use]
    pub fn stats(&self) -> UpdaterStats {
        self.signal.lock().stats
    }
}

/// Everything a pass reads and writes.
pub(crate) struct PassContext {
    pub(crate) display: Mutex<Box<dyn Display>>,
    pub(crate) scalars: Arc<ScalarMapTable>,
    pub(crate) constants: Arc<ConstantMapTable>,
    pub(crate) datums: Arc<DatumTable>,
}

impl PassContext {
    /// One rebuild pass. Returns `None` if no table was dirty.
    fn update_display(&self) -> Result<Option<PassReport>, EngineError> {
        let mut flags = PassFlags::empty();
        if self.constants.is_changed() {
            flags |= PassFlags::CONSTANT_MAPS;
        }
        if self.scalars.is_changed() {
            flags |= PassFlags::SCALAR_MAPS;
        }
        if self.datums.is_changed() {
            flags |= PassFlags::DATA;
        }
        if flags.is_empty() {
            trace!("wake with nothing dirty");
            return Ok(None);
        }

        let wiped = flags.requires_wipe();
        let start = Instant::now();
        let span = info_span!(
            "vizbind.pass",
            constant = flags.contains(PassFlags::CONSTANT_MAPS),
            scalar = flags.contains(PassFlags::SCALAR_MAPS),
            data = flags.contains(PassFlags::DATA),
            wiped,
            duration_us = tracing::field::Empty
        );
        let _guard = span.enter();

        let mut display = lock(&self.display);
        let display: &mut dyn Display = &mut **display;

        display.disable_action()?;
        let applied = self.apply(display, flags);
        let enabled = display.enable_action();
        applied?;
        enabled?;

        let duration = start.elapsed();
        span.record("duration_us", duration.as_micros() as u64);
        debug!(?flags, wiped, "rebuild pass applied");
        Ok(Some(PassReport {
            flags,
            wiped,
            duration,
        }))
    }

    /// Apply the tables named in `flags`, the snapshot taken when the pass
    /// started. Tables dirtied since then stay dirty; their wake has already
    /// scheduled the next pass.
    fn apply(&self, display: &mut dyn Display, flags: PassFlags) -> Result<(), EngineError> {
        let wiped = flags.requires_wipe();
        if wiped {
            display.remove_all_references()?;
            display.clear_maps()?;
        }
        // After a wipe both map tables go back out, dirty or not.
        if wiped || flags.contains(PassFlags::CONSTANT_MAPS) {
            self.constants.set_display(display)?;
        }
        if wiped || flags.contains(PassFlags::SCALAR_MAPS) {
            self.scalars.set_display(display)?;
        }
        if wiped || flags.contains(PassFlags::DATA) {
            self.datums.set_display(display, wiped)?;
        }
        Ok(())
    }
}

/// Owner of the rebuild pass and, in background mode, of its worker thread.
pub struct Updater {
    waker: Waker,
    context: Arc<PassContext>,
    config: UpdaterConfig,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Updater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Updater")
            .field("mode", &self.config.mode)
            .field("stats", &self.waker.stats())
            .finish_non_exhaustive()
    }
}

impl Updater {
    pub(crate) fn start(
        waker: Waker,
        context: PassContext,
        config: UpdaterConfig,
    ) -> Result<Self, EngineError> {
        let context = Arc::new(context);
        let handle = match config.mode {
            UpdateMode::Manual => None,
            UpdateMode::Background => {
                let signal = Arc::clone(&waker.signal);
                let ctx = Arc::clone(&context);
                let window = config.coalesce_window();
                let handle = thread::Builder::new()
                    .name(config.thread_name.clone())
                    .spawn(move || update_loop(&signal, &ctx, window))
                    .map_err(EngineError::Spawn)?;
                Some(handle)
            }
        };
        Ok(Self {
            waker,
            context,
            config,
            handle,
        })
    }

    #[must_use]
    pub fn mode(&self) -> UpdateMode {
        self.config.mode
    }

    #[must_use]
    pub fn waker(&self) -> &Waker {
        &self.waker
    }

    #[must_use]
    pub fn stats(&self) -> UpdaterStats {
        self.waker.stats()
    }

    /// Run the pending pass, if any.
    ///
    /// In manual mode the pass runs on the calling thread and its error is
    /// returned (and logged). In background mode this waits for the worker
    /// to go idle, up to the configured flush timeout, and returns `None`.
    pub fn flush(&self) -> Result<Option<PassReport>, EngineError> {
        match self.config.mode {
            UpdateMode::Background => {
                self.wait_idle(self.config.flush_timeout());
                Ok(None)
            }
            UpdateMode::Manual => {
                {
                    let mut state = self.waker.signal.lock();
                    if !state.pending {
                        return Ok(None);
                    }
                    state.pending = false;
                    state.running = true;
                }
                let result = self.context.update_display();
                finish_pass(&self.waker.signal, &result);
                result
            }
        }
    }

    /// Block until no pass is pending or running. Returns `false` on timeout.
    ///
    /// Always returns immediately in manual mode, where nothing runs on its own.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        if self.config.mode == UpdateMode::Manual {
            return !self.waker.is_pending();
        }
        let deadline = Instant::now() + timeout;
        let mut state = self.waker.signal.lock();
        while state.pending || state.running {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .waker
                .signal
                .cond
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        true
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.waker.signal.lock().shutdown = true;
            self.waker.signal.cond.notify_all();
            let _ = handle.join();
        }
    }
}

impl Drop for Updater {
    fn drop(&mut self) {
        self.stop();
    }
}

fn update_loop(signal: &Signal, context: &PassContext, window: Duration) {
    loop {
        {
            let mut state = signal.lock();
            while !state.pending && !state.shutdown {
                state = signal.wait(state);
            }
            if state.shutdown {
                return;
            }
            state.pending = false;
            state.running = true;
        }

        if !window.is_zero() {
            thread::sleep(window);
            // Wakes that arrived during the window are served by this pass.
            signal.lock().pending = false;
        }

        let result = context.update_display();
        finish_pass(signal, &result);
    }
}

fn finish_pass(signal: &Signal, result: &Result<Option<PassReport>, EngineError>) {
    let mut state = signal.lock();
    state.running = false;
    match result {
        Ok(Some(report)) => {
            state.stats.passes += 1;
            state.stats.last = Some(*report);
        }
        Ok(None) => {}
        Err(err) => {
            state.stats.failures += 1;
            error!(error = %err, "rebuild pass failed; update dropped");
        }
    }
    drop(state);
    signal.cond.notify_all();
}
