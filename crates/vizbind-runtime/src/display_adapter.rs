#![forbid(unsafe_code)]

//! The display adapter: three tables and an updater in front of one display.
//!
//! Client code registers adapters here and returns immediately; the display
//! itself is only ever touched by the updater.
//!
//! ```rust,ignore
//! let adapter = DisplayAdapter::builder().display(my_display).build()?;
//! let ids = adapter.ids().clone();
//!
//! adapter.add_constants(&ConstantMaps::single(&ids, DisplayAxis::Z, 2.0))?;
//! let color = ScalarMapAdapter::new(&ids, ScalarMapping::new("Temperature", DisplayAxis::Rgb));
//! adapter.accept(&color);
//! adapter.add_data(&DataAdapter::new(&ids, "surface"));
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{EngineConfig, UpdateMode};
use crate::error::EngineError;
use crate::tables::{ConstantMapTable, DatumTable, ScalarMapTable};
use crate::updater::{PassContext, PassReport, Updater, UpdaterStats, Waker};
use vizbind_core::{
    ComponentHandle, ConstantMapping, ConstantMaps, DataAdapter, Dimensionality, Display,
    IdAllocator, ScalarMapAdapter, ScalarMapping,
};

/// Builder for [`DisplayAdapter`].
#[derive(Default)]
pub struct DisplayAdapterBuilder {
    display: Option<Box<dyn Display>>,
    config: EngineConfig,
    ids: Option<IdAllocator>,
}

impl std::fmt::Debug for DisplayAdapterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayAdapterBuilder")
            .field("has_display", &self.display.is_some())
            .field("config", &self.config)
            .field("ids", &self.ids)
            .finish()
    }
}

impl DisplayAdapterBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The display to drive. Required.
    #[must_use]
    pub fn display(mut self, display: impl Display + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    /// An already boxed display.
    #[must_use]
    pub fn boxed_display(mut self, display: Box<dyn Display>) -> Self {
        self.display = Some(display);
        self
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Identifier allocator to share with client code. A fresh one is
    /// created if none is given.
    #[must_use]
    pub fn ids(mut self, ids: IdAllocator) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Validate the configuration, start the updater, and return the adapter.
    pub fn build(self) -> Result<DisplayAdapter, EngineError> {
        let display = self.display.ok_or(EngineError::MissingDisplay)?;
        self.config.validate()?;

        let dimensionality = display.dimensionality();
        let component = display.component();
        let waker = Waker::new();
        let scalars = ScalarMapTable::new(waker.clone());
        let constants = ConstantMapTable::new(waker.clone());
        let datums = DatumTable::new(waker.clone());

        let context = PassContext {
            display: Mutex::new(display),
            scalars: Arc::clone(&scalars),
            constants: Arc::clone(&constants),
            datums: Arc::clone(&datums),
        };
        let updater = Updater::start(waker, context, self.config.updater.clone())?;

        info!(
            mode = ?self.config.updater.mode,
            dimensionality = dimensionality.count(),
            "display adapter started"
        );
        Ok(DisplayAdapter {
            ids: self.ids.unwrap_or_else(IdAllocator::new),
            dimensionality,
            component,
            scalars,
            constants,
            datums,
            updater,
        })
    }
}

/// Front of the reconciliation engine for one display.
///
/// Every method returns after a short critical section; changes reach the
/// display with the next rebuild pass. Dropping the adapter stops its
/// updater thread.
#[derive(Debug)]
pub struct DisplayAdapter {
    ids: IdAllocator,
    dimensionality: Dimensionality,
    component: ComponentHandle,
    scalars: Arc<ScalarMapTable>,
    constants: Arc<ConstantMapTable>,
    datums: Arc<DatumTable>,
    updater: Updater,
}

impl DisplayAdapter {
    #[must_use]
    pub fn builder() -> DisplayAdapterBuilder {
        DisplayAdapterBuilder::new()
    }

    /// An adapter with the default configuration.
    pub fn new(display: impl Display + 'static) -> Result<Self, EngineError> {
        Self::builder().display(display).build()
    }

    /// Register a scalar mapping adapter and return its controller.
    ///
    /// If a structurally equal mapping is already registered, `adapter`
    /// duplicates it and the existing controller is returned.
    pub fn accept(&self, adapter: &Arc<ScalarMapAdapter>) -> Arc<ScalarMapAdapter> {
        let controller = self.scalars.accept(adapter);
        debug!(
            adapter = adapter.id().get(),
            controller = controller.id().get(),
            "scalar adapter accepted"
        );
        controller
    }

    /// Create an adapter for `mapping` and accept it.
    ///
    /// The table only holds a weak reference; the binding lasts as long as
    /// the returned adapter is kept alive.
    #[must_use]
    pub fn bind_scalar(&self, mapping: ScalarMapping) -> Arc<ScalarMapAdapter> {
        let adapter = ScalarMapAdapter::new(&self.ids, mapping);
        self.accept(&adapter);
        adapter
    }

    pub fn remove_scalar(&self, adapter: &Arc<ScalarMapAdapter>) {
        self.scalars.remove(adapter);
    }

    /// Register a constant set. Fails without changing anything if the set
    /// binds an axis another registered set already binds.
    pub fn add_constants(&self, maps: &Arc<ConstantMaps>) -> Result<(), EngineError> {
        self.constants.add(maps)?;
        Ok(())
    }

    /// Register several constant sets, all or none.
    pub fn add_all_constants(&self, batch: &[Arc<ConstantMaps>]) -> Result<(), EngineError> {
        self.constants.add_all(batch)?;
        Ok(())
    }

    /// Register a single constant binding as its own set.
    ///
    /// As with [`bind_scalar`](Self::bind_scalar), keep the returned set alive.
    pub fn bind_constant(&self, mapping: ConstantMapping) -> Result<Arc<ConstantMaps>, EngineError> {
        let maps = ConstantMaps::single(&self.ids, mapping.axis, mapping.value);
        self.add_constants(&maps)?;
        Ok(maps)
    }

    pub fn remove_constants(&self, maps: &Arc<ConstantMaps>) {
        self.constants.remove(maps);
    }

    pub fn add_data(&self, datum: &Arc<DataAdapter>) {
        self.datums.add(datum);
    }

    pub fn remove_data(&self, datum: &Arc<DataAdapter>) {
        self.datums.set_obsolete(datum);
    }

    #[must_use]
    pub fn dimensionality(&self) -> Dimensionality {
        self.dimensionality
    }

    /// Opaque handle of the display's UI component.
    #[must_use]
    pub fn component(&self) -> ComponentHandle {
        self.component
    }

    /// Allocator scoped to this adapter; clone it into client code.
    #[must_use]
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    #[must_use]
    pub fn mode(&self) -> UpdateMode {
        self.updater.mode()
    }

    /// Run the pending pass now (manual mode) or wait for the worker to
    /// finish it (background mode).
    pub fn flush(&self) -> Result<Option<PassReport>, EngineError> {
        self.updater.flush()
    }

    /// Block until no pass is pending or running. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.updater.wait_idle(timeout)
    }

    #[must_use]
    pub fn stats(&self) -> UpdaterStats {
        self.updater.stats()
    }

    #[must_use]
    pub fn scalar_table(&self) -> &ScalarMapTable {
        &self.scalars
    }

    #[must_use]
    pub fn constant_table(&self) -> &ConstantMapTable {
        &self.constants
    }

    #[must_use]
    pub fn datum_table(&self) -> &DatumTable {
        &self.datums
    }
}
