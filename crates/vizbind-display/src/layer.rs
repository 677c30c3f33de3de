#![forbid(unsafe_code)]

//! Leaf displayable.
//!
//! A [`Layer`] owns one datum plus the scalar and constant bindings it is
//! drawn with. Constant-valued properties live in a [`ConstantMaps`] set
//! attached to the datum, so changing the colour of one layer re-sends only
//! that layer's datum and never clears the display's maps.

use std::sync::{Arc, Mutex};

use tracing::debug;

use vizbind_core::{
    AdapterId, Binding, ConstantMapping, ConstantMaps, DataAdapter, DisplayAxis, IdAllocator,
    ListenerId, Listeners, ScalarMapAdapter, ScalarMapSet, ScalarMapping, lock,
};
use vizbind_runtime::DisplayAdapter;

use crate::animation::merge_times;
use crate::displayable::{Displayable, DisplayableEvent, DisplayableListener};
use crate::error::DisplayableError;
use crate::property::{DisplayProperties, Property};

/// Builder for [`Layer`].
#[derive(Debug)]
pub struct LayerBuilder {
    ids: IdAllocator,
    label: String,
    scalars: Vec<ScalarMapping>,
    constants: Vec<ConstantMapping>,
    times: Vec<f64>,
    properties: Vec<Property>,
}

impl LayerBuilder {
    /// Map a shared quantity. Layers mapping the same quantity to the same
    /// axis share one binding on the display.
    #[must_use]
    pub fn scalar(mut self, mapping: ScalarMapping) -> Self {
        self.scalars.push(mapping);
        self
    }

    /// Map a quantity of this layer's own, named after `base`.
    #[must_use]
    pub fn private_scalar(mut self, base: &str, axis: DisplayAxis) -> Self {
        let quantity = self.ids.unique_quantity(base);
        self.scalars.push(ScalarMapping::new(quantity, axis));
        self
    }

    #[must_use]
    pub fn constant(mut self, mapping: ConstantMapping) -> Self {
        self.constants.push(mapping);
        self
    }

    #[must_use]
    pub fn times(mut self, times: impl IntoIterator<Item = f64>) -> Self {
        self.times.extend(times);
        self
    }

    #[must_use]
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Fails if two constants bind the same axis.
    pub fn build(self) -> Result<Arc<Layer>, DisplayableError> {
        let constants = ConstantMaps::from_mappings(&self.ids, self.constants)?;
        let datum = DataAdapter::with_constants(&self.ids, self.label.as_str(), Arc::clone(&constants));
        let scalars = self
            .scalars
            .into_iter()
            .map(|mapping| ScalarMapAdapter::new(&self.ids, mapping))
            .collect();

        let layer = Arc::new(Layer {
            id: self.ids.next_id(),
            ids: self.ids,
            label: self.label,
            constants,
            datum,
            state: Mutex::new(LayerState {
                scalars,
                properties: DisplayProperties::new(),
                times: merge_times([self.times]),
                display: None,
                destroyed: false,
            }),
            listeners: Listeners::new(),
        });
        for property in self.properties {
            layer.set_property(property)?;
        }
        Ok(layer)
    }
}

#[derive(Debug)]
struct LayerState {
    scalars: Vec<Arc<ScalarMapAdapter>>,
    properties: DisplayProperties,
    times: Vec<f64>,
    display: Option<Arc<DisplayAdapter>>,
    destroyed: bool,
}

/// A single datum with its own scalar and constant bindings.
#[derive(Debug)]
pub struct Layer {
    id: AdapterId,
    ids: IdAllocator,
    label: String,
    constants: Arc<ConstantMaps>,
    datum: Arc<DataAdapter>,
    state: Mutex<LayerState>,
    listeners: Listeners<DisplayableEvent>,
}

impl Layer {
    #[must_use]
    pub fn builder(ids: &IdAllocator, label: impl Into<String>) -> LayerBuilder {
        LayerBuilder {
            ids: ids.clone(),
            label: label.into(),
            scalars: Vec::new(),
            constants: Vec::new(),
            times: Vec::new(),
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn datum(&self) -> &Arc<DataAdapter> {
        &self.datum
    }

    /// Constants the datum is rendered with.
    #[must_use]
    pub fn constant_maps(&self) -> &Arc<ConstantMaps> {
        &self.constants
    }

    #[must_use]
    pub fn scalar_adapters(&self) -> Vec<Arc<ScalarMapAdapter>> {
        lock(&self.state).scalars.clone()
    }

    /// Add a scalar binding, registering it right away if attached.
    pub fn add_scalar_map(
        &self,
        mapping: ScalarMapping,
    ) -> Result<Arc<ScalarMapAdapter>, DisplayableError> {
        let adapter = ScalarMapAdapter::new(&self.ids, mapping);
        let display = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return Err(DisplayableError::Destroyed);
            }
            state.scalars.push(Arc::clone(&adapter));
            state.display.clone()
        };
        if let Some(display) = display {
            display.accept(&adapter);
        }
        self.fire_scalar_map_set();
        Ok(adapter)
    }

    /// Drop every scalar binding equal to `mapping`. Returns `false` if
    /// there was none.
    pub fn remove_scalar_map(&self, mapping: &ScalarMapping) -> bool {
        let (removed, display) = {
            let mut state = lock(&self.state);
            let (removed, kept) = std::mem::take(&mut state.scalars)
                .into_iter()
                .partition::<Vec<_>, _>(|adapter| adapter.mapping() == *mapping);
            state.scalars = kept;
            (removed, state.display.clone())
        };
        if removed.is_empty() {
            return false;
        }
        if let Some(display) = display {
            for adapter in &removed {
                display.remove_scalar(adapter);
            }
        }
        self.fire_scalar_map_set();
        true
    }

    /// Replace the layer's animation times. The datum is marked changed.
    pub fn set_animation_times(&self, times: impl IntoIterator<Item = f64>) {
        let times: Vec<f64> = times.into_iter().collect();
        lock(&self.state).times = merge_times([times]);
        self.datum.mark_changed();
    }

    /// Announce that the datum's contents changed.
    pub fn mark_data_changed(&self) {
        self.datum.mark_changed();
    }

    fn fire_scalar_map_set(&self) {
        self.listeners.fire(&DisplayableEvent::ScalarMapSet {
            source: self.id,
            maps: self.scalar_map_set(),
        });
    }

    fn apply(&self, property: &Property, display: Option<&DisplayAdapter>) {
        for mapping in property.constant_maps() {
            self.constants.set(mapping.axis, mapping.value);
        }
        match property {
            Property::Visible(visible) => {
                if let Some(display) = display {
                    if *visible {
                        display.add_data(&self.datum);
                    } else {
                        display.remove_data(&self.datum);
                    }
                }
            }
            Property::SelectedRange(Some(range)) => {
                for adapter in self.scalar_adapters() {
                    if *adapter.axis() == DisplayAxis::SelectRange {
                        adapter.set_range(*range);
                    }
                }
            }
            _ => {}
        }
    }

    fn register(&self, display: &DisplayAdapter) {
        let (scalars, visible) = {
            let state = lock(&self.state);
            (state.scalars.clone(), state.properties.visible())
        };
        for adapter in &scalars {
            display.accept(adapter);
        }
        if visible {
            display.add_data(&self.datum);
        }
    }

    fn withdraw(&self, display: &DisplayAdapter) {
        for adapter in self.scalar_adapters() {
            display.remove_scalar(&adapter);
        }
        display.remove_data(&self.datum);
    }
}

impl Displayable for Layer {
    fn id(&self) -> AdapterId {
        self.id
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn bindings(&self) -> Vec<Binding> {
        let mut bindings: Vec<Binding> = self
            .scalar_adapters()
            .iter()
            .map(|adapter| Binding::Scalar(adapter.effective_mapping()))
            .collect();
        bindings.extend(self.constants.mappings().into_iter().map(Binding::Constant));
        bindings.push(Binding::Data(self.datum.datum_ref()));
        bindings
    }

    fn scalar_map_set(&self) -> ScalarMapSet {
        let mut set = ScalarMapSet::new();
        for adapter in self.scalar_adapters() {
            set.insert(adapter.mapping());
        }
        set
    }

    fn set_property(&self, property: Property) -> Result<(), DisplayableError> {
        let display = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return Err(DisplayableError::Destroyed);
            }
            if !state.properties.set(property.clone()) {
                return Ok(());
            }
            state.display.clone()
        };
        self.apply(&property, display.as_deref());
        debug!(layer = self.id.get(), key = ?property.key(), "layer property set");
        self.listeners.fire(&DisplayableEvent::Property {
            source: self.id,
            property,
        });
        Ok(())
    }

    fn properties(&self) -> DisplayProperties {
        lock(&self.state).properties.clone()
    }

    fn attach(&self, display: &Arc<DisplayAdapter>) -> Result<(), DisplayableError> {
        let previous = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return Err(DisplayableError::Destroyed);
            }
            state.display.replace(Arc::clone(display))
        };
        if let Some(previous) = previous {
            if Arc::ptr_eq(&previous, display) {
                return Ok(());
            }
            self.withdraw(&previous);
        }
        self.register(display);
        debug!(layer = self.id.get(), "layer attached");
        Ok(())
    }

    fn detach(&self) {
        let display = lock(&self.state).display.take();
        if let Some(display) = display {
            self.withdraw(&display);
            debug!(layer = self.id.get(), "layer detached");
        }
    }

    fn is_attached(&self) -> bool {
        lock(&self.state).display.is_some()
    }

    fn add_constant_map(&self, mapping: ConstantMapping) -> Result<(), DisplayableError> {
        if lock(&self.state).destroyed {
            return Err(DisplayableError::Destroyed);
        }
        self.constants.set(mapping.axis, mapping.value);
        Ok(())
    }

    fn animation_times(&self, force: bool) -> Vec<f64> {
        let state = lock(&self.state);
        if force || state.properties.use_times_in_animation() {
            state.times.clone()
        } else {
            Vec::new()
        }
    }

    fn subscribe(&self, listener: DisplayableListener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn destroy(&self) {
        self.detach();
        lock(&self.state).destroyed = true;
    }

    fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }
}
