#![forbid(unsafe_code)]

//! Instrumented fake display.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::trace;
use vizbind_core::{
    AdapterId, ComponentHandle, ConstantMapping, DatumRef, Dimensionality, Display, DisplayError,
    ScalarMapping, lock,
};

/// One call made on a [`RecordingDisplay`].
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCall {
    DisableAction,
    EnableAction,
    RemoveAllReferences,
    ClearMaps,
    AddConstantMaps(Vec<ConstantMapping>),
    AddScalarMap(ScalarMapping),
    AddReference {
        datum: DatumRef,
        constants: Vec<ConstantMapping>,
    },
    RemoveReference(DatumRef),
}

impl DisplayCall {
    /// Name of the [`Display`] method this call went to.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::DisableAction => "disable_action",
            Self::EnableAction => "enable_action",
            Self::RemoveAllReferences => "remove_all_references",
            Self::ClearMaps => "clear_maps",
            Self::AddConstantMaps(_) => "add_constant_maps",
            Self::AddScalarMap(_) => "add_scalar_map",
            Self::AddReference { .. } => "add_reference",
            Self::RemoveReference(_) => "remove_reference",
        }
    }
}

/// What the fake scene currently holds.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneState {
    pub scalar_maps: Vec<ScalarMapping>,
    pub constant_maps: Vec<ConstantMapping>,
    pub references: BTreeMap<AdapterId, DatumRef>,
    pub action_enabled: bool,
}

impl Default for SceneState {
    fn default() -> Self {
        Self {
            scalar_maps: Vec::new(),
            constant_maps: Vec::new(),
            references: BTreeMap::new(),
            action_enabled: true,
        }
    }
}

#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<DisplayCall>,
    scene: SceneState,
    /// Operations to fail, each once, in order of arrival.
    failures: VecDeque<&'static str>,
}

impl Recorder {
    fn take_failure(&mut self, operation: &'static str) -> Option<DisplayError> {
        let pos = self.failures.iter().position(|op| *op == operation)?;
        self.failures.remove(pos);
        Some(DisplayError::rejected(operation, "injected failure"))
    }

    fn apply(&mut self, call: DisplayCall) -> Result<(), DisplayError> {
        let operation = call.operation();
        trace!(operation, "recording display call");
        self.calls.push(call.clone());
        if let Some(err) = self.take_failure(operation) {
            return Err(err);
        }
        let scene = &mut self.scene;
        match call {
            DisplayCall::DisableAction => scene.action_enabled = false,
            DisplayCall::EnableAction => scene.action_enabled = true,
            DisplayCall::RemoveAllReferences => scene.references.clear(),
            DisplayCall::ClearMaps => {
                scene.scalar_maps.clear();
                scene.constant_maps.clear();
            }
            DisplayCall::AddConstantMaps(maps) => {
                for map in &maps {
                    if scene.constant_maps.iter().any(|m| m.axis == map.axis) {
                        return Err(DisplayError::rejected(
                            operation,
                            format!("axis {} already has a constant", map.axis),
                        ));
                    }
                }
                scene.constant_maps.extend(maps);
            }
            DisplayCall::AddScalarMap(map) => {
                if scene.scalar_maps.contains(&map) {
                    return Err(DisplayError::rejected(
                        operation,
                        format!("{} -> {} is already mapped", map.quantity, map.axis),
                    ));
                }
                scene.scalar_maps.push(map);
            }
            DisplayCall::AddReference { datum, .. } => {
                scene.references.insert(datum.id, datum);
            }
            DisplayCall::RemoveReference(datum) => {
                if scene.references.remove(&datum.id).is_none() {
                    return Err(DisplayError::rejected(
                        operation,
                        format!("datum {} is not attached", datum.id),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A [`Display`] that records calls instead of rendering.
///
/// Clones share the same record, so a test keeps one clone and hands the
/// other to the engine.
///
/// The scene model rejects what a real display would: a second scalar map
/// for the same quantity and axis, a second constant for an axis, and the
/// removal of a datum that is not attached.
#[derive(Debug, Clone)]
pub struct RecordingDisplay {
    dimensionality: Dimensionality,
    component: ComponentHandle,
    recorder: Arc<Mutex<Recorder>>,
}

impl Default for RecordingDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDisplay {
    /// A three-dimensional display.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimensionality(Dimensionality::Three)
    }

    #[must_use]
    pub fn with_dimensionality(dimensionality: Dimensionality) -> Self {
        Self {
            dimensionality,
            component: ComponentHandle(1),
            recorder: Arc::new(Mutex::new(Recorder::default())),
        }
    }

    #[must_use]
    pub fn with_component(mut self, component: ComponentHandle) -> Self {
        self.component = component;
        self
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<DisplayCall> {
        lock(&self.recorder).calls.clone()
    }

    /// Names of the calls so far, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<&'static str> {
        lock(&self.recorder)
            .calls
            .iter()
            .map(DisplayCall::operation)
            .collect()
    }

    /// Number of calls to `operation`.
    #[must_use]
    pub fn count(&self, operation: &str) -> usize {
        lock(&self.recorder)
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Return the calls so far and start a fresh record.
    pub fn take_calls(&self) -> Vec<DisplayCall> {
        std::mem::take(&mut lock(&self.recorder).calls)
    }

    pub fn clear_calls(&self) {
        lock(&self.recorder).calls.clear();
    }

    #[must_use]
    pub fn scene(&self) -> SceneState {
        lock(&self.recorder).scene.clone()
    }

    /// Fail the next call to `operation` once. The call is still recorded.
    pub fn fail_next(&self, operation: &'static str) {
        lock(&self.recorder).failures.push_back(operation);
    }
}

impl Display for RecordingDisplay {
    fn dimensionality(&self) -> Dimensionality {
        self.dimensionality
    }

    fn component(&self) -> ComponentHandle {
        self.component
    }

    fn disable_action(&mut self) -> Result<(), DisplayError> {
        lock(&self.recorder).apply(DisplayCall::DisableAction)
    }

    fn enable_action(&mut self) -> Result<(), DisplayError> {
        lock(&self.recorder).apply(DisplayCall::EnableAction)
    }

    fn remove_all_references(&mut self) -> Result<(), DisplayError> {
        lock(&self.recorder).apply(DisplayCall::RemoveAllReferences)
    }

    fn clear_maps(&mut self) -> Result<(), DisplayError> {
        lock(&self.recorder).apply(DisplayCall::ClearMaps)
    }

    fn add_constant_maps(&mut self, maps: &[ConstantMapping]) -> Result<(), DisplayError> {
        lock(&self.recorder).apply(DisplayCall::AddConstantMaps(maps.to_vec()))
    }

    fn add_scalar_map(&mut self, map: &ScalarMapping) -> Result<(), DisplayError> {
        lock(&self.recorder).apply(DisplayCall::AddScalarMap(map.clone()))
    }

    fn add_reference(
        &mut self,
        datum: &DatumRef,
        constants: &[ConstantMapping],
    ) -> Result<(), DisplayError> {
        lock(&self.recorder).apply(DisplayCall::AddReference {
            datum: datum.clone(),
            constants: constants.to_vec(),
        })
    }

    fn remove_reference(&mut self, datum: &DatumRef) -> Result<(), DisplayError> {
        lock(&self.recorder).apply(DisplayCall::RemoveReference(datum.clone()))
    }
}
