//! Reconciliation properties checked against an instrumented display.
//!
//! All tests run the updater in manual mode so every rebuild pass happens
//! on the test thread at a known point.

use std::sync::{Arc, Mutex};

use vizbind_core::{
    ComponentHandle, ConstantMapping, ConstantMaps, DataAdapter, DatumRef, Dimensionality,
    Display, DisplayAxis, DisplayError, IdAllocator, Range, ScalarMapAdapter, ScalarMapping, lock,
};
use vizbind_harness::{DisplayCall, RecordingDisplay};
use vizbind_runtime::{DatumState, DisplayAdapter, EngineConfig, PassFlags};

fn manual_adapter() -> (DisplayAdapter, RecordingDisplay, IdAllocator) {
    let display = RecordingDisplay::new();
    let ids = IdAllocator::new();
    let adapter = DisplayAdapter::builder()
        .display(display.clone())
        .config(EngineConfig::manual())
        .ids(ids.clone())
        .build()
        .unwrap();
    (adapter, display, ids)
}

fn temperature_color(ids: &IdAllocator) -> Arc<ScalarMapAdapter> {
    ScalarMapAdapter::new(ids, ScalarMapping::new("Temperature", DisplayAxis::Rgb))
}

fn position(calls: &[DisplayCall], operation: &str) -> usize {
    calls
        .iter()
        .position(|call| call.operation() == operation)
        .unwrap_or_else(|| panic!("no {operation} call in {calls:?}"))
}

// ============================================================================
// Scalar-map coalescing
// ============================================================================

#[test]
fn equal_scalar_mappings_share_one_controller() {
    let (adapter, display, ids) = manual_adapter();
    let first = temperature_color(&ids);
    first.set_range(Range::new(250.0, 320.0));
    let second = temperature_color(&ids);

    assert!(Arc::ptr_eq(&adapter.accept(&first), &first));
    let controller = adapter.accept(&second);

    assert!(Arc::ptr_eq(&controller, &first));
    assert!(Arc::ptr_eq(&second.controller().unwrap(), &first));
    assert!(first.effective_mapping().same_as(&second.effective_mapping()));

    adapter.flush().unwrap();
    assert_eq!(display.count("add_scalar_map"), 1);
}

#[test]
fn duplicate_range_change_reaches_the_controller() {
    let (adapter, display, ids) = manual_adapter();
    let first = temperature_color(&ids);
    let second = temperature_color(&ids);
    adapter.accept(&first);
    adapter.accept(&second);
    adapter.flush().unwrap();
    display.clear_calls();

    second.set_range(Range::new(0.0, 40.0));
    adapter.flush().unwrap();

    assert_eq!(first.mapping().range, Some(Range::new(0.0, 40.0)));
    let scalar_calls: Vec<_> = display
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            DisplayCall::AddScalarMap(map) => Some(map),
            _ => None,
        })
        .collect();
    assert_eq!(scalar_calls.len(), 1);
    assert_eq!(scalar_calls[0].range, Some(Range::new(0.0, 40.0)));
}

#[test]
fn removing_controller_keeps_binding_for_duplicates() {
    let (adapter, display, ids) = manual_adapter();
    let first = temperature_color(&ids);
    let second = temperature_color(&ids);
    adapter.accept(&first);
    adapter.accept(&second);
    adapter.flush().unwrap();

    adapter.remove_scalar(&first);
    adapter.flush().unwrap();

    assert!(!second.is_duplicate());
    assert_eq!(display.scene().scalar_maps, vec![second.mapping()]);
}

// ============================================================================
// Constant-map exclusivity
// ============================================================================

#[test]
fn colliding_constant_sets_are_rejected() {
    let (adapter, display, ids) = manual_adapter();
    let first = ConstantMaps::single(&ids, DisplayAxis::Z, 2.0);
    let second = ConstantMaps::single(&ids, DisplayAxis::Z, 5.0);
    adapter.add_constants(&first).unwrap();

    let err = adapter.add_constants(&second).unwrap_err();

    assert!(err.is_duplicate_axis());
    assert_eq!(
        adapter.constant_table().aggregated(),
        vec![ConstantMapping::new(DisplayAxis::Z, 2.0)]
    );
    adapter.flush().unwrap();
    assert_eq!(
        display.scene().constant_maps,
        vec![ConstantMapping::new(DisplayAxis::Z, 2.0)]
    );
}

#[test]
fn colliding_batch_leaves_neither_set() {
    let (adapter, _display, ids) = manual_adapter();
    let a = ConstantMaps::single(&ids, DisplayAxis::Z, 2.0);
    let b = ConstantMaps::single(&ids, DisplayAxis::Z, 5.0);

    let err = adapter
        .add_all_constants(&[Arc::clone(&a), Arc::clone(&b)])
        .unwrap_err();

    assert!(err.is_duplicate_axis());
    assert!(adapter.constant_table().aggregated().is_empty());
    assert!(adapter.flush().unwrap().is_none());
}

// ============================================================================
// Datum lifecycle
// ============================================================================

#[test]
fn unshown_datum_withdrawn_leaves_no_trace() {
    let (adapter, display, ids) = manual_adapter();
    let datum = DataAdapter::new(&ids, "surface");
    adapter.add_data(&datum);
    adapter.remove_data(&datum);

    adapter.flush().unwrap();

    assert_eq!(display.count("add_reference"), 0);
    assert_eq!(display.count("remove_reference"), 0);
    assert_eq!(adapter.datum_table().state_of(datum.id()), None);
}

#[test]
fn shown_datum_withdrawn_is_removed_exactly_once() {
    let (adapter, display, ids) = manual_adapter();
    let datum = DataAdapter::new(&ids, "surface");
    adapter.add_data(&datum);
    adapter.flush().unwrap();
    assert_eq!(
        adapter.datum_table().state_of(datum.id()),
        Some(DatumState::Extant)
    );

    adapter.remove_data(&datum);
    adapter.remove_data(&datum);
    let report = adapter.flush().unwrap().unwrap();

    assert!(!report.wiped);
    assert_eq!(display.count("remove_reference"), 1);
    assert!(display.scene().references.is_empty());
    assert!(adapter.flush().unwrap().is_none());
}

#[test]
fn datum_constant_change_resends_only_data() {
    let (adapter, display, ids) = manual_adapter();
    let maps = ConstantMaps::single(&ids, DisplayAxis::LineWidth, 1.0);
    let datum = DataAdapter::with_constants(&ids, "contours", Arc::clone(&maps));
    adapter.add_data(&datum);
    adapter.flush().unwrap();
    display.clear_calls();

    maps.set(DisplayAxis::LineWidth, 3.0);
    let report = adapter.flush().unwrap().unwrap();

    assert_eq!(report.flags, PassFlags::DATA);
    assert_eq!(
        display.operations(),
        vec!["disable_action", "add_reference", "enable_action"]
    );
    match &display.calls()[1] {
        DisplayCall::AddReference { constants, .. } => {
            assert_eq!(
                constants,
                &vec![ConstantMapping::new(DisplayAxis::LineWidth, 3.0)]
            );
        }
        other => panic!("unexpected call {other:?}"),
    }
}

// ============================================================================
// Rebuild coalescing
// ============================================================================

#[test]
fn many_mutations_make_one_pass() {
    let (adapter, display, ids) = manual_adapter();
    let scalar = temperature_color(&ids);
    adapter.accept(&scalar);
    for i in 0..10 {
        scalar.set_range(Range::new(0.0, f64::from(i + 1)));
    }
    let data: Vec<_> = (0..5)
        .map(|i| DataAdapter::new(&ids, format!("datum-{i}")))
        .collect();
    for datum in &data {
        adapter.add_data(datum);
    }
    let z = ConstantMaps::single(&ids, DisplayAxis::Z, 1.0);
    adapter.add_constants(&z).unwrap();

    let report = adapter.flush().unwrap().unwrap();

    assert!(report.flags.is_all());
    assert_eq!(adapter.stats().passes, 1);
    assert!(adapter.stats().wakes > 1);
    assert!(adapter.flush().unwrap().is_none());
    assert_eq!(display.count("add_scalar_map"), 1);
    assert_eq!(
        display.scene().scalar_maps[0].range,
        Some(Range::new(0.0, 10.0))
    );
    assert_eq!(display.count("add_reference"), 5);
}

// ============================================================================
// Apply ordering
// ============================================================================

#[test]
fn constants_then_scalars_then_data() {
    let (adapter, display, ids) = manual_adapter();
    let datum = DataAdapter::new(&ids, "surface");
    let color = temperature_color(&ids);
    let z = ConstantMaps::single(&ids, DisplayAxis::Z, 2.0);
    // Registered in reverse of the apply order.
    adapter.add_data(&datum);
    adapter.accept(&color);
    adapter.add_constants(&z).unwrap();

    adapter.flush().unwrap();

    let calls = display.calls();
    let constant = position(&calls, "add_constant_maps");
    let scalar = position(&calls, "add_scalar_map");
    let data = position(&calls, "add_reference");
    assert!(position(&calls, "disable_action") < position(&calls, "clear_maps"));
    assert!(position(&calls, "clear_maps") < constant);
    assert!(constant < scalar);
    assert!(scalar < data);
    assert_eq!(calls.last(), Some(&DisplayCall::EnableAction));
}

#[test]
fn map_change_wipes_and_restores_everything() {
    let (adapter, display, ids) = manual_adapter();
    let datum = DataAdapter::new(&ids, "surface");
    let z = ConstantMaps::single(&ids, DisplayAxis::Z, 2.0);
    adapter.add_data(&datum);
    adapter.add_constants(&z).unwrap();
    adapter.flush().unwrap();

    let color = temperature_color(&ids);
    adapter.accept(&color);
    let report = adapter.flush().unwrap().unwrap();

    assert!(report.wiped);
    let scene = display.scene();
    assert_eq!(scene.constant_maps.len(), 1);
    assert_eq!(scene.scalar_maps.len(), 1);
    assert!(scene.references.contains_key(&datum.id()));
    assert!(scene.action_enabled);
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn end_to_end_scenario() {
    let (adapter, display, ids) = manual_adapter();

    let z = ConstantMaps::single(&ids, DisplayAxis::Z, 2.0);
    adapter.add_constants(&z).unwrap();
    let first = temperature_color(&ids);
    let second = temperature_color(&ids);
    adapter.accept(&first);
    adapter.accept(&second);
    let datum = DataAdapter::new(&ids, "surface");
    adapter.add_data(&datum);

    adapter.flush().unwrap();

    assert_eq!(
        display.calls(),
        vec![
            DisplayCall::DisableAction,
            DisplayCall::RemoveAllReferences,
            DisplayCall::ClearMaps,
            DisplayCall::AddConstantMaps(vec![ConstantMapping::new(DisplayAxis::Z, 2.0)]),
            DisplayCall::AddScalarMap(ScalarMapping::new("Temperature", DisplayAxis::Rgb)),
            DisplayCall::AddReference {
                datum: datum.datum_ref(),
                constants: Vec::new(),
            },
            DisplayCall::EnableAction,
        ]
    );
    assert!(Arc::ptr_eq(&second.controller().unwrap(), &first));
}

// ============================================================================
// Mutations racing a pass
// ============================================================================

type Hook = Box<dyn FnOnce() + Send>;

/// Recording display that runs a one-shot callback when a pass starts,
/// after the updater has taken its dirty-table snapshot.
#[derive(Clone)]
struct HookDisplay {
    inner: RecordingDisplay,
    on_disable: Arc<Mutex<Option<Hook>>>,
}

impl HookDisplay {
    fn new(inner: RecordingDisplay) -> Self {
        Self {
            inner,
            on_disable: Arc::new(Mutex::new(None)),
        }
    }

    fn arm(&self, hook: impl FnOnce() + Send + 'static) {
        *lock(&self.on_disable) = Some(Box::new(hook));
    }
}

impl Display for HookDisplay {
    fn dimensionality(&self) -> Dimensionality {
        self.inner.dimensionality()
    }

    fn component(&self) -> ComponentHandle {
        self.inner.component()
    }

    fn disable_action(&mut self) -> Result<(), DisplayError> {
        let hook = lock(&self.on_disable).take();
        if let Some(hook) = hook {
            hook();
        }
        self.inner.disable_action()
    }

    fn enable_action(&mut self) -> Result<(), DisplayError> {
        self.inner.enable_action()
    }

    fn remove_all_references(&mut self) -> Result<(), DisplayError> {
        self.inner.remove_all_references()
    }

    fn clear_maps(&mut self) -> Result<(), DisplayError> {
        self.inner.clear_maps()
    }

    fn add_constant_maps(&mut self, maps: &[ConstantMapping]) -> Result<(), DisplayError> {
        self.inner.add_constant_maps(maps)
    }

    fn add_scalar_map(&mut self, map: &ScalarMapping) -> Result<(), DisplayError> {
        self.inner.add_scalar_map(map)
    }

    fn add_reference(
        &mut self,
        datum: &DatumRef,
        constants: &[ConstantMapping],
    ) -> Result<(), DisplayError> {
        self.inner.add_reference(datum, constants)
    }

    fn remove_reference(&mut self, datum: &DatumRef) -> Result<(), DisplayError> {
        self.inner.remove_reference(datum)
    }
}

#[test]
fn mutation_during_pass_waits_for_next_pass() {
    let display = RecordingDisplay::new();
    let hooked = HookDisplay::new(display.clone());
    let ids = IdAllocator::new();
    let adapter = DisplayAdapter::builder()
        .display(hooked.clone())
        .config(EngineConfig::manual())
        .ids(ids.clone())
        .build()
        .unwrap();

    let temperature = temperature_color(&ids);
    adapter.accept(&temperature);
    adapter.flush().unwrap();

    let datum = DataAdapter::new(&ids, "surface");
    adapter.add_data(&datum);
    display.clear_calls();

    let late = Arc::clone(&temperature);
    hooked.arm(move || late.set_range(Range::new(0.0, 1.0)));

    // The range change lands after the snapshot: this pass is data only.
    let report = adapter.flush().unwrap().unwrap();
    assert_eq!(report.flags, PassFlags::DATA);
    assert!(!report.wiped);
    assert_eq!(display.count("add_scalar_map"), 0);
    assert_eq!(display.count("clear_maps"), 0);
    assert!(display.scene().references.contains_key(&datum.id()));

    display.clear_calls();
    let report = adapter.flush().unwrap().unwrap();
    assert!(report.wiped);
    assert!(report.flags.contains(PassFlags::SCALAR_MAPS));

    let scene = display.scene();
    assert_eq!(scene.scalar_maps.len(), 1);
    assert_eq!(scene.scalar_maps[0].range, Some(Range::new(0.0, 1.0)));
    assert!(scene.references.contains_key(&datum.id()));
    assert!(adapter.flush().unwrap().is_none());
}
