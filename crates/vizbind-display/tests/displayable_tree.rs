//! Displayable trees driving a recorded display through a manual-mode
//! adapter.

use std::sync::Arc;

use vizbind_core::{ConstantMapping, DisplayAxis, ScalarMapping};
use vizbind_display::{CompositeDisplayable, Displayable, Layer, Property, Rgba};
use vizbind_harness::RecordingDisplay;
use vizbind_runtime::{DisplayAdapter, EngineConfig};

fn manual(display: &RecordingDisplay) -> Arc<DisplayAdapter> {
    Arc::new(
        DisplayAdapter::builder()
            .display(display.clone())
            .config(EngineConfig::manual())
            .build()
            .unwrap(),
    )
}

fn temperature_layer(adapter: &DisplayAdapter, label: &str) -> Arc<Layer> {
    Layer::builder(adapter.ids(), label)
        .scalar(ScalarMapping::new("Temperature", DisplayAxis::Rgb))
        .build()
        .unwrap()
}

#[test]
fn shared_quantities_bind_once() {
    let display = RecordingDisplay::new();
    let adapter = manual(&display);
    let group = CompositeDisplayable::new(adapter.ids(), "surface");
    let a = temperature_layer(&adapter, "model");
    let b = temperature_layer(&adapter, "observed");
    group.add_displayable(a.clone()).unwrap();
    group.add_displayable(b.clone()).unwrap();

    group.attach(&adapter).unwrap();
    adapter.flush().unwrap();

    let scene = display.scene();
    assert_eq!(scene.scalar_maps.len(), 1);
    assert_eq!(scene.references.len(), 2);
    assert_eq!(display.count("add_scalar_map"), 1);
}

#[test]
fn attaching_a_child_to_an_attached_group_registers_it() {
    let display = RecordingDisplay::new();
    let adapter = manual(&display);
    let group = CompositeDisplayable::new(adapter.ids(), "surface");
    group.attach(&adapter).unwrap();

    let late = temperature_layer(&adapter, "late");
    group.add_displayable(late.clone()).unwrap();
    assert!(late.is_attached());

    adapter.flush().unwrap();
    assert!(display.scene().references.contains_key(&late.datum().id()));
}

#[test]
fn group_colour_resends_only_data() {
    let display = RecordingDisplay::new();
    let adapter = manual(&display);
    let group = CompositeDisplayable::new(adapter.ids(), "surface");
    let a = temperature_layer(&adapter, "a");
    let b = temperature_layer(&adapter, "b");
    group.add_displayable(a.clone()).unwrap();
    group.add_displayable(b.clone()).unwrap();
    group.attach(&adapter).unwrap();
    adapter.flush().unwrap();
    display.clear_calls();

    group
        .set_property(Property::Color(Rgba::opaque(0.0, 0.0, 1.0)))
        .unwrap();
    let report = adapter.flush().unwrap().unwrap();

    assert!(!report.wiped);
    assert_eq!(display.count("clear_maps"), 0);
    assert_eq!(display.count("add_reference"), 2);
    let scene = display.scene();
    for layer in [&a, &b] {
        let constants = layer.datum().constants();
        assert!(constants.contains(&ConstantMapping::new(DisplayAxis::Blue, 1.0)));
        assert!(scene.references.contains_key(&layer.datum().id()));
    }
}

#[test]
fn hiding_a_range_withdraws_only_those_layers() {
    let display = RecordingDisplay::new();
    let adapter = manual(&display);
    let group = CompositeDisplayable::new(adapter.ids(), "frames");
    let layers: Vec<_> = (0..3)
        .map(|i| temperature_layer(&adapter, &format!("frame{i}")))
        .collect();
    for layer in &layers {
        group.add_displayable(layer.clone()).unwrap();
    }
    group.attach(&adapter).unwrap();
    adapter.flush().unwrap();

    group.set_visible_range(false, 0, 1).unwrap();
    adapter.flush().unwrap();

    let references = display.scene().references;
    assert_eq!(references.len(), 1);
    assert!(references.contains_key(&layers[2].datum().id()));
}

#[test]
fn removing_the_controlling_layer_keeps_the_shared_binding() {
    let display = RecordingDisplay::new();
    let adapter = manual(&display);
    let group = CompositeDisplayable::new(adapter.ids(), "surface");
    let first = temperature_layer(&adapter, "first");
    let second = temperature_layer(&adapter, "second");
    group.add_displayable(first.clone()).unwrap();
    group.add_displayable(second.clone()).unwrap();
    group.attach(&adapter).unwrap();
    adapter.flush().unwrap();

    assert!(group.remove_displayable(&*first));
    adapter.flush().unwrap();

    let scene = display.scene();
    assert_eq!(scene.scalar_maps.len(), 1);
    assert_eq!(scene.references.len(), 1);
    assert!(!first.is_attached());
    let remaining = &second.scalar_adapters()[0];
    assert!(!remaining.is_duplicate());
}

#[test]
fn destroying_the_group_empties_the_display() {
    let display = RecordingDisplay::new();
    let adapter = manual(&display);
    let group = CompositeDisplayable::new(adapter.ids(), "surface");
    let a = temperature_layer(&adapter, "a");
    group.add_displayable(a.clone()).unwrap();
    group
        .add_constant_map(ConstantMapping::new(DisplayAxis::Z, 1.0))
        .unwrap();
    group.attach(&adapter).unwrap();
    adapter.flush().unwrap();
    assert_eq!(display.scene().references.len(), 1);

    group.destroy();
    adapter.flush().unwrap();

    let scene = display.scene();
    assert!(scene.references.is_empty());
    assert!(scene.scalar_maps.is_empty());
    assert!(a.is_destroyed());
}

#[test]
fn moving_a_layer_between_displays() {
    let first_display = RecordingDisplay::new();
    let second_display = RecordingDisplay::new();
    let first = manual(&first_display);
    let second = manual(&second_display);
    let layer = Layer::builder(first.ids(), "roaming")
        .scalar(ScalarMapping::new("Pressure", DisplayAxis::Z))
        .build()
        .unwrap();

    layer.attach(&first).unwrap();
    first.flush().unwrap();
    layer.attach(&second).unwrap();
    first.flush().unwrap();
    second.flush().unwrap();

    assert!(first_display.scene().references.is_empty());
    assert_eq!(second_display.scene().references.len(), 1);
}
