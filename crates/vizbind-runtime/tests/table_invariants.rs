//! Property tests for the three tables under random operation sequences.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use proptest::prelude::*;
use vizbind_core::{
    ConstantMapping, ConstantMaps, DataAdapter, Display, DisplayAxis, IdAllocator,
    ScalarMapAdapter, ScalarMapping,
};
use vizbind_harness::RecordingDisplay;
use vizbind_runtime::{ConstantMapTable, DatumState, DatumTable, ScalarMapTable, Waker};

const QUANTITIES: [&str; 3] = ["Temperature", "Pressure", "Humidity"];
const AXES: [DisplayAxis; 3] = [DisplayAxis::X, DisplayAxis::Rgb, DisplayAxis::Z];

// ============================================================================
// Scalar table
// ============================================================================

#[derive(Debug, Clone)]
enum ScalarOp {
    Accept(usize),
    Remove(usize),
    Rebind(usize, usize),
}

fn scalar_op(pool: usize) -> impl Strategy<Value = ScalarOp> {
    prop_oneof![
        3 => (0..pool).prop_map(ScalarOp::Accept),
        1 => (0..pool).prop_map(ScalarOp::Remove),
        2 => (0..pool, 0..QUANTITIES.len()).prop_map(|(i, q)| ScalarOp::Rebind(i, q)),
    ]
}

proptest! {
    #[test]
    fn scalar_table_has_one_controller_per_key(
        seeds in proptest::collection::vec((0..QUANTITIES.len(), 0..AXES.len()), 6),
        ops in proptest::collection::vec(scalar_op(6), 1..60),
    ) {
        let ids = IdAllocator::new();
        let table = ScalarMapTable::new(Waker::new());
        let pool: Vec<Arc<ScalarMapAdapter>> = seeds
            .iter()
            .map(|&(q, a)| {
                ScalarMapAdapter::new(&ids, ScalarMapping::new(QUANTITIES[q], AXES[a].clone()))
            })
            .collect();
        let mut registered = BTreeSet::new();

        for op in ops {
            match op {
                ScalarOp::Accept(i) => {
                    let controller = table.accept(&pool[i]);
                    prop_assert_eq!(controller.mapping(), pool[i].mapping());
                    registered.insert(i);
                }
                ScalarOp::Remove(i) => {
                    table.remove(&pool[i]);
                    registered.remove(&i);
                    prop_assert_eq!(pool[i].listener_count(), 0);
                }
                ScalarOp::Rebind(i, q) => pool[i].rebind(QUANTITIES[q]),
            }

            let keys: BTreeSet<ScalarMapping> =
                registered.iter().map(|&i| pool[i].mapping()).collect();
            prop_assert_eq!(table.len(), keys.len());
            for &i in &registered {
                let adapter = &pool[i];
                let controller = table.controller_for(&adapter.mapping());
                prop_assert!(controller.is_some(), "no controller for {:?}", adapter.mapping());
                let controller = controller.unwrap();
                prop_assert_eq!(controller.mapping(), adapter.mapping());
                if !Arc::ptr_eq(&controller, adapter) {
                    let theirs = adapter.controller();
                    prop_assert!(theirs.is_some_and(|c| Arc::ptr_eq(&c, &controller)));
                }
            }
        }
    }
}

// ============================================================================
// Datum table
// ============================================================================

#[derive(Debug, Clone)]
enum DatumOp {
    Add(usize),
    Obsolete(usize),
    Change(usize),
    Pass { wiped: bool },
}

fn datum_op(pool: usize) -> impl Strategy<Value = DatumOp> {
    prop_oneof![
        3 => (0..pool).prop_map(DatumOp::Add),
        2 => (0..pool).prop_map(DatumOp::Obsolete),
        2 => (0..pool).prop_map(DatumOp::Change),
        2 => any::<bool>().prop_map(|wiped| DatumOp::Pass { wiped }),
    ]
}

proptest! {
    #[test]
    fn datum_table_keeps_display_in_step(ops in proptest::collection::vec(datum_op(5), 1..80)) {
        let ids = IdAllocator::new();
        let table = DatumTable::new(Waker::new());
        let mut display = RecordingDisplay::new();
        let pool: Vec<Arc<DataAdapter>> = (0..5)
            .map(|i| DataAdapter::new(&ids, format!("datum-{i}")))
            .collect();

        for op in ops {
            match op {
                DatumOp::Add(i) => table.add(&pool[i]),
                DatumOp::Obsolete(i) => table.set_obsolete(&pool[i]),
                DatumOp::Change(i) => pool[i].mark_changed(),
                DatumOp::Pass { wiped } => {
                    if wiped {
                        display.remove_all_references().unwrap();
                    }
                    // The fake display rejects removal of anything not attached.
                    prop_assert!(table.set_display(&mut display, wiped).is_ok());
                    let counts = table.counts();
                    prop_assert_eq!(counts.new + counts.changed + counts.obsolete, 0);
                    let shown: BTreeSet<_> = display.scene().references.keys().copied().collect();
                    let extant: BTreeSet<_> = pool
                        .iter()
                        .filter(|d| table.state_of(d.id()) == Some(DatumState::Extant))
                        .map(|d| d.id())
                        .collect();
                    prop_assert_eq!(shown, extant);
                }
            }

            for datum in &pool {
                let listening = matches!(
                    table.state_of(datum.id()),
                    Some(DatumState::Extant | DatumState::Changed)
                );
                prop_assert_eq!(datum.listener_count(), usize::from(listening));
            }
            let counts = table.counts();
            let registered = pool.iter().filter(|d| table.state_of(d.id()).is_some()).count();
            prop_assert_eq!(counts.total(), registered);
        }
    }
}

// ============================================================================
// Constant table
// ============================================================================

proptest! {
    #[test]
    fn constant_table_binds_each_axis_once(
        sets in proptest::collection::vec(
            proptest::collection::btree_map(0..AXES.len(), -10.0f64..10.0, 1..3),
            1..8,
        ),
    ) {
        let ids = IdAllocator::new();
        let table = ConstantMapTable::new(Waker::new());
        let mut accepted = Vec::new();
        let mut bound: BTreeMap<usize, f64> = BTreeMap::new();

        for set in sets {
            let maps = ConstantMaps::from_mappings(
                &ids,
                set.iter().map(|(&a, &v)| ConstantMapping::new(AXES[a].clone(), v)),
            )
            .unwrap();
            let collides = set.keys().any(|a| bound.contains_key(a));
            let result = table.add(&maps);
            prop_assert_eq!(result.is_err(), collides);
            if !collides {
                bound.extend(set);
                accepted.push(maps);
            }

            let aggregate = table.aggregated();
            let axes: BTreeSet<_> = aggregate.iter().map(|m| m.axis.clone()).collect();
            prop_assert_eq!(axes.len(), aggregate.len());
            prop_assert_eq!(aggregate.len(), bound.len());
            prop_assert_eq!(table.len(), accepted.len());
        }
    }
}
