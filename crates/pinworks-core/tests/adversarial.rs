//! Adversarial input tests for the Pinworks engine.
//!
//! Commands that must be rejected without mutating anything, and broken
//! worlds that must fault rather than limp along.

use pinworks_core::catalog::{Catalog, standard};
use pinworks_core::config::EngineConfig;
use pinworks_core::engine::Engine;
use pinworks_core::error::SimError;
use pinworks_core::id::*;
use pinworks_core::job_queue::JobKind;
use pinworks_core::machine::ProductionState;
use pinworks_core::material::Material;
use pinworks_core::position::GridPosition;
use pinworks_core::stockpile::StockpileRole;
use pinworks_core::test_utils::*;

/// Removing more than a stockpile holds fails and leaves it untouched.
#[test]
fn overdraw_is_rejected_without_mutation() {
    let mut engine = Engine::default();
    let s = engine.place_stockpile(1, 1, 1, 1).unwrap();
    engine.add_material(s, Material::BowlOfShortWires, 2).unwrap();
    let before = engine.snapshot_stockpile(s).unwrap();

    assert_eq!(
        engine.remove_material(s, Material::BowlOfShortWires, 3),
        Err(SimError::InsufficientMaterial {
            stockpile: s,
            material: Material::BowlOfShortWires,
            requested: 3,
            available: 2,
        })
    );
    assert_eq!(engine.snapshot_stockpile(s).unwrap(), before);
}

#[test]
fn earmarked_units_cannot_be_removed_directly() {
    let (mut engine, source, _, _) = replenish_pair(Material::SmallBowl, 2, 2);
    engine.step().unwrap();
    assert!(matches!(
        engine.remove_material(source, Material::SmallBowl, 1),
        Err(SimError::EarmarkedMaterial { free: 0, .. })
    ));
    assert_eq!(
        engine.stockpile(source).unwrap().quantity(Material::SmallBowl),
        2
    );
}

#[test]
fn capacity_message_names_the_limit() {
    let mut engine = Engine::default();
    for i in 0..50 {
        engine.place_stockpile(i, 0, 1, 1).unwrap();
    }
    let err = engine.place_stockpile(0, 9, 1, 1).unwrap_err();
    assert_eq!(err.to_string(), "cannot add more stockpiles: limit is 50");
    assert_eq!(engine.stockpile_count(), 50);
}

#[test]
fn eleventh_worker_is_refused() {
    let mut engine = Engine::default();
    for _ in 0..10 {
        engine.spawn_worker().unwrap();
    }
    assert!(matches!(
        engine.spawn_worker(),
        Err(SimError::CapacityExceeded {
            kind: EntityKind::Worker,
            limit: 10
        })
    ));
}

#[test]
fn full_job_queue_is_an_error() {
    let mut engine = Engine::new(
        EngineConfig {
            job_queue_capacity: 2,
            ..EngineConfig::default()
        },
        Catalog::standard(),
    );
    let m = engine.place_machine(standard::WIRE_CUTTER, 0, 0).unwrap();
    let target = ObjectRef::Machine(m);
    engine.enqueue_job(target, JobKind::EmptyMachineOutput).unwrap();
    engine.enqueue_job(target, JobKind::EmptyMachineOutput).unwrap();
    assert_eq!(
        engine.enqueue_job(target, JobKind::EmptyMachineOutput),
        Err(SimError::JobQueueFull { capacity: 2 })
    );
    assert_eq!(engine.job_queue().len(), 2);
}

#[test]
fn order_table_exhaustion_faults_the_scan() {
    let mut engine = Engine::new(
        EngineConfig {
            replenishment_slots: 1,
            ..EngineConfig::default()
        },
        Catalog::standard(),
    );
    let a = engine.place_stockpile(0, 0, 1, 1).unwrap();
    let b = engine.place_stockpile(2, 0, 1, 1).unwrap();
    engine.add_required_material(a, Material::SmallBowl, 1).unwrap();
    engine.add_required_material(b, Material::SmallBowl, 1).unwrap();

    assert_eq!(
        engine.step(),
        Err(SimError::ReplenishmentTableFull { slots: 1 })
    );
    assert!(engine.fault().is_some());
}

#[test]
fn second_pending_recipe_is_refused() {
    let (mut engine, machine, _, _) = winder_cell(1, 1);
    engine.assign_recipe(machine, standard::WIND_WIRE).unwrap();
    engine.assign_recipe(machine, standard::WIND_WIRE).unwrap();
    assert_eq!(
        engine.assign_recipe(machine, standard::WIND_WIRE),
        Err(SimError::RecipeAlreadyPending {
            machine,
            pending: standard::WIND_WIRE
        })
    );
}

#[test]
fn unknown_entities_are_rejected() {
    let mut other = Engine::default();
    let foreign = other.place_stockpile(0, 0, 1, 1).unwrap();
    let foreign_machine = other.place_machine(standard::WIRE_CUTTER, 0, 0).unwrap();

    let mut engine = Engine::default();
    assert_eq!(
        engine.add_material(foreign, Material::SmallBowl, 1),
        Err(SimError::UnknownEntity(ObjectRef::Stockpile(foreign)))
    );
    assert_eq!(
        engine.assign_recipe(foreign_machine, standard::CUT_WIRE),
        Err(SimError::UnknownEntity(ObjectRef::Machine(foreign_machine)))
    );
    assert_eq!(
        engine.enqueue_job(ObjectRef::Machine(foreign_machine), JobKind::OperateMachine),
        Err(SimError::UnknownEntity(ObjectRef::Machine(foreign_machine)))
    );
}

/// An operator that needs to fetch inputs but has no input stockpile is a
/// wiring error, and the engine latches it.
#[test]
fn missing_input_link_faults_and_latches() {
    let mut engine = Engine::default();
    let m = engine.place_machine(standard::WIRE_GRINDER, 1, 0).unwrap();
    engine.spawn_worker().unwrap();
    engine.assign_recipe(m, standard::GRIND_POINT).unwrap();

    let err = loop {
        match engine.step() {
            Ok(_) => assert!(engine.tick() < 50, "never faulted"),
            Err(err) => break err,
        }
    };
    assert_eq!(
        err,
        SimError::MissingStockpileLink {
            machine: m,
            role: StockpileRole::Input
        }
    );
    let fault = engine.fault().cloned().unwrap();
    assert_eq!(fault.error, err);
    assert_eq!(
        engine.step(),
        Err(SimError::Faulted { tick: fault.tick })
    );
    assert_eq!(engine.advance(5), Err(SimError::Faulted { tick: fault.tick }));
}

#[test]
fn missing_output_link_faults_when_output_is_collected() {
    let mut engine = Engine::default();
    let input = engine.place_stockpile(0, 1, 1, 1).unwrap();
    engine
        .add_material(input, Material::BowlOfShortWires, 1)
        .unwrap();
    let m = engine.place_machine(standard::WIRE_GRINDER, 2, 1).unwrap();
    engine.attach_input_stockpile(m, input).unwrap();
    engine.spawn_worker().unwrap();
    engine.assign_recipe(m, standard::GRIND_POINT).unwrap();

    let err = engine.advance(100).unwrap_err();
    assert_eq!(
        err,
        SimError::MissingStockpileLink {
            machine: m,
            role: StockpileRole::Output
        }
    );
    assert!(matches!(
        engine.machine(m).unwrap().state,
        ProductionState::OutputReady { .. }
    ));
}

#[test]
fn zero_quantity_removal_is_a_no_op() {
    let mut engine = Engine::default();
    let s = engine.place_stockpile(0, 0, 1, 1).unwrap();
    assert_eq!(engine.remove_material(s, Material::SmallBowl, 0), Ok(()));
    assert_eq!(engine.stockpile(s).unwrap().total(), 0);
}

/// Stock past `u32::MAX` units is refused rather than capped.
#[test]
fn stockpile_overflow_is_rejected_without_mutation() {
    let mut engine = Engine::default();
    let s = engine.place_stockpile(0, 0, 1, 1).unwrap();
    engine.add_material(s, Material::SmallBowl, u32::MAX).unwrap();
    assert!(matches!(
        engine.add_material(s, Material::SmallBowl, 1),
        Err(SimError::StockpileOverflow { stockpile, .. }) if stockpile == s
    ));
    assert_eq!(engine.stockpile(s).unwrap().quantity(Material::SmallBowl), u32::MAX);
    engine
        .add_required_material(s, Material::LongWires, u32::MAX)
        .unwrap();
    assert!(engine
        .add_required_material(s, Material::LongWires, 1)
        .is_err());
}

#[test]
fn stockpiles_at_negative_coordinates_are_reachable() {
    let (mut engine, source, destination, worker) = replenish_pair(Material::SmallBowl, 1, 1);
    let far = engine.place_stockpile(-4, -3, 1, 1).unwrap();
    engine.set_stockpile_drawable(source, false).unwrap();
    engine.set_stockpile_drawable(far, true).unwrap();
    engine.add_material(far, Material::SmallBowl, 1).unwrap();

    run_until(&mut engine, 100, |e| {
        e.stockpile(destination).unwrap().quantity(Material::SmallBowl) == 1
            && e.worker(worker).unwrap().is_idle()
    })
    .expect("far source never used");
    assert_eq!(engine.stockpile(far).unwrap().total(), 0);
}

/// Placements at the edge of the i32 grid step and hit-test without
/// overflowing.
#[test]
fn stockpiles_at_coordinate_extremes_do_not_panic() {
    let mut engine = Engine::default();
    let source = engine.place_stockpile(i32::MIN, 0, 1, 1).unwrap();
    engine.set_stockpile_drawable(source, true).unwrap();
    engine.add_material(source, Material::SmallBowl, 1).unwrap();
    let destination = engine.place_stockpile(5, 0, 1, 1).unwrap();
    engine
        .add_required_material(destination, Material::SmallBowl, 1)
        .unwrap();
    let corner = engine
        .place_stockpile(i32::MAX - 1, i32::MAX, 4, 4)
        .unwrap();
    let worker = engine.spawn_worker().unwrap();

    run_checked(&mut engine, 3).unwrap();

    let w = engine.worker(worker).unwrap();
    assert_eq!(w.position, GridPosition::new(-3, 0));
    assert_eq!(w.target, GridPosition::new(i32::MIN, 0));
    assert_eq!(
        engine.object_at(i32::MAX, i32::MAX),
        ObjectRef::Stockpile(corner)
    );
    assert_eq!(engine.object_at(i32::MIN, 0), ObjectRef::Stockpile(source));
}
