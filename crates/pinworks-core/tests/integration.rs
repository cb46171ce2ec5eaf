//! Integration tests for the Pinworks engine.
//!
//! These run whole ticks through the public API: replenishment, machine
//! operation, output hauling and the wind-and-pull line.

use pinworks_core::catalog::standard;
use pinworks_core::engine::Engine;
use pinworks_core::event::{Event, EventKind};
use pinworks_core::id::*;
use pinworks_core::job_queue::JobKind;
use pinworks_core::machine::{ProductionState, RecipeAssignment};
use pinworks_core::material::Material;
use pinworks_core::position::GridPosition;
use pinworks_core::test_utils::*;
use pinworks_core::worker::WorkerStatus;

// ===========================================================================
// Replenishment
// ===========================================================================

#[test]
fn replenishment_fills_manifest_exactly() {
    let (mut engine, source, destination, worker) = replenish_pair(Material::SmallBowl, 5, 5);

    let ran = run_until(&mut engine, 100, |e| {
        e.stockpile(destination).unwrap().quantity(Material::SmallBowl) == 5
            && e.worker(worker).unwrap().is_idle()
    });
    assert!(ran.is_some(), "destination never filled");

    assert_eq!(
        engine.stockpile(destination).unwrap().quantity(Material::SmallBowl),
        5
    );
    assert_eq!(engine.stockpile(source).unwrap().total(), 0);
    assert_eq!(engine.replenishment_orders().active_count(), 0);

    // Nothing further is ordered once the manifest is met.
    run_checked(&mut engine, 10).unwrap();
    assert_eq!(count_events(&engine, EventKind::ReplenishmentOrdered), 1);
    assert_eq!(
        engine.stockpile(destination).unwrap().quantity(Material::SmallBowl),
        5
    );
}

#[test]
fn claimed_units_are_earmarked_until_pickup() {
    let (mut engine, source, _, _) = replenish_pair(Material::EmptySpindle, 3, 3);

    engine.step().unwrap();
    let stockpile = engine.stockpile(source).unwrap();
    // The worker starts at the origin, a few steps from the source.
    assert_eq!(stockpile.quantity(Material::EmptySpindle), 3);
    assert_eq!(stockpile.earmarked(Material::EmptySpindle), 3);
    assert_eq!(stockpile.free_quantity(Material::EmptySpindle), 0);
    assert_invariants(&engine);
}

#[test]
fn partial_source_leaves_order_outstanding() {
    let (mut engine, source, destination, worker) = replenish_pair(Material::LongWires, 5, 3);

    run_until(&mut engine, 100, |e| {
        e.stockpile(destination).unwrap().quantity(Material::LongWires) == 3
            && e.worker(worker).unwrap().is_idle()
    })
    .expect("partial delivery never arrived");

    let orders = engine.replenishment_orders();
    assert_eq!(orders.active_count(), 1);
    assert_eq!(orders.outstanding_for(destination, Material::LongWires), 2);
    assert_eq!(count_events(&engine, EventKind::ReplenishmentOrdered), 1);

    engine.add_material(source, Material::LongWires, 2).unwrap();
    run_until(&mut engine, 100, |e| {
        e.replenishment_orders().active_count() == 0 && e.worker(worker).unwrap().is_idle()
    })
    .expect("order never fulfilled");
    assert_eq!(
        engine.stockpile(destination).unwrap().quantity(Material::LongWires),
        5
    );
    assert_eq!(count_events(&engine, EventKind::ReplenishmentOrdered), 1);
}

#[test]
fn non_drawable_source_is_never_used() {
    let (mut engine, source, destination, _) = replenish_pair(Material::SmallBowl, 2, 2);
    engine.set_stockpile_drawable(source, false).unwrap();

    run_checked(&mut engine, 30).unwrap();
    assert_eq!(engine.stockpile(source).unwrap().quantity(Material::SmallBowl), 2);
    assert_eq!(engine.stockpile(destination).unwrap().total(), 0);
    assert_eq!(count_events(&engine, EventKind::ReplenishmentClaimed), 0);
}

#[test]
fn scan_orders_first_unmet_entry_only() {
    let mut engine = Engine::default();
    let s = engine.place_stockpile(3, 3, 2, 2).unwrap();
    engine
        .add_required_material(s, Material::EmptySpindle, 2)
        .unwrap();
    engine
        .add_required_material(s, Material::WashedIronWireCoil, 3)
        .unwrap();

    let report = engine.step().unwrap();
    assert_eq!(report.orders_placed, 1);
    let orders = engine.replenishment_orders();
    assert_eq!(orders.outstanding_for(s, Material::EmptySpindle), 2);
    assert_eq!(orders.outstanding_for(s, Material::WashedIronWireCoil), 0);

    let report = engine.step().unwrap();
    assert_eq!(report.orders_placed, 1);
    assert_eq!(
        engine
            .replenishment_orders()
            .outstanding_for(s, Material::WashedIronWireCoil),
        3
    );

    let report = engine.step().unwrap();
    assert_eq!(report.orders_placed, 0);
}

// ===========================================================================
// Machine operation
// ===========================================================================

#[test]
fn operator_fills_inputs_and_produces() {
    let (mut engine, machine, input, output) = winder_cell(1, 1);
    engine.assign_recipe(machine, standard::WIND_WIRE).unwrap();

    run_until(&mut engine, 100, |e| {
        e.stockpile(output).unwrap().quantity(Material::SpindledWireCoil) == 1
    })
    .expect("output never reached the output stockpile");

    let started = match first_event(&engine, EventKind::ProductionStarted) {
        Some(Event::ProductionStarted { tick, .. }) => *tick,
        other => panic!("expected production to start, got {other:?}"),
    };
    let completed = match first_event(&engine, EventKind::ProductionCompleted) {
        Some(Event::ProductionCompleted { tick, recipe, .. }) => {
            assert_eq!(*recipe, standard::WIND_WIRE);
            *tick
        }
        other => panic!("expected production to complete, got {other:?}"),
    };
    let duration = engine
        .catalog()
        .get_recipe(standard::WIND_WIRE)
        .unwrap()
        .duration;
    assert_eq!(completed, started + duration);

    // The operator carried exactly the declared output off the machine.
    let picked = engine.events().iter().find_map(|e| match e {
        Event::MaterialPickedUp {
            from: ObjectRef::Machine(m),
            material,
            quantity,
            ..
        } if *m == machine => Some((*material, *quantity)),
        _ => None,
    });
    assert_eq!(picked, Some((Material::SpindledWireCoil, 1)));

    assert_eq!(engine.stockpile(input).unwrap().total(), 0);
    let m = engine.machine(machine).unwrap();
    assert!(m.input_buffer.is_empty());
    assert!(m.output_buffer.is_empty());
    assert_eq!(m.state, ProductionState::Idle);
    assert_eq!(m.worker, None);
}

#[test]
fn operator_blocks_on_short_input_and_resumes() {
    let (mut engine, machine, input, output) = winder_cell(1, 0);
    engine.assign_recipe(machine, standard::WIND_WIRE).unwrap();

    run_until(&mut engine, 100, |e| {
        e.workers().all(|w| w.status() == WorkerStatus::Blocked)
    })
    .expect("worker never blocked");
    run_checked(&mut engine, 5).unwrap();
    assert_eq!(count_events(&engine, EventKind::WorkerBlocked), 1);
    assert_eq!(
        engine.machine(machine).unwrap().input_buffer.quantity(Material::WashedIronWireCoil),
        1
    );

    engine.add_material(input, Material::EmptySpindle, 1).unwrap();
    run_until(&mut engine, 100, |e| {
        e.stockpile(output).unwrap().quantity(Material::SpindledWireCoil) == 1
    })
    .expect("production never resumed");
    assert_eq!(count_events(&engine, EventKind::WorkerResumed), 1);
}

#[test]
fn relinked_input_stockpile_is_walked_to_before_pickup() {
    let (mut engine, machine, input, output) = winder_cell(1, 0);
    engine.assign_recipe(machine, standard::WIND_WIRE).unwrap();
    run_until(&mut engine, 100, |e| {
        e.workers().all(|w| w.status() == WorkerStatus::Blocked)
    })
    .expect("worker never blocked");
    let worker = engine.workers().next().unwrap().id;
    assert_eq!(engine.worker(worker).unwrap().position, GridPosition::new(0, 2));

    let far = engine.place_stockpile(30, 30, 1, 1).unwrap();
    engine.add_material(far, Material::EmptySpindle, 1).unwrap();
    engine.attach_input_stockpile(machine, far).unwrap();
    assert_eq!(engine.stockpile(input).unwrap().attachment, None);

    engine.step().unwrap();
    let w = engine.worker(worker).unwrap();
    assert_eq!(w.position, GridPosition::new(0, 2));
    assert_eq!(w.target, GridPosition::new(30, 30));
    assert_eq!(w.status(), WorkerStatus::Moving);
    assert_eq!(engine.stockpile(far).unwrap().quantity(Material::EmptySpindle), 1);
    assert_eq!(count_events(&engine, EventKind::WorkerResumed), 1);

    run_until(&mut engine, 200, |e| {
        e.stockpile(far).unwrap().quantity(Material::EmptySpindle) == 0
    })
    .expect("spindle never picked up");
    assert_eq!(engine.worker(worker).unwrap().position, GridPosition::new(30, 30));

    run_until(&mut engine, 200, |e| {
        e.stockpile(output).unwrap().quantity(Material::SpindledWireCoil) == 1
    })
    .expect("production never finished");
}

#[test]
fn relinked_output_stockpile_receives_the_carried_load() {
    let (mut engine, machine, _, output) = winder_cell(1, 1);
    engine.assign_recipe(machine, standard::WIND_WIRE).unwrap();
    run_until(&mut engine, 100, |e| {
        e.workers().any(|w| {
            w.status() == WorkerStatus::Carrying && w.job() == Some(JobKind::EmptyMachineOutput)
        })
    })
    .expect("output never picked up");
    let worker = engine.workers().next().unwrap().id;

    let far = engine.place_stockpile(30, 30, 1, 1).unwrap();
    engine.attach_output_stockpile(machine, far).unwrap();

    run_until(&mut engine, 200, |e| {
        e.stockpile(far).unwrap().quantity(Material::SpindledWireCoil) == 1
    })
    .expect("load never reached the relinked stockpile");
    assert_eq!(engine.worker(worker).unwrap().position, GridPosition::new(30, 30));
    assert_eq!(engine.stockpile(output).unwrap().total(), 0);
    assert_eq!(engine.stockpile(output).unwrap().attachment, None);
}

#[test]
fn pending_recipe_runs_after_output_is_collected() {
    let (mut engine, machine, _, output) = winder_cell(2, 2);
    assert_eq!(
        engine.assign_recipe(machine, standard::WIND_WIRE),
        Ok(RecipeAssignment::Activated)
    );

    run_until(&mut engine, 100, |e| e.machine(machine).unwrap().is_producing())
        .expect("first run never started");
    assert_eq!(
        engine.assign_recipe(machine, standard::WIND_WIRE),
        Ok(RecipeAssignment::Queued)
    );
    assert_eq!(
        engine.machine(machine).unwrap().pending_recipe,
        Some(standard::WIND_WIRE)
    );

    run_until(&mut engine, 200, |e| {
        e.stockpile(output).unwrap().quantity(Material::SpindledWireCoil) == 2
            && e.workers().all(|w| w.is_idle())
    })
    .expect("pending recipe never produced");
    assert_eq!(count_events(&engine, EventKind::ProductionCompleted), 2);
    let m = engine.machine(machine).unwrap();
    assert_eq!(m.pending_recipe, None);
    assert_eq!(m.state, ProductionState::Idle);
}

#[test]
fn stale_operate_job_is_discarded() {
    let (mut engine, machine, _, _) = winder_cell(1, 1);
    engine
        .enqueue_job(ObjectRef::Machine(machine), JobKind::OperateMachine)
        .unwrap();

    let report = engine.step().unwrap();
    assert_eq!(report.jobs_dispatched, 0);
    assert!(engine.job_queue().is_empty());
    assert_eq!(count_events(&engine, EventKind::JobDiscarded), 1);
    assert!(engine.workers().all(|w| w.is_idle()));
}

#[test]
fn empty_output_job_on_idle_machine_returns_worker() {
    let (mut engine, machine, _, _) = winder_cell(0, 0);
    engine
        .enqueue_job(ObjectRef::Machine(machine), JobKind::EmptyMachineOutput)
        .unwrap();

    assert_eq!(engine.step().unwrap().jobs_dispatched, 1);
    run_until(&mut engine, 20, |e| e.workers().all(|w| w.is_idle()))
        .expect("worker never gave up on an empty machine");
    assert_eq!(count_events(&engine, EventKind::MaterialPickedUp), 0);
}

// ===========================================================================
// The full line
// ===========================================================================

#[test]
fn wind_and_pull_line_moves_one_coil_downstream() {
    let mut line = wire_line();

    run_until(&mut line.engine, 200, |e| {
        e.stockpile(line.puller_in)
            .unwrap()
            .quantity(Material::SpindledWireCoil)
            == 1
            && e.workers().all(|w| w.is_idle())
    })
    .expect("spindled coil never reached the puller");

    let engine = &line.engine;
    assert_eq!(engine.stockpile(line.winder_in).unwrap().total(), 0);
    assert_eq!(engine.stockpile(line.winder_out).unwrap().total(), 0);
    assert_eq!(engine.stockpile(line.puller_out).unwrap().total(), 0);
    assert_eq!(
        engine.machine(line.winder).unwrap().state,
        ProductionState::Idle
    );
    // No recipe on the puller: it never runs.
    assert_eq!(
        engine.machine(line.puller).unwrap().state,
        ProductionState::Idle
    );
    assert_eq!(
        engine
            .replenishment_orders()
            .outstanding_for(line.puller_in, Material::SpindledWireCoil),
        4
    );
    assert_eq!(count_events(engine, EventKind::ReplenishmentOrdered), 1);
    assert_invariants(engine);
}

#[test]
fn wire_line_keeps_invariants_every_tick() {
    let mut line = wire_line();
    run_checked(&mut line.engine, 120).unwrap();
    assert_eq!(line.engine.tick(), 120);
    assert!(line.engine.fault().is_none());
}

#[test]
fn identical_worlds_hash_identically() {
    let mut a = wire_line();
    let mut b = wire_line();
    for _ in 0..80 {
        a.engine.step().unwrap();
        b.engine.step().unwrap();
        assert_eq!(a.engine.state_hash(), b.engine.state_hash());
    }
}

#[test]
fn state_hash_tracks_progress() {
    let mut line = wire_line();
    line.engine.step().unwrap();
    let first = line.engine.state_hash();
    line.engine.step().unwrap();
    assert_ne!(line.engine.state_hash(), first);
}

#[test]
fn event_log_reads_as_a_story() {
    let mut line = wire_line();
    run_until(&mut line.engine, 200, |e| {
        count_events(e, EventKind::ReplenishmentDelivered) == 1
    })
    .expect("no delivery");

    let lines: Vec<String> = line.engine.events().iter().map(|e| e.to_string()).collect();
    assert!(lines[0].starts_with("[t0]"), "{}", lines[0]);
    assert!(lines.iter().any(|l| l.contains("RO0")));
    assert!(lines.iter().any(|l| l.contains("spindled_wire_coil")));
}

#[test]
fn suppressed_events_are_not_logged() {
    let mut line = wire_line();
    line.engine.suppress_event(EventKind::MaterialPickedUp);
    line.engine.suppress_event(EventKind::MaterialDropped);
    run_checked(&mut line.engine, 60).unwrap();
    assert_eq!(count_events(&line.engine, EventKind::MaterialPickedUp), 0);
    assert_eq!(count_events(&line.engine, EventKind::MaterialDropped), 0);
    assert!(count_events(&line.engine, EventKind::ProductionCompleted) > 0);
}
