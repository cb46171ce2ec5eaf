//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::catalog::standard;
use crate::engine::Engine;
use crate::error::SimError;
use crate::event::{Event, EventKind};
use crate::fixed::Ticks;
use crate::id::*;
use crate::machine::ProductionState;
use crate::material::Material;
use crate::worker::{OperateStage, TripStage, WorkerTask};
use std::collections::HashMap;

// ===========================================================================
// Fixtures
// ===========================================================================

/// The two-machine wind-and-pull line.
#[derive(Debug)]
pub struct WireLine {
    pub engine: Engine,
    pub winder: MachineId,
    pub winder_in: StockpileId,
    pub winder_out: StockpileId,
    pub puller: MachineId,
    pub puller_in: StockpileId,
    pub puller_out: StockpileId,
    pub workers: Vec<WorkerId>,
}

/// Build the wind-and-pull line: the winder holds one coil and one spindle
/// and has `wind_wire` assigned; the puller's input stockpile wants five
/// spindled coils; two workers wait at the origin.
pub fn wire_line() -> WireLine {
    let mut engine = Engine::default();

    let winder_in = engine.place_stockpile(2, 2, 2, 2).unwrap();
    let winder_out = engine.place_stockpile(2, 6, 3, 3).unwrap();
    engine.set_stockpile_drawable(winder_out, true).unwrap();
    engine
        .add_material(winder_in, Material::WashedIronWireCoil, 1)
        .unwrap();
    engine
        .add_material(winder_in, Material::EmptySpindle, 1)
        .unwrap();
    let winder = engine.place_machine(standard::WIRE_WINDER, 2, 4).unwrap();
    engine.attach_output_stockpile(winder, winder_out).unwrap();
    engine.attach_input_stockpile(winder, winder_in).unwrap();

    let puller_out = engine.place_stockpile(11, 10, 3, 3).unwrap();
    engine.set_stockpile_drawable(puller_out, true).unwrap();
    let puller_in = engine.place_stockpile(7, 10, 2, 2).unwrap();
    engine
        .add_required_material(puller_in, Material::SpindledWireCoil, 5)
        .unwrap();
    let puller = engine.place_machine(standard::WIRE_PULLER, 9, 10).unwrap();
    engine.attach_output_stockpile(puller, puller_out).unwrap();
    engine.attach_input_stockpile(puller, puller_in).unwrap();

    let workers = vec![engine.spawn_worker().unwrap(), engine.spawn_worker().unwrap()];
    engine.assign_recipe(winder, standard::WIND_WIRE).unwrap();

    WireLine {
        engine,
        winder,
        winder_in,
        winder_out,
        puller,
        puller_in,
        puller_out,
        workers,
    }
}

/// One worker, a drawable source holding `on_hand` units, and a destination
/// whose manifest wants `wanted` units of the same material.
pub fn replenish_pair(
    material: Material,
    wanted: u32,
    on_hand: u32,
) -> (Engine, StockpileId, StockpileId, WorkerId) {
    let mut engine = Engine::default();
    let source = engine.place_stockpile(0, 4, 2, 2).unwrap();
    engine.set_stockpile_drawable(source, true).unwrap();
    engine.add_material(source, material, on_hand).unwrap();
    let destination = engine.place_stockpile(6, 0, 2, 2).unwrap();
    engine
        .add_required_material(destination, material, wanted)
        .unwrap();
    let worker = engine.spawn_worker().unwrap();
    (engine, source, destination, worker)
}

/// A single winder with linked stockpiles and one worker. The input
/// stockpile is stocked with `coils` coils and `spindles` spindles; no recipe
/// is assigned yet.
pub fn winder_cell(coils: u32, spindles: u32) -> (Engine, MachineId, StockpileId, StockpileId) {
    let mut engine = Engine::default();
    let input = engine.place_stockpile(0, 2, 1, 1).unwrap();
    let output = engine.place_stockpile(4, 2, 1, 1).unwrap();
    engine
        .add_material(input, Material::WashedIronWireCoil, coils)
        .unwrap();
    engine
        .add_material(input, Material::EmptySpindle, spindles)
        .unwrap();
    let machine = engine.place_machine(standard::WIRE_WINDER, 2, 2).unwrap();
    engine.attach_input_stockpile(machine, input).unwrap();
    engine.attach_output_stockpile(machine, output).unwrap();
    engine.spawn_worker().unwrap();
    (engine, machine, input, output)
}

// ===========================================================================
// Running
// ===========================================================================

/// Step until `done` holds, for at most `max_ticks`. Returns the number of
/// ticks run when the condition was met.
pub fn run_until<F>(engine: &mut Engine, max_ticks: Ticks, mut done: F) -> Option<Ticks>
where
    F: FnMut(&Engine) -> bool,
{
    for ran in 0..=max_ticks {
        if done(engine) {
            return Some(ran);
        }
        if ran == max_ticks {
            break;
        }
        engine.step().unwrap();
    }
    None
}

/// Step `ticks` times, checking invariants after every tick.
pub fn run_checked(engine: &mut Engine, ticks: Ticks) -> Result<(), SimError> {
    for _ in 0..ticks {
        engine.step()?;
        assert_invariants(engine);
    }
    Ok(())
}

/// First logged event of `kind`, oldest first.
pub fn first_event(engine: &Engine, kind: EventKind) -> Option<&Event> {
    engine.events().iter().find(|e| e.kind() == kind)
}

pub fn count_events(engine: &Engine, kind: EventKind) -> usize {
    engine.events().iter().filter(|e| e.kind() == kind).count()
}

// ===========================================================================
// Invariants
// ===========================================================================

/// Panic if any cross-entity invariant is broken.
pub fn assert_invariants(engine: &Engine) {
    // Ledger: unique, non-empty entries; earmarks never exceed stock.
    for stockpile in engine.stockpiles() {
        let mut seen = Vec::new();
        for entry in stockpile.inventory() {
            assert!(
                !seen.contains(&entry.material),
                "{:?} has two {} entries",
                stockpile.id,
                entry.material
            );
            seen.push(entry.material);
            assert!(entry.quantity > 0, "{:?} kept an empty entry", stockpile.id);
            assert!(
                entry.earmarked <= entry.quantity,
                "{:?} earmarks {} of {} {}",
                stockpile.id,
                entry.earmarked,
                entry.quantity,
                entry.material
            );
        }
    }

    // Orders: never over-claimed.
    for (id, order) in engine.replenishment_orders().iter() {
        assert!(order.ordered > 0, "{id} left in its slot with nothing ordered");
        assert!(
            order.picked_up <= order.ordered,
            "{id} picked up {} of {}",
            order.picked_up,
            order.ordered
        );
    }

    // Earmarks are exactly the claims still on their way to the source.
    let mut claimed: HashMap<(StockpileId, Material), u32> = HashMap::new();
    for worker in engine.workers() {
        if let WorkerTask::Replenish {
            claim,
            stage: TripStage::Fetching,
        } = worker.task
        {
            *claimed.entry((claim.source, claim.material)).or_default() += claim.amount;
        }
    }
    for stockpile in engine.stockpiles() {
        for entry in stockpile.inventory() {
            let expected = claimed
                .get(&(stockpile.id, entry.material))
                .copied()
                .unwrap_or(0);
            assert_eq!(
                entry.earmarked, expected,
                "{:?} earmark for {} disagrees with outstanding claims",
                stockpile.id, entry.material
            );
        }
    }

    // A producing machine always has its operator standing by.
    for machine in engine.machines() {
        if let ProductionState::Producing { .. } = machine.state {
            let worker = machine
                .worker
                .and_then(|w| engine.worker(w))
                .unwrap_or_else(|| panic!("{:?} producing without a worker", machine.id));
            assert_eq!(
                worker.task,
                WorkerTask::OperateMachine {
                    machine: machine.id,
                    stage: OperateStage::Producing
                },
                "operator of {:?} wandered off",
                machine.id
            );
        }
    }
}
