//! Read-only query API for inspecting simulation state.
//!
//! Snapshot types are owned copies of engine state, suitable for rendering
//! and printing. Nothing here borrows into the engine's pools.

use crate::catalog::RecipeEntry;
use crate::engine::Engine;
use crate::fixed::{Fixed64, Ticks};
use crate::id::*;
use crate::job_queue::JobKind;
use crate::material::MaterialStack;
use crate::position::{Footprint, GridPosition};
use crate::stockpile::{Attachment, LedgerEntry};
use crate::worker::WorkerStatus;

// ---------------------------------------------------------------------------
// Worker snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub id: WorkerId,
    pub position: GridPosition,
    pub target: GridPosition,
    pub status: WorkerStatus,
    /// The job being worked, if any.
    pub job: Option<JobKind>,
    /// What the job is about. `Nothing` when idle.
    pub job_target: ObjectRef,
    pub carrying: Option<MaterialStack>,
}

// ---------------------------------------------------------------------------
// Machine snapshot
// ---------------------------------------------------------------------------

/// An aggregated, read-only view of a single machine.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSnapshot {
    pub id: MachineId,
    pub machine_type: MachineTypeId,
    pub position: GridPosition,
    pub footprint: Footprint,
    /// Production state name (`idle`, `awaiting_inputs`, `producing`,
    /// `output_ready`).
    pub state: &'static str,
    pub recipe: Option<RecipeId>,
    pub pending_recipe: Option<RecipeId>,
    /// Whether another recipe assignment would be accepted.
    pub accepts_recipe: bool,
    /// Production progress as a 0..1 fraction. 0 unless producing.
    pub progress: Fixed64,
    /// Ticks left on the production timer.
    pub remaining: Option<Ticks>,
    pub input_contents: Vec<MaterialStack>,
    pub output_contents: Vec<MaterialStack>,
    pub worker: Option<WorkerId>,
    pub input_stockpile: Option<StockpileId>,
    pub output_stockpile: Option<StockpileId>,
}

// ---------------------------------------------------------------------------
// Stockpile snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockpileSnapshot {
    pub id: StockpileId,
    pub position: GridPosition,
    pub footprint: Footprint,
    pub drawable: bool,
    /// Ledger entries in insertion order, with their earmarks.
    pub inventory: Vec<LedgerEntry>,
    /// Standing replenishment targets.
    pub manifest: Vec<RecipeEntry>,
    /// Units still outstanding on replenishment orders, per manifest entry
    /// that has any.
    pub on_order: Vec<RecipeEntry>,
    pub attachment: Option<Attachment>,
}

// ---------------------------------------------------------------------------
// Query methods on Engine
// ---------------------------------------------------------------------------

impl Engine {
    pub fn snapshot_worker(&self, id: WorkerId) -> Option<WorkerSnapshot> {
        let worker = self.workers.get(id)?;
        Some(WorkerSnapshot {
            id,
            position: worker.position,
            target: worker.target,
            status: worker.status(),
            job: worker.job(),
            job_target: worker.task.job_target(),
            carrying: worker.carrying(),
        })
    }

    pub fn snapshot_machine(&self, id: MachineId) -> Option<MachineSnapshot> {
        let machine = self.machines.get(id)?;
        Some(MachineSnapshot {
            id,
            machine_type: machine.machine_type,
            position: machine.position,
            footprint: machine.footprint,
            state: machine.state.name(),
            recipe: machine.active_recipe(),
            pending_recipe: machine.pending_recipe,
            accepts_recipe: machine.can_accept_recipe(),
            progress: machine.progress(),
            remaining: machine.remaining(),
            input_contents: machine.input_buffer.as_slice().to_vec(),
            output_contents: machine.output_buffer.as_slice().to_vec(),
            worker: machine.worker,
            input_stockpile: machine.input_stockpile,
            output_stockpile: machine.output_stockpile,
        })
    }

    pub fn snapshot_stockpile(&self, id: StockpileId) -> Option<StockpileSnapshot> {
        let stockpile = self.stockpiles.get(id)?;
        Some(StockpileSnapshot {
            id,
            position: stockpile.position,
            footprint: stockpile.footprint,
            drawable: stockpile.drawable,
            inventory: stockpile.inventory().to_vec(),
            manifest: stockpile.manifest().to_vec(),
            on_order: stockpile
                .manifest()
                .iter()
                .map(|e| RecipeEntry::new(e.material, self.orders.outstanding_for(id, e.material)))
                .filter(|e| e.quantity > 0)
                .collect(),
            attachment: stockpile.attachment,
        })
    }

    pub fn snapshot_all_workers(&self) -> Vec<WorkerSnapshot> {
        self.workers
            .keys()
            .filter_map(|id| self.snapshot_worker(id))
            .collect()
    }

    pub fn snapshot_all_machines(&self) -> Vec<MachineSnapshot> {
        self.machines
            .keys()
            .filter_map(|id| self.snapshot_machine(id))
            .collect()
    }

    pub fn snapshot_all_stockpiles(&self) -> Vec<StockpileSnapshot> {
        self.stockpiles
            .keys()
            .filter_map(|id| self.snapshot_stockpile(id))
            .collect()
    }

    /// What occupies the cell `(x, y)`.
    ///
    /// Workers are matched on their exact cell, machines and stockpiles on
    /// their footprint. Workers win over machines, machines over stockpiles,
    /// and within a pool the oldest entity wins.
    pub fn object_at(&self, x: i32, y: i32) -> ObjectRef {
        let point = GridPosition::new(x, y);
        if let Some((id, _)) = self.workers.iter().find(|(_, w)| w.position == point) {
            return ObjectRef::Worker(id);
        }
        if let Some((id, _)) = self.machines.iter().find(|(_, m)| m.contains(point)) {
            return ObjectRef::Machine(id);
        }
        if let Some((id, _)) = self.stockpiles.iter().find(|(_, s)| s.contains(point)) {
            return ObjectRef::Stockpile(id);
        }
        ObjectRef::Nothing
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{RecipeEntry, standard};
    use crate::engine::Engine;
    use crate::error::SimError;
    use crate::fixed::Fixed64;
    use crate::id::ObjectRef;
    use crate::material::Material;
    use crate::worker::WorkerStatus;

    #[test]
    fn object_at_prefers_workers_then_machines() {
        let mut engine = Engine::default();
        let s = engine.place_stockpile(0, 0, 4, 4).unwrap();
        let m = engine.place_machine(standard::WIRE_CUTTER, 1, 1).unwrap();
        let w = engine.spawn_worker().unwrap();

        assert_eq!(engine.object_at(0, 0), ObjectRef::Worker(w));
        assert_eq!(engine.object_at(1, 1), ObjectRef::Machine(m));
        assert_eq!(engine.object_at(3, 3), ObjectRef::Stockpile(s));
        assert_eq!(engine.object_at(4, 4), ObjectRef::Nothing);
        assert_eq!(engine.object_at(-1, 0), ObjectRef::Nothing);
    }

    #[test]
    fn machine_snapshot_reports_state() {
        let mut engine = Engine::default();
        let m = engine.place_machine(standard::WIRE_WINDER, 2, 4).unwrap();
        engine.assign_recipe(m, standard::WIND_WIRE).unwrap();
        let snap = engine.snapshot_machine(m).unwrap();
        assert_eq!(snap.state, "awaiting_inputs");
        assert_eq!(snap.recipe, Some(standard::WIND_WIRE));
        assert_eq!(snap.progress, Fixed64::ZERO);
        assert!(snap.input_contents.is_empty());
        assert!(snap.accepts_recipe);
    }

    #[test]
    fn machine_snapshot_refuses_a_second_pending_recipe() {
        let mut engine = Engine::default();
        let m = engine.place_machine(standard::WIRE_WINDER, 2, 4).unwrap();
        engine.assign_recipe(m, standard::WIND_WIRE).unwrap();
        engine.assign_recipe(m, standard::WIND_WIRE).unwrap();
        let snap = engine.snapshot_machine(m).unwrap();
        assert_eq!(snap.pending_recipe, Some(standard::WIND_WIRE));
        assert!(!snap.accepts_recipe);
        assert!(matches!(
            engine.assign_recipe(m, standard::WIND_WIRE),
            Err(SimError::RecipeAlreadyPending { .. })
        ));
    }

    #[test]
    fn stockpile_snapshot_copies_ledger() {
        let mut engine = Engine::default();
        let s = engine.place_stockpile(2, 2, 2, 2).unwrap();
        engine.add_material(s, Material::WashedIronWireCoil, 3).unwrap();
        engine.add_required_material(s, Material::EmptySpindle, 1).unwrap();
        let snap = engine.snapshot_stockpile(s).unwrap();
        assert_eq!(snap.inventory.len(), 1);
        assert_eq!(snap.inventory[0].quantity, 3);
        assert_eq!(snap.manifest.len(), 1);
        assert!(snap.on_order.is_empty());
        assert!(!snap.drawable);

        engine.place_replenishment_orders().unwrap();
        let snap = engine.snapshot_stockpile(s).unwrap();
        assert_eq!(snap.on_order, vec![RecipeEntry::new(Material::EmptySpindle, 1)]);
    }

    #[test]
    fn idle_worker_snapshot() {
        let mut engine = Engine::default();
        engine.spawn_worker().unwrap();
        let all = engine.snapshot_all_workers();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, WorkerStatus::Idle);
        assert_eq!(all[0].job_target, ObjectRef::Nothing);
        assert_eq!(all[0].carrying, None);
    }
}
