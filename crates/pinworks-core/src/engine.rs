//! The simulation engine: owns every entity pool and the two work queues, and
//! orchestrates the fixed-order tick.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - Slotmap arenas of [`Worker`]s, [`Machine`]s and [`Stockpile`]s
//! - A bounded [`JobQueue`] and a slotted [`ReplenishmentTable`]
//! - The immutable [`Catalog`] of recipes and machine types
//! - A [`SimState`] (tick counter) and an [`EventLog`]
//!
//! # Tick Pipeline
//!
//! Each `step()` runs:
//! 1. **Scan** -- stockpiles raise replenishment orders for unmet manifest entries
//! 2. **Replenishment dispatch** -- idle workers claim fillable orders; the
//!    sourced units are earmarked immediately
//! 3. **Job dispatch** -- remaining idle workers take queued jobs
//! 4. **Machines** -- production timers advance; finished machines release
//!    their operator to empty the output buffer
//! 5. **Workers** -- every worker steps toward its target or acts on arrival
//! 6. **Bookkeeping** -- update tick counter, compute state hash
//!
//! Claims are earmarked in phase 2, before any queued job can move material,
//! so a unit is never promised twice.
//!
//! Commands (placement, linkage, recipe assignment) are applied between ticks
//! and validate before mutating: an `Err` leaves the world unchanged. An `Err`
//! from `step()` is fatal and latches the engine into a faulted state.

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::SimError;
use crate::event::{Event, EventKind, EventLog};
use crate::fixed::Ticks;
use crate::id::*;
use crate::job_queue::{JobKind, JobQueue, QueuedJob};
use crate::machine::{Machine, ProductionState, RecipeAssignment};
use crate::material::Material;
use crate::position::{Footprint, GridPosition};
use crate::replenishment::{ReplenishmentOrder, ReplenishmentTable};
use crate::sim::{SimState, StateHash, TickReport};
use crate::stockpile::{Attachment, Stockpile, StockpileRole};
use crate::worker::{
    HaulStage, OperateStage, ReplenishmentClaim, TripStage, Worker, WorkerTask,
};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// A fatal error latched by `step()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// The tick during which the error was raised.
    pub tick: Ticks,
    pub error: SimError,
}

/// The core simulation engine.
#[derive(Debug)]
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) catalog: Catalog,

    /// Simulation state (tick counter).
    pub sim_state: SimState,

    // -- Entity pools --
    pub(crate) workers: SlotMap<WorkerId, Worker>,
    pub(crate) machines: SlotMap<MachineId, Machine>,
    pub(crate) stockpiles: SlotMap<StockpileId, Stockpile>,

    // -- Work queues --
    pub(crate) jobs: JobQueue,
    pub(crate) orders: ReplenishmentTable,

    /// Human-readable event log.
    pub(crate) events: EventLog,

    /// The most recently computed state hash.
    pub(crate) last_state_hash: u64,

    pub(crate) fault: Option<Fault>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), Catalog::standard())
    }
}

impl Engine {
    /// Create an empty world at tick 0.
    pub fn new(config: EngineConfig, catalog: Catalog) -> Self {
        Self {
            jobs: JobQueue::new(config.job_queue_capacity),
            orders: ReplenishmentTable::new(config.replenishment_slots),
            events: EventLog::new(config.event_log_capacity),
            workers: SlotMap::with_capacity_and_key(config.max_workers),
            machines: SlotMap::with_capacity_and_key(config.max_machines),
            stockpiles: SlotMap::with_capacity_and_key(config.max_stockpiles),
            sim_state: SimState::new(),
            last_state_hash: 0,
            fault: None,
            config,
            catalog,
        }
    }

    // -----------------------------------------------------------------------
    // Placement commands
    // -----------------------------------------------------------------------

    /// Place an empty, non-drawable stockpile with its origin at `(x, y)`.
    pub fn place_stockpile(
        &mut self,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Result<StockpileId, SimError> {
        if self.stockpiles.len() >= self.config.max_stockpiles {
            return Err(SimError::CapacityExceeded {
                kind: EntityKind::Stockpile,
                limit: self.config.max_stockpiles,
            });
        }
        let position = GridPosition::new(x, y);
        let footprint = Footprint::new(width, height);
        let id = self
            .stockpiles
            .insert_with_key(|id| Stockpile::new(id, position, footprint));
        tracing::debug!(stockpile = ?id, x, y, width, height, "stockpile placed");
        Ok(id)
    }

    /// Place a machine of the given type with its origin at `(x, y)`.
    pub fn place_machine(
        &mut self,
        machine_type: MachineTypeId,
        x: i32,
        y: i32,
    ) -> Result<MachineId, SimError> {
        let def = self
            .catalog
            .get_machine_type(machine_type)
            .ok_or(SimError::UnknownMachineType(machine_type))?;
        if self.machines.len() >= self.config.max_machines {
            return Err(SimError::CapacityExceeded {
                kind: EntityKind::Machine,
                limit: self.config.max_machines,
            });
        }
        let position = GridPosition::new(x, y);
        let footprint = def.footprint;
        let id = self
            .machines
            .insert_with_key(|id| Machine::new(id, machine_type, position, footprint));
        tracing::debug!(machine = ?id, kind = %def.name, x, y, "machine placed");
        Ok(id)
    }

    /// Add a worker at the origin.
    pub fn spawn_worker(&mut self) -> Result<WorkerId, SimError> {
        if self.workers.len() >= self.config.max_workers {
            return Err(SimError::CapacityExceeded {
                kind: EntityKind::Worker,
                limit: self.config.max_workers,
            });
        }
        let id = self
            .workers
            .insert_with_key(|id| Worker::new(id, GridPosition::ORIGIN));
        tracing::debug!(worker = ?id, "worker spawned");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Linkage and stock commands
    // -----------------------------------------------------------------------

    /// Link `stockpile` as the machine's input stockpile.
    pub fn attach_input_stockpile(
        &mut self,
        machine: MachineId,
        stockpile: StockpileId,
    ) -> Result<(), SimError> {
        self.attach_stockpile(machine, stockpile, StockpileRole::Input)
    }

    /// Link `stockpile` as the machine's output stockpile.
    pub fn attach_output_stockpile(
        &mut self,
        machine: MachineId,
        stockpile: StockpileId,
    ) -> Result<(), SimError> {
        self.attach_stockpile(machine, stockpile, StockpileRole::Output)
    }

    fn attach_stockpile(
        &mut self,
        machine_id: MachineId,
        stockpile_id: StockpileId,
        role: StockpileRole,
    ) -> Result<(), SimError> {
        let machine = self
            .machines
            .get(machine_id)
            .ok_or(SimError::UnknownEntity(ObjectRef::Machine(machine_id)))?;
        let stockpile = self
            .stockpiles
            .get(stockpile_id)
            .ok_or(SimError::UnknownEntity(ObjectRef::Stockpile(stockpile_id)))?;
        let attachment = Attachment {
            machine: machine_id,
            role,
        };
        if let Some(existing) = stockpile.attachment
            && existing != attachment
        {
            return Err(SimError::StockpileAlreadyAttached {
                stockpile: stockpile_id,
                machine: existing.machine,
            });
        }
        let previous = match role {
            StockpileRole::Input => machine.input_stockpile,
            StockpileRole::Output => machine.output_stockpile,
        };

        if let Some(old) = previous.filter(|old| *old != stockpile_id)
            && let Some(old) = self.stockpiles.get_mut(old)
        {
            old.attachment = None;
        }
        if let Some(stockpile) = self.stockpiles.get_mut(stockpile_id) {
            stockpile.attachment = Some(attachment);
        }
        if let Some(machine) = self.machines.get_mut(machine_id) {
            match role {
                StockpileRole::Input => machine.input_stockpile = Some(stockpile_id),
                StockpileRole::Output => machine.output_stockpile = Some(stockpile_id),
            }
        }
        tracing::debug!(machine = ?machine_id, stockpile = ?stockpile_id, %role, "stockpile attached");
        Ok(())
    }

    /// Add a standing replenishment target to a stockpile's manifest.
    pub fn add_required_material(
        &mut self,
        stockpile: StockpileId,
        material: Material,
        quantity: u32,
    ) -> Result<(), SimError> {
        self.stockpile_mut(stockpile)?
            .add_required(material, quantity)
    }

    /// Put material directly into a stockpile.
    pub fn add_material(
        &mut self,
        stockpile: StockpileId,
        material: Material,
        quantity: u32,
    ) -> Result<(), SimError> {
        self.stockpile_mut(stockpile)?.add(material, quantity)
    }

    /// Take material directly out of a stockpile. Fails without mutating if
    /// the stockpile holds too little free material.
    pub fn remove_material(
        &mut self,
        stockpile: StockpileId,
        material: Material,
        quantity: u32,
    ) -> Result<(), SimError> {
        self.stockpile_mut(stockpile)?.remove(material, quantity)
    }

    /// Allow or forbid workers drawing from this stockpile for replenishment.
    pub fn set_stockpile_drawable(
        &mut self,
        stockpile: StockpileId,
        drawable: bool,
    ) -> Result<(), SimError> {
        self.stockpile_mut(stockpile)?.drawable = drawable;
        Ok(())
    }

    fn stockpile_mut(&mut self, id: StockpileId) -> Result<&mut Stockpile, SimError> {
        self.stockpiles
            .get_mut(id)
            .ok_or(SimError::UnknownEntity(ObjectRef::Stockpile(id)))
    }

    // -----------------------------------------------------------------------
    // Work commands
    // -----------------------------------------------------------------------

    /// Assign a recipe. An idle machine activates it and queues an
    /// operate-machine job; a busy machine holds it as its single pending
    /// recipe.
    pub fn assign_recipe(
        &mut self,
        machine_id: MachineId,
        recipe: RecipeId,
    ) -> Result<RecipeAssignment, SimError> {
        if self.catalog.get_recipe(recipe).is_none() {
            return Err(SimError::UnknownRecipe(recipe));
        }
        let machine = self
            .machines
            .get_mut(machine_id)
            .ok_or(SimError::UnknownEntity(ObjectRef::Machine(machine_id)))?;
        let machine_type = self
            .catalog
            .get_machine_type(machine.machine_type)
            .ok_or(SimError::UnknownMachineType(machine.machine_type))?;
        if !machine_type.supports(recipe) {
            return Err(SimError::RecipeNotSupported {
                machine: machine_id,
                recipe,
            });
        }
        if machine.state == ProductionState::Idle && self.jobs.is_full() {
            return Err(SimError::JobQueueFull {
                capacity: self.jobs.capacity(),
            });
        }

        let assignment = machine.assign_recipe(recipe)?;
        if assignment == RecipeAssignment::Activated {
            self.jobs.push(QueuedJob {
                target: ObjectRef::Machine(machine_id),
                kind: JobKind::OperateMachine,
            })?;
        }
        self.events.push(Event::RecipeAssigned {
            machine: machine_id,
            recipe,
            queued: assignment == RecipeAssignment::Queued,
            tick: self.sim_state.tick,
        });
        Ok(assignment)
    }

    /// Queue a job for the next idle worker. Only machine jobs can be queued.
    pub fn enqueue_job(&mut self, target: ObjectRef, kind: JobKind) -> Result<(), SimError> {
        if !kind.is_queueable() {
            return Err(SimError::UnqueueableJob { kind });
        }
        let ObjectRef::Machine(machine) = target else {
            return Err(SimError::InvalidJobTarget { kind, target });
        };
        if !self.machines.contains_key(machine) {
            return Err(SimError::UnknownEntity(target));
        }
        self.jobs.push(QueuedJob { target, kind })
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Run exactly one tick.
    ///
    /// Any error is fatal: it is latched, and every later call returns
    /// [`SimError::Faulted`].
    pub fn step(&mut self) -> Result<TickReport, SimError> {
        if let Some(fault) = &self.fault {
            return Err(SimError::Faulted { tick: fault.tick });
        }
        let tick = self.sim_state.tick;
        match self.step_internal() {
            Ok(report) => Ok(report),
            Err(error) => {
                tracing::error!(tick, %error, "simulation faulted");
                self.fault = Some(Fault {
                    tick,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Run `steps` ticks, stopping at the first error.
    pub fn advance(&mut self, steps: u64) -> Result<TickReport, SimError> {
        let mut total = TickReport {
            tick: self.sim_state.tick,
            ..TickReport::default()
        };
        for _ in 0..steps {
            let report = self.step()?;
            total.accumulate(&report);
        }
        Ok(total)
    }

    fn step_internal(&mut self) -> Result<TickReport, SimError> {
        let mut report = TickReport {
            tick: self.sim_state.tick,
            ..TickReport::default()
        };

        // Phase 1: Scan -- raise replenishment orders.
        report.orders_placed = self.place_replenishment_orders()?;

        // Phase 2: Replenishment dispatch -- claim and earmark.
        report.replenishments_dispatched = self.phase_replenishment_dispatch()?;

        // Phase 3: Job dispatch.
        report.jobs_dispatched = self.phase_job_dispatch()?;

        // Phase 4: Machines.
        report.productions_completed = self.phase_machines()?;

        // Phase 5: Workers.
        self.phase_workers()?;

        // Phase 6: Bookkeeping.
        self.phase_bookkeeping();

        Ok(report)
    }

    /// Raise at most one new order per stockpile: for the first manifest
    /// entry that is short on hand and has no order yet. Returns the number of
    /// orders placed. Running it again before anything changes only places
    /// orders for other entries, never a second one for the same material.
    pub fn place_replenishment_orders(&mut self) -> Result<u32, SimError> {
        let tick = self.sim_state.tick;
        let mut placed = 0;
        for (id, stockpile) in &self.stockpiles {
            let Some(need) =
                stockpile.next_replenishment_need(|m| self.orders.has_order_for(id, m))
            else {
                continue;
            };
            let order = self.orders.allocate(id, need.material, need.quantity)?;
            tracing::debug!(
                stockpile = ?id,
                %order,
                material = %need.material,
                shortfall = need.quantity,
                "replenishment order placed"
            );
            self.events.push(Event::ReplenishmentOrdered {
                order,
                stockpile: id,
                material: need.material,
                quantity: need.quantity,
                tick,
            });
            placed += 1;
        }
        Ok(placed)
    }

    fn first_idle_worker(&self) -> Option<WorkerId> {
        self.workers
            .iter()
            .find(|(_, w)| w.is_idle())
            .map(|(id, _)| id)
    }

    fn phase_replenishment_dispatch(&mut self) -> Result<u32, SimError> {
        let tick = self.sim_state.tick;
        let mut dispatched = 0;
        while let Some(worker_id) = self.first_idle_worker() {
            let Some(order_id) = self
                .orders
                .next_fillable(|o| find_source(&self.stockpiles, o).is_some())
            else {
                break;
            };
            let order = *self.orders.get(order_id).ok_or(SimError::UnknownOrder(order_id))?;
            let source_id =
                find_source(&self.stockpiles, &order).ok_or(SimError::UnknownOrder(order_id))?;
            let source = self.stockpile_mut(source_id)?;
            let amount = source.free_quantity(order.material).min(order.outstanding());
            source.earmark(order.material, i64::from(amount))?;
            let source_pos = source.position;
            self.orders.claim(order_id, amount)?;

            let claim = ReplenishmentClaim {
                order: order_id,
                source: source_id,
                destination: order.destination,
                material: order.material,
                amount,
            };
            if let Some(worker) = self.workers.get_mut(worker_id) {
                worker.task = WorkerTask::Replenish {
                    claim,
                    stage: TripStage::Fetching,
                };
                worker.target = source_pos;
            }
            tracing::debug!(
                worker = ?worker_id,
                order = %order_id,
                source = ?source_id,
                amount,
                outstanding = order.outstanding() - amount,
                "replenishment claimed"
            );
            self.events.push(Event::ReplenishmentClaimed {
                order: order_id,
                worker: worker_id,
                source: source_id,
                quantity: amount,
                tick,
            });
            self.events.push(Event::JobAssigned {
                worker: worker_id,
                job: JobKind::Replenish,
                target: ObjectRef::Stockpile(order.destination),
                tick,
            });
            dispatched += 1;
        }
        Ok(dispatched)
    }

    fn phase_job_dispatch(&mut self) -> Result<u32, SimError> {
        let tick = self.sim_state.tick;
        let mut dispatched = 0;
        while let Some(worker_id) = self.first_idle_worker() {
            let Some(job) = self.jobs.pop() else {
                break;
            };
            let ObjectRef::Machine(machine_id) = job.target else {
                return Err(SimError::InvalidJobTarget {
                    kind: job.kind,
                    target: job.target,
                });
            };
            let machine = self
                .machines
                .get_mut(machine_id)
                .ok_or(SimError::UnknownEntity(job.target))?;
            let task = match job.kind {
                JobKind::OperateMachine => {
                    let awaiting = matches!(machine.state, ProductionState::AwaitingInputs { .. });
                    if !awaiting || machine.worker.is_some() {
                        tracing::warn!(machine = ?machine_id, state = machine.state.name(), "stale operate job discarded");
                        self.events.push(Event::JobDiscarded { job, tick });
                        continue;
                    }
                    machine.worker = Some(worker_id);
                    WorkerTask::OperateMachine {
                        machine: machine_id,
                        stage: OperateStage::Approaching,
                    }
                }
                JobKind::EmptyMachineOutput => WorkerTask::EmptyMachineOutput {
                    machine: machine_id,
                    stage: HaulStage::Fetching,
                },
                JobKind::FillInputBuffer | JobKind::Replenish => {
                    return Err(SimError::UnqueueableJob { kind: job.kind });
                }
            };
            let machine_pos = machine.position;
            if let Some(worker) = self.workers.get_mut(worker_id) {
                worker.task = task;
                worker.target = machine_pos;
            }
            self.events.push(Event::JobAssigned {
                worker: worker_id,
                job: job.kind,
                target: job.target,
                tick,
            });
            dispatched += 1;
        }
        Ok(dispatched)
    }

    fn phase_machines(&mut self) -> Result<u32, SimError> {
        let tick = self.sim_state.tick;
        let mut finished = Vec::new();
        for (id, machine) in &mut self.machines {
            if let Some(done) = machine.tick(&self.catalog)? {
                finished.push((id, machine.position, done));
            }
        }
        let completed = finished.len() as u32;
        for (machine_id, position, done) in finished {
            self.events.push(Event::ProductionCompleted {
                machine: machine_id,
                recipe: done.recipe,
                tick,
            });
            let worker = self
                .workers
                .get_mut(done.worker)
                .ok_or(SimError::UnknownEntity(ObjectRef::Worker(done.worker)))?;
            worker.task = WorkerTask::EmptyMachineOutput {
                machine: machine_id,
                stage: HaulStage::Fetching,
            };
            worker.target = position;
            self.events.push(Event::JobAssigned {
                worker: done.worker,
                job: JobKind::EmptyMachineOutput,
                target: ObjectRef::Machine(machine_id),
                tick,
            });
        }
        Ok(completed)
    }

    fn phase_workers(&mut self) -> Result<(), SimError> {
        let ids: Vec<WorkerId> = self.workers.keys().collect();
        for id in ids {
            self.advance_worker(id)?;
        }
        Ok(())
    }

    fn phase_bookkeeping(&mut self) {
        self.sim_state.tick += 1;
        self.last_state_hash = self.compute_state_hash();
    }

    /// Compute a deterministic hash of the current simulation state.
    fn compute_state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.sim_state.tick);

        // SlotMap iteration order is deterministic (slot order).
        for (_, worker) in &self.workers {
            hasher.write_position(worker.position);
            hasher.write_position(worker.target);
            hasher.write(worker.status().name().as_bytes());
            if let Some(load) = worker.carrying() {
                hasher.write_u64(load.material.ordinal());
                hasher.write_u32(load.quantity);
            }
        }
        for (_, machine) in &self.machines {
            hasher.write(machine.state.name().as_bytes());
            if let Some(recipe) = machine.active_recipe() {
                hasher.write_u32(recipe.0);
            }
            hasher.write_u64(machine.remaining().unwrap_or(0));
            for stack in machine.input_buffer.iter().chain(machine.output_buffer.iter()) {
                hasher.write_u64(stack.material.ordinal());
                hasher.write_u32(stack.quantity);
            }
        }
        for (_, stockpile) in &self.stockpiles {
            for entry in stockpile.inventory() {
                hasher.write_u64(entry.material.ordinal());
                hasher.write_u32(entry.quantity);
                hasher.write_u32(entry.earmarked);
            }
        }
        for (id, order) in self.orders.iter() {
            hasher.write_u32(id.0);
            hasher.write_u32(order.ordered);
            hasher.write_u32(order.picked_up);
        }
        hasher.write_u64(self.jobs.len() as u64);
        hasher.finish()
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The number of ticks executed so far.
    pub fn tick(&self) -> Ticks {
        self.sim_state.tick
    }

    /// The state hash computed at the end of the last tick.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    /// The latched fatal error, if `step()` has failed.
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.workers.get(id)
    }

    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.machines.get(id)
    }

    pub fn stockpile(&self, id: StockpileId) -> Option<&Stockpile> {
        self.stockpiles.get(id)
    }

    pub fn workers(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    pub fn machines(&self) -> impl Iterator<Item = &Machine> {
        self.machines.values()
    }

    pub fn stockpiles(&self) -> impl Iterator<Item = &Stockpile> {
        self.stockpiles.values()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    pub fn stockpile_count(&self) -> usize {
        self.stockpiles.len()
    }

    pub fn job_queue(&self) -> &JobQueue {
        &self.jobs
    }

    pub fn replenishment_orders(&self) -> &ReplenishmentTable {
        &self.orders
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Stop recording an event kind in the log.
    pub fn suppress_event(&mut self, kind: EventKind) {
        self.events.suppress(kind);
    }
}

/// First drawable stockpile, other than the ordering one, with free units of
/// the ordered material.
fn find_source(
    stockpiles: &SlotMap<StockpileId, Stockpile>,
    order: &ReplenishmentOrder,
) -> Option<StockpileId> {
    stockpiles
        .iter()
        .find(|(id, s)| {
            *id != order.destination && s.drawable && s.free_quantity(order.material) > 0
        })
        .map(|(id, _)| id)
}
