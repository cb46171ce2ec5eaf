//! Worker task state machine.
//!
//! A worker's job and status are a single closed [`WorkerTask`]: every
//! variant is a legal (job, stage) pair, and the carried load lives inside the
//! delivering stages, so "carrying without a delivery" cannot be represented.
//!
//! Each tick a worker either takes one greedy step toward its target or, when
//! already there, performs the arrival action for its current task.

use crate::engine::Engine;
use crate::error::SimError;
use crate::event::Event;
use crate::id::*;
use crate::job_queue::{JobKind, QueuedJob};
use crate::material::{Material, MaterialStack};
use crate::position::GridPosition;
use crate::stockpile::StockpileRole;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Rendered worker status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerStatus {
    Idle,
    Moving,
    Carrying,
    Producing,
    Blocked,
}

impl WorkerStatus {
    pub fn name(self) -> &'static str {
        match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Moving => "moving",
            WorkerStatus::Carrying => "carrying",
            WorkerStatus::Producing => "producing",
            WorkerStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress of an operate-machine job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperateStage {
    /// Walking to the machine.
    Approaching,
    /// Standing at the machine while its timer runs.
    Producing,
}

/// Progress of a fetch-and-deliver job that can stall on missing material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaulStage {
    /// Walking to the pickup point.
    Fetching,
    /// Walking to the drop point with a load.
    Delivering { load: MaterialStack },
    /// At the pickup point, waiting for material to become available.
    Blocked,
}

/// Progress of a replenishment trip. The pickup is earmarked in advance, so
/// it never blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripStage {
    Fetching,
    Delivering { load: MaterialStack },
}

/// A worker's claim on part of a replenishment order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentClaim {
    pub order: OrderId,
    pub source: StockpileId,
    pub destination: StockpileId,
    pub material: Material,
    /// Units earmarked at the source for this worker.
    pub amount: u32,
}

/// Everything a worker can be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkerTask {
    #[default]
    Idle,
    OperateMachine {
        machine: MachineId,
        stage: OperateStage,
    },
    FillInputBuffer {
        machine: MachineId,
        stage: HaulStage,
    },
    EmptyMachineOutput {
        machine: MachineId,
        stage: HaulStage,
    },
    Replenish {
        claim: ReplenishmentClaim,
        stage: TripStage,
    },
}

impl WorkerTask {
    pub fn job(&self) -> Option<JobKind> {
        match self {
            WorkerTask::Idle => None,
            WorkerTask::OperateMachine { .. } => Some(JobKind::OperateMachine),
            WorkerTask::FillInputBuffer { .. } => Some(JobKind::FillInputBuffer),
            WorkerTask::EmptyMachineOutput { .. } => Some(JobKind::EmptyMachineOutput),
            WorkerTask::Replenish { .. } => Some(JobKind::Replenish),
        }
    }

    /// The entity the job is for: the machine, or the ordering stockpile.
    pub fn job_target(&self) -> ObjectRef {
        match *self {
            WorkerTask::Idle => ObjectRef::Nothing,
            WorkerTask::OperateMachine { machine, .. }
            | WorkerTask::FillInputBuffer { machine, .. }
            | WorkerTask::EmptyMachineOutput { machine, .. } => ObjectRef::Machine(machine),
            WorkerTask::Replenish { claim, .. } => ObjectRef::Stockpile(claim.destination),
        }
    }

    pub fn status(&self) -> WorkerStatus {
        match self {
            WorkerTask::Idle => WorkerStatus::Idle,
            WorkerTask::OperateMachine { stage, .. } => match stage {
                OperateStage::Approaching => WorkerStatus::Moving,
                OperateStage::Producing => WorkerStatus::Producing,
            },
            WorkerTask::FillInputBuffer { stage, .. }
            | WorkerTask::EmptyMachineOutput { stage, .. } => match stage {
                HaulStage::Fetching => WorkerStatus::Moving,
                HaulStage::Delivering { .. } => WorkerStatus::Carrying,
                HaulStage::Blocked => WorkerStatus::Blocked,
            },
            WorkerTask::Replenish { stage, .. } => match stage {
                TripStage::Fetching => WorkerStatus::Moving,
                TripStage::Delivering { .. } => WorkerStatus::Carrying,
            },
        }
    }

    pub fn carrying(&self) -> Option<MaterialStack> {
        match *self {
            WorkerTask::FillInputBuffer {
                stage: HaulStage::Delivering { load },
                ..
            }
            | WorkerTask::EmptyMachineOutput {
                stage: HaulStage::Delivering { load },
                ..
            }
            | WorkerTask::Replenish {
                stage: TripStage::Delivering { load },
                ..
            } => Some(load),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub position: GridPosition,
    /// Where the worker is walking; equal to `position` once arrived.
    pub target: GridPosition,
    pub task: WorkerTask,
}

impl Worker {
    pub fn new(id: WorkerId, position: GridPosition) -> Self {
        Self {
            id,
            position,
            target: position,
            task: WorkerTask::Idle,
        }
    }

    pub fn status(&self) -> WorkerStatus {
        self.task.status()
    }

    pub fn job(&self) -> Option<JobKind> {
        self.task.job()
    }

    pub fn carrying(&self) -> Option<MaterialStack> {
        self.task.carrying()
    }

    pub fn is_idle(&self) -> bool {
        self.task == WorkerTask::Idle
    }

    pub fn has_arrived(&self) -> bool {
        self.position == self.target
    }
}

// ---------------------------------------------------------------------------
// Advancing
// ---------------------------------------------------------------------------

/// The task a worker holds after its arrival action, and where it walks next.
type Next = (WorkerTask, GridPosition);

impl Engine {
    /// Advance one worker by one tick.
    pub(crate) fn advance_worker(&mut self, id: WorkerId) -> Result<(), SimError> {
        let worker = *self
            .workers
            .get(id)
            .ok_or(SimError::UnknownEntity(ObjectRef::Worker(id)))?;

        if !worker.has_arrived() {
            if let Some(w) = self.workers.get_mut(id) {
                w.position = w.position.step_towards(w.target);
            }
            return Ok(());
        }

        let here = worker.position;
        let (task, target) = match worker.task {
            WorkerTask::Idle => (WorkerTask::Idle, here),
            WorkerTask::OperateMachine { machine, stage } => {
                self.arrive_operate(id, machine, stage, here)?
            }
            WorkerTask::FillInputBuffer { machine, stage } => {
                self.arrive_fill(id, machine, stage, here)?
            }
            WorkerTask::EmptyMachineOutput { machine, stage } => {
                self.arrive_empty(id, machine, stage, here)?
            }
            WorkerTask::Replenish { claim, stage } => self.arrive_replenish(id, claim, stage, here)?,
        };

        if let Some(w) = self.workers.get_mut(id) {
            w.task = task;
            w.target = target;
        }
        Ok(())
    }

    fn arrive_operate(
        &mut self,
        id: WorkerId,
        machine_id: MachineId,
        stage: OperateStage,
        here: GridPosition,
    ) -> Result<Next, SimError> {
        if stage == OperateStage::Producing {
            return Ok((
                WorkerTask::OperateMachine {
                    machine: machine_id,
                    stage,
                },
                here,
            ));
        }
        let tick = self.sim_state.tick;
        let machine = self
            .machines
            .get_mut(machine_id)
            .ok_or(SimError::UnknownEntity(ObjectRef::Machine(machine_id)))?;
        let recipe_id = machine
            .active_recipe()
            .ok_or(SimError::NoActiveRecipe { machine: machine_id })?;
        let recipe = self
            .catalog
            .get_recipe(recipe_id)
            .ok_or(SimError::UnknownRecipe(recipe_id))?;

        if machine.inputs_satisfied(recipe) {
            machine.start_production(recipe, id)?;
            self.events.push(Event::ProductionStarted {
                machine: machine_id,
                recipe: recipe_id,
                worker: id,
                tick,
            });
            return Ok((
                WorkerTask::OperateMachine {
                    machine: machine_id,
                    stage: OperateStage::Producing,
                },
                machine.position,
            ));
        }

        let source = machine.input_stockpile.ok_or(SimError::MissingStockpileLink {
            machine: machine_id,
            role: StockpileRole::Input,
        })?;
        let source_pos = self
            .stockpiles
            .get(source)
            .ok_or(SimError::UnknownEntity(ObjectRef::Stockpile(source)))?
            .position;
        Ok((
            WorkerTask::FillInputBuffer {
                machine: machine_id,
                stage: HaulStage::Fetching,
            },
            source_pos,
        ))
    }

    fn arrive_fill(
        &mut self,
        id: WorkerId,
        machine_id: MachineId,
        stage: HaulStage,
        here: GridPosition,
    ) -> Result<Next, SimError> {
        let tick = self.sim_state.tick;
        let machine = self
            .machines
            .get_mut(machine_id)
            .ok_or(SimError::UnknownEntity(ObjectRef::Machine(machine_id)))?;
        let recipe_id = machine
            .active_recipe()
            .ok_or(SimError::NoActiveRecipe { machine: machine_id })?;
        let recipe = self
            .catalog
            .get_recipe(recipe_id)
            .ok_or(SimError::UnknownRecipe(recipe_id))?;
        let source = machine.input_stockpile.ok_or(SimError::MissingStockpileLink {
            machine: machine_id,
            role: StockpileRole::Input,
        })?;

        match stage {
            HaulStage::Fetching | HaulStage::Blocked => {
                let Some(need) = machine.next_unfulfilled(recipe) else {
                    return Ok((
                        WorkerTask::OperateMachine {
                            machine: machine_id,
                            stage: OperateStage::Approaching,
                        },
                        machine.position,
                    ));
                };
                let stockpile = self
                    .stockpiles
                    .get_mut(source)
                    .ok_or(SimError::UnknownEntity(ObjectRef::Stockpile(source)))?;
                let was_blocked = stage == HaulStage::Blocked;

                if stockpile.position != here {
                    tracing::debug!(worker = ?id, stockpile = ?source, "input link moved, retargeting");
                    if was_blocked {
                        self.events.push(Event::WorkerResumed {
                            worker: id,
                            job: JobKind::FillInputBuffer,
                            tick,
                        });
                    }
                    return Ok((
                        WorkerTask::FillInputBuffer {
                            machine: machine_id,
                            stage: HaulStage::Fetching,
                        },
                        stockpile.position,
                    ));
                }

                if stockpile.free_quantity(need.material) < need.quantity {
                    if !was_blocked {
                        tracing::debug!(
                            worker = ?id,
                            material = %need.material,
                            needed = need.quantity,
                            free = stockpile.free_quantity(need.material),
                            "input stockpile short, blocking"
                        );
                        self.events.push(Event::WorkerBlocked {
                            worker: id,
                            job: JobKind::FillInputBuffer,
                            tick,
                        });
                    }
                    return Ok((
                        WorkerTask::FillInputBuffer {
                            machine: machine_id,
                            stage: HaulStage::Blocked,
                        },
                        here,
                    ));
                }

                stockpile.remove(need.material, need.quantity)?;
                if was_blocked {
                    self.events.push(Event::WorkerResumed {
                        worker: id,
                        job: JobKind::FillInputBuffer,
                        tick,
                    });
                }
                self.events.push(Event::MaterialPickedUp {
                    worker: id,
                    from: ObjectRef::Stockpile(source),
                    material: need.material,
                    quantity: need.quantity,
                    tick,
                });
                Ok((
                    WorkerTask::FillInputBuffer {
                        machine: machine_id,
                        stage: HaulStage::Delivering {
                            load: MaterialStack::new(need.material, need.quantity),
                        },
                    },
                    machine.position,
                ))
            }
            HaulStage::Delivering { load } => {
                machine.receive_input(load)?;
                self.events.push(Event::MaterialDropped {
                    worker: id,
                    to: ObjectRef::Machine(machine_id),
                    material: load.material,
                    quantity: load.quantity,
                    tick,
                });

                if machine.inputs_satisfied(recipe) {
                    machine.start_production(recipe, id)?;
                    self.events.push(Event::ProductionStarted {
                        machine: machine_id,
                        recipe: recipe_id,
                        worker: id,
                        tick,
                    });
                    return Ok((
                        WorkerTask::OperateMachine {
                            machine: machine_id,
                            stage: OperateStage::Producing,
                        },
                        here,
                    ));
                }

                let source_pos = self
                    .stockpiles
                    .get(source)
                    .ok_or(SimError::UnknownEntity(ObjectRef::Stockpile(source)))?
                    .position;
                Ok((
                    WorkerTask::FillInputBuffer {
                        machine: machine_id,
                        stage: HaulStage::Fetching,
                    },
                    source_pos,
                ))
            }
        }
    }

    fn arrive_empty(
        &mut self,
        id: WorkerId,
        machine_id: MachineId,
        stage: HaulStage,
        here: GridPosition,
    ) -> Result<Next, SimError> {
        let tick = self.sim_state.tick;
        let machine = self
            .machines
            .get_mut(machine_id)
            .ok_or(SimError::UnknownEntity(ObjectRef::Machine(machine_id)))?;
        let out = machine.output_stockpile.ok_or(SimError::MissingStockpileLink {
            machine: machine_id,
            role: StockpileRole::Output,
        })?;
        let out_stockpile = self
            .stockpiles
            .get_mut(out)
            .ok_or(SimError::UnknownEntity(ObjectRef::Stockpile(out)))?;

        match stage {
            HaulStage::Fetching | HaulStage::Blocked => {
                let was_blocked = stage == HaulStage::Blocked;
                let Some((load, activated)) = machine.take_output() else {
                    if machine.is_producing() {
                        if !was_blocked {
                            self.events.push(Event::WorkerBlocked {
                                worker: id,
                                job: JobKind::EmptyMachineOutput,
                                tick,
                            });
                        }
                        return Ok((
                            WorkerTask::EmptyMachineOutput {
                                machine: machine_id,
                                stage: HaulStage::Blocked,
                            },
                            here,
                        ));
                    }
                    return Ok((WorkerTask::Idle, here));
                };

                if was_blocked {
                    self.events.push(Event::WorkerResumed {
                        worker: id,
                        job: JobKind::EmptyMachineOutput,
                        tick,
                    });
                }
                self.events.push(Event::MaterialPickedUp {
                    worker: id,
                    from: ObjectRef::Machine(machine_id),
                    material: load.material,
                    quantity: load.quantity,
                    tick,
                });
                if let Some(recipe) = activated {
                    tracing::debug!(machine = ?machine_id, %recipe, "pending recipe activated");
                    self.jobs.push(QueuedJob {
                        target: ObjectRef::Machine(machine_id),
                        kind: JobKind::OperateMachine,
                    })?;
                }
                Ok((
                    WorkerTask::EmptyMachineOutput {
                        machine: machine_id,
                        stage: HaulStage::Delivering { load },
                    },
                    out_stockpile.position,
                ))
            }
            HaulStage::Delivering { load } => {
                if out_stockpile.position != here {
                    tracing::debug!(worker = ?id, stockpile = ?out, "output link moved, retargeting");
                    return Ok((
                        WorkerTask::EmptyMachineOutput {
                            machine: machine_id,
                            stage: HaulStage::Delivering { load },
                        },
                        out_stockpile.position,
                    ));
                }
                out_stockpile.add(load.material, load.quantity)?;
                self.events.push(Event::MaterialDropped {
                    worker: id,
                    to: ObjectRef::Stockpile(out),
                    material: load.material,
                    quantity: load.quantity,
                    tick,
                });
                if machine.output_buffer.is_empty() {
                    Ok((WorkerTask::Idle, here))
                } else {
                    Ok((
                        WorkerTask::EmptyMachineOutput {
                            machine: machine_id,
                            stage: HaulStage::Fetching,
                        },
                        machine.position,
                    ))
                }
            }
        }
    }

    fn arrive_replenish(
        &mut self,
        id: WorkerId,
        claim: ReplenishmentClaim,
        stage: TripStage,
        here: GridPosition,
    ) -> Result<Next, SimError> {
        let tick = self.sim_state.tick;
        match stage {
            TripStage::Fetching => {
                let destination_pos = self
                    .stockpiles
                    .get(claim.destination)
                    .ok_or(SimError::UnknownEntity(ObjectRef::Stockpile(claim.destination)))?
                    .position;
                let source = self
                    .stockpiles
                    .get_mut(claim.source)
                    .ok_or(SimError::UnknownEntity(ObjectRef::Stockpile(claim.source)))?;
                source.earmark(claim.material, -i64::from(claim.amount))?;
                source.remove(claim.material, claim.amount)?;
                self.events.push(Event::MaterialPickedUp {
                    worker: id,
                    from: ObjectRef::Stockpile(claim.source),
                    material: claim.material,
                    quantity: claim.amount,
                    tick,
                });
                Ok((
                    WorkerTask::Replenish {
                        claim,
                        stage: TripStage::Delivering {
                            load: MaterialStack::new(claim.material, claim.amount),
                        },
                    },
                    destination_pos,
                ))
            }
            TripStage::Delivering { load } => {
                let destination = self
                    .stockpiles
                    .get_mut(claim.destination)
                    .ok_or(SimError::UnknownEntity(ObjectRef::Stockpile(claim.destination)))?;
                destination.add(load.material, load.quantity)?;
                self.events.push(Event::MaterialDropped {
                    worker: id,
                    to: ObjectRef::Stockpile(claim.destination),
                    material: load.material,
                    quantity: load.quantity,
                    tick,
                });
                let fulfilled = self.orders.complete(claim.order, load.quantity)?;
                self.events.push(Event::ReplenishmentDelivered {
                    order: claim.order,
                    stockpile: claim.destination,
                    quantity: load.quantity,
                    fulfilled,
                    tick,
                });
                Ok((WorkerTask::Idle, here))
            }
        }
    }
}
