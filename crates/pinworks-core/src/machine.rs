//! Machine production state machine.
//!
//! ```text
//!   Idle --assign--> AwaitingInputs --start (inputs + worker)--> Producing
//!    ^                    ^                                          |
//!    |                    | pending recipe                   timer expires
//!    +---- output fully collected ----+---------------- OutputReady <+
//! ```

use crate::catalog::{Catalog, RecipeDef, RecipeEntry};
use crate::error::SimError;
use crate::fixed::{Fixed64, Ticks, ratio};
use crate::id::*;
use crate::material::{MaterialBuffer, MaterialStack};
use crate::position::{Footprint, GridPosition};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionState {
    /// No active recipe.
    Idle,
    /// Recipe assigned; input buffer not yet consumed.
    AwaitingInputs { recipe: RecipeId },
    /// Inputs consumed; timer running with a worker present.
    Producing {
        recipe: RecipeId,
        remaining: Ticks,
        duration: Ticks,
    },
    /// Outputs sit in the output buffer awaiting pickup.
    OutputReady { recipe: RecipeId },
}

impl ProductionState {
    pub fn name(&self) -> &'static str {
        match self {
            ProductionState::Idle => "idle",
            ProductionState::AwaitingInputs { .. } => "awaiting_inputs",
            ProductionState::Producing { .. } => "producing",
            ProductionState::OutputReady { .. } => "output_ready",
        }
    }

    pub fn recipe(&self) -> Option<RecipeId> {
        match *self {
            ProductionState::Idle => None,
            ProductionState::AwaitingInputs { recipe }
            | ProductionState::Producing { recipe, .. }
            | ProductionState::OutputReady { recipe } => Some(recipe),
        }
    }
}

/// A production run that finished during [`Machine::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completed {
    /// The operator released by the machine.
    pub worker: WorkerId,
    pub recipe: RecipeId,
}

/// Result of [`Machine::assign_recipe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeAssignment {
    /// The machine was idle and now awaits inputs; an operator is needed.
    Activated,
    /// The machine was busy; the recipe becomes active once output is collected.
    Queued,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: MachineId,
    pub machine_type: MachineTypeId,
    pub position: GridPosition,
    pub footprint: Footprint,
    pub state: ProductionState,
    pub pending_recipe: Option<RecipeId>,
    pub input_buffer: MaterialBuffer,
    pub output_buffer: MaterialBuffer,
    pub input_stockpile: Option<StockpileId>,
    pub output_stockpile: Option<StockpileId>,
    pub worker: Option<WorkerId>,
}

impl Machine {
    pub fn new(
        id: MachineId,
        machine_type: MachineTypeId,
        position: GridPosition,
        footprint: Footprint,
    ) -> Self {
        Self {
            id,
            machine_type,
            position,
            footprint,
            state: ProductionState::Idle,
            pending_recipe: None,
            input_buffer: MaterialBuffer::new(),
            output_buffer: MaterialBuffer::new(),
            input_stockpile: None,
            output_stockpile: None,
            worker: None,
        }
    }

    pub fn active_recipe(&self) -> Option<RecipeId> {
        self.state.recipe()
    }

    pub fn is_producing(&self) -> bool {
        matches!(self.state, ProductionState::Producing { .. })
    }

    /// Activate `recipe` on an idle machine, or hold it as the single pending
    /// recipe on a busy one.
    pub fn assign_recipe(&mut self, recipe: RecipeId) -> Result<RecipeAssignment, SimError> {
        if self.state == ProductionState::Idle {
            self.state = ProductionState::AwaitingInputs { recipe };
            return Ok(RecipeAssignment::Activated);
        }
        if let Some(pending) = self.pending_recipe {
            return Err(SimError::RecipeAlreadyPending {
                machine: self.id,
                pending,
            });
        }
        self.pending_recipe = Some(recipe);
        Ok(RecipeAssignment::Queued)
    }

    /// Whether `assign_recipe` would succeed.
    pub fn can_accept_recipe(&self) -> bool {
        self.state == ProductionState::Idle || self.pending_recipe.is_none()
    }

    /// First recipe input (declared order) short in the input buffer, with its
    /// shortfall.
    pub fn next_unfulfilled(&self, recipe: &RecipeDef) -> Option<RecipeEntry> {
        recipe.next_unfulfilled(&self.input_buffer)
    }

    pub fn inputs_satisfied(&self, recipe: &RecipeDef) -> bool {
        recipe.inputs_satisfied(&self.input_buffer)
    }

    pub fn receive_input(&mut self, stack: MaterialStack) -> Result<(), SimError> {
        let machine = self.id;
        self.input_buffer
            .add(stack.material, stack.quantity)
            .map_err(|source| SimError::MachineBufferOverflow { machine, source })
    }

    /// Consume the recipe's inputs and start the timer. Any overage stays in
    /// the input buffer.
    pub fn start_production(&mut self, recipe: &RecipeDef, worker: WorkerId) -> Result<(), SimError> {
        let recipe_id = match self.state {
            ProductionState::Producing { .. } => {
                return Err(SimError::AlreadyProducing { machine: self.id });
            }
            ProductionState::AwaitingInputs { recipe } => recipe,
            ProductionState::Idle | ProductionState::OutputReady { .. } => {
                return Err(SimError::NoActiveRecipe { machine: self.id });
            }
        };
        if !self.inputs_satisfied(recipe) {
            return Err(SimError::InputsNotSatisfied {
                machine: self.id,
                recipe: recipe_id,
            });
        }
        for entry in &recipe.inputs {
            if self.input_buffer.remove(entry.material, entry.quantity) < entry.quantity {
                return Err(SimError::InputsNotSatisfied {
                    machine: self.id,
                    recipe: recipe_id,
                });
            }
        }
        self.state = ProductionState::Producing {
            recipe: recipe_id,
            remaining: recipe.duration,
            duration: recipe.duration,
        };
        self.worker = Some(worker);
        tracing::debug!(machine = ?self.id, recipe = %recipe.name, "production started");
        Ok(())
    }

    /// Advance production by one tick. When the timer expires the recipe's
    /// outputs land in the output buffer and the operator is released.
    pub fn tick(&mut self, catalog: &Catalog) -> Result<Option<Completed>, SimError> {
        let ProductionState::Producing {
            recipe,
            remaining,
            duration,
        } = self.state
        else {
            return Ok(None);
        };
        let Some(worker) = self.worker else {
            return Err(SimError::ProducingWithoutWorker { machine: self.id });
        };
        if remaining > 1 {
            self.state = ProductionState::Producing {
                recipe,
                remaining: remaining - 1,
                duration,
            };
            return Ok(None);
        }
        let def = catalog
            .get_recipe(recipe)
            .ok_or(SimError::UnknownRecipe(recipe))?;
        let machine = self.id;
        for output in &def.outputs {
            self.output_buffer
                .add(output.material, output.quantity)
                .map_err(|source| SimError::MachineBufferOverflow { machine, source })?;
        }
        self.state = ProductionState::OutputReady { recipe };
        self.worker = None;
        tracing::debug!(machine = ?self.id, recipe = %def.name, "production completed");
        Ok(Some(Completed { worker, recipe }))
    }

    /// Take the next output entry, in declared order. Once the buffer is empty
    /// the machine goes idle, or activates its pending recipe; in that case the
    /// newly active recipe is returned alongside the stack.
    pub fn take_output(&mut self) -> Option<(MaterialStack, Option<RecipeId>)> {
        let stack = self.output_buffer.take_first()?;
        let mut activated = None;
        if self.output_buffer.is_empty() && matches!(self.state, ProductionState::OutputReady { .. }) {
            self.state = match self.pending_recipe.take() {
                Some(recipe) => {
                    activated = Some(recipe);
                    ProductionState::AwaitingInputs { recipe }
                }
                None => ProductionState::Idle,
            };
        }
        Some((stack, activated))
    }

    /// Fraction of the current production run that has elapsed.
    pub fn progress(&self) -> Fixed64 {
        match self.state {
            ProductionState::Producing {
                remaining,
                duration,
                ..
            } => ratio(duration.saturating_sub(remaining), duration),
            ProductionState::OutputReady { .. } => Fixed64::ONE,
            ProductionState::Idle | ProductionState::AwaitingInputs { .. } => Fixed64::ZERO,
        }
    }

    /// Remaining ticks on the production timer, if producing.
    pub fn remaining(&self) -> Option<Ticks> {
        match self.state {
            ProductionState::Producing { remaining, .. } => Some(remaining),
            _ => None,
        }
    }

    pub fn contains(&self, point: GridPosition) -> bool {
        self.footprint.contains(self.position, point)
    }
}
