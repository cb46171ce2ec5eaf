use crate::fixed::Ticks;
use crate::id::*;
use crate::job_queue::JobKind;
use crate::material::{Material, StackOverflow};
use crate::stockpile::StockpileRole;

/// Fatal simulation errors.
///
/// Every variant names the entity and operation that tripped it. Resource
/// shortages during a tick are not errors: the affected worker blocks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    // -- capacity ----------------------------------------------------------
    #[error("cannot add more {}: limit is {limit}", .kind.plural())]
    CapacityExceeded { kind: EntityKind, limit: usize },
    #[error("job queue is full ({capacity} entries)")]
    JobQueueFull { capacity: usize },
    #[error("replenishment table is full ({slots} slots)")]
    ReplenishmentTableFull { slots: usize },

    // -- stockpile ledger --------------------------------------------------
    #[error("stockpile {stockpile:?}: cannot remove {requested} {material}, only {available} on hand")]
    InsufficientMaterial {
        stockpile: StockpileId,
        material: Material,
        requested: u32,
        available: u32,
    },
    #[error("stockpile {stockpile:?}: cannot remove {requested} {material}, only {free} not earmarked")]
    EarmarkedMaterial {
        stockpile: StockpileId,
        material: Material,
        requested: u32,
        free: u32,
    },
    #[error("stockpile {stockpile:?}: cannot earmark {material}, none on hand")]
    MaterialNotPresent {
        stockpile: StockpileId,
        material: Material,
    },
    #[error("stockpile {stockpile:?}: cannot earmark {requested} more {material}, only {free} free")]
    EarmarkOverflow {
        stockpile: StockpileId,
        material: Material,
        requested: u32,
        free: u32,
    },
    #[error("stockpile {stockpile:?}: cannot release {released} {material}, only {earmarked} earmarked")]
    EarmarkUnderflow {
        stockpile: StockpileId,
        material: Material,
        released: u32,
        earmarked: u32,
    },
    #[error("stockpile {stockpile:?}: {source}")]
    StockpileOverflow {
        stockpile: StockpileId,
        source: StackOverflow,
    },
    #[error("stockpile {stockpile:?} is already attached to machine {machine:?}")]
    StockpileAlreadyAttached {
        stockpile: StockpileId,
        machine: MachineId,
    },

    // -- machines ----------------------------------------------------------
    #[error("machine {machine:?}: cannot start {recipe}, inputs not satisfied")]
    InputsNotSatisfied { machine: MachineId, recipe: RecipeId },
    #[error("machine {machine:?} is already producing")]
    AlreadyProducing { machine: MachineId },
    #[error("machine {machine:?} has no active recipe")]
    NoActiveRecipe { machine: MachineId },
    #[error("machine {machine:?} already has {pending} pending")]
    RecipeAlreadyPending { machine: MachineId, pending: RecipeId },
    #[error("machine {machine:?} cannot run {recipe}")]
    RecipeNotSupported { machine: MachineId, recipe: RecipeId },
    #[error("machine {machine:?} is producing without a worker")]
    ProducingWithoutWorker { machine: MachineId },
    #[error("machine {machine:?}: {source}")]
    MachineBufferOverflow {
        machine: MachineId,
        source: StackOverflow,
    },
    #[error("machine {machine:?} has no {role} stockpile attached")]
    MissingStockpileLink { machine: MachineId, role: StockpileRole },

    // -- catalog / lookup --------------------------------------------------
    #[error("unknown recipe: {0}")]
    UnknownRecipe(RecipeId),
    #[error("unknown machine type: {0}")]
    UnknownMachineType(MachineTypeId),
    #[error("unknown entity: {0}")]
    UnknownEntity(ObjectRef),
    #[error("unknown replenishment order: {0}")]
    UnknownOrder(OrderId),
    #[error("order {order}: cannot claim {requested}, only {outstanding} outstanding")]
    OrderOverclaimed {
        order: OrderId,
        requested: u32,
        outstanding: u32,
    },
    #[error("order {order}: cannot deliver {delivered}, only {picked_up} picked up")]
    OrderOverdelivered {
        order: OrderId,
        delivered: u32,
        picked_up: u32,
    },

    // -- jobs --------------------------------------------------------------
    #[error("{kind} job cannot target {target}")]
    InvalidJobTarget { kind: JobKind, target: ObjectRef },
    #[error("{kind} jobs are never queued")]
    UnqueueableJob { kind: JobKind },

    // -- engine ------------------------------------------------------------
    #[error("engine faulted at tick {tick}; no further steps are possible")]
    Faulted { tick: Ticks },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_message_uses_plural() {
        let err = SimError::CapacityExceeded {
            kind: EntityKind::Stockpile,
            limit: 50,
        };
        assert_eq!(err.to_string(), "cannot add more stockpiles: limit is 50");
    }

    #[test]
    fn unqueueable_job_message_names_kind() {
        let err = SimError::UnqueueableJob {
            kind: JobKind::Replenish,
        };
        assert!(err.to_string().contains("replenish"), "got: {err}");
    }
}
