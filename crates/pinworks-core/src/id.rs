use serde::{Deserialize, Serialize};
use slotmap::{Key, new_key_type};
use std::fmt;

new_key_type! {
    /// Identifies a worker in the engine's worker pool.
    pub struct WorkerId;

    /// Identifies a placed machine.
    pub struct MachineId;

    /// Identifies a placed stockpile.
    pub struct StockpileId;
}

/// Identifies a recipe in the catalog. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);

/// Identifies a machine type in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineTypeId(pub u32);

/// Slot index in the replenishment order table. Slots are reused once the
/// order occupying them is fully delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u32);

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recipe#{}", self.0)
    }
}

impl fmt::Display for MachineTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "machine-type#{}", self.0)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RO{}", self.0)
    }
}

/// The three entity pools an [`ObjectRef`] can point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Worker,
    Machine,
    Stockpile,
}

impl EntityKind {
    /// Plural name used in capacity messages.
    pub fn plural(self) -> &'static str {
        match self {
            EntityKind::Worker => "workers",
            EntityKind::Machine => "machines",
            EntityKind::Stockpile => "stockpiles",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Worker => "worker",
            EntityKind::Machine => "machine",
            EntityKind::Stockpile => "stockpile",
        })
    }
}

/// A tagged reference into one of the entity pools, or nothing.
///
/// Returned by hit-testing (`Engine::object_at`) and carried by queued jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectRef {
    #[default]
    Nothing,
    Worker(WorkerId),
    Machine(MachineId),
    Stockpile(StockpileId),
}

impl ObjectRef {
    /// The pool this reference points into, if any.
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            ObjectRef::Nothing => None,
            ObjectRef::Worker(_) => Some(EntityKind::Worker),
            ObjectRef::Machine(_) => Some(EntityKind::Machine),
            ObjectRef::Stockpile(_) => Some(EntityKind::Stockpile),
        }
    }

    pub fn is_nothing(&self) -> bool {
        matches!(self, ObjectRef::Nothing)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectRef::Nothing => f.write_str("nothing"),
            ObjectRef::Worker(id) => write!(f, "W{:?}", id.data()),
            ObjectRef::Machine(id) => write!(f, "M{:?}", id.data()),
            ObjectRef::Stockpile(id) => write!(f, "S{:?}", id.data()),
        }
    }
}

impl From<WorkerId> for ObjectRef {
    fn from(id: WorkerId) -> Self {
        ObjectRef::Worker(id)
    }
}

impl From<MachineId> for ObjectRef {
    fn from(id: MachineId) -> Self {
        ObjectRef::Machine(id)
    }
}

impl From<StockpileId> for ObjectRef {
    fn from(id: StockpileId) -> Self {
        ObjectRef::Stockpile(id)
    }
}
