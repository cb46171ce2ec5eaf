use crate::error::SimError;
use crate::id::{OrderId, StockpileId};
use crate::material::Material;
use serde::{Deserialize, Serialize};
use std::fmt;

/// "Move `ordered` units of `material` into `destination`."
///
/// `picked_up` counts units already claimed by a worker. The order stays in
/// its slot until every ordered unit has been delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentOrder {
    pub destination: StockpileId,
    pub material: Material,
    pub ordered: u32,
    pub picked_up: u32,
}

impl ReplenishmentOrder {
    /// Units not yet claimed by any worker.
    pub fn outstanding(&self) -> u32 {
        self.ordered - self.picked_up
    }
}

impl fmt::Display for ReplenishmentOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "order for {:?}: {} {} ({} picked up)",
            self.destination, self.ordered, self.material, self.picked_up
        )
    }
}

/// Fixed number of order slots, scanned in slot order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplenishmentTable {
    slots: Vec<Option<ReplenishmentOrder>>,
}

impl ReplenishmentTable {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: vec![None; slots],
        }
    }

    /// Place a new order in the first free slot.
    pub fn allocate(
        &mut self,
        destination: StockpileId,
        material: Material,
        amount: u32,
    ) -> Result<OrderId, SimError> {
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(SimError::ReplenishmentTableFull {
                slots: self.slots.len(),
            })?;
        self.slots[index] = Some(ReplenishmentOrder {
            destination,
            material,
            ordered: amount,
            picked_up: 0,
        });
        Ok(OrderId(index as u32))
    }

    pub fn get(&self, id: OrderId) -> Option<&ReplenishmentOrder> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: OrderId) -> Result<&mut ReplenishmentOrder, SimError> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(SimError::UnknownOrder(id))
    }

    /// Record that a worker has claimed `amount` units of the order.
    pub fn claim(&mut self, id: OrderId, amount: u32) -> Result<(), SimError> {
        let order = self.get_mut(id)?;
        if amount > order.outstanding() {
            return Err(SimError::OrderOverclaimed {
                order: id,
                requested: amount,
                outstanding: order.outstanding(),
            });
        }
        order.picked_up += amount;
        Ok(())
    }

    /// Record delivery of `amount` claimed units. Returns `true` when the
    /// order is fully delivered and its slot has been released.
    pub fn complete(&mut self, id: OrderId, amount: u32) -> Result<bool, SimError> {
        let order = self.get_mut(id)?;
        if amount > order.picked_up {
            return Err(SimError::OrderOverdelivered {
                order: id,
                delivered: amount,
                picked_up: order.picked_up,
            });
        }
        order.ordered -= amount;
        order.picked_up -= amount;
        if order.ordered == 0 {
            self.slots[id.0 as usize] = None;
            return Ok(true);
        }
        Ok(false)
    }

    /// Total still ordered (claimed or not) for a destination and material.
    pub fn outstanding_for(&self, destination: StockpileId, material: Material) -> u32 {
        self.iter()
            .filter(|(_, o)| o.destination == destination && o.material == material)
            .map(|(_, o)| o.ordered)
            .sum()
    }

    pub fn has_order_for(&self, destination: StockpileId, material: Material) -> bool {
        self.iter()
            .any(|(_, o)| o.destination == destination && o.material == material)
    }

    /// First order, in slot order, with unclaimed units for which `can_source`
    /// holds.
    pub fn next_fillable<F>(&self, mut can_source: F) -> Option<OrderId>
    where
        F: FnMut(&ReplenishmentOrder) -> bool,
    {
        self.iter()
            .find(|(_, o)| o.outstanding() > 0 && can_source(o))
            .map(|(id, _)| id)
    }

    /// Active orders with their ids, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (OrderId, &ReplenishmentOrder)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|o| (OrderId(i as u32), o)))
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
