//! The stockpile ledger: on-hand inventory with earmarks, plus a manifest of
//! standing replenishment targets.
//!
//! Invariants held by every method here:
//! - at most one ledger entry per material, and never a zero-quantity entry;
//! - `earmarked <= quantity` for every entry.
//!
//! Operations that would break either invariant return an error and leave the
//! stockpile untouched.

use crate::catalog::RecipeEntry;
use crate::error::SimError;
use crate::id::{MachineId, StockpileId};
use crate::material::{Material, StackOverflow};
use crate::position::{Footprint, GridPosition};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a machine a stockpile serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockpileRole {
    Input,
    Output,
}

impl fmt::Display for StockpileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StockpileRole::Input => "input",
            StockpileRole::Output => "output",
        })
    }
}

/// Link from a stockpile back to the machine it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub machine: MachineId,
    pub role: StockpileRole,
}

/// One material held by a stockpile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub material: Material,
    pub quantity: u32,
    /// Reserved for an in-flight replenishment pickup.
    pub earmarked: u32,
}

impl LedgerEntry {
    /// On-hand quantity not reserved by an earmark.
    pub fn free(&self) -> u32 {
        self.quantity - self.earmarked
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stockpile {
    pub id: StockpileId,
    pub position: GridPosition,
    pub footprint: Footprint,
    /// Whether workers may draw from this stockpile to fill orders elsewhere.
    pub drawable: bool,
    inventory: Vec<LedgerEntry>,
    manifest: Vec<RecipeEntry>,
    pub attachment: Option<Attachment>,
}

impl Stockpile {
    pub fn new(id: StockpileId, position: GridPosition, footprint: Footprint) -> Self {
        Self {
            id,
            position,
            footprint,
            drawable: false,
            inventory: Vec::new(),
            manifest: Vec::new(),
            attachment: None,
        }
    }

    pub fn inventory(&self) -> &[LedgerEntry] {
        &self.inventory
    }

    pub fn manifest(&self) -> &[RecipeEntry] {
        &self.manifest
    }

    fn entry(&self, material: Material) -> Option<&LedgerEntry> {
        self.inventory.iter().find(|e| e.material == material)
    }

    fn entry_index(&self, material: Material) -> Option<usize> {
        self.inventory.iter().position(|e| e.material == material)
    }

    /// On-hand quantity of `material`.
    pub fn quantity(&self, material: Material) -> u32 {
        self.entry(material).map(|e| e.quantity).unwrap_or(0)
    }

    /// On-hand minus earmarked quantity of `material`.
    pub fn free_quantity(&self, material: Material) -> u32 {
        self.entry(material).map(LedgerEntry::free).unwrap_or(0)
    }

    pub fn earmarked(&self, material: Material) -> u32 {
        self.entry(material).map(|e| e.earmarked).unwrap_or(0)
    }

    /// Total units on hand across all materials.
    pub fn total(&self) -> u64 {
        self.inventory.iter().map(|e| u64::from(e.quantity)).sum()
    }

    /// Merge material into the ledger, appending a new entry if needed.
    /// Fails without mutating if the entry would overflow.
    pub fn add(&mut self, material: Material, quantity: u32) -> Result<(), SimError> {
        if quantity == 0 {
            return Ok(());
        }
        let stockpile = self.id;
        match self.inventory.iter_mut().find(|e| e.material == material) {
            Some(entry) => {
                entry.quantity = checked_sum(stockpile, material, entry.quantity, quantity)?;
            }
            None => self.inventory.push(LedgerEntry {
                material,
                quantity,
                earmarked: 0,
            }),
        }
        Ok(())
    }

    /// Remove material. Fails without mutating if more is requested than is on
    /// hand, or if the removal would eat into earmarked units.
    pub fn remove(&mut self, material: Material, quantity: u32) -> Result<(), SimError> {
        if quantity == 0 {
            return Ok(());
        }
        let Some(index) = self.entry_index(material) else {
            return Err(SimError::InsufficientMaterial {
                stockpile: self.id,
                material,
                requested: quantity,
                available: 0,
            });
        };
        let entry = self.inventory[index];
        if quantity > entry.quantity {
            return Err(SimError::InsufficientMaterial {
                stockpile: self.id,
                material,
                requested: quantity,
                available: entry.quantity,
            });
        }
        if quantity > entry.free() {
            return Err(SimError::EarmarkedMaterial {
                stockpile: self.id,
                material,
                requested: quantity,
                free: entry.free(),
            });
        }
        let remaining = entry.quantity - quantity;
        if remaining == 0 {
            self.inventory.remove(index);
        } else {
            self.inventory[index].quantity = remaining;
        }
        Ok(())
    }

    /// Adjust the earmark on `material` by `delta`. Positive deltas reserve
    /// free units; negative deltas release a reservation.
    pub fn earmark(&mut self, material: Material, delta: i64) -> Result<(), SimError> {
        let id = self.id;
        let Some(entry) = self.inventory.iter_mut().find(|e| e.material == material) else {
            return Err(SimError::MaterialNotPresent {
                stockpile: id,
                material,
            });
        };
        let amount = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
        if delta >= 0 {
            if amount > entry.free() {
                return Err(SimError::EarmarkOverflow {
                    stockpile: id,
                    material,
                    requested: amount,
                    free: entry.free(),
                });
            }
            entry.earmarked += amount;
            tracing::debug!(stockpile = ?id, %material, amount, "earmarked");
        } else {
            if amount > entry.earmarked {
                return Err(SimError::EarmarkUnderflow {
                    stockpile: id,
                    material,
                    released: amount,
                    earmarked: entry.earmarked,
                });
            }
            entry.earmarked -= amount;
            tracing::debug!(stockpile = ?id, %material, amount, "released earmark");
        }
        Ok(())
    }

    /// Add (or raise) a standing requirement for `material`.
    pub fn add_required(&mut self, material: Material, quantity: u32) -> Result<(), SimError> {
        let stockpile = self.id;
        match self.manifest.iter_mut().find(|e| e.material == material) {
            Some(entry) => {
                entry.quantity = checked_sum(stockpile, material, entry.quantity, quantity)?;
            }
            None => self.manifest.push(RecipeEntry::new(material, quantity)),
        }
        Ok(())
    }

    /// The first manifest entry (in declared order) that is short on hand and
    /// has no outstanding order, paired with its shortfall.
    pub fn next_replenishment_need<F>(&self, has_order: F) -> Option<RecipeEntry>
    where
        F: Fn(Material) -> bool,
    {
        self.manifest.iter().find_map(|entry| {
            if has_order(entry.material) {
                return None;
            }
            let on_hand = self.quantity(entry.material);
            (entry.quantity > on_hand)
                .then(|| RecipeEntry::new(entry.material, entry.quantity - on_hand))
        })
    }

    /// Whether `point` falls within this stockpile's footprint.
    pub fn contains(&self, point: GridPosition) -> bool {
        self.footprint.contains(self.position, point)
    }
}

fn checked_sum(
    stockpile: StockpileId,
    material: Material,
    held: u32,
    added: u32,
) -> Result<u32, SimError> {
    held.checked_add(added).ok_or(SimError::StockpileOverflow {
        stockpile,
        source: StackOverflow {
            material,
            held,
            added,
        },
    })
}
