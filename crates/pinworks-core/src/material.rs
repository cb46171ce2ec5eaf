//! Material tokens and fungible stacks.
//!
//! A [`Material`] has no intrinsic quantity; it is always paired with a count
//! in a [`MaterialStack`]. "No material" is spelled `Option<Material>::None`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A transportable good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    WashedIronWireCoil,
    EmptySpindle,
    SpindledWireCoil,
    LongWires,
    SmallBowl,
    BowlOfShortWires,
    BowlOfHeadlessPins,
}

impl Material {
    /// Every material, in declaration order.
    pub const ALL: [Material; 7] = [
        Material::WashedIronWireCoil,
        Material::EmptySpindle,
        Material::SpindledWireCoil,
        Material::LongWires,
        Material::SmallBowl,
        Material::BowlOfShortWires,
        Material::BowlOfHeadlessPins,
    ];

    /// Stable snake_case name. Matches the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            Material::WashedIronWireCoil => "washed_iron_wire_coil",
            Material::EmptySpindle => "empty_spindle",
            Material::SpindledWireCoil => "spindled_wire_coil",
            Material::LongWires => "long_wires",
            Material::SmallBowl => "small_bowl",
            Material::BowlOfShortWires => "bowl_of_short_wires",
            Material::BowlOfHeadlessPins => "bowl_of_headless_pins",
        }
    }

    /// Small stable integer used by the state hash.
    pub fn ordinal(self) -> u64 {
        self as u64
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown material: {0}")]
pub struct UnknownMaterial(pub String);

impl FromStr for Material {
    type Err = UnknownMaterial;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Material::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| UnknownMaterial(s.to_string()))
    }
}

/// Adding to a stack would take it past `u32::MAX` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{added} more {material} would overflow a stack of {held}")]
pub struct StackOverflow {
    pub material: Material,
    pub held: u32,
    pub added: u32,
}

/// A count of one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialStack {
    pub material: Material,
    pub quantity: u32,
}

impl MaterialStack {
    pub fn new(material: Material, quantity: u32) -> Self {
        Self { material, quantity }
    }
}

impl fmt::Display for MaterialStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.material, self.quantity)
    }
}

/// Unbounded list of material stacks, one entry per material, in insertion
/// order. Used for machine input/output buffers.
///
/// Zero-quantity entries are never kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialBuffer {
    stacks: Vec<MaterialStack>,
}

impl MaterialBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `quantity` of `material` into the buffer. Fails without
    /// mutating if the stack would overflow.
    pub fn add(&mut self, material: Material, quantity: u32) -> Result<(), StackOverflow> {
        if quantity == 0 {
            return Ok(());
        }
        match self.stacks.iter_mut().find(|s| s.material == material) {
            Some(stack) => {
                stack.quantity =
                    stack
                        .quantity
                        .checked_add(quantity)
                        .ok_or(StackOverflow {
                            material,
                            held: stack.quantity,
                            added: quantity,
                        })?;
            }
            None => self.stacks.push(MaterialStack::new(material, quantity)),
        }
        Ok(())
    }

    /// Remove up to `quantity`. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, material: Material, quantity: u32) -> u32 {
        let Some(index) = self.stacks.iter().position(|s| s.material == material) else {
            return 0;
        };
        let stack = &mut self.stacks[index];
        let removed = quantity.min(stack.quantity);
        stack.quantity -= removed;
        if stack.quantity == 0 {
            self.stacks.remove(index);
        }
        removed
    }

    /// Take the first stack out of the buffer entirely.
    pub fn take_first(&mut self) -> Option<MaterialStack> {
        if self.stacks.is_empty() {
            None
        } else {
            Some(self.stacks.remove(0))
        }
    }

    pub fn quantity(&self, material: Material) -> u32 {
        self.stacks
            .iter()
            .find(|s| s.material == material)
            .map(|s| s.quantity)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.stacks.iter().map(|s| u64::from(s.quantity)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaterialStack> {
        self.stacks.iter()
    }

    pub fn as_slice(&self) -> &[MaterialStack] {
        &self.stacks
    }

    pub fn clear(&mut self) {
        self.stacks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for m in Material::ALL {
            assert_eq!(m.name().parse::<Material>(), Ok(m));
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "copper_plate".parse::<Material>().unwrap_err();
        assert_eq!(err.to_string(), "unknown material: copper_plate");
    }

    #[test]
    fn display_uses_snake_case_name() {
        assert_eq!(Material::BowlOfShortWires.to_string(), "bowl_of_short_wires");
    }

    #[test]
    fn buffer_merges_same_material() {
        let mut buf = MaterialBuffer::new();
        buf.add(Material::LongWires, 40).unwrap();
        buf.add(Material::SmallBowl, 1).unwrap();
        buf.add(Material::LongWires, 60).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.quantity(Material::LongWires), 100);
    }

    #[test]
    fn buffer_drops_exhausted_entries() {
        let mut buf = MaterialBuffer::new();
        buf.add(Material::EmptySpindle, 2).unwrap();
        assert_eq!(buf.remove(Material::EmptySpindle, 5), 2);
        assert!(buf.is_empty());
        assert_eq!(buf.remove(Material::EmptySpindle, 1), 0);
    }

    #[test]
    fn buffer_rejects_overflow_without_mutation() {
        let mut buf = MaterialBuffer::new();
        buf.add(Material::LongWires, u32::MAX - 1).unwrap();
        assert_eq!(
            buf.add(Material::LongWires, 2),
            Err(StackOverflow {
                material: Material::LongWires,
                held: u32::MAX - 1,
                added: 2
            })
        );
        assert_eq!(buf.quantity(Material::LongWires), u32::MAX - 1);
        buf.add(Material::LongWires, 1).unwrap();
        buf.add(Material::SmallBowl, u32::MAX).unwrap();
        assert_eq!(buf.total(), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn buffer_ignores_zero_add() {
        let mut buf = MaterialBuffer::new();
        buf.add(Material::SmallBowl, 0).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn take_first_preserves_order() {
        let mut buf = MaterialBuffer::new();
        buf.add(Material::LongWires, 100).unwrap();
        buf.add(Material::EmptySpindle, 1).unwrap();
        assert_eq!(buf.take_first(), Some(MaterialStack::new(Material::LongWires, 100)));
        assert_eq!(buf.take_first(), Some(MaterialStack::new(Material::EmptySpindle, 1)));
        assert_eq!(buf.take_first(), None);
    }
}
