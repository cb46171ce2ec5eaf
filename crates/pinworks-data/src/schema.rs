//! Serde data file structs for scenario definitions.
//!
//! A scenario describes a starting world: stockpiles with their stock and
//! manifests, machines with their links and first recipe, a worker count and
//! engine limits. Catalog additions and tweaks ride along. Everything refers
//! to everything else by name; the loader resolves names into ids.

use pinworks_core::config::EngineConfig;
use serde::Deserialize;

// ===========================================================================
// Scenario
// ===========================================================================

/// A complete scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioData {
    pub name: String,
    /// Engine limits. Missing fields take their defaults.
    #[serde(default)]
    pub config: EngineConfig,
    /// Recipes registered on top of the standard wire line.
    #[serde(default)]
    pub recipes: Vec<RecipeData>,
    /// Machine types registered on top of the standard wire line.
    #[serde(default)]
    pub machine_types: Vec<MachineTypeData>,
    /// Adjustments to already-registered recipes.
    #[serde(default)]
    pub recipe_overrides: Vec<RecipeOverrideData>,
    #[serde(default)]
    pub stockpiles: Vec<StockpileData>,
    #[serde(default)]
    pub machines: Vec<MachineData>,
    #[serde(default)]
    pub workers: usize,
}

// ===========================================================================
// Catalog additions
// ===========================================================================

/// A material amount, supporting both short tuple form and full form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountData {
    /// Short form: `("material_name", quantity)`.
    Short(String, u32),
    /// Full form with explicit fields.
    Full { material: String, quantity: u32 },
}

impl AmountData {
    pub fn material(&self) -> &str {
        match self {
            AmountData::Short(material, _) | AmountData::Full { material, .. } => material,
        }
    }

    pub fn quantity(&self) -> u32 {
        match *self {
            AmountData::Short(_, quantity) | AmountData::Full { quantity, .. } => quantity,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub name: String,
    pub inputs: Vec<AmountData>,
    pub outputs: Vec<AmountData>,
    #[serde(default = "default_duration")]
    pub duration: u64,
}

fn default_duration() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct MachineTypeData {
    pub name: String,
    /// `(width, height)` in cells.
    pub footprint: (u32, u32),
    /// Names of the recipes this type can run.
    pub recipes: Vec<String>,
}

/// Replace the duration of a registered recipe.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeOverrideData {
    pub recipe: String,
    pub duration: u64,
}

// ===========================================================================
// World
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StockpileData {
    pub name: String,
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_extent")]
    pub width: u32,
    #[serde(default = "default_extent")]
    pub height: u32,
    /// Whether other stockpiles' orders may draw from this one.
    #[serde(default)]
    pub drawable: bool,
    /// Starting stock.
    #[serde(default)]
    pub contents: Vec<AmountData>,
    /// Manifest entries, in priority order.
    #[serde(default)]
    pub requires: Vec<AmountData>,
}

fn default_extent() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct MachineData {
    pub name: String,
    /// Machine type name, e.g. `"wire_winder"`.
    pub kind: String,
    pub x: i32,
    pub y: i32,
    /// Name of the input stockpile.
    #[serde(default)]
    pub input: Option<String>,
    /// Name of the output stockpile.
    #[serde(default)]
    pub output: Option<String>,
    /// Recipe assigned once the world is built.
    #[serde(default)]
    pub recipe: Option<String>,
}
