use crate::fixed::Ticks;
use crate::id::*;
use crate::material::{Material, MaterialBuffer};
use crate::position::Footprint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A recipe input/output entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeEntry {
    pub material: Material,
    pub quantity: u32,
}

impl RecipeEntry {
    pub fn new(material: Material, quantity: u32) -> Self {
        Self { material, quantity }
    }
}

/// A recipe definition. Inputs and outputs keep their declared order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDef {
    pub name: String,
    pub inputs: Vec<RecipeEntry>,
    pub outputs: Vec<RecipeEntry>,
    pub duration: Ticks,
}

impl RecipeDef {
    /// First input (in declared order) the buffer holds less of than required,
    /// paired with the shortfall.
    pub fn next_unfulfilled(&self, buffer: &MaterialBuffer) -> Option<RecipeEntry> {
        self.inputs.iter().find_map(|entry| {
            let have = buffer.quantity(entry.material);
            (have < entry.quantity).then(|| RecipeEntry::new(entry.material, entry.quantity - have))
        })
    }

    /// Whether every input is present at or above its required quantity.
    pub fn inputs_satisfied(&self, buffer: &MaterialBuffer) -> bool {
        self.next_unfulfilled(buffer).is_none()
    }
}

/// A machine type: footprint and the recipes it may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineTypeDef {
    pub name: String,
    pub footprint: Footprint,
    pub recipes: Vec<RecipeId>,
}

impl MachineTypeDef {
    pub fn supports(&self, recipe: RecipeId) -> bool {
        self.recipes.contains(&recipe)
    }
}

/// Builder for constructing an immutable Catalog.
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
    machine_types: Vec<MachineTypeDef>,
    machine_type_name_to_id: HashMap<String, MachineTypeId>,
    duplicates: Vec<String>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder pre-loaded with the standard wire line, ready for further
    /// registrations and mutations.
    pub fn standard() -> CatalogBuilder {
        use Material::*;
        let mut b = CatalogBuilder::new();
        let wind = b.register_recipe(
            "wind_wire",
            vec![
                RecipeEntry::new(WashedIronWireCoil, 1),
                RecipeEntry::new(EmptySpindle, 1),
            ],
            vec![RecipeEntry::new(SpindledWireCoil, 1)],
            1,
        );
        let pull = b.register_recipe(
            "pull_wire",
            vec![RecipeEntry::new(SpindledWireCoil, 1)],
            vec![
                RecipeEntry::new(LongWires, 100),
                RecipeEntry::new(EmptySpindle, 1),
            ],
            1,
        );
        let cut = b.register_recipe(
            "cut_wire",
            vec![RecipeEntry::new(LongWires, 10), RecipeEntry::new(SmallBowl, 1)],
            vec![RecipeEntry::new(BowlOfShortWires, 1)],
            1,
        );
        let grind = b.register_recipe(
            "grind_point",
            vec![RecipeEntry::new(BowlOfShortWires, 1)],
            vec![RecipeEntry::new(BowlOfHeadlessPins, 1)],
            1,
        );
        b.register_machine_type("wire_winder", Footprint::new(2, 2), vec![wind]);
        b.register_machine_type("wire_puller", Footprint::new(2, 2), vec![pull]);
        b.register_machine_type("wire_cutter", Footprint::single(), vec![cut]);
        b.register_machine_type("wire_grinder", Footprint::single(), vec![grind]);
        b
    }

    /// Phase 1: Register a recipe. Returns its ID.
    pub fn register_recipe(
        &mut self,
        name: &str,
        inputs: Vec<RecipeEntry>,
        outputs: Vec<RecipeEntry>,
        duration: Ticks,
    ) -> RecipeId {
        let id = RecipeId(self.recipes.len() as u32);
        self.recipes.push(RecipeDef {
            name: name.to_string(),
            inputs,
            outputs,
            duration,
        });
        if self.recipe_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(name.to_string());
        }
        id
    }

    /// Phase 1: Register a machine type. Returns its ID.
    pub fn register_machine_type(
        &mut self,
        name: &str,
        footprint: Footprint,
        recipes: Vec<RecipeId>,
    ) -> MachineTypeId {
        let id = MachineTypeId(self.machine_types.len() as u32);
        self.machine_types.push(MachineTypeDef {
            name: name.to_string(),
            footprint,
            recipes,
        });
        if self
            .machine_type_name_to_id
            .insert(name.to_string(), id)
            .is_some()
        {
            self.duplicates.push(name.to_string());
        }
        id
    }

    /// Phase 2: Mutate an existing recipe by name.
    pub fn mutate_recipe<F>(&mut self, name: &str, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut RecipeDef),
    {
        let id = self
            .recipe_name_to_id
            .get(name)
            .ok_or(CatalogError::NotFound(name.to_string()))?;
        f(&mut self.recipes[id.0 as usize]);
        Ok(())
    }

    /// Phase 2: Mutate an existing machine type by name.
    pub fn mutate_machine_type<F>(&mut self, name: &str, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut MachineTypeDef),
    {
        let id = self
            .machine_type_name_to_id
            .get(name)
            .ok_or(CatalogError::NotFound(name.to_string()))?;
        f(&mut self.machine_types[id.0 as usize]);
        Ok(())
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    pub fn machine_type_id(&self, name: &str) -> Option<MachineTypeId> {
        self.machine_type_name_to_id.get(name).copied()
    }

    /// Phase 3: Validate and build the immutable catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        if let Some(name) = self.duplicates.first() {
            return Err(CatalogError::DuplicateName(name.clone()));
        }
        for recipe in &self.recipes {
            if let Some(entry) = recipe
                .inputs
                .iter()
                .chain(recipe.outputs.iter())
                .find(|e| e.quantity == 0)
            {
                return Err(CatalogError::ZeroQuantity {
                    recipe: recipe.name.clone(),
                    material: entry.material,
                });
            }
            for list in [&recipe.inputs, &recipe.outputs] {
                if let Some((_, entry)) = list
                    .iter()
                    .enumerate()
                    .find(|(i, e)| list[..*i].iter().any(|p| p.material == e.material))
                {
                    return Err(CatalogError::DuplicateMaterial {
                        recipe: recipe.name.clone(),
                        material: entry.material,
                    });
                }
            }
        }
        for machine_type in &self.machine_types {
            if machine_type.footprint.width == 0 || machine_type.footprint.height == 0 {
                return Err(CatalogError::EmptyFootprint(machine_type.name.clone()));
            }
            for recipe in &machine_type.recipes {
                if recipe.0 as usize >= self.recipes.len() {
                    return Err(CatalogError::InvalidRecipeRef {
                        machine_type: machine_type.name.clone(),
                        recipe: *recipe,
                    });
                }
            }
        }
        Ok(self.finish())
    }

    fn finish(self) -> Catalog {
        Catalog {
            recipes: self.recipes,
            recipe_name_to_id: self.recipe_name_to_id,
            machine_types: self.machine_types,
            machine_type_name_to_id: self.machine_type_name_to_id,
        }
    }
}

/// Immutable recipe and machine-type catalog. Frozen after build().
#[derive(Debug, Clone)]
pub struct Catalog {
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
    machine_types: Vec<MachineTypeDef>,
    machine_type_name_to_id: HashMap<String, MachineTypeId>,
}

impl Catalog {
    pub fn get_recipe(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.0 as usize)
    }

    pub fn get_machine_type(&self, id: MachineTypeId) -> Option<&MachineTypeDef> {
        self.machine_types.get(id.0 as usize)
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    pub fn machine_type_id(&self, name: &str) -> Option<MachineTypeId> {
        self.machine_type_name_to_id.get(name).copied()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    pub fn machine_type_count(&self) -> usize {
        self.machine_types.len()
    }

    pub fn recipes(&self) -> impl Iterator<Item = (RecipeId, &RecipeDef)> {
        self.recipes
            .iter()
            .enumerate()
            .map(|(i, r)| (RecipeId(i as u32), r))
    }

    pub fn machine_types(&self) -> impl Iterator<Item = (MachineTypeId, &MachineTypeDef)> {
        self.machine_types
            .iter()
            .enumerate()
            .map(|(i, m)| (MachineTypeId(i as u32), m))
    }

    /// The pin-making wire line: winding, pulling, cutting and grinding.
    pub fn standard() -> Catalog {
        CatalogBuilder::standard().finish()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Well-known ids in [`Catalog::standard`].
pub mod standard {
    use crate::id::{MachineTypeId, RecipeId};

    pub const WIND_WIRE: RecipeId = RecipeId(0);
    pub const PULL_WIRE: RecipeId = RecipeId(1);
    pub const CUT_WIRE: RecipeId = RecipeId(2);
    pub const GRIND_POINT: RecipeId = RecipeId(3);

    pub const WIRE_WINDER: MachineTypeId = MachineTypeId(0);
    pub const WIRE_PULLER: MachineTypeId = MachineTypeId(1);
    pub const WIRE_CUTTER: MachineTypeId = MachineTypeId(2);
    pub const WIRE_GRINDER: MachineTypeId = MachineTypeId(3);
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("machine type {machine_type} references unknown {recipe}")]
    InvalidRecipeRef {
        machine_type: String,
        recipe: RecipeId,
    },
    #[error("recipe {recipe} has a zero quantity of {material}")]
    ZeroQuantity { recipe: String, material: Material },
    #[error("recipe {recipe} lists {material} more than once")]
    DuplicateMaterial { recipe: String, material: Material },
    #[error("machine type {0} has an empty footprint")]
    EmptyFootprint(String),
}
