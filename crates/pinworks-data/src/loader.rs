//! Resolution pipeline: reads a scenario file, resolves names, builds the
//! catalog and the engine.
//!
//! Provides format detection (RON/JSON/TOML) and deserialization helpers used
//! by the higher-level loading pipeline.

use crate::schema::*;
use pinworks_core::catalog::{CatalogBuilder, CatalogError, RecipeEntry};
use pinworks_core::engine::Engine;
use pinworks_core::error::SimError;
use pinworks_core::id::{MachineId, RecipeId, StockpileId, WorkerId};
use pinworks_core::material::Material;
use pinworks_core::position::Footprint;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during scenario loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// The catalog additions did not validate.
    #[error("invalid catalog in {file}: {source}")]
    Catalog {
        file: PathBuf,
        #[source]
        source: CatalogError,
    },

    /// The engine rejected a command while building the world.
    #[error("cannot build '{name}' from {file}: {source}")]
    Build {
        file: PathBuf,
        name: String,
        #[source]
        source: SimError,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize file contents according to `format`. `path` is only used for
/// error reporting.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    path: &Path,
) -> Result<T, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

fn resolve_material(name: &str, file: &Path) -> Result<Material, DataLoadError> {
    name.parse().map_err(|_| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind: "material",
    })
}

fn resolve_amounts(amounts: &[AmountData], file: &Path) -> Result<Vec<RecipeEntry>, DataLoadError> {
    amounts
        .iter()
        .map(|a| Ok(RecipeEntry::new(resolve_material(a.material(), file)?, a.quantity())))
        .collect()
}

// ===========================================================================
// Building
// ===========================================================================

/// A built world plus the name-to-id maps of everything in it.
#[derive(Debug)]
pub struct BuiltScenario {
    pub name: String,
    pub engine: Engine,
    pub stockpiles: HashMap<String, StockpileId>,
    pub machines: HashMap<String, MachineId>,
    pub workers: Vec<WorkerId>,
}

impl BuiltScenario {
    pub fn stockpile(&self, name: &str) -> Option<StockpileId> {
        self.stockpiles.get(name).copied()
    }

    pub fn machine(&self, name: &str) -> Option<MachineId> {
        self.machines.get(name).copied()
    }
}

/// Load and build a scenario file in one go.
pub fn load_scenario(path: &Path) -> Result<BuiltScenario, DataLoadError> {
    let data: ScenarioData = deserialize_file(path)?;
    build_scenario(&data, path)
}

/// Resolve a parsed scenario into a ready-to-step engine. `file` is only used
/// for error reporting.
pub fn build_scenario(data: &ScenarioData, file: &Path) -> Result<BuiltScenario, DataLoadError> {
    let build_error = |name: &str| {
        let file = file.to_path_buf();
        let name = name.to_string();
        move |source: SimError| DataLoadError::Build { file, name, source }
    };

    // -- Catalog: standard line, then additions, then overrides. --
    let mut builder = CatalogBuilder::standard();
    for recipe in &data.recipes {
        builder.register_recipe(
            &recipe.name,
            resolve_amounts(&recipe.inputs, file)?,
            resolve_amounts(&recipe.outputs, file)?,
            recipe.duration,
        );
    }
    for machine_type in &data.machine_types {
        let recipes = machine_type
            .recipes
            .iter()
            .map(|name| {
                builder.recipe_id(name).ok_or_else(|| DataLoadError::UnresolvedRef {
                    file: file.to_path_buf(),
                    name: name.clone(),
                    expected_kind: "recipe",
                })
            })
            .collect::<Result<Vec<RecipeId>, _>>()?;
        let (width, height) = machine_type.footprint;
        builder.register_machine_type(&machine_type.name, Footprint::new(width, height), recipes);
    }
    for tweak in &data.recipe_overrides {
        let duration = tweak.duration;
        builder
            .mutate_recipe(&tweak.recipe, |recipe| recipe.duration = duration)
            .map_err(|source| DataLoadError::Catalog {
                file: file.to_path_buf(),
                source,
            })?;
    }
    let catalog = builder.build().map_err(|source| DataLoadError::Catalog {
        file: file.to_path_buf(),
        source,
    })?;

    let mut engine = Engine::new(data.config.clone(), catalog);

    // -- Stockpiles --
    let mut stockpiles = HashMap::new();
    for s in &data.stockpiles {
        check_duplicate(&stockpiles, &s.name, file)?;
        let id = engine
            .place_stockpile(s.x, s.y, s.width, s.height)
            .map_err(build_error(&s.name))?;
        engine
            .set_stockpile_drawable(id, s.drawable)
            .map_err(build_error(&s.name))?;
        for entry in resolve_amounts(&s.contents, file)? {
            engine
                .add_material(id, entry.material, entry.quantity)
                .map_err(build_error(&s.name))?;
        }
        for entry in resolve_amounts(&s.requires, file)? {
            engine
                .add_required_material(id, entry.material, entry.quantity)
                .map_err(build_error(&s.name))?;
        }
        stockpiles.insert(s.name.clone(), id);
    }

    // -- Machines and links --
    let mut machines = HashMap::new();
    for m in &data.machines {
        check_duplicate(&machines, &m.name, file)?;
        let machine_type = engine
            .catalog()
            .machine_type_id(&m.kind)
            .ok_or_else(|| DataLoadError::UnresolvedRef {
                file: file.to_path_buf(),
                name: m.kind.clone(),
                expected_kind: "machine type",
            })?;
        let id = engine
            .place_machine(machine_type, m.x, m.y)
            .map_err(build_error(&m.name))?;
        if let Some(output) = &m.output {
            let stockpile = *resolve_name(&stockpiles, output, file, "stockpile")?;
            engine
                .attach_output_stockpile(id, stockpile)
                .map_err(build_error(&m.name))?;
        }
        if let Some(input) = &m.input {
            let stockpile = *resolve_name(&stockpiles, input, file, "stockpile")?;
            engine
                .attach_input_stockpile(id, stockpile)
                .map_err(build_error(&m.name))?;
        }
        machines.insert(m.name.clone(), id);
    }

    // -- Workers --
    let workers = (0..data.workers)
        .map(|_| engine.spawn_worker().map_err(build_error("worker")))
        .collect::<Result<Vec<_>, _>>()?;

    // -- First recipes --
    for m in &data.machines {
        let Some(recipe_name) = &m.recipe else {
            continue;
        };
        let recipe = engine
            .catalog()
            .recipe_id(recipe_name)
            .ok_or_else(|| DataLoadError::UnresolvedRef {
                file: file.to_path_buf(),
                name: recipe_name.clone(),
                expected_kind: "recipe",
            })?;
        let id = *resolve_name(&machines, &m.name, file, "machine")?;
        engine
            .assign_recipe(id, recipe)
            .map_err(build_error(&m.name))?;
    }

    tracing::info!(
        scenario = %data.name,
        stockpiles = stockpiles.len(),
        machines = machines.len(),
        workers = workers.len(),
        "scenario built"
    );

    Ok(BuiltScenario {
        name: data.name.clone(),
        engine,
        stockpiles,
        machines,
        workers,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
