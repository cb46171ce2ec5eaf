//! Pinworks Data -- scenario files for the Pinworks engine.
//!
//! Scenarios are written in RON, JSON or TOML (picked by file extension) and
//! describe a starting world by name. [`loader::load_scenario`] parses one
//! and returns a ready-to-step engine with name-to-id maps.

pub mod loader;
pub mod schema;

pub use loader::{BuiltScenario, DataLoadError, build_scenario, load_scenario};
