//! Data-driven setup for the automation engine.
//!
//! Reads `automate` settings and `items` definitions from RON, TOML or JSON
//! files in a directory and turns them into an [`AutomateConfig`] and an
//! [`ItemRegistry`].
//!
//! [`AutomateConfig`]: automate_core::config::AutomateConfig
//! [`ItemRegistry`]: automate_core::registry::ItemRegistry

pub mod loader;
pub mod schema;

pub use loader::{AutomateData, DataLoadError, load_automate_data};
