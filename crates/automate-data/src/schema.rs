//! On-disk shapes for item definitions.
//!
//! Engine settings need no wrapper: [`AutomateConfig`] deserializes directly.
//!
//! [`AutomateConfig`]: automate_core::config::AutomateConfig

use serde::Deserialize;

/// An item type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
    /// Falls back to the config's `default_max_stack` when absent.
    #[serde(default)]
    pub max_stack: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}
