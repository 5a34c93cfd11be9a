//! Loading pipeline: finds data files, deserializes them, builds engine types.
//!
//! A data directory may contain:
//! - `automate.{ron,toml,json}`: engine settings. Missing means defaults.
//! - `items.{ron,toml,json}`: item definitions. Missing means an empty
//!   registry, so every item uses `default_max_stack`.
//!
//! At most one format per base name is allowed.

use crate::schema::ItemData;
use automate_core::config::{AutomateConfig, ConfigError};
use automate_core::registry::{ItemRegistry, ItemRegistryBuilder, RegistryError};
use ron::extensions::Extensions;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_FILE: &str = "automate";
pub const ITEMS_FILE: &str = "items";

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error("item '{name}' in {file} has a max stack size of zero")]
    ZeroMaxStack { file: PathBuf, name: String },

    #[error("invalid settings: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file from its extension.
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
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml` or `.json` in `dir`.
///
/// Returns `Ok(None)` if none exists and `Err(ConflictingFormats)` if more
/// than one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }

    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, err: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: err.to_string(),
    }
}

/// RON options for data files: optional fields take bare values, so
/// `max_stack: 999` needs no `Some(..)`.
fn ron_options() -> ron::Options {
    ron::Options::default().with_default_extension(Extensions::IMPLICIT_SOME)
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron_options()
            .from_str(&content)
            .map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML has no top-level arrays, so there the list is
/// read from the array under `toml_key`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }

    let content = std::fs::read_to_string(path)?;
    let table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    let array = table
        .get(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
        .clone();
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Loading
// ===========================================================================

/// Everything a data directory describes.
#[derive(Debug)]
pub struct AutomateData {
    pub config: AutomateConfig,
    pub registry: ItemRegistry,
}

/// Load engine settings from `dir`, falling back to defaults when no
/// settings file exists. The result is validated.
pub fn load_config(dir: &Path) -> Result<AutomateConfig, DataLoadError> {
    let config = match find_data_file(dir, CONFIG_FILE)? {
        Some(path) => {
            let config: AutomateConfig = deserialize_file(&path)?;
            info!(file = %path.display(), "loaded automation settings");
            config
        }
        None => {
            debug!(dir = %dir.display(), "no settings file, using defaults");
            AutomateConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

/// Build a registry from item definitions. Items without a max stack size
/// get `default_max_stack`.
pub fn build_registry(
    items: &[ItemData],
    default_max_stack: u32,
    file: &Path,
) -> Result<ItemRegistry, DataLoadError> {
    let mut seen = BTreeSet::new();
    let mut builder = ItemRegistryBuilder::new();

    for item in items {
        if !seen.insert(item.name.as_str()) {
            return Err(DataLoadError::DuplicateName {
                file: file.to_path_buf(),
                name: item.name.clone(),
            });
        }
        let max_stack = item.max_stack.unwrap_or(default_max_stack);
        if max_stack == 0 {
            return Err(DataLoadError::ZeroMaxStack {
                file: file.to_path_buf(),
                name: item.name.clone(),
            });
        }
        let tags: Vec<&str> = item.tags.iter().map(String::as_str).collect();
        builder.register_item_with_tags(&item.name, max_stack, &tags);
    }

    Ok(builder.build()?)
}

/// Load item definitions from `dir`. A missing items file yields an empty
/// registry.
pub fn load_items(dir: &Path, default_max_stack: u32) -> Result<ItemRegistry, DataLoadError> {
    let Some(path) = find_data_file(dir, ITEMS_FILE)? else {
        debug!(dir = %dir.display(), "no items file, registry is empty");
        return Ok(ItemRegistry::default());
    };

    let items: Vec<ItemData> = deserialize_list(&path, "items")?;
    let registry = build_registry(&items, default_max_stack, &path)?;
    info!(file = %path.display(), items = registry.item_count(), "loaded items");
    Ok(registry)
}

/// Load settings and items from one directory.
pub fn load_automate_data(dir: &Path) -> Result<AutomateData, DataLoadError> {
    let config = load_config(dir)?;
    let registry = load_items(dir, config.default_max_stack)?;
    Ok(AutomateData { config, registry })
}

// ===========================================================================
// Tests
// ===========================================================================
