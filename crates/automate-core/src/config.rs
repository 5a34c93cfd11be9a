use crate::registry::DEFAULT_MAX_STACK;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per machine type settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineOverride {
    /// Whether machines of this type are automated at all.
    pub enabled: bool,
    /// Higher runs earlier within a network. Ties keep tile order.
    pub priority: i32,
}

impl Default for MachineOverride {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 0,
        }
    }
}

/// Engine settings. Every field has a default, so partial config files are
/// valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomateConfig {
    pub enabled: bool,
    /// Networks are processed on ticks divisible by this.
    pub automation_interval: u64,
    /// Host object names that act as connectors.
    pub connectors: Vec<String>,
    /// Keyed by machine type name.
    pub machine_overrides: BTreeMap<String, MachineOverride>,
    /// Slot cap for items the registry does not know.
    pub default_max_stack: u32,
    /// Automation events kept before the oldest are dropped.
    pub event_capacity: usize,
}

impl Default for AutomateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            automation_interval: 60,
            connectors: Vec::new(),
            machine_overrides: BTreeMap::new(),
            default_max_stack: DEFAULT_MAX_STACK,
            event_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("automation_interval must be at least 1")]
    ZeroInterval,
    #[error("default_max_stack must be at least 1")]
    ZeroMaxStack,
}

impl AutomateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.automation_interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.default_max_stack == 0 {
            return Err(ConfigError::ZeroMaxStack);
        }
        Ok(())
    }

    pub fn is_connector(&self, object_name: &str) -> bool {
        self.connectors
            .iter()
            .any(|c| c.eq_ignore_ascii_case(object_name))
    }

    pub fn machine_override(&self, machine_type: &str) -> MachineOverride {
        self.machine_overrides
            .get(machine_type)
            .copied()
            .unwrap_or_default()
    }

    /// Whether `tick` is a processing tick.
    pub fn is_due(&self, tick: u64) -> bool {
        tick % self.automation_interval.max(1) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AutomateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.automation_interval, 60);
        assert_eq!(config.default_max_stack, 999);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = AutomateConfig {
            automation_interval: 0,
            ..AutomateConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval));
        // Still safe to query.
        assert!(config.is_due(7));
    }

    #[test]
    fn connector_names_ignore_case() {
        let config = AutomateConfig {
            connectors: vec!["Wood Path".into()],
            ..AutomateConfig::default()
        };
        assert!(config.is_connector("wood path"));
        assert!(!config.is_connector("Stone Floor"));
    }

    #[test]
    fn missing_override_uses_default() {
        let mut config = AutomateConfig::default();
        config.machine_overrides.insert(
            "Keg".into(),
            MachineOverride {
                enabled: false,
                priority: 3,
            },
        );
        assert!(!config.machine_override("Keg").enabled);
        assert_eq!(config.machine_override("Furnace"), MachineOverride::default());
    }

    #[test]
    fn due_ticks() {
        let config = AutomateConfig::default();
        assert!(config.is_due(0));
        assert!(!config.is_due(59));
        assert!(config.is_due(120));
    }
}
