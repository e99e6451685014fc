//! Builder configuration.

use serde::{Deserialize, Serialize};

/// Configuration shared by every statement a [`QueryBuilder`](crate::QueryBuilder) creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbalConfig {
    /// Render leaf conditions when they are added instead of when the statement is built.
    pub realtime_cond_building: bool,
    /// Separator placed between statement clauses.
    pub separator: String,
    /// Allow UPDATE/DELETE execution without a WHERE clause.
    pub allow_empty_where: bool,
}

impl Default for DbalConfig {
    fn default() -> Self {
        Self {
            realtime_cond_building: false,
            separator: " ".to_string(),
            allow_empty_where: false,
        }
    }
}

impl DbalConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set realtime condition building.
    pub fn realtime_cond_building(mut self, enabled: bool) -> Self {
        self.realtime_cond_building = enabled;
        self
    }

    /// Set the clause separator (`"\n"` gives one clause per line).
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Allow UPDATE/DELETE without WHERE.
    pub fn allow_empty_where(mut self, allow: bool) -> Self {
        self.allow_empty_where = allow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: DbalConfig =
            serde_json::from_str(r#"{"realtime_cond_building": true}"#).unwrap();
        assert!(config.realtime_cond_building);
        assert_eq!(config.separator, " ");
        assert!(!config.allow_empty_where);
    }

    #[test]
    fn setters_chain() {
        let config = DbalConfig::new().separator("\n").allow_empty_where(true);
        assert_eq!(config.separator, "\n");
        assert!(config.allow_empty_where);
    }
}
