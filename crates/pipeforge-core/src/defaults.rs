//! Ambient `pipeline.*` scope defaults (recovered from
//! `original_source/config/defaults.go`, dropped by the distillation).
//!
//! When a caller supplies no pipeline values (or omits one of these),
//! these fill the `pipeline.*` template scope alongside whatever the
//! caller passed under `pipeline.parameters`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConfigValues {
    pub id: String,
    pub number: u64,
    pub trigger_source: String,
    pub project_type: String,
}

impl Default for ConfigValues {
    fn default() -> Self {
        ConfigValues {
            id: "00000000-0000-0000-0000-000000000001".to_string(),
            number: 1,
            trigger_source: "api".to_string(),
            project_type: "github".to_string(),
        }
    }
}

impl ConfigValues {
    /// Render into the flat JSON object the template engine consumes
    /// under the `pipeline` key, alongside `parameters`.
    pub fn as_map(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("id".to_string(), serde_json::json!(self.id));
        map.insert("number".to_string(), serde_json::json!(self.number));
        map.insert(
            "trigger_source".to_string(),
            serde_json::json!(self.trigger_source),
        );
        map.insert(
            "project_type".to_string(),
            serde_json::json!(self.project_type),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_observed_values() {
        let d = ConfigValues::default();
        assert_eq!(d.id, "00000000-0000-0000-0000-000000000001");
        assert_eq!(d.number, 1);
        assert_eq!(d.trigger_source, "api");
        assert_eq!(d.project_type, "github");
    }
}
