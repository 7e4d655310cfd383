//! `environment` field: accepts a map, a list of maps (later entries win),
//! or a list of `"KEY=value"` strings. Recovered from
//! `original_source/config/config_environment.go`, which spec.md's
//! distillation dropped (spec.md's Non-goals don't exclude it).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment(pub BTreeMap<String, serde_yaml::Value>);

impl Environment {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;

        if let Some(seq) = value.as_sequence() {
            // Either a list of maps (later entries win) or a list of
            // "KEY=value" strings — never mixed.
            if seq.iter().all(|v| v.is_string()) {
                let mut map = BTreeMap::new();
                for item in seq {
                    let s = item.as_str().unwrap();
                    let (key, val) = s.split_once('=').ok_or_else(|| {
                        serde::de::Error::custom(format!(
                            "environment string should be of form KEY=value, not {s}"
                        ))
                    })?;
                    map.insert(key.to_string(), serde_yaml::Value::String(val.to_string()));
                }
                return Ok(Environment(map));
            }

            let mut map = BTreeMap::new();
            for item in seq {
                let mapping = item.as_mapping().ok_or_else(|| {
                    serde::de::Error::custom("environment list entries must be maps")
                })?;
                for (k, v) in mapping {
                    let key = k.as_str().unwrap_or_default().to_string();
                    map.insert(key, v.clone());
                }
            }
            return Ok(Environment(map));
        }

        let mapping = value
            .as_mapping()
            .ok_or_else(|| serde::de::Error::custom("environment must be a map or list"))?;
        let mut map = BTreeMap::new();
        for (k, v) in mapping {
            map.insert(k.as_str().unwrap_or_default().to_string(), v.clone());
        }
        Ok(Environment(map))
    }
}

impl Serialize for Environment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let map: BTreeMap<&String, serde_yaml::Value> = self
            .0
            .iter()
            .map(|(k, v)| {
                if v.is_null() {
                    (k, serde_yaml::Value::String(String::new()))
                } else {
                    (k, v.clone())
                }
            })
            .collect();
        map.serialize(serializer)
    }
}
