//! Top-level config shape: `version`, `setup`, `jobs`, `workflows`,
//! `orbs`, `commands`, `parameters`, `executors` (spec §3, §6).

use crate::parameters::Parameters;
use crate::raw::RawNode;
use crate::step::Step;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A reusable command: `{ description?, parameters, steps }` (spec §3
/// `Command`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Command {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Real configs write `version: 2.1` or `version: 2` unquoted, which
/// `serde_yaml` parses as a numeric scalar rather than a string; coerce
/// either shape to the string form the rest of the compiler compares
/// against.
fn deserialize_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(deserializer)?;
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "version must be a string or number, got {other:?}"
        ))),
    }
}

/// The source document, decoded before any template substitution or orb
/// resolution has happened. Job/executor/command bodies are kept as
/// `RawNode`s here because parameter templating must run against their
/// raw subtree before the concrete shape can be decoded (spec §3, §4.1).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub setup: bool,
    #[serde(default)]
    pub jobs: HashMap<String, RawNode>,
    #[serde(default)]
    pub workflows: HashMap<String, RawNode>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub orbs: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub commands: HashMap<String, RawNode>,
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub executors: HashMap<String, RawNode>,
}

/// The compiled output document: `version: 2`, plus only `jobs` and
/// `workflows` (spec §4.8, §6).
#[derive(Debug, Clone, Serialize, Default)]
pub struct CompiledConfig {
    pub version: u32,
    pub jobs: serde_yaml::Mapping,
    pub workflows: serde_yaml::Mapping,
}

impl CompiledConfig {
    pub fn new() -> Self {
        CompiledConfig {
            version: 2,
            jobs: serde_yaml::Mapping::new(),
            workflows: serde_yaml::Mapping::new(),
        }
    }
}
