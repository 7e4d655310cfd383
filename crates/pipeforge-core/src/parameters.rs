//! Parameter declarations and value bags (spec §3 `Parameter`/`ParamValues`, §4.1).

use crate::errors::CompileError;
use crate::value::{as_map_value, ParamValue, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The declared type of a parameter (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Integer,
    Boolean,
    Enum,
    Steps,
    Executor,
    #[serde(rename = "env_var_name")]
    EnvVarName,
}

impl std::fmt::Display for ParameterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Enum => "enum",
            ParameterType::Steps => "steps",
            ParameterType::Executor => "executor",
            ParameterType::EnvVarName => "env_var_name",
        };
        f.write_str(s)
    }
}

impl ParameterType {
    fn matches_kind(&self, kind: ValueKind) -> bool {
        matches!(
            (self, kind),
            (ParameterType::String, ValueKind::String)
                | (ParameterType::Integer, ValueKind::Integer)
                | (ParameterType::Boolean, ValueKind::Boolean)
                | (ParameterType::Steps, ValueKind::Steps)
                | (ParameterType::Executor, ValueKind::Executor)
        )
    }
}

/// A parameter declaration on a command, job, executor, or the pipeline itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Parameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_yaml::Value>>,
}

impl Parameter {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// A set of declared parameters, keyed by name.
pub type Parameters = HashMap<String, Parameter>;

/// A mapping from parameter name to value, with an optional "parent-aware"
/// decode mode that strips sibling keys before the rest are treated as
/// parameter arguments (used for inline-parameter shapes like executor
/// references and workflow-job entries — spec §3 `ParamValues`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamValues {
    pub values: HashMap<String, ParamValue>,
}

impl ParamValues {
    pub fn lookup(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Decode a YAML mapping into parameter values, after removing any keys
    /// named in `sibling_keys` (the surrounding shape's own fields).
    pub fn from_mapping_excluding(
        value: &serde_yaml::Value,
        sibling_keys: &[&str],
    ) -> Result<Self, serde_yaml::Error> {
        let mapping = match value.as_mapping() {
            Some(m) => m.clone(),
            None => return Ok(ParamValues::default()),
        };

        let mut values = HashMap::with_capacity(mapping.len());
        for (k, v) in mapping {
            let key = k.as_str().unwrap_or_default().to_string();
            if sibling_keys.contains(&key.as_str()) {
                continue;
            }
            values.insert(key, ParamValue::from_yaml(&v)?);
        }
        Ok(ParamValues { values })
    }

    /// Materialize values for templating (spec §4.1 `AsMap`): scalars pass
    /// through, `steps`/`executor` become pre-rendered JSON.
    pub fn as_map(&self) -> HashMap<String, serde_json::Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), as_map_value(v)))
            .collect()
    }
}

impl<'de> Deserialize<'de> for ParamValues {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let values: HashMap<String, ParamValue> = HashMap::deserialize(deserializer)?;
        Ok(ParamValues { values })
    }
}

impl Serialize for ParamValues {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.values.serialize(serializer)
    }
}

/// Validate supplied parameter values against their declarations (spec
/// §4.1 `validateParameters`). Returns the flat list of per-parameter
/// errors; callers wrap this in a [`CompileError::sorted`] or
/// [`CompileError::ordered`] aggregate as their context dictates.
pub fn validate_parameters(declared: &Parameters, provided: &ParamValues) -> Vec<CompileError> {
    let mut errors = Vec::new();
    let mut missing = Vec::new();

    for (name, parameter) in declared {
        let value = provided.lookup(name);
        let is_absent = match value {
            None => true,
            Some(v) => v.is_nil(),
        };

        if is_absent {
            if !parameter.has_default() {
                missing.push(name.clone());
            }
            continue;
        }

        let value = value.unwrap();
        let actual = value.kind();
        if parameter.param_type.matches_kind(actual) {
            continue;
        }

        match parameter.param_type {
            ParameterType::Enum => {
                let rendered = value.to_yaml();
                let allowed = parameter.enum_values.as_deref().unwrap_or_default();
                if !allowed.iter().any(|e| e == &rendered) {
                    errors.push(CompileError::ParamEnumMismatch {
                        name: name.clone(),
                        targets: allowed.iter().map(display_yaml).collect(),
                        value: display_yaml(&rendered),
                    });
                }
            }
            ParameterType::EnvVarName if actual == ValueKind::String => {}
            _ => {
                errors.push(CompileError::ParamTypeMismatch {
                    name: name.clone(),
                    want: parameter.param_type.to_string(),
                    got: actual.to_string(),
                });
            }
        }
    }

    for name in provided.values.keys() {
        if !declared.contains_key(name) {
            errors.push(CompileError::UnknownArgument(name.clone()));
        }
    }

    if !missing.is_empty() {
        missing.sort();
        errors.push(CompileError::MissingParams(missing));
    }

    errors
}

/// Merge declared defaults with provided values, keyed only by declared
/// names (spec §4.1 `JoinDefaults`): a provided value wins over the
/// parameter's default.
pub fn join_defaults(
    declared: &Parameters,
    provided: &ParamValues,
) -> HashMap<String, serde_json::Value> {
    let mut out = HashMap::with_capacity(declared.len());
    for (name, parameter) in declared {
        let value = provided
            .lookup(name)
            .filter(|v| !v.is_nil())
            .map(as_map_value)
            .or_else(|| {
                parameter
                    .default
                    .as_ref()
                    .map(|d| serde_json::to_value(d).unwrap_or(serde_json::Value::Null))
            })
            .unwrap_or(serde_json::Value::Null);
        out.insert(name.clone(), value);
    }
    out
}

fn display_yaml(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}
