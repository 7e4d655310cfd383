//! Value & Parameter Model — tagged parameter value kind (spec §3, §4.1).

use crate::executor::JobExecutor;
use crate::step::Step;
use serde::Serialize;
use std::fmt;

/// The closed set of kinds a [`ParamValue`] can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Nil,
    String,
    Integer,
    Boolean,
    Steps,
    Executor,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Nil => "nil",
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Boolean => "boolean",
            ValueKind::Steps => "steps",
            ValueKind::Executor => "executor",
        };
        f.write_str(s)
    }
}

/// A tagged union over the parameter value kinds a CircleCI-style config admits.
///
/// A missing or YAML-`null` value is represented as [`ParamValue::Nil`] and is
/// always treated as absent by parameter validation (spec §3 invariants).
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Nil,
    String(String),
    Integer(i64),
    Boolean(bool),
    Steps(Vec<Step>),
    Executor(JobExecutor),
}

impl ParamValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            ParamValue::Nil => ValueKind::Nil,
            ParamValue::String(_) => ValueKind::String,
            ParamValue::Integer(_) => ValueKind::Integer,
            ParamValue::Boolean(_) => ValueKind::Boolean,
            ParamValue::Steps(_) => ValueKind::Steps,
            ParamValue::Executor(_) => ValueKind::Executor,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, ParamValue::Nil)
    }

    /// Decode a raw YAML scalar/sequence/mapping into a `ParamValue`, trying
    /// each shape in the same order the original decoder does: string,
    /// integer, boolean, steps, executor.
    pub fn from_yaml(value: &serde_yaml::Value) -> Result<Self, serde_yaml::Error> {
        if value.is_null() {
            return Ok(ParamValue::Nil);
        }
        if let Some(s) = value.as_str() {
            return Ok(ParamValue::String(s.to_string()));
        }
        if let Some(i) = value.as_i64() {
            return Ok(ParamValue::Integer(i));
        }
        if let Some(b) = value.as_bool() {
            return Ok(ParamValue::Boolean(b));
        }
        if let Ok(steps) = serde_yaml::from_value::<Vec<Step>>(value.clone()) {
            return Ok(ParamValue::Steps(steps));
        }
        if let Ok(executor) = serde_yaml::from_value::<JobExecutor>(value.clone()) {
            return Ok(ParamValue::Executor(executor));
        }
        Err(serde::de::Error::custom(format!(
            "invalid param value: {value:?}"
        )))
    }

    /// Render back to a `serde_yaml::Value`, the inverse of [`Self::from_yaml`].
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            ParamValue::Nil => serde_yaml::Value::Null,
            ParamValue::String(s) => serde_yaml::Value::String(s.clone()),
            ParamValue::Integer(i) => serde_yaml::Value::Number((*i).into()),
            ParamValue::Boolean(b) => serde_yaml::Value::Bool(*b),
            ParamValue::Steps(steps) => serde_yaml::to_value(steps).unwrap_or(serde_yaml::Value::Null),
            ParamValue::Executor(e) => serde_yaml::to_value(e).unwrap_or(serde_yaml::Value::Null),
        }
    }
}

impl<'de> serde::Deserialize<'de> for ParamValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        ParamValue::from_yaml(&value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for ParamValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_yaml().serialize(serializer)
    }
}

/// Renders a JSON string wrapped so the template engine inserts it verbatim
/// (spec §4.1/§4.2 "safe string" contract): `steps`/`executor` values are
/// re-serialized to YAML, round-tripped through JSON, and marked raw.
pub fn as_map_value(value: &ParamValue) -> serde_json::Value {
    match value {
        ParamValue::Nil => serde_json::Value::Null,
        ParamValue::String(s) => serde_json::Value::String(s.clone()),
        ParamValue::Integer(i) => serde_json::Value::Number((*i).into()),
        ParamValue::Boolean(b) => serde_json::Value::Bool(*b),
        ParamValue::Steps(_) | ParamValue::Executor(_) => {
            // Re-parse through YAML -> JSON so nested maps/sequences survive
            // as structured JSON rather than an escaped scalar string.
            let yaml = value.to_yaml();
            serde_json::to_value(&yaml).unwrap_or(serde_json::Value::Null)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_absent_kind() {
        assert_eq!(ParamValue::Nil.kind(), ValueKind::Nil);
        assert!(ParamValue::Nil.is_nil());
    }

    #[test]
    fn string_roundtrips() {
        let v = ParamValue::from_yaml(&serde_yaml::Value::String("hello".into())).unwrap();
        assert_eq!(v, ParamValue::String("hello".into()));
    }

    #[test]
    fn integer_before_boolean_order() {
        // "1" parses to an integer before boolean is attempted.
        let v = ParamValue::from_yaml(&serde_yaml::Value::Number(1.into())).unwrap();
        assert_eq!(v, ParamValue::Integer(1));
    }
}
