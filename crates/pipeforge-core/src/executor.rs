//! Executor shapes: `docker`/`macos`/`machine`/`resource_class`, and the
//! job-level reference to a named executor (spec §3 `Executor`,
//! `JobExecutor`).

use crate::environment::Environment;
use crate::parameters::ParamValues;
use crate::raw::StringList;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

fn xcode_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d(\.\d){1,2}(-\w+)?$").unwrap())
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Auth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Docker {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub entrypoint: StringList,
    #[serde(default, skip_serializing_if = "StringList::is_empty")]
    pub command: StringList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Environment::is_empty")]
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Machine {
    pub image: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub docker_layer_caching: bool,
}

/// `macos: { xcode }` — `xcode` must match `^\d(\.\d){1,2}(-\w+)?$`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacOs {
    pub xcode: String,
}

impl<'de> Deserialize<'de> for MacOs {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            xcode: String,
        }
        let raw = Raw::deserialize(deserializer)?;
        if !xcode_version_re().is_match(&raw.xcode) {
            return Err(serde::de::Error::custom(format!(
                "invalid xcode version: {}",
                raw.xcode
            )));
        }
        Ok(MacOs { xcode: raw.xcode })
    }
}

impl Serialize for MacOs {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("MacOs", 1)?;
        s.serialize_field("xcode", &self.xcode)?;
        s.end()
    }
}

/// An executor body: `resource_class`, and at most one of
/// `docker`/`macos`/`machine` in practice, though the shape allows any
/// combination exactly as the original does (spec §3 `Executor`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Executor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_class: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub docker: Vec<Docker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macos: Option<MacOs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<Machine>,
}

impl Executor {
    pub fn is_empty(&self) -> bool {
        self.resource_class.is_none()
            && self.docker.is_empty()
            && self.macos.is_none()
            && self.machine.is_none()
    }
}

/// A job's reference to a named executor, optionally with parameter
/// overrides. Decodes from a bare string or a map with a required,
/// non-empty `name` field (spec §3 `JobExecutor`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobExecutor {
    pub name: String,
    pub param_values: ParamValues,
}

impl JobExecutor {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl<'de> Deserialize<'de> for JobExecutor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        if let Some(s) = value.as_str() {
            return Ok(JobExecutor {
                name: s.to_string(),
                param_values: ParamValues::default(),
            });
        }

        let name = value
            .as_mapping()
            .and_then(|m| m.get("name"))
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string();

        if name.is_empty() {
            return Err(serde::de::Error::custom("invalid job executor: name required"));
        }

        let param_values = ParamValues::from_mapping_excluding(&value, &["name"])
            .map_err(serde::de::Error::custom)?;

        Ok(JobExecutor { name, param_values })
    }
}

impl Serialize for JobExecutor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if self.param_values.values.is_empty() {
            self.name.serialize(serializer)
        } else {
            let mut mapping = serde_yaml::Mapping::new();
            mapping.insert("name".to_string().into(), self.name.clone().into());
            for (key, value) in &self.param_values.values {
                mapping.insert(key.clone().into(), value.to_yaml());
            }
            mapping.serialize(serializer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_executor_accepts_bare_string() {
        let ex: JobExecutor = serde_yaml::from_str("default").unwrap();
        assert_eq!(ex.name, "default");
        assert!(ex.param_values.values.is_empty());
    }

    #[test]
    fn job_executor_requires_name_in_map_form() {
        let result: Result<JobExecutor, _> = serde_yaml::from_str("foo: bar");
        assert!(result.is_err());
    }

    #[test]
    fn job_executor_map_form_captures_params() {
        let ex: JobExecutor = serde_yaml::from_str("name: linux\ntag: \"1.0\"").unwrap();
        assert_eq!(ex.name, "linux");
        assert!(ex.param_values.values.contains_key("tag"));
    }

    #[test]
    fn job_executor_serialize_keeps_name_alongside_params() {
        let ex: JobExecutor = serde_yaml::from_str("name: linux\ntag: \"1.0\"").unwrap();
        let rendered = serde_yaml::to_value(&ex).unwrap();
        let mapping = rendered.as_mapping().unwrap();
        assert_eq!(mapping.get("name").and_then(|v| v.as_str()), Some("linux"));
        assert!(mapping.get("tag").is_some());
    }

    #[test]
    fn xcode_version_must_match_pattern() {
        let ok: Result<MacOs, _> = serde_yaml::from_str("xcode: \"14.2\"");
        assert!(ok.is_ok());
        let bad: Result<MacOs, _> = serde_yaml::from_str("xcode: \"vNext\"");
        assert!(bad.is_err());
    }
}
