//! Step model: the closed set of built-in step bodies plus user-defined
//! command invocations, and their per-type validators (spec §3, §4.9).

use crate::condition::Condition;
use crate::environment::Environment;
use crate::errors::CompileError;
use crate::parameters::ParamValues;
use crate::raw::StringList;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct RunData {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default, skip_serializing_if = "Environment::is_empty")]
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub background: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

impl RunData {
    fn validate(&self) -> Result<(), CompileError> {
        if self.command.is_empty() {
            return Err(CompileError::StepValidation("run: command is required".into()));
        }
        if let Some(w) = &self.when {
            if !matches!(w.as_str(), "always" | "on_success" | "on_fail") {
                return Err(CompileError::StepValidation(format!(
                    "run.when must be one of always|on_success|on_fail, got {w}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct CheckoutData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct SetupRemoteDockerData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub docker_layer_caching: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct SaveCacheData {
    #[serde(default)]
    pub paths: StringList,
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SaveCacheData {
    fn validate(&self) -> Result<(), CompileError> {
        if self.paths.is_empty() || self.key.is_empty() {
            return Err(CompileError::StepValidation(
                "save_cache: paths and key are required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct RestoreCacheData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RestoreCacheData {
    fn validate(&self) -> Result<(), CompileError> {
        if self.key.is_none() && self.keys.as_ref().map(|k| k.is_empty()).unwrap_or(true) {
            return Err(CompileError::StepValidation(
                "restore_cache: at least one of key or keys is required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct StoreArtifactsData {
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl StoreArtifactsData {
    fn validate(&self) -> Result<(), CompileError> {
        if self.path.is_empty() {
            return Err(CompileError::StepValidation("store_artifacts: path is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct StoreTestResultsData {
    #[serde(default)]
    pub path: String,
}

impl StoreTestResultsData {
    fn validate(&self) -> Result<(), CompileError> {
        if self.path.is_empty() {
            return Err(CompileError::StepValidation(
                "store_test_results: path is required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct PersistToWorkspaceData {
    #[serde(default)]
    pub root: String,
    #[serde(default)]
    pub paths: StringList,
}

impl PersistToWorkspaceData {
    fn validate(&self) -> Result<(), CompileError> {
        if self.root.is_empty() || self.paths.is_empty() {
            return Err(CompileError::StepValidation(
                "persist_to_workspace: root and paths are required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct AttachWorkspaceData {
    #[serde(default)]
    pub at: String,
}

impl AttachWorkspaceData {
    fn validate(&self) -> Result<(), CompileError> {
        if self.at.is_empty() {
            return Err(CompileError::StepValidation("attach_workspace: at is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct AddSshKeysData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprints: Option<Vec<String>>,
}

/// The body of a `when`/`unless` step: a condition plus the steps to run
/// when it is satisfied (spec §3 `ConditionalSteps`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ConditionalSteps {
    pub condition: Condition,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A single pipeline step: one of the closed built-in set, or a reference
/// to a user-defined command (possibly orb-qualified as `orb/name`), spec
/// §3 `Step`.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Run(RunData),
    Checkout(Option<CheckoutData>),
    SetupRemoteDocker(Option<SetupRemoteDockerData>),
    SaveCache(SaveCacheData),
    RestoreCache(RestoreCacheData),
    StoreArtifacts(StoreArtifactsData),
    StoreTestResults(StoreTestResultsData),
    PersistToWorkspace(PersistToWorkspaceData),
    AttachWorkspace(AttachWorkspaceData),
    AddSshKeys(AddSshKeysData),
    When(ConditionalSteps),
    Unless(ConditionalSteps),
    Command {
        type_name: String,
        params: ParamValues,
    },
}

const BUILTIN_TYPES: &[&str] = &[
    "run",
    "checkout",
    "setup_remote_docker",
    "save_cache",
    "restore_cache",
    "store_artifacts",
    "store_test_results",
    "persist_to_workspace",
    "attach_workspace",
    "add_ssh_keys",
    "when",
    "unless",
];

impl Step {
    pub fn is_builtin_type(name: &str) -> bool {
        BUILTIN_TYPES.contains(&name)
    }

    /// The step's `type` discriminator, mirroring the YAML key it decoded
    /// from — used to build positional error prefixes (spec §4.6).
    pub fn type_name(&self) -> &str {
        match self {
            Step::Run(_) => "run",
            Step::Checkout(_) => "checkout",
            Step::SetupRemoteDocker(_) => "setup_remote_docker",
            Step::SaveCache(_) => "save_cache",
            Step::RestoreCache(_) => "restore_cache",
            Step::StoreArtifacts(_) => "store_artifacts",
            Step::StoreTestResults(_) => "store_test_results",
            Step::PersistToWorkspace(_) => "persist_to_workspace",
            Step::AttachWorkspace(_) => "attach_workspace",
            Step::AddSshKeys(_) => "add_ssh_keys",
            Step::When(_) => "when",
            Step::Unless(_) => "unless",
            Step::Command { type_name, .. } => type_name,
        }
    }

    fn from_named(name: &str, body: serde_yaml::Value) -> Result<Step, CompileError> {
        match name {
            "run" => {
                let data = if let Some(s) = body.as_str() {
                    RunData {
                        command: s.to_string(),
                        ..Default::default()
                    }
                } else {
                    serde_yaml::from_value(body).map_err(|e| {
                        CompileError::StepValidation(format!("run: {e}"))
                    })?
                };
                data.validate()?;
                Ok(Step::Run(data))
            }
            "checkout" => {
                if body.is_null() {
                    Ok(Step::Checkout(None))
                } else {
                    let data: CheckoutData = serde_yaml::from_value(body)
                        .map_err(|e| CompileError::StepValidation(format!("checkout: {e}")))?;
                    Ok(Step::Checkout(Some(data)))
                }
            }
            "setup_remote_docker" => {
                if body.is_null() {
                    Ok(Step::SetupRemoteDocker(None))
                } else {
                    let data: SetupRemoteDockerData = serde_yaml::from_value(body).map_err(|e| {
                        CompileError::StepValidation(format!("setup_remote_docker: {e}"))
                    })?;
                    Ok(Step::SetupRemoteDocker(Some(data)))
                }
            }
            "save_cache" => {
                let data: SaveCacheData = serde_yaml::from_value(body)
                    .map_err(|e| CompileError::StepValidation(format!("save_cache: {e}")))?;
                data.validate()?;
                Ok(Step::SaveCache(data))
            }
            "restore_cache" => {
                let data: RestoreCacheData = serde_yaml::from_value(body)
                    .map_err(|e| CompileError::StepValidation(format!("restore_cache: {e}")))?;
                data.validate()?;
                Ok(Step::RestoreCache(data))
            }
            "store_artifacts" => {
                let data: StoreArtifactsData = serde_yaml::from_value(body)
                    .map_err(|e| CompileError::StepValidation(format!("store_artifacts: {e}")))?;
                data.validate()?;
                Ok(Step::StoreArtifacts(data))
            }
            "store_test_results" => {
                let data: StoreTestResultsData = serde_yaml::from_value(body).map_err(|e| {
                    CompileError::StepValidation(format!("store_test_results: {e}"))
                })?;
                data.validate()?;
                Ok(Step::StoreTestResults(data))
            }
            "persist_to_workspace" => {
                let data: PersistToWorkspaceData = serde_yaml::from_value(body).map_err(|e| {
                    CompileError::StepValidation(format!("persist_to_workspace: {e}"))
                })?;
                data.validate()?;
                Ok(Step::PersistToWorkspace(data))
            }
            "attach_workspace" => {
                let data: AttachWorkspaceData = serde_yaml::from_value(body).map_err(|e| {
                    CompileError::StepValidation(format!("attach_workspace: {e}"))
                })?;
                data.validate()?;
                Ok(Step::AttachWorkspace(data))
            }
            "add_ssh_keys" => {
                let data: AddSshKeysData = if body.is_null() {
                    AddSshKeysData::default()
                } else {
                    serde_yaml::from_value(body)
                        .map_err(|e| CompileError::StepValidation(format!("add_ssh_keys: {e}")))?
                };
                Ok(Step::AddSshKeys(data))
            }
            "when" => {
                let data: ConditionalSteps = serde_yaml::from_value(body)
                    .map_err(|e| CompileError::StepValidation(format!("when: {e}")))?;
                Ok(Step::When(data))
            }
            "unless" => {
                let data: ConditionalSteps = serde_yaml::from_value(body)
                    .map_err(|e| CompileError::StepValidation(format!("unless: {e}")))?;
                Ok(Step::Unless(data))
            }
            other => {
                let params = ParamValues::from_mapping_excluding(&body, &[])
                    .map_err(|e| CompileError::StepValidation(format!("{other}: {e}")))?;
                Ok(Step::Command {
                    type_name: other.to_string(),
                    params,
                })
            }
        }
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;

        if let Some(s) = value.as_str() {
            return Step::from_named(s, serde_yaml::Value::Null).map_err(serde::de::Error::custom);
        }

        let mapping = value
            .as_mapping()
            .ok_or_else(|| serde::de::Error::custom("step must be a string or a single-key map"))?;
        if mapping.len() != 1 {
            return Err(serde::de::Error::custom(
                "step map must have exactly one key naming its type",
            ));
        }
        let (k, v) = mapping.iter().next().unwrap();
        let name = k
            .as_str()
            .ok_or_else(|| serde::de::Error::custom("step type must be a string"))?;
        Step::from_named(name, v.clone()).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Step {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        match self {
            Step::Checkout(None) => return "checkout".serialize(serializer),
            Step::SetupRemoteDocker(None) => return "setup_remote_docker".serialize(serializer),
            _ => {}
        }

        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Step::Run(d) => map.serialize_entry("run", d)?,
            Step::Checkout(Some(d)) => map.serialize_entry("checkout", d)?,
            Step::SetupRemoteDocker(Some(d)) => map.serialize_entry("setup_remote_docker", d)?,
            Step::SaveCache(d) => map.serialize_entry("save_cache", d)?,
            Step::RestoreCache(d) => map.serialize_entry("restore_cache", d)?,
            Step::StoreArtifacts(d) => map.serialize_entry("store_artifacts", d)?,
            Step::StoreTestResults(d) => map.serialize_entry("store_test_results", d)?,
            Step::PersistToWorkspace(d) => map.serialize_entry("persist_to_workspace", d)?,
            Step::AttachWorkspace(d) => map.serialize_entry("attach_workspace", d)?,
            Step::AddSshKeys(d) => map.serialize_entry("add_ssh_keys", d)?,
            Step::When(d) => map.serialize_entry("when", d)?,
            Step::Unless(d) => map.serialize_entry("unless", d)?,
            Step::Command { type_name, params } => map.serialize_entry(type_name, &params.values)?,
            Step::Checkout(None) | Step::SetupRemoteDocker(None) => unreachable!(),
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_checkout() {
        let step: Step = serde_yaml::from_str("checkout").unwrap();
        assert_eq!(step, Step::Checkout(None));
    }

    #[test]
    fn run_shorthand_string() {
        let step: Step = serde_yaml::from_str("run: echo hi").unwrap();
        match step {
            Step::Run(d) => assert_eq!(d.command, "echo hi"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn run_without_command_is_invalid() {
        let result: Result<Step, _> = serde_yaml::from_str("run: {}");
        assert!(result.is_err());
    }

    #[test]
    fn run_when_must_be_known_value() {
        let result: Result<Step, _> =
            serde_yaml::from_str("run:\n  command: echo\n  when: sometimes");
        assert!(result.is_err());
    }

    #[test]
    fn save_cache_requires_paths_and_key() {
        let result: Result<Step, _> = serde_yaml::from_str("save_cache:\n  key: v1");
        assert!(result.is_err());
    }

    #[test]
    fn restore_cache_accepts_keys_list() {
        let step: Step = serde_yaml::from_str("restore_cache:\n  keys: [v1, v2]").unwrap();
        match step {
            Step::RestoreCache(d) => assert_eq!(d.keys, Some(vec!["v1".into(), "v2".into()])),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn user_command_captures_params() {
        let step: Step = serde_yaml::from_str("greet:\n  name: world").unwrap();
        match step {
            Step::Command { type_name, params } => {
                assert_eq!(type_name, "greet");
                assert!(params.values.contains_key("name"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn when_step_decodes_condition_and_nested_steps() {
        let step: Step =
            serde_yaml::from_str("when:\n  condition: true\n  steps:\n    - checkout").unwrap();
        match step {
            Step::When(cs) => assert_eq!(cs.steps.len(), 1),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
