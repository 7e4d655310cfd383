//! Workflow definitions: workflow-jobs, matrices, and filters (spec §3
//! `Workflow`, `WorkflowJob`).

use crate::condition::Condition;
use crate::errors::CompileError;
use crate::parameters::ParamValues;
use crate::raw::StringList;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct FilterConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only: Option<StringList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<StringList>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Filters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<FilterConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<FilterConditions>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.branches.is_none() && self.tags.is_none()
    }
}

/// `matrix: { parameters, exclude? }` (spec §3, §4.4). `exclude` is
/// accepted but not enforced — see `matrix::expand`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct JobMatrix {
    #[serde(default)]
    pub parameters: BTreeMap<String, Vec<serde_yaml::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<serde_yaml::Mapping>>,
}

impl JobMatrix {
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// A reference from a workflow to a job definition, plus overrides (spec
/// §3 `WorkflowJob`). A bare string entry in the source (`- my_job`)
/// decodes to a `WorkflowJob` with only `key` set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowJob {
    pub key: String,
    pub name: Option<String>,
    pub is_approval: bool,
    pub requires: Vec<String>,
    pub context: Vec<String>,
    pub filters: Filters,
    pub matrix: JobMatrix,
    pub pre_steps: Vec<crate::step::Step>,
    pub post_steps: Vec<crate::step::Step>,
    pub params: ParamValues,
}

impl WorkflowJob {
    /// The identifier this job is known by within its workflow: `name` if
    /// set, else `key` (spec §3).
    pub fn identifier(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.key)
    }
}

const WORKFLOW_JOB_SIBLING_KEYS: &[&str] = &[
    "name",
    "type",
    "requires",
    "context",
    "filters",
    "matrix",
    "pre-steps",
    "post-steps",
];

impl<'de> Deserialize<'de> for WorkflowJob {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;

        if let Some(s) = value.as_str() {
            return Ok(WorkflowJob {
                key: s.to_string(),
                ..Default::default()
            });
        }

        let mapping = value
            .as_mapping()
            .ok_or_else(|| serde::de::Error::custom("workflow job must be a string or a single-key map"))?;
        if mapping.len() != 1 {
            return Err(serde::de::Error::custom(
                "workflow job map must have exactly one key naming the job",
            ));
        }
        let (k, body) = mapping.iter().next().unwrap();
        let key = k
            .as_str()
            .ok_or_else(|| serde::de::Error::custom("workflow job key must be a string"))?
            .to_string();

        #[derive(Deserialize, Default)]
        struct Body {
            name: Option<String>,
            #[serde(rename = "type")]
            job_type: Option<String>,
            #[serde(default)]
            requires: StringList,
            #[serde(default)]
            context: StringList,
            #[serde(default)]
            filters: Filters,
            #[serde(default)]
            matrix: JobMatrix,
            #[serde(rename = "pre-steps", default)]
            pre_steps: Vec<crate::step::Step>,
            #[serde(rename = "post-steps", default)]
            post_steps: Vec<crate::step::Step>,
        }

        let parsed: Body = serde_yaml::from_value(body.clone()).map_err(serde::de::Error::custom)?;
        let is_approval = matches!(parsed.job_type.as_deref(), Some("approval"));
        let params = ParamValues::from_mapping_excluding(body, WORKFLOW_JOB_SIBLING_KEYS)
            .map_err(serde::de::Error::custom)?;

        Ok(WorkflowJob {
            key,
            name: parsed.name,
            is_approval,
            requires: parsed.requires.0,
            context: parsed.context.0,
            filters: parsed.filters,
            matrix: parsed.matrix,
            pre_steps: parsed.pre_steps,
            post_steps: parsed.post_steps,
            params,
        })
    }
}

impl Serialize for WorkflowJob {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let trivial = self.name.is_none()
            && !self.is_approval
            && self.requires.is_empty()
            && self.context.is_empty()
            && self.filters.is_empty()
            && self.matrix.is_empty()
            && self.pre_steps.is_empty()
            && self.post_steps.is_empty()
            && self.params.values.is_empty();

        if trivial {
            let mut outer = serializer.serialize_map(Some(1))?;
            outer.serialize_entry(&self.key, &serde_yaml::Value::Null)?;
            return outer.end();
        }

        let mut body = serde_yaml::Mapping::new();
        if let Some(name) = &self.name {
            body.insert("name".into(), name.clone().into());
        }
        if self.is_approval {
            body.insert("type".into(), "approval".into());
        }
        if !self.requires.is_empty() {
            body.insert(
                "requires".into(),
                serde_yaml::to_value(&self.requires).unwrap_or_default(),
            );
        }
        if !self.context.is_empty() {
            body.insert(
                "context".into(),
                serde_yaml::to_value(&self.context).unwrap_or_default(),
            );
        }
        for (k, v) in &self.params.values {
            body.insert(k.clone().into(), v.to_yaml());
        }

        let mut outer = serializer.serialize_map(Some(1))?;
        outer.serialize_entry(&self.key, &body)?;
        outer.end()
    }
}

/// `workflows.NAME` (spec §3 `Workflow`). `unless: C` in the source is
/// normalized to `when: not(C)`; declaring both is rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    pub jobs: Vec<WorkflowJob>,
    pub when: Option<Condition>,
}

impl<'de> Deserialize<'de> for Workflow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            jobs: Vec<WorkflowJob>,
            #[serde(default)]
            when: Option<Condition>,
            #[serde(default)]
            unless: Option<Condition>,
        }
        let raw = Raw::deserialize(deserializer)?;
        let when = match (raw.when, raw.unless) {
            (Some(_), Some(_)) => {
                return Err(serde::de::Error::custom(
                    "workflow cannot declare both when and unless",
                ))
            }
            (Some(w), None) => Some(w),
            (None, Some(u)) => Some(u.negate()),
            (None, None) => None,
        };
        Ok(Workflow {
            jobs: raw.jobs,
            when,
        })
    }
}

impl Serialize for Workflow {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("jobs", &self.jobs)?;
        if let Some(when) = &self.when {
            map.serialize_entry("when", when)?;
        }
        map.end()
    }
}

pub fn validate_requires(
    workflow_name: &str,
    known_identifiers: &[String],
    entries: &[(String, Vec<String>)],
) -> Result<(), CompileError> {
    let mut errors = Vec::new();
    for (job, requires) in entries {
        for r in requires {
            if !known_identifiers.iter().any(|id| id == r) {
                errors.push(CompileError::RequiresUnknownJob {
                    job: job.clone(),
                    requires: r.clone(),
                });
            }
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CompileError::ordered(
            format!("job requirement error(s) in workflow {workflow_name}:"),
            errors,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_entry_becomes_key_only() {
        let wj: WorkflowJob = serde_yaml::from_str("build").unwrap();
        assert_eq!(wj.key, "build");
        assert!(wj.requires.is_empty());
    }

    #[test]
    fn map_entry_captures_requires_and_params() {
        let wj: WorkflowJob =
            serde_yaml::from_str("build:\n  requires: [setup]\n  os: linux").unwrap();
        assert_eq!(wj.key, "build");
        assert_eq!(wj.requires, vec!["setup".to_string()]);
        assert!(wj.params.values.contains_key("os"));
    }

    #[test]
    fn approval_type_is_recognized() {
        let wj: WorkflowJob = serde_yaml::from_str("hold:\n  type: approval").unwrap();
        assert!(wj.is_approval);
    }

    #[test]
    fn workflow_rejects_when_and_unless_together() {
        let result: Result<Workflow, _> =
            serde_yaml::from_str("jobs: [a]\nwhen: true\nunless: false");
        assert!(result.is_err());
    }

    #[test]
    fn workflow_unless_is_negated_into_when() {
        let wf: Workflow = serde_yaml::from_str("jobs: [a]\nunless: true").unwrap();
        assert!(!Condition::evaluate(wf.when.as_ref()).unwrap());
    }

    #[test]
    fn identifier_prefers_name_over_key() {
        let wj = WorkflowJob {
            key: "build".into(),
            name: Some("build-2".into()),
            ..Default::default()
        };
        assert_eq!(wj.identifier(), "build-2");
    }
}
