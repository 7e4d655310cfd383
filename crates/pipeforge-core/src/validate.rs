//! Legacy v2/2.1 config validator, recovered from
//! `original_source/config/{rules.go,validate.go}`. Exposed as
//! `pipeforge validate` — distinct from, and run independently of, the
//! compiler (spec.md's scope is compilation; this is ambient tooling the
//! original carried alongside it).

use crate::config::Config;
use crate::errors::CompileError;

type Rule = fn(&Config) -> Result<(), CompileError>;

fn rule_must_contain_jobs(c: &Config) -> Result<(), CompileError> {
    if c.jobs.is_empty() {
        return Err(CompileError::Other("required key [jobs] not found".into()));
    }
    Ok(())
}

fn rule_must_contain_workflows(c: &Config) -> Result<(), CompileError> {
    if c.workflows.is_empty() {
        return Err(CompileError::Other(
            "required key [workflows] not found".into(),
        ));
    }
    Ok(())
}

fn rule_setup_requires_2_1(c: &Config) -> Result<(), CompileError> {
    if c.setup && c.version != "2.1" {
        return Err(CompileError::Other(
            "version 2.1 is required for Setup workflows".into(),
        ));
    }
    Ok(())
}

fn rule_commands_have_steps(c: &Config) -> Result<(), CompileError> {
    for (name, node) in &c.commands {
        let command: crate::config::Command = node
            .decode()
            .map_err(|e| CompileError::Other(format!("command {name}: {e}")))?;
        if command.steps.is_empty() {
            return Err(CompileError::Other(format!(
                "command {name} must have at least 1 step"
            )));
        }
    }
    Ok(())
}

fn rule_jobs_have_steps_and_executor(c: &Config) -> Result<(), CompileError> {
    for (name, node) in &c.jobs {
        let job: crate::job::Job = node
            .decode()
            .map_err(|e| CompileError::Other(format!("job {name}: {e}")))?;
        if job.steps.is_empty() {
            return Err(CompileError::Other(format!("job {name} must have steps")));
        }
        if !job.executor.is_empty() || !job.inline_executor.is_empty() {
            continue;
        }
        return Err(CompileError::Other(format!(
            "job {name} requires one of the following: [macos, docker, machine, executor] to have been defined"
        )));
    }
    Ok(())
}

/// A stub matching the original's own TODO: orb *existence* validation
/// requires a network call to an orb registry, out of scope for the core
/// validator.
fn rule_orb_references_exist(_c: &Config) -> Result<(), CompileError> {
    Ok(())
}

const RULES_2: &[Rule] = &[
    rule_must_contain_jobs,
    rule_must_contain_workflows,
    rule_setup_requires_2_1,
    rule_jobs_have_steps_and_executor,
];

const RULES_2_1: &[Rule] = &[
    rule_must_contain_jobs,
    rule_must_contain_workflows,
    rule_orb_references_exist,
    rule_setup_requires_2_1,
    rule_commands_have_steps,
    rule_jobs_have_steps_and_executor,
];

/// Validate a source document against the legacy rule set selected by its
/// declared `version`. Fails fast at the first broken rule, matching the
/// original's router-plus-linear-rule-chain behavior.
pub fn validate(source: &str) -> Result<(), CompileError> {
    if source.is_empty() {
        return Err(CompileError::Other("config string is empty".into()));
    }

    let config: Config = serde_yaml::from_str(source)?;

    let rules: &[Rule] = match config.version.as_str() {
        "2" | "2.0" => RULES_2,
        "2.1" => RULES_2_1,
        other => {
            return Err(CompileError::Other(format!(
                "config version not supported: \"{other}\""
            )))
        }
    };

    for rule in rules {
        rule(&config)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_is_rejected() {
        assert!(validate("").is_err());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let err = validate("version: \"3\"\njobs: {}\nworkflows: {}\n").unwrap_err();
        assert!(matches!(err, CompileError::Other(_)));
    }

    #[test]
    fn missing_jobs_is_rejected() {
        let err = validate("version: \"2\"\nworkflows: {}\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("jobs"));
    }

    #[test]
    fn setup_requires_2_1() {
        let err = validate("version: \"2\"\nsetup: true\njobs: {a: {}}\nworkflows: {w: {}}\n")
            .unwrap_err();
        assert!(err.to_string().contains("2.1"));
    }

    #[test]
    fn valid_minimal_2_1_config_passes() {
        let src = r#"
version: "2.1"
jobs:
  build:
    docker:
      - image: cimg/base
    steps:
      - checkout
workflows:
  w:
    jobs:
      - build
"#;
        assert!(validate(src).is_ok());
    }

    #[test]
    fn unquoted_numeric_version_is_accepted() {
        let src = r#"
version: 2.1
jobs:
  build:
    docker:
      - image: cimg/base
    steps:
      - checkout
workflows:
  w:
    jobs:
      - build
"#;
        assert!(validate(src).is_ok());
    }
}
