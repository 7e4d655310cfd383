//! End-to-end compilation scenarios (spec §8).

use pipeforge_core::errors::CompileError;
use pipeforge_core::{compile, OrbSource};

struct NoOrbs;

impl OrbSource for NoOrbs {
    fn fetch(&self, reference: &str) -> Result<String, CompileError> {
        Err(CompileError::OrbFetchFailed(reference.to_string()))
    }
}

struct FakeOrbs;

impl OrbSource for FakeOrbs {
    fn fetch(&self, reference: &str) -> Result<String, CompileError> {
        match reference {
            "greetings/greet@1.0.0" => Ok(r#"
commands:
  hello:
    parameters:
      name:
        type: string
        default: world
    steps:
      - run: echo hello {{ parameters.name }}
jobs:
  wave:
    docker:
      - image: cimg/base:stable
    steps:
      - checkout
"#
            .to_string()),
            other => Err(CompileError::OrbFetchFailed(other.to_string())),
        }
    }
}

fn compiled_yaml(source: &str) -> serde_yaml::Value {
    let bytes = compile(source.as_bytes(), None, &NoOrbs).expect("compile succeeds");
    serde_yaml::from_slice(&bytes).expect("compiled output is valid yaml")
}

#[test]
fn minimal_config_compiles_one_job_one_workflow() {
    let source = r#"
version: "2.1"
jobs:
  build:
    docker:
      - image: cimg/base:stable
    steps:
      - checkout
      - run: echo hi
workflows:
  main:
    jobs:
      - build
"#;
    let doc = compiled_yaml(source);
    assert_eq!(doc["version"].as_i64(), Some(2));
    assert!(doc["jobs"]["build"].is_mapping());
    let jobs = doc["workflows"]["main"]["jobs"].as_sequence().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].as_str(), Some("build"));
}

#[test]
fn job_parameters_are_substituted_per_instantiation() {
    let source = r#"
version: "2.1"
jobs:
  build:
    parameters:
      image:
        type: string
        default: cimg/base:stable
    docker:
      - image: <<parameters.image>>
    steps:
      - checkout
workflows:
  main:
    jobs:
      - build:
          image: cimg/node:18.0
"#;
    let doc = compiled_yaml(source);
    let image = doc["jobs"]["build"]["docker"][0]["image"].as_str().unwrap();
    assert_eq!(image, "cimg/node:18.0");
}

#[test]
fn pipeline_parameters_flow_into_job_bodies() {
    let source = r#"
version: "2.1"
parameters:
  release-tag:
    type: string
    default: v0
jobs:
  build:
    docker:
      - image: cimg/base:stable
    steps:
      - run: echo building <<pipeline.parameters.release-tag>>
workflows:
  main:
    jobs:
      - build
"#;
    let bytes = compile(
        source.as_bytes(),
        Some(serde_json::json!({ "parameters": { "release-tag": "v9" } })),
        &NoOrbs,
    )
    .unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_slice(&bytes).unwrap();
    let run = doc["jobs"]["build"]["steps"][0]["run"]["command"].as_str().unwrap();
    assert_eq!(run, "echo building v9");
}

#[test]
fn conditional_steps_are_expanded_or_dropped() {
    let source = r#"
version: "2.1"
jobs:
  build:
    docker:
      - image: cimg/base:stable
    steps:
      - checkout
      - when:
          condition: true
          steps:
            - run: echo kept
      - unless:
          condition: true
          steps:
            - run: echo dropped
workflows:
  main:
    jobs:
      - build
"#;
    let doc = compiled_yaml(source);
    let steps = doc["jobs"]["build"]["steps"].as_sequence().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1]["run"]["command"].as_str(), Some("echo kept"));
}

#[test]
fn matrix_fans_out_with_deterministic_sorted_key_naming() {
    let source = r#"
version: "2.1"
jobs:
  test:
    parameters:
      os:
        type: string
        default: linux
      version:
        type: string
        default: "1"
    docker:
      - image: cimg/base:stable
    steps:
      - run: echo <<parameters.os>>-<<parameters.version>>
workflows:
  main:
    jobs:
      - test:
          matrix:
            parameters:
              os: [linux, mac]
              version: ["1", "2"]
"#;
    let doc = compiled_yaml(source);
    let jobs = doc["jobs"].as_mapping().unwrap();
    let mut names: Vec<String> = jobs
        .keys()
        .map(|k| k.as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "test-linux-1".to_string(),
            "test-linux-2".to_string(),
            "test-mac-1".to_string(),
            "test-mac-2".to_string(),
        ]
    );

    let workflow_jobs = doc["workflows"]["main"]["jobs"].as_sequence().unwrap();
    assert_eq!(workflow_jobs.len(), 4);
}

#[test]
fn structurally_identical_instantiations_dedup_to_one_job() {
    let source = r#"
version: "2.1"
jobs:
  build:
    docker:
      - image: cimg/base:stable
    steps:
      - checkout
workflows:
  a:
    jobs:
      - build
  b:
    jobs:
      - build
"#;
    let doc = compiled_yaml(source);
    assert_eq!(doc["jobs"].as_mapping().unwrap().len(), 1);
    assert_eq!(
        doc["workflows"]["a"]["jobs"][0].as_str(),
        Some("build")
    );
    assert_eq!(
        doc["workflows"]["b"]["jobs"][0].as_str(),
        Some("build")
    );
}

#[test]
fn requires_is_remapped_through_matrix_fan_out() {
    let source = r#"
version: "2.1"
jobs:
  build:
    parameters:
      os:
        type: string
        default: linux
    docker:
      - image: cimg/base:stable
    steps:
      - checkout
  deploy:
    docker:
      - image: cimg/base:stable
    steps:
      - checkout
workflows:
  main:
    jobs:
      - build:
          matrix:
            parameters:
              os: [linux, mac]
      - deploy:
          requires:
            - build
"#;
    let doc = compiled_yaml(source);
    let deploy_entry = doc["workflows"]["main"]["jobs"]
        .as_sequence()
        .unwrap()
        .iter()
        .find(|j| j.as_mapping().map(|m| m.contains_key("deploy")).unwrap_or(false))
        .expect("deploy entry present");
    let requires = deploy_entry["deploy"]["requires"].as_sequence().unwrap();
    let mut names: Vec<&str> = requires.iter().map(|v| v.as_str().unwrap()).collect();
    names.sort();
    assert_eq!(names, vec!["build-linux", "build-mac"]);
}

#[test]
fn approval_jobs_pass_through_at_their_pre_expansion_offset() {
    let source = r#"
version: "2.1"
jobs:
  deploy:
    docker:
      - image: cimg/base:stable
    steps:
      - checkout
workflows:
  main:
    jobs:
      - hold:
          type: approval
      - deploy:
          requires:
            - hold
"#;
    let doc = compiled_yaml(source);
    let jobs = doc["workflows"]["main"]["jobs"].as_sequence().unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs[0]["hold"]["type"].as_str() == Some("approval"));
}

#[test]
fn orb_job_and_command_are_resolved_and_templated() {
    let source = r#"
version: "2.1"
orbs:
  greetings: greetings/greet@1.0.0
jobs:
  build:
    docker:
      - image: cimg/base:stable
    steps:
      - checkout
      - greetings/hello:
          name: circle
workflows:
  main:
    jobs:
      - build
      - greetings/wave
"#;
    let bytes = compile(source.as_bytes(), None, &FakeOrbs).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_slice(&bytes).unwrap();
    let steps = doc["jobs"]["build"]["steps"].as_sequence().unwrap();
    let greet = steps
        .iter()
        .find(|s| s.get("run").is_some() && s["run"]["command"].as_str() == Some("echo hello circle"))
        .expect("orb command expanded with substituted parameter");
    assert!(greet["run"]["command"].as_str().unwrap().contains("circle"));
    assert!(doc["jobs"]["wave"].is_mapping());
}

#[test]
fn undeclared_parameter_reference_is_rejected() {
    let source = r#"
version: "2.1"
jobs:
  build:
    docker:
      - image: cimg/base:stable
    steps:
      - run: echo <<parameters.missing>>
workflows:
  main:
    jobs:
      - build
"#;
    let err = compile(source.as_bytes(), None, &NoOrbs).unwrap_err();
    assert!(matches!(err, CompileError::Aggregate { .. }));
    assert!(err.to_string().contains("step 0"));
}

#[test]
fn missing_required_job_parameter_is_reported() {
    let source = r#"
version: "2.1"
jobs:
  build:
    parameters:
      image:
        type: string
    docker:
      - image: <<parameters.image>>
    steps:
      - checkout
workflows:
  main:
    jobs:
      - build
"#;
    let err = compile(source.as_bytes(), None, &NoOrbs).unwrap_err();
    assert!(err.to_string().contains("missing required parameters"));
}

#[test]
fn requires_an_unknown_job_is_rejected() {
    let source = r#"
version: "2.1"
jobs:
  build:
    docker:
      - image: cimg/base:stable
    steps:
      - checkout
workflows:
  main:
    jobs:
      - build:
          requires:
            - nonexistent
"#;
    let err = compile(source.as_bytes(), None, &NoOrbs).unwrap_err();
    assert!(err.to_string().contains("nonexistent"));
}

#[test]
fn unquoted_version_scalar_is_accepted() {
    let source = r#"
version: 2.1
jobs:
  build:
    docker:
      - image: cimg/base:stable
    steps:
      - checkout
workflows:
  main:
    jobs:
      - build
"#;
    let doc = compiled_yaml(source);
    assert_eq!(doc["version"].as_i64(), Some(2));
}

#[test]
fn workflow_with_false_when_condition_is_skipped_entirely() {
    let source = r#"
version: "2.1"
jobs:
  build:
    docker:
      - image: cimg/base:stable
    steps:
      - checkout
workflows:
  main:
    when: false
    jobs:
      - build
"#;
    let doc = compiled_yaml(source);
    assert!(doc["workflows"].as_mapping().unwrap().is_empty());
    assert!(doc["jobs"].as_mapping().unwrap().is_empty());
}
