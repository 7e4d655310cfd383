//! The compilation pipeline: pipeline-parameter substitution, orb
//! resolution, matrix fan-out, job instantiation, and workflow assembly
//! (spec §4.6, §4.7, §4.8).

use crate::config::{Command, CompiledConfig, Config};
use crate::condition::Condition;
use crate::defaults::ConfigValues;
use crate::errors::CompileError;
use crate::executor::{Executor, JobExecutor};
use crate::job::Job;
use crate::matrix::{self, Kv};
use crate::orb::{self, Orbs, OrbSource};
use crate::parameters::{join_defaults, validate_parameters, ParamValues, Parameters};
use crate::raw::RawNode;
use crate::template::{apply_params, apply_pipeline_params};
use crate::value::ParamValue;
use crate::workflow::{Filters, Workflow, WorkflowJob};
use std::collections::HashMap;

/// Per-invocation compiler state lives entirely on the stack of
/// [`Compiler::compile`]; the struct itself only carries the orb-source
/// collaborator, so a `Compiler` is trivially shareable across concurrent
/// calls (spec §5).
pub struct Compiler<'a> {
    orb_source: &'a dyn OrbSource,
}

struct MatrixJobInstance {
    matrix_values: Vec<Kv>,
    job: Job,
}

struct PendingWfJob {
    requires: Vec<String>,
    context: Vec<String>,
    filters: Filters,
    job_id: String,
    job_index: usize,
}

struct PendingApproval {
    offset: usize,
    workflow_job: WorkflowJob,
}

fn parameters_from_node(node: &RawNode) -> Result<Parameters, CompileError> {
    #[derive(serde::Deserialize, Default)]
    struct Wrap {
        #[serde(default)]
        parameters: Parameters,
    }
    let wrap: Wrap = node.decode()?;
    Ok(wrap.parameters)
}

/// Extract the `parameters` sub-map from the externally supplied
/// pipeline-params value. Any shape other than `{parameters: {...}}` (or
/// absence of the key) is rejected (spec §6).
fn pipeline_param_values(pipeline_params: Option<&serde_json::Value>) -> Result<ParamValues, CompileError> {
    let Some(outer) = pipeline_params else {
        return Ok(ParamValues::default());
    };
    let Some(params_value) = outer.get("parameters") else {
        return Ok(ParamValues::default());
    };
    if !params_value.is_object() && !params_value.is_null() {
        return Err(CompileError::Other(
            "parameters key must have a map value".into(),
        ));
    }
    let yaml_value = serde_yaml::to_value(params_value)?;
    Ok(ParamValues::from_mapping_excluding(&yaml_value, &[])?)
}

fn render_scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
    }
}

fn matrix_suffix(values: &[Kv]) -> String {
    values
        .iter()
        .map(|kv| render_scalar(&kv.value))
        .collect::<Vec<_>>()
        .join("-")
}

fn workflow_job_entry(
    name: &str,
    requires: &[String],
    context: &[String],
    filters: &Filters,
) -> serde_yaml::Value {
    if requires.is_empty() && context.is_empty() && filters.is_empty() {
        return serde_yaml::Value::String(name.to_string());
    }
    let mut body = serde_yaml::Mapping::new();
    if !requires.is_empty() {
        body.insert(
            "requires".into(),
            serde_yaml::to_value(requires).unwrap_or_default(),
        );
    }
    if !context.is_empty() {
        body.insert(
            "context".into(),
            serde_yaml::to_value(context).unwrap_or_default(),
        );
    }
    if !filters.is_empty() {
        body.insert(
            "filters".into(),
            serde_yaml::to_value(filters).unwrap_or_default(),
        );
    }
    let mut outer = serde_yaml::Mapping::new();
    outer.insert(name.into(), serde_yaml::Value::Mapping(body));
    serde_yaml::Value::Mapping(outer)
}

impl<'a> Compiler<'a> {
    pub fn new(orb_source: &'a dyn OrbSource) -> Self {
        Compiler { orb_source }
    }

    /// Compile a source document, returning the normalized output YAML
    /// (spec §6 `Compile`).
    pub fn compile(
        &self,
        source: &[u8],
        pipeline_params: Option<serde_json::Value>,
    ) -> Result<Vec<u8>, CompileError> {
        let text = std::str::from_utf8(source)
            .map_err(|e| CompileError::Other(format!("invalid source: {e}")))?;
        let root_value: serde_yaml::Value = serde_yaml::from_str(text)?;
        let root_node = RawNode(root_value);

        let declared_pipeline_params = parameters_from_node(&root_node)?;
        let provided_pipeline_params = pipeline_param_values(pipeline_params.as_ref())?;

        let param_errors = validate_parameters(&declared_pipeline_params, &provided_pipeline_params);
        if !param_errors.is_empty() {
            return Err(CompileError::sorted("pipeline parameter error(s):", param_errors));
        }

        let joined_params = join_defaults(&declared_pipeline_params, &provided_pipeline_params);
        let mut pipeline_scope = ConfigValues::default().as_map();
        pipeline_scope.insert(
            "parameters".to_string(),
            serde_json::Value::Object(joined_params.into_iter().collect()),
        );
        let pipeline_scope: HashMap<String, serde_json::Value> = pipeline_scope.into_iter().collect();

        let substituted: RawNode = apply_pipeline_params(&root_node, &pipeline_scope)?;
        let root: Config = substituted.decode()?;

        let mut orb_names: Vec<&String> = root.orbs.keys().collect();
        orb_names.sort();

        let mut orbs_map = HashMap::new();
        for name in orb_names {
            let reference = &root.orbs[name];
            let source = self
                .orb_source
                .fetch(reference)
                .map_err(|_| CompileError::OrbFetchFailed(reference.clone()))?;
            let rewritten = orb::rewrite_orb_delimiters(&source);
            let parsed = orb::parse_orb(name, &rewritten)?;
            orbs_map.insert(name.clone(), parsed);
        }
        let orbs = Orbs(orbs_map);

        let mut jobs_state: HashMap<String, Vec<MatrixJobInstance>> = HashMap::new();
        let mut workflows_state: HashMap<String, Vec<PendingWfJob>> = HashMap::new();
        let mut approvals_state: HashMap<String, Vec<PendingApproval>> = HashMap::new();

        let mut workflow_names: Vec<&String> = root.workflows.keys().collect();
        workflow_names.sort();

        for name in workflow_names {
            let node = &root.workflows[name];
            let workflow: Workflow = node.decode()?;
            if !Condition::evaluate(workflow.when.as_ref())? {
                continue;
            }
            self.process_workflow(
                &root,
                &orbs,
                name,
                &workflow,
                &mut jobs_state,
                &mut workflows_state,
                &mut approvals_state,
            )
            .map_err(|e| CompileError::Other(format!("error processing workflow {name}: {e}")))?;
        }

        let compiled = assemble(jobs_state, workflows_state, approvals_state)?;
        Ok(serde_yaml::to_string(&compiled)?.into_bytes())
    }

    fn process_workflow(
        &self,
        root: &Config,
        orbs: &Orbs,
        workflow_name: &str,
        workflow: &Workflow,
        jobs_state: &mut HashMap<String, Vec<MatrixJobInstance>>,
        workflows_state: &mut HashMap<String, Vec<PendingWfJob>>,
        approvals_state: &mut HashMap<String, Vec<PendingApproval>>,
    ) -> Result<(), CompileError> {
        let known_identifiers: Vec<String> = workflow
            .jobs
            .iter()
            .map(|wj| wj.identifier().to_string())
            .collect();

        for (i, wj) in workflow.jobs.iter().enumerate() {
            if wj.is_approval {
                approvals_state
                    .entry(workflow_name.to_string())
                    .or_default()
                    .push(PendingApproval {
                        offset: i,
                        workflow_job: wj.clone(),
                    });
                continue;
            }

            let job_node = resolve_job_node(root, orbs, &wj.key)?;
            let rows = matrix::expand(&wj.matrix.parameters);

            for row in rows {
                let (job_id, job_index) =
                    self.process_job(root, orbs, wj, &row, job_node, jobs_state)?;
                workflows_state
                    .entry(workflow_name.to_string())
                    .or_default()
                    .push(PendingWfJob {
                        requires: wj.requires.clone(),
                        context: wj.context.clone(),
                        filters: wj.filters.clone(),
                        job_id,
                        job_index,
                    });
            }
        }

        let entries: Vec<(String, Vec<String>)> = workflow
            .jobs
            .iter()
            .map(|wj| (wj.identifier().to_string(), wj.requires.clone()))
            .collect();
        crate::workflow::validate_requires(workflow_name, &known_identifiers, &entries)
    }

    fn process_job(
        &self,
        root: &Config,
        orbs: &Orbs,
        wj: &WorkflowJob,
        matrix_row: &[Kv],
        job_node: &RawNode,
        jobs_state: &mut HashMap<String, Vec<MatrixJobInstance>>,
    ) -> Result<(String, usize), CompileError> {
        let declared = parameters_from_node(job_node)?;

        let provided = if matrix_row.is_empty() {
            wj.params.clone()
        } else {
            let mut values = HashMap::new();
            for kv in matrix_row {
                values.insert(kv.key.clone(), ParamValue::from_yaml(&kv.value)?);
            }
            for (k, v) in &wj.params.values {
                values.insert(k.clone(), v.clone());
            }
            ParamValues { values }
        };

        let errors = validate_parameters(&declared, &provided);
        if !errors.is_empty() {
            return Err(CompileError::sorted(
                format!("parameter error(s) for job {}:", wj.key),
                errors,
            ));
        }

        let joined = join_defaults(&declared, &provided);
        let mut job: Job = apply_params(job_node, &joined)?;

        if !job.executor.name.is_empty() {
            let executor_node = resolve_executor_node(root, orbs, &job.executor.name)?;
            let ex_declared = parameters_from_node(executor_node)?;
            let ex_joined = join_defaults(&ex_declared, &job.executor.param_values);
            let inline: Executor = apply_params(executor_node, &ex_joined)?;
            job.inline_executor = inline;
        }

        let mut steps = Vec::with_capacity(wj.pre_steps.len() + job.steps.len() + wj.post_steps.len());
        steps.extend(wj.pre_steps.iter().cloned());
        steps.extend(job.steps.iter().cloned());
        steps.extend(wj.post_steps.iter().cloned());

        job.steps = self.expand_multi_step(root, orbs, None, &steps)?;
        if job.steps.is_empty() {
            return Err(CompileError::EmptySteps);
        }

        let job_id = wj.identifier().to_string();
        let slot = jobs_state.entry(job_id.clone()).or_default();
        let job_index = match slot.iter().position(|existing| existing.job == job) {
            Some(idx) => idx,
            None => {
                slot.push(MatrixJobInstance {
                    matrix_values: matrix_row.to_vec(),
                    job,
                });
                slot.len() - 1
            }
        };

        Ok((job_id, job_index))
    }

    fn expand_multi_step(
        &self,
        root: &Config,
        orbs: &Orbs,
        orb_ctx: Option<&str>,
        steps: &[crate::step::Step],
    ) -> Result<Vec<crate::step::Step>, CompileError> {
        let mut result = Vec::new();
        let mut errors = Vec::new();

        for (i, step) in steps.iter().enumerate() {
            match self.expand_step(root, orbs, orb_ctx, step) {
                Ok(mut expanded) => result.append(&mut expanded),
                Err(e) => errors.push(CompileError::Other(format!(
                    "step {i}: {}: {e}",
                    step.type_name()
                ))),
            }
        }

        if !errors.is_empty() {
            return Err(CompileError::ordered("could not compile step(s):", errors));
        }
        Ok(result)
    }

    fn expand_step(
        &self,
        root: &Config,
        orbs: &Orbs,
        orb_ctx: Option<&str>,
        step: &crate::step::Step,
    ) -> Result<Vec<crate::step::Step>, CompileError> {
        use crate::step::Step;

        match step {
            Step::When(cs) => {
                if Condition::evaluate(Some(&cs.condition))? {
                    self.expand_multi_step(root, orbs, orb_ctx, &cs.steps)
                } else {
                    Ok(Vec::new())
                }
            }
            Step::Unless(cs) => {
                if !Condition::evaluate(Some(&cs.condition))? {
                    self.expand_multi_step(root, orbs, orb_ctx, &cs.steps)
                } else {
                    Ok(Vec::new())
                }
            }
            Step::Command { type_name, params } => {
                let (node, new_ctx) = match root.commands.get(type_name) {
                    Some(n) => (n, orb_ctx.map(str::to_string)),
                    None => orbs.get_command_node(orb_ctx, type_name)?,
                };

                let declared = parameters_from_node(node)?;
                let errors = validate_parameters(&declared, params);
                if !errors.is_empty() {
                    return Err(CompileError::sorted(
                        format!("parameter error(s) invoking command {type_name}:"),
                        errors,
                    ));
                }

                let joined = join_defaults(&declared, params);
                let command: Command = apply_params(node, &joined)?;
                self.expand_multi_step(root, orbs, new_ctx.as_deref(), &command.steps)
            }
            builtin => Ok(vec![builtin.clone()]),
        }
    }
}

fn resolve_job_node<'b>(root: &'b Config, orbs: &'b Orbs, key: &str) -> Result<&'b RawNode, CompileError> {
    if let Some(node) = root.jobs.get(key) {
        return Ok(node);
    }
    orbs.get_job_node(key)
}

fn resolve_executor_node<'b>(
    root: &'b Config,
    orbs: &'b Orbs,
    name: &str,
) -> Result<&'b RawNode, CompileError> {
    if let Some(node) = root.executors.get(name) {
        return Ok(node);
    }
    orbs.get_executor_node(name)
}

fn assemble(
    jobs_state: HashMap<String, Vec<MatrixJobInstance>>,
    workflows_state: HashMap<String, Vec<PendingWfJob>>,
    approvals_state: HashMap<String, Vec<PendingApproval>>,
) -> Result<CompiledConfig, CompileError> {
    let mut compiled = CompiledConfig::new();
    let mut emitted_names: HashMap<String, Vec<String>> = HashMap::new();

    let mut job_ids: Vec<&String> = jobs_state.keys().collect();
    job_ids.sort();

    for id in job_ids {
        let instances = &jobs_state[id];
        let total = instances.len();
        let mut names = Vec::with_capacity(total);

        for (i, instance) in instances.iter().enumerate() {
            let suffix = matrix_suffix(&instance.matrix_values);
            let name = if !suffix.is_empty() {
                format!("{id}-{suffix}")
            } else if total == 1 {
                id.clone()
            } else {
                format!("{id}-{}", i + 1)
            };

            let mut job = instance.job.clone();
            job.name = name.clone();
            job.parameters = Parameters::new();
            job.executor = JobExecutor::default();

            compiled.jobs.insert(
                serde_yaml::Value::String(name.clone()),
                serde_yaml::to_value(&job)?,
            );
            names.push(name);
        }

        emitted_names.insert(id.clone(), names);
    }

    let mut workflow_names: Vec<&String> = workflows_state.keys().collect();
    workflow_names.sort();

    for wf_name in workflow_names {
        let pending = &workflows_state[wf_name];
        let mut job_entries: Vec<serde_yaml::Value> = Vec::with_capacity(pending.len());

        for p in pending {
            let names = emitted_names.get(&p.job_id).cloned().unwrap_or_default();
            let this_name = names
                .get(p.job_index)
                .cloned()
                .unwrap_or_else(|| p.job_id.clone());
            let requires: Vec<String> = p
                .requires
                .iter()
                .flat_map(|r| {
                    emitted_names
                        .get(r)
                        .cloned()
                        .unwrap_or_else(|| vec![r.clone()])
                })
                .collect();
            job_entries.push(workflow_job_entry(&this_name, &requires, &p.context, &p.filters));
        }

        if let Some(approvals) = approvals_state.get(wf_name) {
            for (i, approval) in approvals.iter().enumerate() {
                let idx = (approval.offset + i).min(job_entries.len());
                job_entries.insert(idx, serde_yaml::to_value(&approval.workflow_job)?);
            }
        }

        let mut wf_map = serde_yaml::Mapping::new();
        wf_map.insert(
            "jobs".into(),
            serde_yaml::Value::Sequence(job_entries),
        );
        compiled.workflows.insert(
            serde_yaml::Value::String(wf_name.clone()),
            serde_yaml::Value::Mapping(wf_map),
        );
    }

    Ok(compiled)
}
