//! Two-phase template engine over `<<parameters.X>>` / `<<pipeline.X…>>`
//! expressions (spec §4.2).
//!
//! Delimiters are rewritten to handlebars' `{{…}}` and rendered through
//! `handlebars`. The registry disables HTML escaping (`no_escape`) since
//! the rendered text is YAML, not HTML — this is how the "safe string"
//! requirement for `steps`/`executor` values (spec §9) is satisfied: there
//! is no escaping pass to route around in the first place.

use crate::errors::CompileError;
use crate::raw::RawNode;
use handlebars::Handlebars;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::OnceLock;

fn param_expr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<<(\s*parameters\.[\w-]+)\s*>>").unwrap())
}

fn pipeline_expr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<<\s*pipeline\.[\w-]+(\.[\w-]+)*\s*>>").unwrap())
}

fn to_handlebars(source: &str, expr: &Regex) -> String {
    expr.replace_all(source, |caps: &regex::Captures| {
        let m = caps.get(0).unwrap().as_str();
        let mut bytes = m.as_bytes().to_vec();
        let len = bytes.len();
        bytes[0] = b'{';
        bytes[1] = b'{';
        bytes[len - 2] = b'}';
        bytes[len - 1] = b'}';
        String::from_utf8(bytes).unwrap()
    })
    .into_owned()
}

fn extract_param_paths(source: &str) -> Vec<String> {
    param_expr()
        .captures_iter(source)
        .map(|c| c.get(1).unwrap().as_str().trim().to_string())
        .collect()
}

fn extract_pipeline_paths(source: &str) -> Vec<String> {
    pipeline_expr()
        .find_iter(source)
        .map(|m| {
            m.as_str()
                .trim_start_matches("<<")
                .trim_end_matches(">>")
                .trim()
                .to_string()
        })
        .collect()
}

fn path_resolvable(scope: &serde_json::Value, path: &str) -> bool {
    let mut cur = scope;
    for part in path.split('.') {
        match cur.as_object().and_then(|m| m.get(part)) {
            Some(v) => cur = v,
            None => return false,
        }
    }
    true
}

/// Paths not resolvable against `scope`, sorted and deduplicated (spec
/// §4.2 "undeclared-reference diagnostics").
fn undeclared(paths: Vec<String>, scope: &serde_json::Value) -> Vec<String> {
    let mut missing: Vec<String> = paths
        .into_iter()
        .filter(|p| !path_resolvable(scope, p))
        .collect();
    missing.sort();
    missing.dedup();
    missing
}

fn render(source: &str, scope: &serde_json::Value) -> Result<String, CompileError> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .render_template(source, scope)
        .map_err(|e| CompileError::InternalTemplate(e.to_string()))
}

/// Apply `<<parameters.X>>` substitution over `node` using `params` (spec
/// §4.2). Used per job/executor/command instantiation.
pub fn apply_params<T: DeserializeOwned>(
    node: &RawNode,
    params: &HashMap<String, serde_json::Value>,
) -> Result<T, CompileError> {
    let source = serde_yaml::to_string(&node.0)?;
    let scope = serde_json::json!({ "parameters": params });

    let missing = undeclared(extract_param_paths(&source), &scope);
    if !missing.is_empty() {
        return Err(CompileError::UndeclaredReference(missing));
    }

    let rendered = render(&to_handlebars(&source, param_expr()), &scope)?;
    Ok(serde_yaml::from_str(&rendered)?)
}

/// Apply `<<pipeline.X…>>` substitution over `node` using `pipeline_values`
/// (spec §4.2). Run once, over the whole document, before orb fetching.
pub fn apply_pipeline_params<T: DeserializeOwned>(
    node: &RawNode,
    pipeline_values: &HashMap<String, serde_json::Value>,
) -> Result<T, CompileError> {
    let source = serde_yaml::to_string(&node.0)?;
    let scope = serde_json::json!({ "pipeline": pipeline_values });

    let missing = undeclared(extract_pipeline_paths(&source), &scope);
    if !missing.is_empty() {
        return Err(CompileError::UndeclaredReference(missing));
    }

    let rendered = render(&to_handlebars(&source, pipeline_expr()), &scope)?;
    Ok(serde_yaml::from_str(&rendered)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(yaml: &str) -> RawNode {
        RawNode(serde_yaml::from_str(yaml).unwrap())
    }

    #[test]
    fn rewrites_param_delimiters_only() {
        let source = "run: build-<<parameters.os>> << pipeline.number >>";
        let rewritten = to_handlebars(source, param_expr());
        assert_eq!(rewritten, "run: build-{{parameters.os}} << pipeline.number >>");
    }

    #[test]
    fn apply_params_substitutes_scalar() {
        let n = node("run: build-<<parameters.os>>");
        let mut params = HashMap::new();
        params.insert("os".to_string(), serde_json::json!("linux"));
        let rendered: serde_yaml::Value = apply_params(&n, &params).unwrap();
        assert_eq!(
            rendered.get("run").unwrap().as_str().unwrap(),
            "build-linux"
        );
    }

    #[test]
    fn apply_params_reports_undeclared_reference() {
        let n = node("run: build-<<parameters.missing>>");
        let params = HashMap::new();
        let err = apply_params::<serde_yaml::Value>(&n, &params).unwrap_err();
        match err {
            CompileError::UndeclaredReference(paths) => {
                assert_eq!(paths, vec!["parameters.missing".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn apply_pipeline_params_handles_nested_path() {
        let n = node("run: <<pipeline.git.branch>>");
        let mut pipeline = HashMap::new();
        pipeline.insert(
            "git".to_string(),
            serde_json::json!({ "branch": "main" }),
        );
        let rendered: serde_yaml::Value = apply_pipeline_params(&n, &pipeline).unwrap();
        assert_eq!(rendered.get("run").unwrap().as_str().unwrap(), "main");
    }

    #[test]
    fn non_template_expressions_pass_through() {
        let n = node("run: '<<custom.thing>>'");
        let params = HashMap::new();
        let rendered: serde_yaml::Value = apply_params(&n, &params).unwrap();
        assert_eq!(rendered.get("run").unwrap().as_str().unwrap(), "<<custom.thing>>");
    }
}
