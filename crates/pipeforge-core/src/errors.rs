//! Structured compile errors and the indented error-tree aggregator (spec §4.10, §7).
//!
//! Two flavors of aggregate exist: `ordered` keeps children in the order they were
//! collected, `sorted` stable-sorts children by their rendered message before
//! emission. Both render as `message` followed by each child indented two spaces
//! further per nesting level, so nested aggregates cumulate indentation.

use thiserror::Error;

/// All error kinds produced by the compiler (spec §7).
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid source: {0}")]
    InvalidSource(#[from] serde_yaml::Error),

    #[error("type mismatch for param {name}: wanted {want} but got {got}")]
    ParamTypeMismatch {
        name: String,
        want: String,
        got: String,
    },

    #[error(
        "enum mismatch for param {name}: wanted one of ({}) but got {value}",
        targets.join(", ")
    )]
    ParamEnumMismatch {
        name: String,
        targets: Vec<String>,
        value: String,
    },

    #[error("missing required parameters: {}", .0.join(", "))]
    MissingParams(Vec<String>),

    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    #[error(
        "argument(s) referenced in template but not declared: {}",
        .0.join(", ")
    )]
    UndeclaredReference(Vec<String>),

    #[error("failed to get orb: {0}")]
    OrbFetchFailed(String),

    #[error("failed to parse orb {name}: {source}")]
    OrbParseFailed {
        name: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{kind} {reference} not found")]
    RefNotFound { kind: &'static str, reference: String },

    #[error("{0}")]
    StepValidation(String),

    #[error("only one of [and, or, equal, not, matches] can be defined")]
    ConditionShape,

    #[error("invalid pattern: {pattern} - {source}")]
    RegexCompile {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("steps are required but got none")]
    EmptySteps,

    #[error("job {job} cannot require {requires}: no job named {requires} in workflow")]
    RequiresUnknownJob { job: String, requires: String },

    #[error("{0}")]
    MatrixShape(String),

    #[error("internal template error: {0}")]
    InternalTemplate(String),

    #[error("{0}")]
    Other(String),

    #[error("{}", render_aggregate(message, children, *sorted))]
    Aggregate {
        message: String,
        children: Vec<CompileError>,
        sorted: bool,
    },
}

impl CompileError {
    /// Build an ordered aggregate (insertion order preserved).
    pub fn ordered(message: impl Into<String>, children: Vec<CompileError>) -> Self {
        CompileError::Aggregate {
            message: message.into(),
            children,
            sorted: false,
        }
    }

    /// Build a sorted aggregate (children stable-sorted by rendered message).
    pub fn sorted(message: impl Into<String>, children: Vec<CompileError>) -> Self {
        CompileError::Aggregate {
            message: message.into(),
            children,
            sorted: true,
        }
    }

    /// `true` for an aggregate with no children — callers use this to avoid
    /// emitting an empty error tree.
    pub fn is_empty_aggregate(&self) -> bool {
        matches!(self, CompileError::Aggregate { children, .. } if children.is_empty())
    }
}

fn render_aggregate(message: &str, children: &[CompileError], sorted: bool) -> String {
    let mut rendered: Vec<String> = children.iter().map(|c| c.to_string()).collect();
    if sorted {
        rendered.sort();
    }

    let mut out = String::from(message);
    for child in rendered {
        for (i, line) in child.lines().enumerate() {
            out.push('\n');
            out.push_str(if i == 0 { "  - " } else { "    " });
            out.push_str(line);
        }
    }
    out
}

pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_preserves_insertion_order() {
        let err = CompileError::ordered(
            "could not compile step(s):",
            vec![
                CompileError::Other("step 1: b".into()),
                CompileError::Other("step 0: a".into()),
            ],
        );
        let rendered = err.to_string();
        let b_pos = rendered.find("step 1: b").unwrap();
        let a_pos = rendered.find("step 0: a").unwrap();
        assert!(b_pos < a_pos);
    }

    #[test]
    fn sorted_orders_by_rendered_message() {
        let err = CompileError::sorted(
            "pipeline parameter error(s):",
            vec![
                CompileError::Other("zzz".into()),
                CompileError::Other("aaa".into()),
            ],
        );
        let rendered = err.to_string();
        let a_pos = rendered.find("aaa").unwrap();
        let z_pos = rendered.find("zzz").unwrap();
        assert!(a_pos < z_pos);
    }

    #[test]
    fn nesting_cumulates_indentation() {
        let inner = CompileError::ordered("inner:", vec![CompileError::Other("leaf".into())]);
        let outer = CompileError::ordered("outer:", vec![inner]);
        let rendered = outer.to_string();
        assert_eq!(rendered, "outer:\n  - inner:\n    - leaf");
    }
}
