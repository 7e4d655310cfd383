//! pipeforge-core: compiles a CircleCI-dialect pipeline config (parameters,
//! reusable commands/jobs/executors, conditionals, matrices, orbs) down to a
//! flat, low-level pipeline description.

pub mod compiler;
pub mod condition;
pub mod config;
pub mod defaults;
pub mod environment;
pub mod errors;
pub mod executor;
pub mod job;
pub mod matrix;
pub mod orb;
pub mod parameters;
pub mod raw;
pub mod step;
pub mod template;
pub mod validate;
pub mod value;
pub mod workflow;

pub use compiler::Compiler;
pub use config::{CompiledConfig, Config};
pub use errors::{CompileError, Result};
pub use orb::OrbSource;
pub use validate::validate;

/// Compile `source` against an orb-source collaborator and optional
/// pipeline parameter values, returning the normalized output YAML.
///
/// A convenience wrapper over [`Compiler`] for callers that have no need to
/// reuse a `Compiler` across invocations (spec §9's "implementers may make
/// Compile a free function").
pub fn compile(
    source: &[u8],
    pipeline_params: Option<serde_json::Value>,
    orb_source: &dyn OrbSource,
) -> Result<Vec<u8>> {
    Compiler::new(orb_source).compile(source, pipeline_params)
}
