//! Orb resolution: a fetched orb's job/command/executor namespace, and
//! orb-qualified reference lookup (spec §3 `Orb`, §4.5).

use crate::errors::CompileError;
use crate::raw::RawNode;
use serde::Deserialize;
use std::collections::HashMap;

/// A parsed orb: mappings from local name to a retained raw subtree,
/// decoded lazily by the job instantiator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Orb {
    #[serde(default)]
    pub jobs: HashMap<String, RawNode>,
    #[serde(default)]
    pub commands: HashMap<String, RawNode>,
    #[serde(default)]
    pub executors: HashMap<String, RawNode>,
}

/// An external collaborator that fetches an orb's YAML source text given
/// its reference (spec §4.5, §6). The `{{`/`}}` → `<<`/`>>` rewrite and
/// YAML parsing are the core's responsibility, not the collaborator's.
pub trait OrbSource {
    fn fetch(&self, reference: &str) -> Result<String, CompileError>;
}

/// Rewrite literal `{{`/`}}` to `<<`/`>>` in fetched orb source, so the
/// template engine's own delimiters don't collide with content an orb
/// author wrote using the other style (spec §4.5).
pub fn rewrite_orb_delimiters(source: &str) -> String {
    source.replace("{{", "<<").replace("}}", ">>")
}

pub fn parse_orb(name: &str, source: &str) -> Result<Orb, CompileError> {
    serde_yaml::from_str(source).map_err(|e| CompileError::OrbParseFailed {
        name: name.to_string(),
        source: e,
    })
}

/// The orbs resolved for one compilation, keyed by the namespace used in
/// the source (e.g. `circleci` in `circleci/node@1`).
#[derive(Debug, Clone, Default)]
pub struct Orbs(pub HashMap<String, Orb>);

impl Orbs {
    /// Split `"orb/name"` into `(orb, name)`; `None` if there is no `/`.
    fn split_ref(reference: &str) -> Option<(&str, &str)> {
        reference.split_once('/')
    }

    pub fn get_job_node(&self, reference: &str) -> Result<&RawNode, CompileError> {
        let (orb, name) = Self::split_ref(reference).ok_or_else(|| CompileError::RefNotFound {
            kind: "job",
            reference: reference.to_string(),
        })?;
        self.0
            .get(orb)
            .and_then(|o| o.jobs.get(name))
            .ok_or_else(|| CompileError::RefNotFound {
                kind: "job",
                reference: reference.to_string(),
            })
    }

    pub fn get_executor_node(&self, reference: &str) -> Result<&RawNode, CompileError> {
        let (orb, name) = Self::split_ref(reference).ok_or_else(|| CompileError::RefNotFound {
            kind: "executor",
            reference: reference.to_string(),
        })?;
        self.0
            .get(orb)
            .and_then(|o| o.executors.get(name))
            .ok_or_else(|| CompileError::RefNotFound {
                kind: "executor",
                reference: reference.to_string(),
            })
    }

    /// Resolve a command reference under a lexical orb context: if
    /// `reference` itself carries a namespace, that wins; otherwise fall
    /// back to `orb_ctx`. Returns the node plus the orb namespace that
    /// should become the new context for steps expanded from it (spec
    /// §4.5).
    pub fn get_command_node<'a>(
        &'a self,
        orb_ctx: Option<&str>,
        reference: &'a str,
    ) -> Result<(&'a RawNode, Option<String>), CompileError> {
        let (orb, name) = match Self::split_ref(reference) {
            Some((orb, name)) => (orb, name),
            None => {
                let orb = orb_ctx.ok_or_else(|| CompileError::RefNotFound {
                    kind: "command",
                    reference: reference.to_string(),
                })?;
                (orb, reference)
            }
        };
        let node = self
            .0
            .get(orb)
            .and_then(|o| o.commands.get(name))
            .ok_or_else(|| CompileError::RefNotFound {
                kind: "command",
                reference: reference.to_string(),
            })?;
        Ok((node, Some(orb.to_string())))
    }
}
