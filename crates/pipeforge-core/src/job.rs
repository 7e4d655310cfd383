//! Job definitions (spec §3 `Job`).

use crate::executor::{Executor, JobExecutor};
use crate::environment::Environment;
use crate::parameters::Parameters;
use crate::step::Step;
use serde::{Deserialize, Serialize};

/// A job definition as it appears under the root `jobs:` map or inside an
/// orb. `name` is not part of the source shape — it is assigned during
/// compilation once the job is instantiated under a workflow.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct Job {
    #[serde(default, skip_serializing_if = "Environment::is_empty")]
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism: Option<u32>,
    #[serde(default, skip_serializing_if = "Parameters::is_empty")]
    pub parameters: Parameters,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "JobExecutor::is_empty")]
    pub executor: JobExecutor,
    #[serde(flatten, skip_serializing_if = "Executor::is_empty")]
    pub inline_executor: Executor,
    #[serde(skip)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_job() {
        let job: Job = serde_yaml::from_str("docker:\n  - image: cimg/base\nsteps:\n  - checkout").unwrap();
        assert_eq!(job.steps.len(), 1);
        assert_eq!(job.inline_executor.docker.len(), 1);
    }
}
