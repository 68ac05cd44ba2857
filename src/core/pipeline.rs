//! Pipeline graph assembly.
//!
//! Builds the fixed two-stage topology: a source stage that listens for
//! repository changes, then a build stage whose executor carries the
//! resolved role policy. Every name is derived from the pipeline name.

use std::collections::BTreeMap;

use tracing::{info, instrument};

use crate::domain::artifact::Artifact;
use crate::domain::graph::{
    Action, BuildExecutor, EnvironmentVariable, Executor, LocalCacheMode, PipelineGraph,
    SourceTrigger, Stage, StageKind, TriggerMode, VariableType,
};
use crate::domain::params::Parameters;
use crate::domain::policy::PolicyStatement;
use crate::domain::reference::{LateBound, Token};

use super::binder::BoundResources;
use super::error::Result;

pub const PIPELINE_LOGICAL_ID: &str = "CodePipeline";
pub const BUILD_PROJECT_LOGICAL_ID: &str = "CodeBuild";
pub const SOURCE_ACTION_NAME: &str = "CodeCommitSourceAction";
pub const BUILD_ACTION_NAME: &str = "CodeBuildBuildAction";

/// Branch the source trigger listens on
pub const SOURCE_BRANCH: &str = "master";

pub const REGION_VARIABLE: &str = "AWS_DEFAULT_REGION";
pub const ACCOUNT_VARIABLE: &str = "AWS_ACCOUNT_ID";

fn source_stage(resources: &BoundResources, output: &Artifact) -> Stage {
    let action = Action {
        name: SOURCE_ACTION_NAME.to_string(),
        inputs: Vec::new(),
        outputs: vec![output.clone()],
        executor: Executor::SourceTrigger(SourceTrigger {
            repository: resources.repository.clone(),
            branch: SOURCE_BRANCH.to_string(),
            trigger: TriggerMode::Events,
        }),
    };

    Stage {
        name: StageKind::Source.name().to_string(),
        kind: StageKind::Source,
        actions: vec![action],
    }
}

fn build_executor(params: &Parameters, role_policy: Vec<PolicyStatement>) -> BuildExecutor {
    let plaintext = |token| EnvironmentVariable {
        var_type: VariableType::Plaintext,
        value: LateBound::token(token),
    };

    let environment = BTreeMap::from([
        (REGION_VARIABLE.to_string(), plaintext(Token::Region)),
        (ACCOUNT_VARIABLE.to_string(), plaintext(Token::Account)),
    ]);

    BuildExecutor {
        logical_id: BUILD_PROJECT_LOGICAL_ID.to_string(),
        project_name: params.pipeline_name.build_project_name(),
        privileged: true,
        check_secrets_in_plaintext_env: true,
        cache: vec![LocalCacheMode::DockerLayer, LocalCacheMode::Custom],
        environment,
        role_policy,
    }
}

fn build_stage(executor: BuildExecutor, input: &Artifact, output: &Artifact) -> Stage {
    let action = Action {
        name: BUILD_ACTION_NAME.to_string(),
        inputs: vec![input.clone()],
        outputs: vec![output.clone()],
        executor: Executor::Build(executor),
    };

    Stage {
        name: StageKind::Build.name().to_string(),
        kind: StageKind::Build,
        actions: vec![action],
    }
}

/// Wire stages, artifacts and the build executor into a graph
#[instrument(skip_all, fields(pipeline = %params.pipeline_name))]
pub fn assemble_graph(
    params: &Parameters,
    resources: BoundResources,
    role_policy: Vec<PolicyStatement>,
) -> Result<PipelineGraph> {
    let source_artifact = Artifact::source();
    let build_artifact = Artifact::build();

    let executor = build_executor(params, role_policy);
    let stages = vec![
        source_stage(&resources, &source_artifact),
        build_stage(executor, &source_artifact, &build_artifact),
    ];

    let graph = PipelineGraph {
        logical_id: PIPELINE_LOGICAL_ID.to_string(),
        name: params.pipeline_name.full_name(),
        cross_account_keys: false,
        repository: resources.repository,
        registry: resources.registry,
        stages,
    };

    graph.check_topology()?;
    info!(name = %graph.name, stages = graph.stages.len(), "Assembled pipeline graph");
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binder::{bind_resources, NamedRepositoryProvider};
    use crate::core::error::AssemblyError;
    use crate::core::templates::{resolve_policies, BuiltinTemplates};
    use crate::domain::params::RawParameters;

    fn graph() -> PipelineGraph {
        let params = RawParameters::new("demo", "svc-repo", "svc/img")
            .validate()
            .unwrap();
        let resources = bind_resources(&NamedRepositoryProvider, &params).unwrap();
        let policy = resolve_policies(&BuiltinTemplates, &resources.registry).unwrap();
        assemble_graph(&params, resources, policy).unwrap()
    }

    #[test]
    fn test_stage_order() {
        let graph = graph();
        let names: Vec<&str> = graph.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Source", "Build"]);
        assert!(graph.stages.iter().all(|s| s.actions.len() == 1));
        assert!(!graph.cross_account_keys);
    }

    #[test]
    fn test_source_trigger() {
        let graph = graph();
        let action = graph.source_action().unwrap();

        assert_eq!(action.name, SOURCE_ACTION_NAME);
        assert!(action.inputs.is_empty());
        match &action.executor {
            Executor::SourceTrigger(trigger) => {
                assert_eq!(trigger.branch, "master");
                assert_eq!(trigger.trigger, TriggerMode::Events);
                assert_eq!(trigger.repository.name, "svc-repo");
            }
            other => panic!("Expected source trigger, got {other:?}"),
        }
    }

    #[test]
    fn test_build_executor_settings() {
        let graph = graph();
        let executor = graph.build_executor().unwrap();

        assert_eq!(executor.project_name, "demo-DockerPipelineStack-CodeBuild");
        assert!(executor.privileged);
        assert!(executor.check_secrets_in_plaintext_env);
        assert_eq!(
            executor.cache,
            vec![LocalCacheMode::DockerLayer, LocalCacheMode::Custom]
        );
        assert_eq!(
            executor.environment[REGION_VARIABLE].value,
            LateBound::token(Token::Region)
        );
        assert_eq!(
            executor.environment[ACCOUNT_VARIABLE].value,
            LateBound::token(Token::Account)
        );
        assert_eq!(executor.role_policy.len(), 3);
    }

    #[test]
    fn test_topology_check_rejects_reordered_stages() {
        let mut graph = graph();
        graph.stages.reverse();

        assert!(matches!(
            graph.check_topology(),
            Err(AssemblyError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_topology_check_rejects_broken_handoff() {
        let mut graph = graph();
        graph.stages[1].actions[0].inputs = vec![Artifact::new("Other")];

        assert!(graph.check_topology().is_err());
    }

    #[test]
    fn test_topology_check_rejects_extra_build_output() {
        let mut graph = graph();
        graph.stages[1].actions[0].outputs.push(Artifact::new("Extra"));

        assert!(matches!(
            graph.check_topology(),
            Err(AssemblyError::InvalidTopology(_))
        ));
    }

    #[test]
    fn test_topology_check_rejects_renamed_build_output() {
        let mut graph = graph();
        graph.stages[1].actions[0].outputs = vec![Artifact::new("Other")];

        assert!(graph.check_topology().is_err());
    }

    #[test]
    fn test_topology_check_rejects_missing_statement() {
        let mut graph = graph();
        if let Executor::Build(executor) = &mut graph.stages[1].actions[0].executor {
            executor.role_policy.truncate(2);
        }

        let err = graph.check_topology().unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::InvalidTopology(ref msg) if msg.contains("build role")
        ));
    }
}
