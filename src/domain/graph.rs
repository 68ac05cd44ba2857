//! The assembled pipeline graph.
//!
//! A graph is a single immutable value: the resources it depends on, its
//! ordered stages, and the build executor with its role policy. Binding
//! produces a new graph and never touches the one it started from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::error::AssemblyError;
use crate::domain::artifact::Artifact;
use crate::domain::policy::{PolicyStatement, StatementKind};
use crate::domain::reference::{DeploymentContext, LateBound};

/// Handle to a pre-existing source repository; referenced, never owned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub logical_id: String,
    pub name: String,
    pub arn: LateBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TagMutability {
    Mutable,
}

/// Container registry declared by this graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryResource {
    pub logical_id: String,
    pub name: String,
    pub scan_on_push: bool,
    pub tag_mutability: TagMutability,
    /// Allocated by the provider at deployment time
    pub arn: LateBound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Start on repository change events
    Events,
}

/// Listener that starts the pipeline from repository changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTrigger {
    pub repository: RepositoryReference,
    pub branch: String,
    pub trigger: TriggerMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalCacheMode {
    DockerLayer,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Plaintext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub value: LateBound,
}

/// Execution identity that runs the build action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildExecutor {
    pub logical_id: String,
    pub project_name: String,
    /// Needed to build container images
    pub privileged: bool,
    pub check_secrets_in_plaintext_env: bool,
    pub cache: Vec<LocalCacheMode>,
    pub environment: BTreeMap<String, EnvironmentVariable>,
    /// Statements attached to the executor's role
    pub role_policy: Vec<PolicyStatement>,
}

impl BuildExecutor {
    pub fn statement(&self, kind: StatementKind) -> Option<&PolicyStatement> {
        self.role_policy.iter().find(|s| s.kind == kind)
    }

    fn bind(&self, ctx: &DeploymentContext) -> Result<Self, AssemblyError> {
        let environment = self
            .environment
            .iter()
            .map(|(key, var)| -> Result<(String, EnvironmentVariable), AssemblyError> {
                Ok((
                    key.clone(),
                    EnvironmentVariable {
                        var_type: var.var_type,
                        value: var.value.bind(ctx)?,
                    },
                ))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let role_policy = self
            .role_policy
            .iter()
            .map(|s| s.bind(ctx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            environment,
            role_policy,
            ..self.clone()
        })
    }
}

/// The external executor an action is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "executor", rename_all = "snake_case")]
pub enum Executor {
    SourceTrigger(SourceTrigger),
    Build(BuildExecutor),
}

/// A unit of work inside a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub inputs: Vec<Artifact>,
    pub outputs: Vec<Artifact>,
    pub executor: Executor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageKind {
    Source,
    Build,
}

impl StageKind {
    /// Fixed execution order
    pub const ORDER: [StageKind; 2] = [StageKind::Source, StageKind::Build];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Source => "Source",
            StageKind::Build => "Build",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub kind: StageKind,
    pub actions: Vec<Action>,
}

/// A fully wired two-stage pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineGraph {
    pub logical_id: String,
    /// `<pipeline name>-DockerPipelineStack`
    pub name: String,
    pub cross_account_keys: bool,
    pub repository: RepositoryReference,
    pub registry: RegistryResource,
    pub stages: Vec<Stage>,
}

impl PipelineGraph {
    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    fn single_action(&self, kind: StageKind) -> Option<&Action> {
        self.stage(kind).and_then(|s| s.actions.first())
    }

    pub fn source_action(&self) -> Option<&Action> {
        self.single_action(StageKind::Source)
    }

    pub fn build_action(&self) -> Option<&Action> {
        self.single_action(StageKind::Build)
    }

    pub fn build_executor(&self) -> Option<&BuildExecutor> {
        match &self.build_action()?.executor {
            Executor::Build(executor) => Some(executor),
            Executor::SourceTrigger(_) => None,
        }
    }

    /// Check ordering, action count, executor kinds, artifact hand-off and
    /// the statements attached to the build role
    pub fn check_topology(&self) -> Result<(), AssemblyError> {
        let kinds: Vec<StageKind> = self.stages.iter().map(|s| s.kind).collect();
        if kinds != StageKind::ORDER {
            return Err(AssemblyError::InvalidTopology(format!(
                "stages must be {:?}, found {:?}",
                StageKind::ORDER,
                kinds
            )));
        }

        for stage in &self.stages {
            if stage.actions.len() != 1 {
                return Err(AssemblyError::InvalidTopology(format!(
                    "stage '{}' must have exactly one action, found {}",
                    stage.name,
                    stage.actions.len()
                )));
            }
            let executor_matches = matches!(
                (stage.kind, &stage.actions[0].executor),
                (StageKind::Source, Executor::SourceTrigger(_))
                    | (StageKind::Build, Executor::Build(_))
            );
            if !executor_matches {
                return Err(AssemblyError::InvalidTopology(format!(
                    "stage '{}' is bound to the wrong executor",
                    stage.name
                )));
            }
        }

        let source = &self.stages[0].actions[0];
        let build = &self.stages[1].actions[0];
        if source.outputs != [Artifact::source()] || build.inputs != source.outputs {
            return Err(AssemblyError::InvalidTopology(
                "source output must be the sole build input".to_string(),
            ));
        }
        if build.outputs != [Artifact::build()] {
            return Err(AssemblyError::InvalidTopology(format!(
                "build must output only '{}'",
                Artifact::build().name
            )));
        }

        let attached: Vec<StatementKind> = self
            .build_executor()
            .map(|e| e.role_policy.iter().map(|s| s.kind).collect())
            .unwrap_or_default();
        if attached != StatementKind::ALL {
            return Err(AssemblyError::InvalidTopology(format!(
                "build role must carry {:?}, found {:?}",
                StatementKind::ALL,
                attached
            )));
        }

        Ok(())
    }

    /// Every name derived from the pipeline name, in graph order
    pub fn derived_names(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        for stage in &self.stages {
            names.push(stage.name.clone());
            for action in &stage.actions {
                names.push(action.name.clone());
                if let Executor::Build(executor) = &action.executor {
                    names.push(executor.project_name.clone());
                }
                names.extend(action.outputs.iter().map(|a| a.name.clone()));
            }
        }
        names
    }

    /// SHA-256 over the derived names; stable across runs with equal inputs
    pub fn naming_digest(&self) -> String {
        let mut hasher = Sha256::new();
        for name in self.derived_names() {
            hasher.update(name.as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }

    /// Produce a graph whose late-bound values are all resolved
    pub fn bind(&self, ctx: &DeploymentContext) -> Result<Self, AssemblyError> {
        let repository = RepositoryReference {
            arn: self.repository.arn.bind(ctx)?,
            ..self.repository.clone()
        };
        let registry = RegistryResource {
            arn: self.registry.arn.bind(ctx)?,
            ..self.registry.clone()
        };

        let stages = self
            .stages
            .iter()
            .map(|stage| -> Result<Stage, AssemblyError> {
                let actions = stage
                    .actions
                    .iter()
                    .map(|action| -> Result<Action, AssemblyError> {
                        let executor = match &action.executor {
                            Executor::SourceTrigger(trigger) => {
                                Executor::SourceTrigger(SourceTrigger {
                                    repository: repository.clone(),
                                    ..trigger.clone()
                                })
                            }
                            Executor::Build(executor) => Executor::Build(executor.bind(ctx)?),
                        };
                        Ok(Action {
                            executor,
                            ..action.clone()
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Stage {
                    actions,
                    ..stage.clone()
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            repository,
            registry,
            stages,
            ..self.clone()
        })
    }
}
