//! Domain types for the pipeline assembler.
//!
//! This module contains the plain data the engine produces:
//! - Params: validated input names
//! - Reference: late-bound values and the deployment context
//! - Artifact: stage hand-off bundles
//! - Policy: role permission statements
//! - Graph: resources, stages, actions and executors

pub mod artifact;
pub mod graph;
pub mod params;
pub mod policy;
pub mod reference;

// Re-export commonly used types
pub use artifact::Artifact;
pub use graph::{
    Action, BuildExecutor, EnvironmentVariable, Executor, LocalCacheMode, PipelineGraph,
    RegistryResource, RepositoryReference, SourceTrigger, Stage, StageKind, TagMutability,
    TriggerMode, VariableType,
};
pub use params::{Parameter, Parameters, PipelineName, RawParameters, RegistryName, RepositoryName};
pub use policy::{Effect, PolicyStatement, ResourceScope, StatementKind};
pub use reference::{DeploymentContext, Fragment, LateBound, Token};
