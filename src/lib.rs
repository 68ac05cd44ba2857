//! dockpipe - Container build pipeline assembler
//!
//! Assembles a deployment-ready definition of a two-stage CI pipeline
//! (source retrieval, container build) and binds least-privilege policy
//! statements to the build executor's role.
//!
//! # Architecture
//!
//! Assembly runs four phases, each consuming only the previous one's output:
//! - Inputs are validated against their allowed shapes
//! - The source repository is resolved and the registry declared
//! - Policy templates are loaded and scoped to the registry and account
//! - Stages, artifacts and the build executor are wired into a graph
//!
//! Account, region and allocated identifiers stay late-bound until a
//! separate binding pass supplies them.
//!
//! # Modules
//!
//! - `core`: Assembly engine (Binder, Templates, Pipeline, Assembler)
//! - `domain`: Data structures (Parameters, PipelineGraph, PolicyStatement)
//! - `config`: Template location configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! dockpipe synth --pipeline-name demo --repository-name svc-repo --registry-name svc/img
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use self::core::{Assembler, AssemblyError};
pub use domain::{DeploymentContext, PipelineGraph, RawParameters};
