//! Core assembly logic.
//!
//! This module contains:
//! - Error: Assembly error taxonomy
//! - Binder: Repository resolution and registry declaration
//! - Templates: Policy template loading and scoping
//! - Pipeline: Graph wiring
//! - Orchestrator: Phase sequencing (Assembler)

pub mod binder;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod templates;

// Re-export commonly used types
pub use binder::{
    bind_resources, declare_registry, BoundResources, KnownRepositories, NamedRepositoryProvider,
    SourceControlProvider,
};
pub use error::AssemblyError;
pub use orchestrator::Assembler;
pub use pipeline::assemble_graph;
pub use templates::{
    account_registry_wildcard, resolve_policies, BuiltinTemplates, FsTemplateStore,
    PolicyTemplate, TemplateStore,
};
