//! Assembly entry point.
//!
//! Runs the phases in order: validate inputs, bind resources, resolve the
//! role policy, assemble the graph. Each phase consumes only the previous
//! phase's output, and any failure aborts with no graph produced.

use tracing::{info, instrument};

use crate::domain::graph::PipelineGraph;
use crate::domain::params::RawParameters;

use super::binder::{bind_resources, NamedRepositoryProvider, SourceControlProvider};
use super::error::Result;
use super::pipeline::assemble_graph;
use super::templates::{resolve_policies, BuiltinTemplates, FsTemplateStore, TemplateStore};

/// Pipeline graph assembler
pub struct Assembler {
    templates: Box<dyn TemplateStore>,
    provider: Box<dyn SourceControlProvider>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(BuiltinTemplates, NamedRepositoryProvider)
    }
}

impl Assembler {
    pub fn new(
        templates: impl TemplateStore + 'static,
        provider: impl SourceControlProvider + 'static,
    ) -> Self {
        Self {
            templates: Box::new(templates),
            provider: Box::new(provider),
        }
    }

    /// Assembler reading templates from the configured directory
    pub fn from_config(config: &crate::config::ResolvedConfig) -> Self {
        Self::new(FsTemplateStore::new(&config.templates), NamedRepositoryProvider)
    }

    /// Assemble a complete graph, or fail with nothing produced
    #[instrument(skip(self, raw), fields(pipeline = %raw.pipeline_name))]
    pub fn assemble(&self, raw: &RawParameters) -> Result<PipelineGraph> {
        let params = raw.validate()?;
        let resources = bind_resources(self.provider.as_ref(), &params)?;
        let role_policy = resolve_policies(self.templates.as_ref(), &resources.registry)?;
        let graph = assemble_graph(&params, resources, role_policy)?;

        info!(digest = %graph.naming_digest(), "Pipeline ready for synthesis");
        Ok(graph)
    }
}
