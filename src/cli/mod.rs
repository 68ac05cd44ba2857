//! Command-line interface for dockpipe.
//!
//! Provides commands for assembling a pipeline graph, checking inputs,
//! and showing the resolved configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config;
use crate::core::{Assembler, FsTemplateStore, NamedRepositoryProvider};
use crate::domain::{DeploymentContext, PipelineGraph, RawParameters};

/// dockpipe - container build pipeline assembler
#[derive(Parser, Debug)]
#[command(name = "dockpipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// The three pipeline inputs
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Pipeline name; suffixed with '-DockerPipelineStack'
    #[arg(long, env = "CODE_PIPELINE_NAME")]
    pub pipeline_name: String,

    /// Existing source repository name
    #[arg(long, env = "CODE_COMMIT_REPOSITORY_NAME")]
    pub repository_name: String,

    /// Container registry name to declare
    #[arg(long, env = "ECR_REPOSITORY_NAME")]
    pub registry_name: String,
}

impl From<InputArgs> for RawParameters {
    fn from(args: InputArgs) -> Self {
        RawParameters::new(args.pipeline_name, args.repository_name, args.registry_name)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble the pipeline graph and write it as JSON
    Synth {
        #[command(flatten)]
        inputs: InputArgs,

        /// Template directory (overrides configuration)
        #[arg(short, long)]
        templates: Option<PathBuf>,

        /// Account to bind late-bound references with (requires --region)
        #[arg(long, requires = "region")]
        account: Option<String>,

        /// Region to bind late-bound references with (requires --account)
        #[arg(long, requires = "account")]
        region: Option<String>,

        /// Output file (writes to stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check the inputs without assembling
    Validate {
        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Synth {
                inputs,
                templates,
                account,
                region,
                output,
            } => synth(inputs.into(), templates, account.zip(region), output),
            Commands::Validate { inputs } => validate(inputs.into()),
            Commands::Config => show_config(),
        }
    }
}

fn synth(
    raw: RawParameters,
    templates: Option<PathBuf>,
    binding: Option<(String, String)>,
    output: Option<PathBuf>,
) -> Result<()> {
    let assembler = match templates {
        Some(dir) => Assembler::new(FsTemplateStore::in_dir(dir), NamedRepositoryProvider),
        None => Assembler::from_config(config::config()?),
    };

    let mut graph = assembler.assemble(&raw)?;

    if let Some((account, region)) = binding {
        let ctx = conventional_context(&graph, account, region);
        graph = graph.bind(&ctx)?;
    }

    let json = serde_json::to_string_pretty(&graph).context("Failed to serialize graph")?;
    match output {
        Some(path) => {
            std::fs::write(&path, json + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote pipeline graph");
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Context using the registry ARN the provider conventionally allocates
fn conventional_context(
    graph: &PipelineGraph,
    account: String,
    region: String,
) -> DeploymentContext {
    let registry_arn = format!(
        "arn:aws:ecr:{}:{}:repository/{}",
        region, account, graph.registry.name
    );
    DeploymentContext::new(account, region)
        .with_resource_arn(&graph.registry.logical_id, registry_arn)
}

fn validate(raw: RawParameters) -> Result<()> {
    let params = raw.validate()?;

    println!("Pipeline:      {}", params.pipeline_name.full_name());
    println!("Build project: {}", params.pipeline_name.build_project_name());
    println!("Repository:    {}", params.repository_name);
    println!("Registry:      {}", params.registry_name);
    Ok(())
}

fn show_config() -> Result<()> {
    let config = config::config()?;

    match &config.config_file {
        Some(path) => println!("Config file:   {}", path.display()),
        None => println!("Config file:   (none, using defaults)"),
    }
    println!("Templates dir: {}", config.templates.dir.display());
    println!("  change:        {}", config.templates.change);
    println!("  authorization: {}", config.templates.authorization);
    println!("  pull_images:   {}", config.templates.pull_images);
    Ok(())
}
