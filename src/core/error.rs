//! Assembly error taxonomy.
//!
//! Every error is fatal to the assembly attempt. Nothing is retried here;
//! the caller decides whether to try again with corrected inputs.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::params::Parameter;
use crate::domain::policy::StatementKind;

#[derive(Debug, Clone, Error)]
pub enum AssemblyError {
    #[error("Invalid {parameter}: '{value}' does not match {}", parameter.allowed_pattern())]
    Validation { parameter: Parameter, value: String },

    #[error("Failed to load {statement} policy template {}: {reason}", path.display())]
    TemplateLoad {
        statement: StatementKind,
        path: PathBuf,
        reason: String,
    },

    #[error("Repository '{repository}' could not be resolved: {reason}")]
    UnresolvedReference { repository: String, reason: String },

    #[error("No value bound for {token}")]
    Unbound { token: String },

    #[error("Assembled graph is inconsistent: {0}")]
    InvalidTopology(String),
}

/// Result type for assembly operations
pub type Result<T> = std::result::Result<T, AssemblyError>;
