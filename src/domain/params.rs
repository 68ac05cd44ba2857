//! Validated pipeline parameters.
//!
//! Raw inputs are checked against the allowed character class and length
//! before anything else runs. The check is purely syntactic: it never asks
//! whether the named repository or registry exists.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::AssemblyError;

/// Suffix appended to every pipeline name
pub const PIPELINE_SUFFIX: &str = "DockerPipelineStack";

/// Suffix appended to the full pipeline name to form the build project name
pub const BUILD_PROJECT_SUFFIX: &str = "CodeBuild";

static NAME_PATTERN: OnceLock<Regex> = OnceLock::new();
static REGISTRY_PATTERN: OnceLock<Regex> = OnceLock::new();

fn name_pattern() -> &'static Regex {
    NAME_PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9._-]{1,100}$").expect("static pattern"))
}

fn registry_pattern() -> &'static Regex {
    REGISTRY_PATTERN
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9/._-]{1,100}$").expect("static pattern"))
}

/// The three inputs the engine accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parameter {
    /// Name of the pipeline to create
    #[serde(rename = "CodePipelineName")]
    PipelineName,

    /// Name of the existing source repository
    #[serde(rename = "CodeCommitRepositoryName")]
    RepositoryName,

    /// Name of the container registry to declare
    #[serde(rename = "ECRRepositoryName")]
    RegistryName,
}

impl Parameter {
    /// Parameter name as declared to the deployment tooling
    pub fn name(&self) -> &'static str {
        match self {
            Parameter::PipelineName => "CodePipelineName",
            Parameter::RepositoryName => "CodeCommitRepositoryName",
            Parameter::RegistryName => "ECRRepositoryName",
        }
    }

    /// Human-readable description of the accepted shape
    pub fn allowed_pattern(&self) -> &'static str {
        match self {
            Parameter::PipelineName | Parameter::RepositoryName => "^[a-zA-Z0-9._-]{1,100}$",
            Parameter::RegistryName => "^[a-zA-Z0-9/._-]{1,100}$",
        }
    }

    fn check(&self, raw: &str) -> Result<(), AssemblyError> {
        let pattern = match self {
            Parameter::PipelineName | Parameter::RepositoryName => name_pattern(),
            Parameter::RegistryName => registry_pattern(),
        };

        if pattern.is_match(raw) {
            Ok(())
        } else {
            Err(AssemblyError::Validation {
                parameter: *self,
                value: raw.to_string(),
            })
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

macro_rules! validated_name {
    ($(#[$meta:meta])* $ty:ident, $param:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $ty(String);

        impl $ty {
            /// Validate a raw string
            pub fn parse(raw: &str) -> Result<Self, AssemblyError> {
                $param.check(raw)?;
                Ok(Self(raw.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

validated_name!(
    /// Pipeline name as supplied by the caller
    PipelineName,
    Parameter::PipelineName
);

validated_name!(
    /// Name of a pre-existing source repository
    RepositoryName,
    Parameter::RepositoryName
);

validated_name!(
    /// Name of the container registry to declare
    RegistryName,
    Parameter::RegistryName
);

impl PipelineName {
    /// `<name>-DockerPipelineStack`, the unique name of the assembled pipeline
    pub fn full_name(&self) -> String {
        format!("{}-{}", self.0, PIPELINE_SUFFIX)
    }

    /// `<full name>-CodeBuild`, the build executor's declared name
    pub fn build_project_name(&self) -> String {
        format!("{}-{}", self.full_name(), BUILD_PROJECT_SUFFIX)
    }
}

/// Raw, unvalidated inputs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawParameters {
    pub pipeline_name: String,
    pub repository_name: String,
    pub registry_name: String,
}

impl RawParameters {
    pub fn new(
        pipeline_name: impl Into<String>,
        repository_name: impl Into<String>,
        registry_name: impl Into<String>,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            repository_name: repository_name.into(),
            registry_name: registry_name.into(),
        }
    }

    /// Check every input, failing on the first one out of shape
    pub fn validate(&self) -> Result<Parameters, AssemblyError> {
        Ok(Parameters {
            pipeline_name: PipelineName::parse(&self.pipeline_name)?,
            repository_name: RepositoryName::parse(&self.repository_name)?,
            registry_name: RegistryName::parse(&self.registry_name)?,
        })
    }
}

/// Inputs that passed validation; read-only from here on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    pub pipeline_name: PipelineName,
    pub repository_name: RepositoryName,
    pub registry_name: RegistryName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_parameters() {
        let params = RawParameters::new("demo", "svc-repo", "svc/img")
            .validate()
            .unwrap();

        assert_eq!(params.pipeline_name.as_str(), "demo");
        assert_eq!(params.repository_name.as_str(), "svc-repo");
        assert_eq!(params.registry_name.as_str(), "svc/img");
    }

    #[test]
    fn test_derived_names() {
        let name = PipelineName::parse("demo").unwrap();
        assert_eq!(name.full_name(), "demo-DockerPipelineStack");
        assert_eq!(name.build_project_name(), "demo-DockerPipelineStack-CodeBuild");
    }

    #[test]
    fn test_pipeline_name_rejects_space_and_bang() {
        let err = RawParameters::new("bad name!", "svc-repo", "svc/img")
            .validate()
            .unwrap_err();

        match err {
            AssemblyError::Validation { parameter, value } => {
                assert_eq!(parameter, Parameter::PipelineName);
                assert_eq!(value, "bad name!");
            }
            other => panic!("Expected Validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_slash_only_allowed_in_registry_name() {
        assert!(RegistryName::parse("team/service").is_ok());
        assert!(RepositoryName::parse("team/service").is_err());
        assert!(PipelineName::parse("team/service").is_err());
    }

    #[test]
    fn test_length_bounds() {
        assert!(PipelineName::parse("").is_err());
        assert!(PipelineName::parse(&"a".repeat(100)).is_ok());
        assert!(PipelineName::parse(&"a".repeat(101)).is_err());
        assert!(RegistryName::parse(&"b".repeat(101)).is_err());
    }

    #[test]
    fn test_error_names_parameter() {
        let err = RawParameters::new("demo", "svc-repo", "img:latest")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("ECRRepositoryName"));
    }
}
