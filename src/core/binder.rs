//! Resource binding.
//!
//! Resolves the existing source repository through a provider and declares
//! the container registry the build pushes to. Both become dependencies of
//! the assembled graph.

use std::collections::BTreeSet;

use tracing::{debug, instrument};

use crate::domain::graph::{RegistryResource, RepositoryReference, TagMutability};
use crate::domain::params::{Parameters, RegistryName, RepositoryName};
use crate::domain::reference::{Fragment, LateBound, Token};

use super::error::{AssemblyError, Result};

pub const REPOSITORY_LOGICAL_ID: &str = "CodeCommit";
pub const REGISTRY_LOGICAL_ID: &str = "ECRRepository";

/// Resolves a repository name to a live reference
pub trait SourceControlProvider: Send + Sync {
    fn resolve(&self, name: &RepositoryName) -> Result<RepositoryReference>;
}

/// Builds a reference from the name alone; existence is checked at deployment
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedRepositoryProvider;

impl SourceControlProvider for NamedRepositoryProvider {
    fn resolve(&self, name: &RepositoryName) -> Result<RepositoryReference> {
        Ok(repository_reference(name))
    }
}

/// Resolves only names from a known set
#[derive(Debug, Clone, Default)]
pub struct KnownRepositories {
    names: BTreeSet<String>,
}

impl KnownRepositories {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl SourceControlProvider for KnownRepositories {
    fn resolve(&self, name: &RepositoryName) -> Result<RepositoryReference> {
        if self.names.contains(name.as_str()) {
            Ok(repository_reference(name))
        } else {
            Err(AssemblyError::UnresolvedReference {
                repository: name.to_string(),
                reason: "no repository with that name".to_string(),
            })
        }
    }
}

/// `arn:aws:codecommit:<region>:<account>:<name>`
fn repository_reference(name: &RepositoryName) -> RepositoryReference {
    RepositoryReference {
        logical_id: REPOSITORY_LOGICAL_ID.to_string(),
        name: name.to_string(),
        arn: LateBound::concat(vec![
            Fragment::Literal("arn:aws:codecommit:".to_string()),
            Fragment::Token(Token::Region),
            Fragment::Literal(":".to_string()),
            Fragment::Token(Token::Account),
            Fragment::Literal(format!(":{name}")),
        ]),
    }
}

/// Registry with scan-on-push and mutable tags; its ARN is allocated later
pub fn declare_registry(name: &RegistryName) -> RegistryResource {
    RegistryResource {
        logical_id: REGISTRY_LOGICAL_ID.to_string(),
        name: name.to_string(),
        scan_on_push: true,
        tag_mutability: TagMutability::Mutable,
        arn: LateBound::token(Token::ResourceArn {
            logical_id: REGISTRY_LOGICAL_ID.to_string(),
        }),
    }
}

/// Resources the pipeline depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundResources {
    pub repository: RepositoryReference,
    pub registry: RegistryResource,
}

#[instrument(skip_all, fields(repository = %params.repository_name))]
pub fn bind_resources(
    provider: &dyn SourceControlProvider,
    params: &Parameters,
) -> Result<BoundResources> {
    let repository = provider.resolve(&params.repository_name)?;
    let registry = declare_registry(&params.registry_name);
    debug!(registry = %registry.name, arn = %registry.arn, "Declared registry");

    Ok(BoundResources {
        repository,
        registry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::params::RawParameters;
    use crate::domain::reference::DeploymentContext;

    fn params() -> Parameters {
        RawParameters::new("demo", "svc-repo", "svc/img")
            .validate()
            .unwrap()
    }

    #[test]
    fn test_registry_declaration() {
        let bound = bind_resources(&NamedRepositoryProvider, &params()).unwrap();

        assert_eq!(bound.registry.name, "svc/img");
        assert!(bound.registry.scan_on_push);
        assert_eq!(bound.registry.tag_mutability, TagMutability::Mutable);
        assert!(bound.registry.arn.is_pending());
    }

    #[test]
    fn test_repository_arn_is_late_bound() {
        let bound = bind_resources(&NamedRepositoryProvider, &params()).unwrap();
        let ctx = DeploymentContext::new("123456789012", "us-east-1");

        assert_eq!(bound.repository.name, "svc-repo");
        assert_eq!(
            bound.repository.arn.bind(&ctx).unwrap().to_string(),
            "arn:aws:codecommit:us-east-1:123456789012:svc-repo"
        );
    }

    #[test]
    fn test_unknown_repository() {
        let provider = KnownRepositories::new(["other-repo"]);
        let err = bind_resources(&provider, &params()).unwrap_err();

        assert!(matches!(
            err,
            AssemblyError::UnresolvedReference { ref repository, .. } if repository == "svc-repo"
        ));
    }
}
