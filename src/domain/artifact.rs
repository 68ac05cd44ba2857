//! Artifacts handed off between pipeline stages.
//!
//! The engine only declares the hand-off edge. Contents are produced by the
//! external runtime when the pipeline executes.

use serde::{Deserialize, Serialize};

/// Name of the artifact the source stage produces
pub const SOURCE_ARTIFACT: &str = "SourceArtifact";

/// Name of the artifact the build stage produces
pub const BUILD_ARTIFACT: &str = "BuildArtifact";

/// An opaque named bundle; identity is its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
}

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn source() -> Self {
        Self::new(SOURCE_ARTIFACT)
    }

    pub fn build() -> Self {
        Self::new(BUILD_ARTIFACT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_identity() {
        assert_eq!(Artifact::source(), Artifact::new("SourceArtifact"));
        assert_ne!(Artifact::source(), Artifact::build());
    }

    #[test]
    fn test_artifact_serialization() {
        let json = serde_json::to_string(&Artifact::build()).unwrap();
        assert_eq!(json, r#"{"name":"BuildArtifact"}"#);
    }
}
