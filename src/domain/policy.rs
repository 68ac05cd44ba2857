//! Permission statements attached to the build executor's role.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::error::AssemblyError;
use crate::domain::reference::{DeploymentContext, LateBound};

/// The three statements the build role receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Push layers and manifests to the declared registry
    RegistryMutate,

    /// Obtain a registry auth token
    RegistryAuthenticate,

    /// Pull base images from any registry in the account
    RegistryPull,
}

impl StatementKind {
    pub const ALL: [StatementKind; 3] = [
        StatementKind::RegistryMutate,
        StatementKind::RegistryAuthenticate,
        StatementKind::RegistryPull,
    ];
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::RegistryMutate => "registry-mutate",
            StatementKind::RegistryAuthenticate => "registry-authenticate",
            StatementKind::RegistryPull => "registry-pull",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    #[serde(alias = "allow")]
    Allow,
    #[serde(alias = "deny")]
    Deny,
}

/// Where a statement applies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "resource", rename_all = "snake_case")]
pub enum ResourceScope {
    /// A single concrete resource
    Exact(LateBound),

    /// Every resource matching a `*`-suffixed pattern
    Wildcard(LateBound),

    /// Provider-global action with no resource to name
    Unscoped,
}

impl ResourceScope {
    pub fn resource(&self) -> Option<&LateBound> {
        match self {
            ResourceScope::Exact(r) | ResourceScope::Wildcard(r) => Some(r),
            ResourceScope::Unscoped => None,
        }
    }

    fn bind(&self, ctx: &DeploymentContext) -> Result<Self, AssemblyError> {
        Ok(match self {
            ResourceScope::Exact(r) => ResourceScope::Exact(r.bind(ctx)?),
            ResourceScope::Wildcard(r) => ResourceScope::Wildcard(r.bind(ctx)?),
            ResourceScope::Unscoped => ResourceScope::Unscoped,
        })
    }
}

/// An allow rule: actions loaded from a template plus a computed scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    pub kind: StatementKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    pub scope: ResourceScope,
}

impl PolicyStatement {
    pub fn bind(&self, ctx: &DeploymentContext) -> Result<Self, AssemblyError> {
        Ok(Self {
            scope: self.scope.bind(ctx)?,
            ..self.clone()
        })
    }

    /// Render as an IAM policy statement document
    pub fn to_iam_json(&self) -> Value {
        let resource = match self.scope.resource() {
            Some(r) => r.to_string(),
            None => "*".to_string(),
        };

        let mut doc = json!({
            "Effect": self.effect,
            "Action": self.actions,
            "Resource": resource,
        });
        if let Some(sid) = &self.sid {
            doc["Sid"] = json!(sid);
        }
        if let Some(condition) = &self.condition {
            doc["Condition"] = condition.clone();
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reference::Token;

    fn statement(scope: ResourceScope) -> PolicyStatement {
        PolicyStatement {
            kind: StatementKind::RegistryMutate,
            sid: None,
            effect: Effect::Allow,
            actions: vec!["ecr:PutImage".into()],
            condition: None,
            scope,
        }
    }

    #[test]
    fn test_unscoped_renders_star() {
        let doc = statement(ResourceScope::Unscoped).to_iam_json();
        assert_eq!(doc["Resource"], "*");
        assert_eq!(doc["Effect"], "Allow");
        assert_eq!(doc["Action"][0], "ecr:PutImage");
        assert!(doc.get("Sid").is_none());
        assert!(doc.get("Condition").is_none());
    }

    #[test]
    fn test_bind_exact_scope() {
        let pending = statement(ResourceScope::Exact(LateBound::token(Token::ResourceArn {
            logical_id: "ECRRepository".into(),
        })));
        let ctx = DeploymentContext::new("1", "r")
            .with_resource_arn("ECRRepository", "arn:aws:ecr:r:1:repository/svc/img");

        let bound = pending.bind(&ctx).unwrap();

        assert_eq!(
            bound.to_iam_json()["Resource"],
            "arn:aws:ecr:r:1:repository/svc/img"
        );
        assert!(pending.scope.resource().unwrap().is_pending());
    }
}
