//! Late-bound references.
//!
//! Account, region and allocated resource identifiers are unknown while the
//! graph is assembled. They are carried as pending values made of literal
//! fragments and tokens, and only become strings in the binding pass.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::AssemblyError;

/// A value supplied by the deployment context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "token", rename_all = "snake_case")]
pub enum Token {
    /// Account identity of the deployment
    Account,

    /// Region identity of the deployment
    Region,

    /// Identifier allocated for a declared resource
    ResourceArn { logical_id: String },
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Account => write!(f, "${{Account}}"),
            Token::Region => write!(f, "${{Region}}"),
            Token::ResourceArn { logical_id } => write!(f, "${{{logical_id}.Arn}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fragment {
    Literal(String),
    Token(Token),
}

/// A string that is either still pending or already resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum LateBound {
    Pending(Vec<Fragment>),
    Resolved(String),
}

impl LateBound {
    /// A value that is exactly one token
    pub fn token(token: Token) -> Self {
        Self::Pending(vec![Fragment::Token(token)])
    }

    /// Join literal text and tokens; collapses to `Resolved` when no token is present
    pub fn concat(fragments: Vec<Fragment>) -> Self {
        if fragments.iter().all(|f| matches!(f, Fragment::Literal(_))) {
            let joined = fragments
                .into_iter()
                .map(|f| match f {
                    Fragment::Literal(s) => s,
                    Fragment::Token(_) => String::new(),
                })
                .collect();
            return Self::Resolved(joined);
        }
        Self::Pending(fragments)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Tokens this value still waits on
    pub fn tokens(&self) -> Vec<&Token> {
        match self {
            Self::Pending(fragments) => fragments
                .iter()
                .filter_map(|f| match f {
                    Fragment::Token(t) => Some(t),
                    Fragment::Literal(_) => None,
                })
                .collect(),
            Self::Resolved(_) => Vec::new(),
        }
    }

    /// Produce the resolved form; the receiver is left as is
    pub fn bind(&self, ctx: &DeploymentContext) -> Result<Self, AssemblyError> {
        match self {
            Self::Resolved(value) => Ok(Self::Resolved(value.clone())),
            Self::Pending(fragments) => {
                let mut out = String::new();
                for fragment in fragments {
                    match fragment {
                        Fragment::Literal(s) => out.push_str(s),
                        Fragment::Token(t) => out.push_str(ctx.lookup(t)?),
                    }
                }
                Ok(Self::Resolved(out))
            }
        }
    }
}

impl fmt::Display for LateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved(value) => f.write_str(value),
            Self::Pending(fragments) => {
                for fragment in fragments {
                    match fragment {
                        Fragment::Literal(s) => f.write_str(s)?,
                        Fragment::Token(t) => write!(f, "{t}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Concrete values the deployment collaborator supplies for tokens
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentContext {
    pub account: Option<String>,
    pub region: Option<String>,

    /// Allocated identifiers keyed by logical id
    #[serde(default)]
    pub resource_arns: BTreeMap<String, String>,
}

impl DeploymentContext {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: Some(region.into()),
            resource_arns: BTreeMap::new(),
        }
    }

    pub fn with_resource_arn(
        mut self,
        logical_id: impl Into<String>,
        arn: impl Into<String>,
    ) -> Self {
        self.resource_arns.insert(logical_id.into(), arn.into());
        self
    }

    fn lookup(&self, token: &Token) -> Result<&str, AssemblyError> {
        let value = match token {
            Token::Account => self.account.as_deref(),
            Token::Region => self.region.as_deref(),
            Token::ResourceArn { logical_id } => {
                self.resource_arns.get(logical_id).map(String::as_str)
            }
        };

        value.ok_or_else(|| AssemblyError::Unbound {
            token: token.to_string(),
        })
    }
}
