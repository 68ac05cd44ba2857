//! Policy template loading and resolution.
//!
//! Templates are IAM statement documents authored outside the engine. Each
//! is loaded into an immutable `PolicyTemplate`; resolving one produces a new
//! `PolicyStatement` with the resource scope computed at assembly time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::TemplateSettings;
use crate::domain::graph::RegistryResource;
use crate::domain::policy::{Effect, PolicyStatement, ResourceScope, StatementKind};
use crate::domain::reference::{Fragment, LateBound, Token};

use super::error::{AssemblyError, Result};

/// Raw template document (IAM JSON keys, lowercase accepted).
///
/// Keys the engine cannot carry into the statement (`NotResource`,
/// `Principal`, ...) are rejected instead of dropped.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateDocument {
    #[serde(rename = "Sid", alias = "sid", default)]
    sid: Option<String>,

    #[serde(rename = "Effect", alias = "effect")]
    effect: Effect,

    #[serde(rename = "Action", alias = "action")]
    action: OneOrMany,

    #[serde(rename = "Condition", alias = "condition", default)]
    condition: Option<Value>,

    /// Always overwritten with the computed scope
    #[serde(rename = "Resource", alias = "resource", default)]
    #[allow(dead_code)]
    resource: Option<Value>,
}

/// `Action` may be a single string or a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// A loaded template; never modified after parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTemplate {
    pub kind: StatementKind,
    pub sid: Option<String>,
    pub actions: Vec<String>,
    pub condition: Option<Value>,
}

impl PolicyTemplate {
    /// Parse a template document; only allow statements are accepted
    pub fn parse(kind: StatementKind, path: &Path, content: &str) -> Result<Self> {
        let load_error = |reason: String| AssemblyError::TemplateLoad {
            statement: kind,
            path: path.to_path_buf(),
            reason,
        };

        let doc: TemplateDocument =
            serde_json::from_str(content).map_err(|e| load_error(e.to_string()))?;

        if doc.effect != Effect::Allow {
            return Err(load_error(format!(
                "effect must be Allow, found {:?}",
                doc.effect
            )));
        }

        if let Some(condition) = &doc.condition {
            if !condition.is_object() {
                return Err(load_error("condition must be an object".to_string()));
            }
        }

        let actions: Vec<String> = doc.action.into();
        if actions.is_empty() {
            return Err(load_error("action list is empty".to_string()));
        }

        Ok(Self {
            kind,
            sid: doc.sid,
            actions,
            condition: doc.condition,
        })
    }

    /// New statement with the given scope; the template stays untouched
    pub fn with_scope(&self, scope: ResourceScope) -> PolicyStatement {
        PolicyStatement {
            kind: self.kind,
            sid: self.sid.clone(),
            effect: Effect::Allow,
            actions: self.actions.clone(),
            condition: self.condition.clone(),
            scope,
        }
    }
}

/// Source of policy templates
pub trait TemplateStore: Send + Sync {
    fn load(&self, kind: StatementKind) -> Result<PolicyTemplate>;
}

/// Reads one JSON file per statement from a directory
#[derive(Debug, Clone)]
pub struct FsTemplateStore {
    dir: PathBuf,
    files: BTreeMap<StatementKind, String>,
}

impl FsTemplateStore {
    pub fn new(settings: &TemplateSettings) -> Self {
        let files = [
            (StatementKind::RegistryMutate, settings.change.clone()),
            (StatementKind::RegistryAuthenticate, settings.authorization.clone()),
            (StatementKind::RegistryPull, settings.pull_images.clone()),
        ]
        .into_iter()
        .collect();

        Self {
            dir: settings.dir.clone(),
            files,
        }
    }

    /// Store over `dir` with the default file names
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(&TemplateSettings {
            dir: dir.into(),
            ..Default::default()
        })
    }

    pub fn path_for(&self, kind: StatementKind) -> PathBuf {
        let file = self.files.get(&kind).map(String::as_str).unwrap_or_default();
        self.dir.join(file)
    }
}

impl TemplateStore for FsTemplateStore {
    fn load(&self, kind: StatementKind) -> Result<PolicyTemplate> {
        let path = self.path_for(kind);
        debug!(statement = %kind, path = %path.display(), "Loading policy template");

        let content =
            std::fs::read_to_string(&path).map_err(|e| AssemblyError::TemplateLoad {
                statement: kind,
                path: path.clone(),
                reason: e.to_string(),
            })?;

        PolicyTemplate::parse(kind, &path, &content)
    }
}

/// Templates compiled into the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplates;

impl TemplateStore for BuiltinTemplates {
    fn load(&self, kind: StatementKind) -> Result<PolicyTemplate> {
        let (name, content) = match kind {
            StatementKind::RegistryMutate => (
                "builtin:CodeBuildECRChangePolicyStatement.json",
                include_str!("../../assets/CodeBuildECRChangePolicyStatement.json"),
            ),
            StatementKind::RegistryAuthenticate => (
                "builtin:CodeBuildECRGetAuthorizationPolicyStatement.json",
                include_str!("../../assets/CodeBuildECRGetAuthorizationPolicyStatement.json"),
            ),
            StatementKind::RegistryPull => (
                "builtin:CodeBuildECRPullImagesPolicyStatement.json",
                include_str!("../../assets/CodeBuildECRPullImagesPolicyStatement.json"),
            ),
        };
        PolicyTemplate::parse(kind, Path::new(name), content)
    }
}

/// `arn:aws:ecr:<region>:<account>:repository/*`
pub fn account_registry_wildcard() -> LateBound {
    LateBound::concat(vec![
        Fragment::Literal("arn:aws:ecr:".to_string()),
        Fragment::Token(Token::Region),
        Fragment::Literal(":".to_string()),
        Fragment::Token(Token::Account),
        Fragment::Literal(":repository/*".to_string()),
    ])
}

/// Load all three templates and scope them against the declared registry.
///
/// Mutate is pinned to the registry's ARN. Pull covers every registry in
/// the account so builds can pull unrelated base images. Authenticate is
/// account-wide by nature and carries no resource.
#[instrument(skip_all, fields(registry = %registry.name))]
pub fn resolve_policies(
    store: &dyn TemplateStore,
    registry: &RegistryResource,
) -> Result<Vec<PolicyStatement>> {
    let mutate = store.load(StatementKind::RegistryMutate)?;
    let authenticate = store.load(StatementKind::RegistryAuthenticate)?;
    let pull = store.load(StatementKind::RegistryPull)?;

    let statements = vec![
        mutate.with_scope(ResourceScope::Exact(registry.arn.clone())),
        authenticate.with_scope(ResourceScope::Unscoped),
        pull.with_scope(ResourceScope::Wildcard(account_registry_wildcard())),
    ];

    info!(count = statements.len(), "Resolved role policy statements");
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binder::declare_registry;
    use crate::domain::params::RegistryName;
    use std::fs;
    use tempfile::TempDir;

    fn registry() -> RegistryResource {
        declare_registry(&RegistryName::parse("svc/img").unwrap())
    }

    #[test]
    fn test_parse_accepts_single_action_and_lowercase_keys() {
        let template = PolicyTemplate::parse(
            StatementKind::RegistryAuthenticate,
            Path::new("auth.json"),
            r#"{"effect": "Allow", "action": "ecr:GetAuthorizationToken", "resource": ""}"#,
        )
        .unwrap();

        assert_eq!(template.actions, vec!["ecr:GetAuthorizationToken"]);
        assert_eq!(template.sid, None);
    }

    #[test]
    fn test_parse_rejects_deny() {
        let err = PolicyTemplate::parse(
            StatementKind::RegistryPull,
            Path::new("pull.json"),
            r#"{"Effect": "Deny", "Action": ["ecr:BatchGetImage"]}"#,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            AssemblyError::TemplateLoad {
                statement: StatementKind::RegistryPull,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_rejects_fields_it_cannot_carry() {
        for extra in [
            r#""NotResource": "x""#,
            r#""Principal": {"AWS": "*"}"#,
            r#""notaction": ["ecr:*"]"#,
        ] {
            let content = format!(
                r#"{{"Effect": "Allow", "Action": ["ecr:BatchGetImage"], {extra}}}"#
            );
            let err = PolicyTemplate::parse(
                StatementKind::RegistryPull,
                Path::new("pull.json"),
                &content,
            )
            .unwrap_err();

            match err {
                AssemblyError::TemplateLoad { reason, .. } => {
                    assert!(reason.contains("unknown field"))
                }
                other => panic!("Expected TemplateLoad, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_condition_carried_into_statement() {
        let template = PolicyTemplate::parse(
            StatementKind::RegistryPull,
            Path::new("pull.json"),
            r#"{
                "Effect": "Allow",
                "Action": ["ecr:BatchGetImage"],
                "Resource": "",
                "Condition": {"StringEquals": {"aws:RequestedRegion": "eu-west-1"}}
            }"#,
        )
        .unwrap();

        let statement = template.with_scope(ResourceScope::Wildcard(account_registry_wildcard()));
        let doc = statement.to_iam_json();

        assert_eq!(
            doc["Condition"]["StringEquals"]["aws:RequestedRegion"],
            "eu-west-1"
        );
        assert_eq!(
            doc["Resource"],
            "arn:aws:ecr:${Region}:${Account}:repository/*"
        );
    }

    #[test]
    fn test_parse_rejects_non_object_condition() {
        let err = PolicyTemplate::parse(
            StatementKind::RegistryPull,
            Path::new("pull.json"),
            r#"{"Effect": "Allow", "Action": "ecr:BatchGetImage", "Condition": "always"}"#,
        )
        .unwrap_err();

        assert!(matches!(err, AssemblyError::TemplateLoad { .. }));
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        let err = PolicyTemplate::parse(
            StatementKind::RegistryMutate,
            Path::new("change.json"),
            "{ not json",
        )
        .unwrap_err();

        assert!(matches!(err, AssemblyError::TemplateLoad { .. }));
    }

    #[test]
    fn test_with_scope_does_not_alter_template() {
        let template = BuiltinTemplates.load(StatementKind::RegistryMutate).unwrap();
        let before = template.clone();

        let statement = template.with_scope(ResourceScope::Exact(registry().arn));

        assert_eq!(template, before);
        assert_eq!(statement.actions, template.actions);
        assert_eq!(statement.effect, Effect::Allow);
    }

    #[test]
    fn test_resolve_policy_scopes() {
        let statements = resolve_policies(&BuiltinTemplates, &registry()).unwrap();
        let kinds: Vec<StatementKind> = statements.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, StatementKind::ALL);

        assert_eq!(statements[0].kind, StatementKind::RegistryMutate);
        assert_eq!(statements[0].scope, ResourceScope::Exact(registry().arn));

        assert_eq!(statements[1].kind, StatementKind::RegistryAuthenticate);
        assert_eq!(statements[1].scope, ResourceScope::Unscoped);

        assert_eq!(statements[2].kind, StatementKind::RegistryPull);
        assert_eq!(
            statements[2].scope.resource().unwrap().to_string(),
            "arn:aws:ecr:${Region}:${Account}:repository/*"
        );
    }

    #[test]
    fn test_fs_store_missing_file() {
        let temp = TempDir::new().unwrap();
        let store = FsTemplateStore::in_dir(temp.path());

        let err = store.load(StatementKind::RegistryPull).unwrap_err();
        match err {
            AssemblyError::TemplateLoad { statement, path, .. } => {
                assert_eq!(statement, StatementKind::RegistryPull);
                assert_eq!(
                    path,
                    temp.path().join("CodeBuildECRPullImagesPolicyStatement.json")
                );
            }
            other => panic!("Expected TemplateLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_fs_store_reads_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("CodeBuildECRChangePolicyStatement.json"),
            r#"{"Sid": "Push", "Effect": "Allow", "Action": ["ecr:PutImage"], "Resource": ""}"#,
        )
        .unwrap();

        let template = FsTemplateStore::in_dir(temp.path())
            .load(StatementKind::RegistryMutate)
            .unwrap();

        assert_eq!(template.sid.as_deref(), Some("Push"));
        assert_eq!(template.actions, vec!["ecr:PutImage"]);
    }
}
