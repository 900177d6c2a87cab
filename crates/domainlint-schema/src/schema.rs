use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_yaml::Value;
use tracing::debug;

use crate::builder::{split_fragments, Resolver};
use crate::config::SchemaConfig;
use crate::error::{Result, SchemaError};
use crate::node::SchemaNode;
use crate::registry::{read_limited, Registry};
use crate::validator::Validator;
use crate::violation::Violation;

/// A built, fully linked schema ready to check documents.
#[derive(Debug, Clone)]
pub struct Schema {
    root: SchemaNode,
    fragments: BTreeMap<String, Arc<SchemaNode>>,
    config: SchemaConfig,
}

impl Schema {
    /// Build from schema text (YAML or JSON), resolving includes against `registry`.
    pub fn build(source: &str, registry: &Registry) -> Result<Self> {
        let value: Value = serde_yaml::from_str(source)?;
        Self::from_value(&value, registry)
    }

    /// Build from an already parsed schema source.
    ///
    /// Top-level `schema;<name>` entries declare fragments local to this schema;
    /// they may not reuse a name the registry already holds.
    pub fn from_value(value: &Value, registry: &Registry) -> Result<Self> {
        let config = *registry.config();
        let Value::Mapping(def) = value else {
            return Err(SchemaError::Malformed {
                path: "<root>".to_string(),
                message: "schema source must be a map".to_string(),
            });
        };
        let (declared, rest) = split_fragments(def)?;

        let mut resolver = Resolver::new(registry, &config, declared)?;
        resolver.build_pending()?;
        let root = resolver.node(&Value::Mapping(rest), "<root>", 0)?;
        let fragments = resolver.into_fragments();

        debug!(
            fragments = fragments.len(),
            registry_fragments = registry.len(),
            "built schema"
        );
        Ok(Self {
            root,
            fragments,
            config,
        })
    }

    /// Load and build a schema file, applying the registry's size limit.
    pub fn from_file(path: &Path, registry: &Registry) -> Result<Self> {
        let display = path.display().to_string();
        let file = std::fs::File::open(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{display}: {err}")))?;
        let metadata = file
            .metadata()
            .map_err(|err| SchemaError::LoadFailed(format!("{display}: {err}")))?;
        let source = read_limited(file, &metadata, registry.config(), &display)?;
        Self::build(&source, registry)
    }

    /// Wrap a programmatically constructed tree.
    pub fn from_node(root: SchemaNode) -> Self {
        Self {
            root,
            fragments: BTreeMap::new(),
            config: SchemaConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// Names of fragments declared by this schema's source.
    pub fn fragment_names(&self) -> Vec<&str> {
        self.fragments.keys().map(String::as_str).collect()
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Check `document`; an empty list means it conforms.
    pub fn validate(&self, document: &Value) -> Vec<Violation> {
        Validator::new(&self.config).run(&self.root, document)
    }
}

/// Build `schema_source` against `registry` and check `document` with it.
///
/// `Err` is reserved for schema problems; document problems are the `Ok` list.
pub fn validate(
    schema_source: &str,
    registry: &Registry,
    document: &Value,
) -> Result<Vec<Violation>> {
    Ok(Schema::build(schema_source, registry)?.validate(document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{MapNode, ScalarKind};
    use crate::violation::ViolationKind;

    const SCHEMA: &str = r#"
"schema;name":
  type: str
  allowempty: false
mapping:
  name:
    include: name
    required: true
  aliases:
    type: seq
    sequence:
      - include: name
"#;

    fn doc(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn local_fragments_are_usable_and_listed() {
        let schema = Schema::build(SCHEMA, &Registry::new()).unwrap();
        assert_eq!(schema.fragment_names(), vec!["name"]);
        assert!(schema.validate(&doc("{name: bot, aliases: [b]}")).is_empty());

        let violations = schema.validate(&doc("{aliases: [\"\"]}"));
        let kinds: Vec<ViolationKind> = violations.iter().map(|v| v.kind).collect();
        assert_eq!(
            kinds,
            vec![ViolationKind::MissingField, ViolationKind::EmptyValue]
        );
        assert_eq!(violations[1].path.to_string(), "aliases[0]");
    }

    #[test]
    fn local_fragment_may_not_shadow_registry() {
        let mut registry = Registry::new();
        registry.register("name", ScalarKind::Str.into()).unwrap();
        assert!(matches!(
            Schema::build(SCHEMA, &registry),
            Err(SchemaError::DuplicateFragment(_))
        ));
    }

    #[test]
    fn schema_errors_are_separate_from_violations() {
        let registry = Registry::new();
        let missing = validate(
            "mapping: {responses: {include: responses}}",
            &registry,
            &doc("{}"),
        );
        assert!(matches!(missing, Err(SchemaError::UnresolvedInclude(_))));

        let syntax = validate("mapping: [", &registry, &doc("{}"));
        assert!(matches!(syntax, Err(SchemaError::InvalidSyntax(_))));

        let ok = validate("mapping: {a: {type: int}}", &registry, &doc("{a: x}")).unwrap();
        assert_eq!(ok.len(), 1);
    }

    #[test]
    fn non_map_source_is_malformed() {
        assert!(matches!(
            Schema::build("[1, 2]", &Registry::new()),
            Err(SchemaError::Malformed { .. })
        ));
    }

    #[test]
    fn validation_does_not_touch_the_document() {
        let schema = Schema::from_node(
            MapNode::new()
                .required_field("a", ScalarKind::Int)
                .into(),
        );
        let document = doc("{a: nope, b: 1}");
        let before = document.clone();
        let first = schema.validate(&document);
        assert_eq!(document, before);
        assert_eq!(schema.validate(&document), first);
    }

    #[test]
    fn from_file_reads_and_builds() {
        let path = std::env::temp_dir().join(format!(
            "domainlint-schema-file-{}.yml",
            std::process::id()
        ));
        std::fs::write(&path, "mapping: {a: {type: bool}}").unwrap();
        let schema = Schema::from_file(&path, &Registry::new()).unwrap();
        assert!(schema.validate(&doc("{a: true}")).is_empty());
        let _ = std::fs::remove_file(&path);

        assert!(matches!(
            Schema::from_file(&path, &Registry::new()),
            Err(SchemaError::LoadFailed(_))
        ));
    }

    #[test]
    fn schema_and_registry_are_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Schema>();
        assert_send_sync::<Registry>();
    }
}
