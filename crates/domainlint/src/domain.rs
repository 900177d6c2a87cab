//! The built-in domain-file schema.
//!
//! The root schema delegates `responses` to a fragment of the same name, which
//! ships separately and is registered before the root schema is built.

use domainlint_schema::{Registry, Result, Schema, SchemaConfig, Violation};
use serde_yaml::Value;

/// Root schema of a domain file.
pub const DOMAIN_SCHEMA: &str = include_str!("../schemas/domain.yml");

/// Fragment source declaring `schema;responses`.
pub const RESPONSES_SCHEMA: &str = include_str!("../schemas/responses.yml");

/// Name of the fragment the domain schema includes.
pub const RESPONSES_FRAGMENT: &str = "responses";

/// Registry holding the built-in `responses` fragment.
pub fn responses_registry() -> Result<Registry> {
    responses_registry_with_config(SchemaConfig::default())
}

pub fn responses_registry_with_config(config: SchemaConfig) -> Result<Registry> {
    let mut registry = Registry::with_config(config);
    registry.register_partials(RESPONSES_SCHEMA)?;
    Ok(registry)
}

/// The domain schema linked against the built-in fragments.
pub fn domain_schema() -> Result<Schema> {
    Schema::build(DOMAIN_SCHEMA, &responses_registry()?)
}

/// The domain schema linked against `registry`.
///
/// The built-in `responses` fragment is only used when `registry` does not
/// already provide one.
pub fn domain_schema_with(registry: &Registry) -> Result<Schema> {
    Schema::build(DOMAIN_SCHEMA, &link_built_in(registry)?)
}

/// `registry` plus the built-in `responses` fragment unless it already has one.
pub fn link_built_in(registry: &Registry) -> Result<Registry> {
    let mut linked = registry.clone();
    if !linked.contains(RESPONSES_FRAGMENT) {
        linked.register_partials(RESPONSES_SCHEMA)?;
    }
    Ok(linked)
}

/// Check a parsed domain document against the built-in schema.
pub fn validate_domain(document: &Value) -> Result<Vec<Violation>> {
    Ok(domain_schema()?.validate(document))
}

#[cfg(test)]
mod tests {
    use domainlint_schema::SchemaNode;

    use super::*;

    #[test]
    fn built_in_schema_builds() {
        let schema = domain_schema().unwrap();
        assert!(matches!(schema.root(), SchemaNode::Map(_)));
        assert!(schema.fragment_names().is_empty());
    }

    #[test]
    fn linking_adds_responses_once() {
        let linked = link_built_in(&Registry::new()).unwrap();
        assert_eq!(linked.names(), vec![RESPONSES_FRAGMENT]);

        let relinked = link_built_in(&linked).unwrap();
        assert_eq!(relinked.len(), 1);
    }

    #[test]
    fn registry_fragment_overrides_built_in() {
        let mut registry = Registry::new();
        registry
            .register_partials("\"schema;responses\": {type: any}")
            .unwrap();
        let schema = domain_schema_with(&registry).unwrap();

        let document: Value = serde_yaml::from_str(
            "{intents: [], entities: [], actions: [], responses: 5, slots: {}, config: {}, session_config: {}}",
        )
        .unwrap();
        assert!(schema.validate(&document).is_empty());
        assert!(!domain_schema().unwrap().validate(&document).is_empty());
    }
}
