use std::collections::BTreeMap;
use std::sync::Arc;

use serde_yaml::{Mapping, Value};
use tracing::trace;

use crate::config::SchemaConfig;
use crate::error::{Result, SchemaError};
use crate::node::{
    Bound, IncludeRef, MapNode, Matching, Pattern, Range, ScalarKind, ScalarNode, SchemaNode,
    SeqNode,
};
use crate::registry::Registry;

/// Key prefix declaring a named fragment (`schema;responses:`).
pub(crate) const FRAGMENT_PREFIX: &str = "schema;";
/// Field-name prefix declaring a pattern-keyed field (`regex;[A-Za-z]+:`).
pub(crate) const PATTERN_PREFIX: &str = "regex;";

const KEYWORDS: [&str; 12] = [
    "type",
    "required",
    "mapping",
    "map",
    "sequence",
    "seq",
    "matching",
    "allowempty",
    "range",
    "enum",
    "pattern",
    "include",
];

/// Split `schema;<name>` entries out of a top-level schema map.
///
/// Returns the declared fragments and the remaining entries.
pub(crate) fn split_fragments(def: &Mapping) -> Result<(BTreeMap<String, Value>, Mapping)> {
    let mut fragments = BTreeMap::new();
    let mut rest = Mapping::new();
    for (key, value) in def {
        match key.as_str().and_then(|k| k.strip_prefix(FRAGMENT_PREFIX)) {
            Some(name) => {
                if name.is_empty() {
                    return Err(malformed("<root>", "fragment name must not be empty"));
                }
                if fragments.insert(name.to_string(), value.clone()).is_some() {
                    return Err(SchemaError::DuplicateFragment(name.to_string()));
                }
            }
            None => {
                rest.insert(key.clone(), value.clone());
            }
        }
    }
    Ok((fragments, rest))
}

/// Builds schema nodes from parsed schema sources and links `include`s.
///
/// Fragments declared alongside the source are built on first use, so they
/// may include each other in any declaration order. Registry fragments are
/// already linked and shared as-is.
pub(crate) struct Resolver<'a> {
    registry: &'a Registry,
    config: &'a SchemaConfig,
    pending: BTreeMap<String, Value>,
    built: BTreeMap<String, Arc<SchemaNode>>,
    stack: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        config: &'a SchemaConfig,
        pending: BTreeMap<String, Value>,
    ) -> Result<Self> {
        if let Some(name) = pending.keys().find(|name| registry.contains(name)) {
            return Err(SchemaError::DuplicateFragment(name.clone()));
        }
        Ok(Self {
            registry,
            config,
            pending,
            built: BTreeMap::new(),
            stack: Vec::new(),
        })
    }

    /// Build every declared fragment, referenced or not, so errors surface early.
    pub(crate) fn build_pending(&mut self) -> Result<()> {
        let names: Vec<String> = self.pending.keys().cloned().collect();
        for name in names {
            self.resolve(&name)?;
        }
        Ok(())
    }

    pub(crate) fn into_fragments(self) -> BTreeMap<String, Arc<SchemaNode>> {
        self.built
    }

    fn resolve(&mut self, name: &str) -> Result<Arc<SchemaNode>> {
        if let Some(node) = self.built.get(name) {
            return Ok(Arc::clone(node));
        }
        if self.stack.iter().any(|open| open == name) {
            let mut chain = self.stack.clone();
            chain.push(name.to_string());
            return Err(SchemaError::IncludeCycle(chain));
        }
        if let Some(source) = self.pending.get(name).cloned() {
            trace!(fragment = name, "building fragment");
            self.stack.push(name.to_string());
            // Depth restarts per fragment; the cycle check bounds include chains.
            let node = self.node(&source, &format!("{FRAGMENT_PREFIX}{name}"), 0);
            self.stack.pop();
            let node = Arc::new(node?);
            self.built.insert(name.to_string(), Arc::clone(&node));
            return Ok(node);
        }
        if let Some(node) = self.registry.get(name) {
            trace!(fragment = name, "linking registry fragment");
            return Ok(Arc::clone(node));
        }
        Err(SchemaError::UnresolvedInclude(name.to_string()))
    }

    pub(crate) fn node(&mut self, value: &Value, path: &str, depth: usize) -> Result<SchemaNode> {
        if depth > self.config.max_schema_depth {
            return Err(SchemaError::TooDeep {
                path: path.to_string(),
                max: self.config.max_schema_depth,
            });
        }
        let Value::Mapping(def) = value else {
            return Err(malformed(path, "schema node must be a map"));
        };
        check_keywords(def, path)?;

        if let Some(include) = def.get("include") {
            return self.include(def, include, path);
        }

        let mapping = either(def, "mapping", "map", path)?;
        let sequence = either(def, "sequence", "seq", path)?;
        let type_name = match def.get("type") {
            Some(Value::String(name)) => Some(name.as_str()),
            Some(_) => return Err(malformed(path, "`type` must be a string")),
            None => None,
        };

        match type_name {
            Some("map" | "mapping") => self.map_node(def, mapping, sequence, path, depth),
            Some("seq" | "sequence") => self.seq_node(def, sequence, mapping, path, depth),
            Some(name) => {
                let kind = ScalarKind::from_name(name).ok_or_else(|| SchemaError::UnknownType {
                    path: path.to_string(),
                    name: name.to_string(),
                })?;
                scalar_node(def, kind, mapping.or(sequence).is_some(), path)
            }
            None if mapping.is_some() => self.map_node(def, mapping, sequence, path, depth),
            None if sequence.is_some() => self.seq_node(def, sequence, mapping, path, depth),
            None => scalar_node(def, ScalarKind::Str, false, path),
        }
    }

    fn include(&mut self, def: &Mapping, include: &Value, path: &str) -> Result<SchemaNode> {
        if let Some(other) = def
            .keys()
            .filter_map(Value::as_str)
            .find(|key| !matches!(*key, "include" | "required" | "desc"))
        {
            return Err(malformed(
                path,
                format!("`include` cannot be combined with `{other}`"),
            ));
        }
        let Some(name) = include.as_str() else {
            return Err(malformed(path, "`include` must name a fragment"));
        };
        trace!(fragment = name, at = path, "resolving include");
        let target = self.resolve(name)?;
        Ok(IncludeRef::new(name, target).into())
    }

    fn map_node(
        &mut self,
        def: &Mapping,
        mapping: Option<&Value>,
        sequence: Option<&Value>,
        path: &str,
        depth: usize,
    ) -> Result<SchemaNode> {
        if sequence.is_some() {
            return Err(malformed(path, "a map node cannot declare `sequence`"));
        }
        reject(def, &["matching", "range", "enum", "pattern"], path, "map")?;

        let allow_empty = flag(def, "allowempty", path)?.unwrap_or(false);
        let mut node = MapNode::new().allow_empty(allow_empty);

        let fields = match mapping {
            None => return Ok(node.into()),
            Some(Value::Mapping(fields)) => fields,
            Some(_) => return Err(malformed(path, "`mapping` must be a map of fields")),
        };

        for (key, child) in fields {
            let Some(key) = key.as_str() else {
                return Err(malformed(path, "field names must be strings"));
            };
            let child_path = format!("{path}.{key}");
            let required = match child {
                Value::Mapping(child_def) => flag(child_def, "required", &child_path)?,
                _ => None,
            };
            let child_node = self.node(child, &child_path, depth + 1)?;

            node = match key.strip_prefix(PATTERN_PREFIX) {
                Some(source) => {
                    if required == Some(true) {
                        return Err(malformed(
                            &child_path,
                            "`required` has no meaning on a regex key",
                        ));
                    }
                    let pattern = compile(source, &child_path)?;
                    node.pattern_field(pattern, child_node)
                }
                None if required == Some(true) => node.required_field(key, child_node),
                None => node.field(key, child_node),
            };
        }
        Ok(node.into())
    }

    fn seq_node(
        &mut self,
        def: &Mapping,
        sequence: Option<&Value>,
        mapping: Option<&Value>,
        path: &str,
        depth: usize,
    ) -> Result<SchemaNode> {
        if mapping.is_some() {
            return Err(malformed(path, "a seq node cannot declare `mapping`"));
        }
        reject(def, &["allowempty", "range", "enum", "pattern"], path, "seq")?;

        let variants = match sequence {
            Some(Value::Sequence(variants)) if !variants.is_empty() => variants,
            Some(Value::Sequence(_)) => {
                return Err(malformed(
                    path,
                    "`sequence` must declare at least one element shape",
                ))
            }
            Some(_) => return Err(malformed(path, "`sequence` must be a list")),
            None => return Err(malformed(path, "type seq requires `sequence`")),
        };

        let matching = match def.get("matching").map(|m| m.as_str()) {
            None | Some(Some("any")) => Matching::Any,
            Some(Some("all")) => Matching::All,
            Some(_) => return Err(malformed(path, "`matching` must be `any` or `all`")),
        };

        // `required` on an element shape is accepted and carries no meaning.
        let mut nodes = Vec::with_capacity(variants.len());
        for (index, variant) in variants.iter().enumerate() {
            nodes.push(self.node(variant, &format!("{path}[{index}]"), depth + 1)?);
        }
        Ok(SeqNode::new(nodes).with_matching(matching).into())
    }
}

fn scalar_node(
    def: &Mapping,
    kind: ScalarKind,
    has_children: bool,
    path: &str,
) -> Result<SchemaNode> {
    if has_children {
        return Err(malformed(
            path,
            format!("type {kind} cannot declare `mapping` or `sequence`"),
        ));
    }
    reject(def, &["matching"], path, kind.as_str())?;

    let mut node = ScalarNode::new(kind);

    if flag(def, "allowempty", path)? == Some(false) {
        if kind != ScalarKind::Str {
            return Err(malformed(path, "`allowempty: false` only applies to str"));
        }
        node = node.non_empty();
    }

    if let Some(range) = def.get("range") {
        if !kind.supports_range() {
            return Err(SchemaError::InvalidRange {
                path: path.to_string(),
                message: format!("range is not supported for type {kind}"),
            });
        }
        node = node.with_range(parse_range(range, path)?);
    }

    if let Some(allowed) = def.get("enum") {
        let values = match allowed {
            Value::Sequence(values) if !values.is_empty() => values,
            _ => return Err(malformed(path, "`enum` must be a non-empty list")),
        };
        if kind == ScalarKind::Any {
            return Err(malformed(path, "`enum` needs a concrete type"));
        }
        if values
            .iter()
            .any(|v| matches!(v, Value::Mapping(_) | Value::Sequence(_)))
        {
            return Err(malformed(path, "`enum` values must be scalars"));
        }
        node = node.with_enum(values.clone());
    }

    if let Some(pattern) = def.get("pattern") {
        if kind != ScalarKind::Str {
            return Err(malformed(path, "`pattern` only applies to str"));
        }
        let Some(source) = pattern.as_str() else {
            return Err(malformed(path, "`pattern` must be a string"));
        };
        node = node.with_pattern(compile(source, path)?);
    }

    Ok(node.into())
}

fn parse_range(value: &Value, path: &str) -> Result<Range> {
    let invalid = |message: String| SchemaError::InvalidRange {
        path: path.to_string(),
        message,
    };
    let Value::Mapping(bounds) = value else {
        return Err(invalid("range must be a map of bounds".to_string()));
    };

    let mut min = None;
    let mut max = None;
    for (key, bound) in bounds {
        let key = key.as_str().unwrap_or_default();
        let number = bound
            .as_f64()
            .ok_or_else(|| invalid(format!("bound `{key}` must be a number")))?;
        let (slot, bound) = match key {
            "min" => (&mut min, Bound::inclusive(number)),
            "min-ex" => (&mut min, Bound::exclusive(number)),
            "max" => (&mut max, Bound::inclusive(number)),
            "max-ex" => (&mut max, Bound::exclusive(number)),
            other => return Err(invalid(format!("unknown bound `{other}`"))),
        };
        if slot.replace(bound).is_some() {
            return Err(invalid(format!("bound `{key}` conflicts with another bound")));
        }
    }
    Range::new(min, max).map_err(invalid)
}

fn compile(source: &str, path: &str) -> Result<Pattern> {
    Pattern::new(source).map_err(|err| SchemaError::InvalidPattern {
        path: path.to_string(),
        pattern: source.to_string(),
        message: err.to_string(),
    })
}

fn check_keywords(def: &Mapping, path: &str) -> Result<()> {
    for key in def.keys() {
        let keyword = key.as_str().unwrap_or_default();
        if keyword != "desc" && !KEYWORDS.contains(&keyword) {
            return Err(SchemaError::UnknownKeyword {
                path: path.to_string(),
                keyword: crate::violation::key_text(key),
            });
        }
    }
    if let Some(desc) = def.get("desc") {
        if !desc.is_string() {
            return Err(malformed(path, "`desc` must be a string"));
        }
    }
    Ok(())
}

fn either<'v>(def: &'v Mapping, name: &str, alias: &str, path: &str) -> Result<Option<&'v Value>> {
    match (def.get(name), def.get(alias)) {
        (Some(_), Some(_)) => Err(malformed(
            path,
            format!("`{name}` and `{alias}` are the same keyword"),
        )),
        (value, alias_value) => Ok(value.or(alias_value)),
    }
}

fn flag(def: &Mapping, key: &str, path: &str) -> Result<Option<bool>> {
    match def.get(key) {
        None => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(_) => Err(malformed(path, format!("`{key}` must be a bool"))),
    }
}

fn reject(def: &Mapping, keys: &[&str], path: &str, kind: &str) -> Result<()> {
    match keys.iter().find(|key| def.contains_key(**key)) {
        Some(key) => Err(malformed(
            path,
            format!("`{key}` is not valid on a {kind} node"),
        )),
        None => Ok(()),
    }
}

fn malformed(path: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::Malformed {
        path: path.to_string(),
        message: message.into(),
    }
}
