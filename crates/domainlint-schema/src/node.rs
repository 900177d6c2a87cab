use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_yaml::Value;

/// One node of the schema model.
///
/// Nodes are immutable once built. Includes are resolved at build time, so an
/// [`IncludeRef`] always carries the fragment it points at.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Map(MapNode),
    Seq(SeqNode),
    Scalar(ScalarNode),
    Include(IncludeRef),
}

impl SchemaNode {
    /// Short description of the shape this node accepts.
    pub fn describe(&self) -> String {
        match self {
            SchemaNode::Map(_) => "map".to_string(),
            SchemaNode::Seq(_) => "seq".to_string(),
            SchemaNode::Scalar(scalar) => scalar.kind().to_string(),
            SchemaNode::Include(include) => include.target().describe(),
        }
    }
}

impl From<MapNode> for SchemaNode {
    fn from(node: MapNode) -> Self {
        SchemaNode::Map(node)
    }
}

impl From<SeqNode> for SchemaNode {
    fn from(node: SeqNode) -> Self {
        SchemaNode::Seq(node)
    }
}

impl From<ScalarNode> for SchemaNode {
    fn from(node: ScalarNode) -> Self {
        SchemaNode::Scalar(node)
    }
}

impl From<ScalarKind> for SchemaNode {
    fn from(kind: ScalarKind) -> Self {
        SchemaNode::Scalar(ScalarNode::new(kind))
    }
}

impl From<IncludeRef> for SchemaNode {
    fn from(node: IncludeRef) -> Self {
        SchemaNode::Include(node)
    }
}

/// A regex matched against the whole of a key or string value.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// The pattern as written in the schema, without anchoring.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

/// How a map field selects document keys.
#[derive(Debug, Clone)]
pub enum FieldKey {
    Literal(String),
    Pattern(Pattern),
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Literal(name) => write!(f, "`{name}`"),
            FieldKey::Pattern(pattern) => write!(f, "{pattern}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    key: FieldKey,
    required: bool,
    node: SchemaNode,
}

impl Field {
    pub fn key(&self) -> &FieldKey {
        &self.key
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn node(&self) -> &SchemaNode {
        &self.node
    }

    /// The literal field name, if this field is not pattern-keyed.
    pub fn literal(&self) -> Option<&str> {
        match &self.key {
            FieldKey::Literal(name) => Some(name),
            FieldKey::Pattern(_) => None,
        }
    }

    /// The key pattern, if this field is pattern-keyed.
    pub fn pattern(&self) -> Option<&Pattern> {
        match &self.key {
            FieldKey::Literal(_) => None,
            FieldKey::Pattern(pattern) => Some(pattern),
        }
    }
}

/// Map shape: an ordered field table plus the `allowempty` flag.
///
/// Fields are kept in declaration order; pattern fields are tried in that
/// order against keys no literal field claims.
#[derive(Debug, Clone, Default)]
pub struct MapNode {
    fields: Vec<Field>,
    allow_empty: bool,
}

impl MapNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tolerate document keys no field matches.
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    /// Add an optional literal field.
    pub fn field(self, name: impl Into<String>, node: impl Into<SchemaNode>) -> Self {
        self.push(FieldKey::Literal(name.into()), false, node.into())
    }

    /// Add a required literal field.
    pub fn required_field(self, name: impl Into<String>, node: impl Into<SchemaNode>) -> Self {
        self.push(FieldKey::Literal(name.into()), true, node.into())
    }

    /// Add a field applied to keys matching `pattern`.
    pub fn pattern_field(self, pattern: Pattern, node: impl Into<SchemaNode>) -> Self {
        self.push(FieldKey::Pattern(pattern), false, node.into())
    }

    fn push(mut self, key: FieldKey, required: bool, node: SchemaNode) -> Self {
        self.fields.push(Field {
            key,
            required,
            node,
        });
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn allows_empty(&self) -> bool {
        self.allow_empty
    }

    pub fn has_literal(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field.literal() == Some(name))
    }

    pub(crate) fn describe_keys(&self) -> String {
        if self.fields.is_empty() {
            return "no keys".to_string();
        }
        let keys: Vec<String> = self.fields.iter().map(|f| f.key.to_string()).collect();
        format!("one of {}", keys.join(", "))
    }
}

/// Sequence element matching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Matching {
    /// An element must satisfy at least one variant.
    #[default]
    Any,
    /// An element must satisfy every variant.
    All,
}

impl fmt::Display for Matching {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matching::Any => f.write_str("any"),
            Matching::All => f.write_str("all"),
        }
    }
}

/// Sequence shape: alternative element variants plus a matching strategy.
#[derive(Debug, Clone)]
pub struct SeqNode {
    variants: Vec<SchemaNode>,
    matching: Matching,
}

impl SeqNode {
    pub fn new(variants: Vec<SchemaNode>) -> Self {
        Self {
            variants,
            matching: Matching::Any,
        }
    }

    /// Sequence whose elements all share one shape.
    pub fn of(element: impl Into<SchemaNode>) -> Self {
        Self::new(vec![element.into()])
    }

    pub fn with_matching(mut self, matching: Matching) -> Self {
        self.matching = matching;
        self
    }

    pub fn variants(&self) -> &[SchemaNode] {
        &self.variants
    }

    pub fn matching(&self) -> Matching {
        self.matching
    }

    pub(crate) fn describe_variants(&self) -> String {
        let shapes: Vec<String> = self.variants.iter().map(SchemaNode::describe).collect();
        match self.matching {
            Matching::Any => format!("any of {}", shapes.join(" | ")),
            Matching::All => format!("all of {}", shapes.join(" & ")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Str,
    Number,
    Int,
    Float,
    Bool,
    Any,
}

impl ScalarKind {
    /// Resolve a schema `type` name, accepting the usual aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "str" | "string" => Some(Self::Str),
            "number" | "num" => Some(Self::Number),
            "int" | "integer" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" | "boolean" => Some(Self::Bool),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Number => "number",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Any => "any",
        }
    }

    /// Whether a `range` constraint means something for this kind.
    pub fn supports_range(self) -> bool {
        matches!(self, Self::Str | Self::Number | Self::Int | Self::Float)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One end of a [`Range`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub exclusive: bool,
}

impl Bound {
    pub fn inclusive(value: f64) -> Self {
        Self {
            value,
            exclusive: false,
        }
    }

    pub fn exclusive(value: f64) -> Self {
        Self {
            value,
            exclusive: true,
        }
    }
}

/// Numeric bounds. Applied to the value of numbers and the length of strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    min: Option<Bound>,
    max: Option<Bound>,
}

impl Range {
    /// Build a range, rejecting NaN bounds and bounds that admit no value.
    pub fn new(min: Option<Bound>, max: Option<Bound>) -> Result<Self, String> {
        if min.is_none() && max.is_none() {
            return Err("range declares no bounds".to_string());
        }
        for bound in min.iter().chain(max.iter()) {
            if !bound.value.is_finite() {
                return Err(format!("bound {} is not a finite number", bound.value));
            }
        }
        if let (Some(lo), Some(hi)) = (min, max) {
            let empty = lo.value > hi.value
                || (lo.value == hi.value && (lo.exclusive || hi.exclusive));
            if empty {
                return Err(format!(
                    "min {} and max {} admit no value",
                    lo.value, hi.value
                ));
            }
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> Option<Bound> {
        self.min
    }

    pub fn max(&self) -> Option<Bound> {
        self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        let above = match self.min {
            Some(Bound {
                value: min,
                exclusive: true,
            }) => value > min,
            Some(Bound { value: min, .. }) => value >= min,
            None => true,
        };
        let below = match self.max {
            Some(Bound {
                value: max,
                exclusive: true,
            }) => value < max,
            Some(Bound { value: max, .. }) => value <= max,
            None => true,
        };
        above && below
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(min) = self.min {
            let op = if min.exclusive { ">" } else { ">=" };
            parts.push(format!("{op} {}", min.value));
        }
        if let Some(max) = self.max {
            let op = if max.exclusive { "<" } else { "<=" };
            parts.push(format!("{op} {}", max.value));
        }
        f.write_str(&parts.join(" and "))
    }
}

/// Leaf shape with optional constraints.
#[derive(Debug, Clone)]
pub struct ScalarNode {
    kind: ScalarKind,
    range: Option<Range>,
    allow_empty: bool,
    allowed: Vec<Value>,
    pattern: Option<Pattern>,
}

impl ScalarNode {
    pub fn new(kind: ScalarKind) -> Self {
        Self {
            kind,
            range: None,
            allow_empty: true,
            allowed: Vec::new(),
            pattern: None,
        }
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    /// Reject the empty string.
    pub fn non_empty(mut self) -> Self {
        self.allow_empty = false;
        self
    }

    /// Restrict values to the given set.
    pub fn with_enum(mut self, allowed: Vec<Value>) -> Self {
        self.allowed = allowed;
        self
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn range(&self) -> Option<&Range> {
        self.range.as_ref()
    }

    pub fn allows_empty(&self) -> bool {
        self.allow_empty
    }

    pub fn allowed_values(&self) -> &[Value] {
        &self.allowed
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }
}

/// A named fragment reference, linked to the fragment it names.
#[derive(Debug, Clone)]
pub struct IncludeRef {
    name: String,
    target: Arc<SchemaNode>,
}

impl IncludeRef {
    pub fn new(name: impl Into<String>, target: Arc<SchemaNode>) -> Self {
        Self {
            name: name.into(),
            target,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &SchemaNode {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_is_anchored() {
        let pattern = Pattern::new("[A-Za-z]+").unwrap();
        assert!(pattern.is_match("restaurant"));
        assert!(pattern.is_match("booking"));
        assert!(!pattern.is_match("123"));
        assert!(!pattern.is_match("form1"));
        assert_eq!(pattern.as_str(), "[A-Za-z]+");
    }

    #[test]
    fn pattern_alternation_stays_anchored() {
        let pattern = Pattern::new("a|b").unwrap();
        assert!(pattern.is_match("a"));
        assert!(!pattern.is_match("ab"));
    }

    #[test]
    fn range_bounds() {
        let range = Range::new(Some(Bound::inclusive(0.0)), None).unwrap();
        assert!(range.contains(0.0));
        assert!(range.contains(60.0));
        assert!(!range.contains(-5.0));
        assert!(!range.contains(f64::NAN));
        assert_eq!(range.to_string(), ">= 0");

        let open = Range::new(Some(Bound::exclusive(0.0)), Some(Bound::exclusive(1.0))).unwrap();
        assert!(!open.contains(0.0));
        assert!(open.contains(0.5));
        assert!(!open.contains(1.0));
        assert_eq!(open.to_string(), "> 0 and < 1");
    }

    #[test]
    fn range_rejects_conflicting_bounds() {
        assert!(Range::new(Some(Bound::inclusive(5.0)), Some(Bound::inclusive(1.0))).is_err());
        assert!(Range::new(Some(Bound::exclusive(1.0)), Some(Bound::inclusive(1.0))).is_err());
        assert!(Range::new(None, None).is_err());
        assert!(Range::new(Some(Bound::inclusive(f64::NAN)), None).is_err());
        assert!(Range::new(Some(Bound::inclusive(1.0)), Some(Bound::inclusive(1.0))).is_ok());
    }

    #[test]
    fn scalar_kind_aliases() {
        assert_eq!(ScalarKind::from_name("string"), Some(ScalarKind::Str));
        assert_eq!(ScalarKind::from_name("str"), Some(ScalarKind::Str));
        assert_eq!(ScalarKind::from_name("boolean"), Some(ScalarKind::Bool));
        assert_eq!(ScalarKind::from_name("timestamp"), None);
        assert!(!ScalarKind::Bool.supports_range());
        assert!(ScalarKind::Str.supports_range());
    }

    #[test]
    fn include_describes_its_target() {
        let target = Arc::new(SchemaNode::from(MapNode::new()));
        let include = SchemaNode::from(IncludeRef::new("responses", target));
        assert_eq!(include.describe(), "map");
    }

    #[test]
    fn map_field_table_keeps_declaration_order() {
        let node = MapNode::new()
            .required_field("b", ScalarKind::Str)
            .pattern_field(Pattern::new("x.*").unwrap(), ScalarKind::Any)
            .field("a", ScalarKind::Bool);
        let keys: Vec<String> = node.fields().iter().map(|f| f.key().to_string()).collect();
        assert_eq!(keys, vec!["`b`", "/x.*/", "`a`"]);
        assert!(node.has_literal("a"));
        assert!(!node.has_literal("x1"));
        assert!(node.fields()[0].is_required());
    }
}
