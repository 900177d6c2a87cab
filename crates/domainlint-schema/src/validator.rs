use serde_yaml::{Mapping, Value};

use crate::config::{ElementReport, PatternMatch, SchemaConfig};
use crate::node::{MapNode, Matching, ScalarKind, ScalarNode, SchemaNode, SeqNode};
use crate::path::{DocPath, PathSegment};
use crate::violation::{key_text, summarize, untag, Violation, ViolationKind};

/// Walks a document in lock-step with a schema tree, collecting violations.
pub(crate) struct Validator<'c> {
    config: &'c SchemaConfig,
    path: DocPath,
    violations: Vec<Violation>,
}

impl<'c> Validator<'c> {
    pub(crate) fn new(config: &'c SchemaConfig) -> Self {
        Self::at(config, DocPath::root())
    }

    fn at(config: &'c SchemaConfig, path: DocPath) -> Self {
        Self {
            config,
            path,
            violations: Vec::new(),
        }
    }

    pub(crate) fn run(mut self, node: &SchemaNode, value: &Value) -> Vec<Violation> {
        self.check(node, value);
        self.violations
    }

    fn check(&mut self, node: &SchemaNode, value: &Value) {
        let value = untag(value);
        match node {
            SchemaNode::Map(map) => self.check_map(map, value),
            SchemaNode::Seq(seq) => self.check_seq(seq, value),
            SchemaNode::Scalar(scalar) => self.check_scalar(scalar, value),
            SchemaNode::Include(include) => self.check(include.target(), value),
        }
    }

    fn report(
        &mut self,
        kind: ViolationKind,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) {
        self.violations
            .push(Violation::new(self.path.clone(), kind, expected, actual));
    }

    fn descend(&mut self, segment: PathSegment, node: &SchemaNode, value: &Value) {
        self.path.push(segment);
        self.check(node, value);
        self.path.pop();
    }

    fn check_map(&mut self, node: &MapNode, value: &Value) {
        let Value::Mapping(map) = value else {
            self.report(ViolationKind::TypeMismatch, "map", summarize(value));
            return;
        };

        for field in node.fields() {
            let Some(name) = field.literal() else {
                continue;
            };
            match literal_entry(map, name) {
                Some(child) => self.descend(PathSegment::Key(name.to_string()), field.node(), child),
                None if field.is_required() => {
                    self.path.push(PathSegment::Key(name.to_string()));
                    self.report(ViolationKind::MissingField, field.node().describe(), "nothing");
                    self.path.pop();
                }
                None => {}
            }
        }

        self.check_remaining_keys(node, map);
    }

    fn check_remaining_keys(&mut self, node: &MapNode, map: &Mapping) {
        for (key, child) in map {
            if matches!(untag(key), Value::String(name) if node.has_literal(name)) {
                continue;
            }
            let text = key_text(key);
            self.path.push(PathSegment::Key(text.clone()));

            let mut matched = false;
            for field in node.fields() {
                let Some(pattern) = field.pattern() else {
                    continue;
                };
                if !pattern.is_match(&text) {
                    continue;
                }
                matched = true;
                self.check(field.node(), child);
                if self.config.pattern_match == PatternMatch::FirstDeclared {
                    break;
                }
            }

            if !matched && !node.allows_empty() {
                self.report(
                    ViolationKind::UnexpectedField,
                    node.describe_keys(),
                    format!("key `{text}`"),
                );
            }
            self.path.pop();
        }
    }

    fn check_seq(&mut self, node: &SeqNode, value: &Value) {
        let Value::Sequence(items) = value else {
            self.report(ViolationKind::TypeMismatch, "seq", summarize(value));
            return;
        };

        // A single shape needs no variant selection; report its violations directly.
        if let [only] = node.variants() {
            for (index, item) in items.iter().enumerate() {
                self.descend(PathSegment::Index(index), only, item);
            }
            return;
        }

        for (index, item) in items.iter().enumerate() {
            self.path.push(PathSegment::Index(index));
            if let Some(causes) = self.match_variants(node, item) {
                self.violations.push(
                    Violation::new(
                        self.path.clone(),
                        ViolationKind::ElementMismatch,
                        node.describe_variants(),
                        summarize(item),
                    )
                    .with_causes(causes),
                );
            }
            self.path.pop();
        }
    }

    /// Returns the causes to report when `item` fails the sequence's matching rule.
    fn match_variants(&self, node: &SeqNode, item: &Value) -> Option<Vec<Violation>> {
        let mut failures: Vec<Vec<Violation>> = Vec::new();
        for variant in node.variants() {
            let outcome = self.try_variant(variant, item);
            if outcome.is_empty() {
                if node.matching() == Matching::Any {
                    return None;
                }
            } else {
                failures.push(outcome);
            }
        }
        if failures.is_empty() {
            return None;
        }

        let causes = match self.config.element_report {
            ElementReport::Closest => failures
                .into_iter()
                .min_by_key(Vec::len)
                .unwrap_or_default(),
            ElementReport::All => failures.into_iter().flatten().collect(),
        };
        Some(causes)
    }

    fn try_variant(&self, node: &SchemaNode, value: &Value) -> Vec<Violation> {
        Validator::at(self.config, self.path.clone()).run(node, value)
    }

    fn check_scalar(&mut self, node: &ScalarNode, value: &Value) {
        if node.kind() == ScalarKind::Any {
            return;
        }
        if !kind_matches(node.kind(), value) {
            self.report(ViolationKind::TypeMismatch, node.kind().as_str(), summarize(value));
            return;
        }

        if let Value::String(text) = value {
            if text.is_empty() && !node.allows_empty() {
                self.report(ViolationKind::EmptyValue, "non-empty str", "empty str");
            }
            if let Some(pattern) = node.pattern() {
                if !pattern.is_match(text) {
                    self.report(
                        ViolationKind::PatternMismatch,
                        format!("str matching {pattern}"),
                        summarize(value),
                    );
                }
            }
        }

        let allowed = node.allowed_values();
        if !allowed.is_empty() && !allowed.contains(value) {
            let choices: Vec<String> = allowed.iter().map(summarize).collect();
            self.report(
                ViolationKind::EnumMismatch,
                format!("one of {}", choices.join(", ")),
                summarize(value),
            );
        }

        if let Some(range) = node.range() {
            let measured = match value {
                Value::Number(n) => n.as_f64().map(|v| (v, "")),
                Value::String(s) => Some((s.chars().count() as f64, "length ")),
                _ => None,
            };
            if let Some((measure, label)) = measured {
                if !range.contains(measure) {
                    self.report(
                        ViolationKind::RangeViolation,
                        format!("{label}{range}"),
                        summarize(value),
                    );
                }
            }
        }
    }
}

fn kind_matches(kind: ScalarKind, value: &Value) -> bool {
    match (kind, value) {
        (ScalarKind::Any, _) => true,
        (ScalarKind::Str, Value::String(_)) => true,
        (ScalarKind::Bool, Value::Bool(_)) => true,
        (ScalarKind::Number, Value::Number(_)) => true,
        (ScalarKind::Int, Value::Number(n)) => n.is_i64() || n.is_u64(),
        (ScalarKind::Float, Value::Number(n)) => n.is_f64(),
        _ => false,
    }
}

/// Value of the key named `name`, matching tagged keys by their content.
fn literal_entry<'v>(map: &'v Mapping, name: &str) -> Option<&'v Value> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| matches!(untag(key), Value::String(text) if text == name))
            .map(|(_, value)| value)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_yaml::value::{Tag, TaggedValue};

    use super::*;
    use crate::node::{Bound, IncludeRef, Pattern, Range};

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    fn run(node: &SchemaNode, doc: &str) -> Vec<Violation> {
        let config = SchemaConfig::default();
        Validator::new(&config).run(node, &yaml(doc))
    }

    fn kinds(violations: &[Violation]) -> Vec<ViolationKind> {
        violations.iter().map(|v| v.kind).collect()
    }

    fn paths(violations: &[Violation]) -> Vec<String> {
        violations.iter().map(|v| v.path.to_string()).collect()
    }

    #[test]
    fn map_reports_missing_then_unexpected_in_order() {
        let node = SchemaNode::from(
            MapNode::new()
                .required_field("a", ScalarKind::Str)
                .required_field("b", ScalarKind::Str)
                .field("c", ScalarKind::Str),
        );
        let violations = run(&node, "{z: 1, b: x, y: 2}");
        assert_eq!(
            kinds(&violations),
            vec![
                ViolationKind::MissingField,
                ViolationKind::UnexpectedField,
                ViolationKind::UnexpectedField
            ]
        );
        assert_eq!(paths(&violations), vec!["a", "z", "y"]);
    }

    #[test]
    fn map_type_mismatch_stops_descent() {
        let node = SchemaNode::from(MapNode::new().required_field("a", ScalarKind::Str));
        let violations = run(&node, "[1, 2]");
        assert_eq!(kinds(&violations), vec![ViolationKind::TypeMismatch]);
        assert_eq!(violations[0].expected, "map");
        assert_eq!(violations[0].actual, "seq of 2 items");
    }

    #[test]
    fn allowempty_accepts_unknown_keys_unchecked() {
        let node = SchemaNode::from(
            MapNode::new()
                .allow_empty(true)
                .field("known", ScalarKind::Bool),
        );
        assert!(run(&node, "{known: true, other: [1, {x: 2}]}").is_empty());
        assert_eq!(
            kinds(&run(&node, "{known: 3}")),
            vec![ViolationKind::TypeMismatch]
        );
    }

    #[test]
    fn regex_keys_first_declared_wins() {
        let node = SchemaNode::from(
            MapNode::new()
                .pattern_field(Pattern::new("[a-z]+").unwrap(), ScalarKind::Str)
                .pattern_field(Pattern::new("[a-z0-9]+").unwrap(), ScalarKind::Int),
        );
        // "abc" hits the first pattern only; "a1" falls through to the second.
        assert!(run(&node, "{abc: text, a1: 3}").is_empty());
        let violations = run(&node, "{abc: 3}");
        assert_eq!(kinds(&violations), vec![ViolationKind::TypeMismatch]);
        assert_eq!(violations[0].expected, "str");
    }

    #[test]
    fn regex_keys_all_policy_checks_every_match() {
        let node = SchemaNode::from(
            MapNode::new()
                .pattern_field(Pattern::new("[a-z]+").unwrap(), ScalarKind::Str)
                .pattern_field(Pattern::new("[a-z0-9]+").unwrap(), ScalarKind::Int),
        );
        let config = SchemaConfig {
            pattern_match: PatternMatch::All,
            ..SchemaConfig::default()
        };
        let violations = Validator::new(&config).run(&node, &yaml("{abc: text}"));
        assert_eq!(kinds(&violations), vec![ViolationKind::TypeMismatch]);
        assert_eq!(violations[0].expected, "int");
    }

    #[test]
    fn literal_key_shadows_patterns() {
        let node = SchemaNode::from(
            MapNode::new()
                .field("fixed", ScalarKind::Bool)
                .pattern_field(Pattern::new(".*").unwrap(), ScalarKind::Str),
        );
        assert!(run(&node, "{fixed: true, free: text}").is_empty());
    }

    #[test]
    fn numeric_document_keys_are_matched_as_text() {
        let node = SchemaNode::from(
            MapNode::new().pattern_field(Pattern::new("[A-Za-z]+").unwrap(), MapNode::new()),
        );
        let violations = run(&node, "{123: {}}");
        assert_eq!(kinds(&violations), vec![ViolationKind::UnexpectedField]);
        assert_eq!(paths(&violations), vec!["123"]);
    }

    #[test]
    fn single_variant_sequence_reports_per_index() {
        let node = SchemaNode::from(SeqNode::of(ScalarKind::Str));
        let violations = run(&node, "[1, ok, 2]");
        assert_eq!(paths(&violations), vec!["[0]", "[2]"]);
        assert!(violations
            .iter()
            .all(|v| v.kind == ViolationKind::TypeMismatch));
    }

    #[test]
    fn any_matching_accepts_each_variant() {
        let node = SchemaNode::from(SeqNode::new(vec![
            MapNode::new()
                .allow_empty(true)
                .field("roles", SeqNode::of(ScalarKind::Str))
                .into(),
            ScalarKind::Str.into(),
        ]));
        assert!(run(&node, "[{roles: [driver]}, city]").is_empty());
    }

    #[test]
    fn element_mismatch_reports_closest_variant() {
        let node = SchemaNode::from(SeqNode::new(vec![
            MapNode::new()
                .required_field("a", ScalarKind::Str)
                .required_field("b", ScalarKind::Str)
                .into(),
            MapNode::new().required_field("a", ScalarKind::Str).into(),
        ]));
        let violations = run(&node, "[ok, {a: 1}]");
        assert_eq!(
            kinds(&violations),
            vec![ViolationKind::ElementMismatch, ViolationKind::ElementMismatch]
        );
        assert_eq!(paths(&violations), vec!["[0]", "[1]"]);
        assert_eq!(violations[0].expected, "any of map | map");
        // Both variants fail the string with one violation; the first declared is kept.
        assert_eq!(violations[0].causes.len(), 1);
        // Second element: variant one has two violations, variant two has one.
        assert_eq!(violations[1].causes.len(), 1);
        assert_eq!(violations[1].causes[0].path.to_string(), "[1].a");
    }

    #[test]
    fn element_report_all_collects_every_variant() {
        let node = SchemaNode::from(SeqNode::new(vec![
            ScalarKind::Str.into(),
            ScalarKind::Bool.into(),
        ]));
        let config = SchemaConfig {
            element_report: ElementReport::All,
            ..SchemaConfig::default()
        };
        let violations = Validator::new(&config).run(&node, &yaml("[3]"));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].causes.len(), 2);
    }

    #[test]
    fn all_matching_requires_every_variant() {
        let node = SchemaNode::from(
            SeqNode::new(vec![
                ScalarKind::Str.into(),
                ScalarNode::new(ScalarKind::Str)
                    .with_pattern(Pattern::new("utter_.*").unwrap())
                    .into(),
            ])
            .with_matching(Matching::All),
        );
        let violations = run(&node, "[utter_greet, greet]");
        assert_eq!(kinds(&violations), vec![ViolationKind::ElementMismatch]);
        assert_eq!(paths(&violations), vec!["[1]"]);
        assert_eq!(
            violations[0].causes[0].kind,
            ViolationKind::PatternMismatch
        );
    }

    #[test]
    fn range_applies_to_numbers_and_string_length() {
        let number = SchemaNode::from(
            ScalarNode::new(ScalarKind::Number)
                .with_range(Range::new(Some(Bound::inclusive(0.0)), None).unwrap()),
        );
        assert!(run(&number, "60").is_empty());
        assert!(run(&number, "0.5").is_empty());
        let violations = run(&number, "-5");
        assert_eq!(kinds(&violations), vec![ViolationKind::RangeViolation]);
        assert_eq!(violations[0].expected, ">= 0");
        assert_eq!(violations[0].actual, "int -5");

        let text = SchemaNode::from(
            ScalarNode::new(ScalarKind::Str)
                .with_range(Range::new(None, Some(Bound::inclusive(3.0))).unwrap()),
        );
        assert!(run(&text, "abc").is_empty());
        assert_eq!(run(&text, "abcd")[0].expected, "length <= 3");
    }

    #[test]
    fn scalar_kinds() {
        let int = SchemaNode::from(ScalarKind::Int);
        assert!(run(&int, "3").is_empty());
        assert_eq!(kinds(&run(&int, "3.5")), vec![ViolationKind::TypeMismatch]);

        let float = SchemaNode::from(ScalarKind::Float);
        assert!(run(&float, "3.5").is_empty());
        assert!(!run(&float, "3").is_empty());

        let boolean = SchemaNode::from(ScalarKind::Bool);
        assert!(run(&boolean, "false").is_empty());
        assert!(!run(&boolean, "\"false\"").is_empty());

        let any = SchemaNode::from(ScalarKind::Any);
        assert!(run(&any, "~").is_empty());
        assert!(run(&any, "{a: [1]}").is_empty());

        let text = SchemaNode::from(ScalarKind::Str);
        assert_eq!(kinds(&run(&text, "~")), vec![ViolationKind::TypeMismatch]);
    }

    #[test]
    fn empty_enum_and_pattern_constraints() {
        let version = SchemaNode::from(ScalarNode::new(ScalarKind::Str).non_empty());
        assert_eq!(kinds(&run(&version, "\"\"")), vec![ViolationKind::EmptyValue]);
        assert!(run(&version, "\"3.1\"").is_empty());

        let choice = SchemaNode::from(
            ScalarNode::new(ScalarKind::Str)
                .with_enum(vec![Value::from("from_entity"), Value::from("from_text")]),
        );
        assert!(run(&choice, "from_text").is_empty());
        let violations = run(&choice, "from_intent");
        assert_eq!(kinds(&violations), vec![ViolationKind::EnumMismatch]);
        assert_eq!(
            violations[0].expected,
            "one of str \"from_entity\", str \"from_text\""
        );
    }

    #[test]
    fn tagged_values_are_checked_by_content() {
        let node = SchemaNode::from(ScalarKind::Str);
        assert!(run(&node, "!custom text").is_empty());
        assert!(!run(&node, "!custom [1]").is_empty());
    }

    #[test]
    fn tagged_keys_match_literal_fields() {
        let node = SchemaNode::from(
            MapNode::new().required_field("intents", SeqNode::of(ScalarKind::Str)),
        );
        let mut map = Mapping::new();
        map.insert(
            Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new("k"),
                value: Value::from("intents"),
            })),
            Value::Sequence(vec![Value::from("greet"), Value::from(1)]),
        );

        let config = SchemaConfig::default();
        let violations = Validator::new(&config).run(&node, &Value::Mapping(map));
        assert_eq!(kinds(&violations), vec![ViolationKind::TypeMismatch]);
        assert_eq!(paths(&violations), vec!["intents[1]"]);
    }

    #[test]
    fn include_descends_into_target() {
        let fragment = Arc::new(SchemaNode::from(MapNode::new().pattern_field(
            Pattern::new(".+").unwrap(),
            SeqNode::of(MapNode::new().allow_empty(true)),
        )));
        let node = SchemaNode::from(
            MapNode::new().required_field("responses", IncludeRef::new("responses", fragment)),
        );
        assert!(run(&node, "{responses: {utter_greet: [{text: hi}]}}").is_empty());
        let violations = run(&node, "{responses: {utter_greet: hi}}");
        assert_eq!(paths(&violations), vec!["responses.utter_greet"]);
        assert_eq!(kinds(&violations), vec![ViolationKind::TypeMismatch]);
    }

    #[test]
    fn validation_is_deterministic() {
        let node = SchemaNode::from(
            MapNode::new()
                .required_field("a", ScalarKind::Int)
                .field("b", SeqNode::of(ScalarKind::Str)),
        );
        let doc = "{b: [1, x, 2], c: 1, d: 2}";
        let first = run(&node, doc);
        for _ in 0..5 {
            assert_eq!(run(&node, doc), first);
        }
        assert_eq!(first.len(), 5);
    }
}
