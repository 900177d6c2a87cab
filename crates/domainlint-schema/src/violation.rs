use std::fmt;

use serde::Serialize;
use serde_yaml::Value;

use crate::path::DocPath;

const PREVIEW_CHARS: usize = 32;

/// Category of a document-shape problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    TypeMismatch,
    MissingField,
    UnexpectedField,
    RangeViolation,
    ElementMismatch,
    EmptyValue,
    EnumMismatch,
    PatternMismatch,
}

impl ViolationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TypeMismatch => "type mismatch",
            Self::MissingField => "missing field",
            Self::UnexpectedField => "unexpected field",
            Self::RangeViolation => "out of range",
            Self::ElementMismatch => "no matching element shape",
            Self::EmptyValue => "empty value",
            Self::EnumMismatch => "value not allowed",
            Self::PatternMismatch => "pattern mismatch",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structural mismatch between a document and its schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub path: DocPath,
    pub kind: ViolationKind,
    /// What the schema wanted at this position.
    pub expected: String,
    /// What the document holds there.
    pub actual: String,
    /// For [`ViolationKind::ElementMismatch`]: why the reported variant(s) failed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<Violation>,
}

impl Violation {
    pub fn new(
        path: DocPath,
        kind: ViolationKind,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            path,
            kind,
            expected: expected.into(),
            actual: actual.into(),
            causes: Vec::new(),
        }
    }

    pub fn with_causes(mut self, causes: Vec<Violation>) -> Self {
        self.causes = causes;
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: expected {}, found {}",
            self.path, self.kind, self.expected, self.actual
        )?;
        for cause in &self.causes {
            write!(f, "\n  - {cause}")?;
        }
        Ok(())
    }
}

/// Strip YAML tags; tagged values are checked through their content.
pub(crate) fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

/// Human-readable summary of a document value for reports.
pub fn summarize(value: &Value) -> String {
    match untag(value) {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {b}"),
        Value::Number(n) if n.is_f64() => format!("float {n}"),
        Value::Number(n) => format!("int {n}"),
        Value::String(s) => {
            let mut preview: String = s.chars().take(PREVIEW_CHARS).collect();
            if s.chars().count() > PREVIEW_CHARS {
                preview.push_str("...");
            }
            format!("str {preview:?}")
        }
        Value::Sequence(items) => format!("seq of {} items", items.len()),
        Value::Mapping(map) => format!("map with {} keys", map.len()),
        Value::Tagged(_) => "tagged value".to_string(),
    }
}

/// Text form of a mapping key, used for path segments and pattern matching.
pub(crate) fn key_text(key: &Value) -> String {
    match untag(key) {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "~".to_string(),
        other => summarize(other),
    }
}
