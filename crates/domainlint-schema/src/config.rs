/// How a sequence element that fails every variant is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementReport {
    /// Report only the variant with the fewest violations (earliest on ties).
    #[default]
    Closest,
    /// Report the violations of every failing variant.
    All,
}

/// How a document key is checked when several `regex;` fields match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatternMatch {
    /// Only the first matching pattern, in declaration order, applies.
    #[default]
    FirstDeclared,
    /// The value must satisfy every matching pattern's node.
    All,
}

/// Controls schema building and validation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaConfig {
    /// Reporting strategy for sequence elements matching no variant.
    pub element_report: ElementReport,
    /// Tie-break for document keys matched by several regex fields.
    pub pattern_match: PatternMatch,
    /// Maximum nesting depth of one schema body. Each fragment counts from its
    /// own root, since a built fragment is shared by every include site.
    pub max_schema_depth: usize,
    /// Maximum number of fragment files loaded from a directory.
    pub max_fragments_from_directory: usize,
    /// Maximum bytes allowed per schema file loaded from disk.
    pub max_schema_file_size: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            element_report: ElementReport::Closest,
            pattern_match: PatternMatch::FirstDeclared,
            max_schema_depth: 64,
            max_fragments_from_directory: 256,
            max_schema_file_size: 256 * 1024,
        }
    }
}
