/// Errors raised while building a schema or populating a registry.
///
/// These never describe a problem with the validated document; document
/// problems are reported as [`crate::Violation`]s.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A schema source could not be loaded from disk.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// The schema text is not valid YAML/JSON.
    #[error("schema is not valid YAML: {0}")]
    InvalidSyntax(#[from] serde_yaml::Error),

    /// A schema node is structurally wrong (bad keyword value, conflicting keywords).
    #[error("malformed schema at {path}: {message}")]
    Malformed { path: String, message: String },

    /// A schema node uses a keyword the builder does not know.
    #[error("unknown schema keyword `{keyword}` at {path}")]
    UnknownKeyword { path: String, keyword: String },

    /// A `type` value names no supported kind.
    #[error("unknown type `{name}` at {path}")]
    UnknownType { path: String, name: String },

    /// A `range` constraint is malformed or its bounds conflict.
    #[error("invalid range at {path}: {message}")]
    InvalidRange { path: String, message: String },

    /// A `regex;` key or `pattern` does not compile.
    #[error("invalid pattern `{pattern}` at {path}: {message}")]
    InvalidPattern {
        path: String,
        pattern: String,
        message: String,
    },

    /// An `include` names a fragment that is neither declared nor registered.
    #[error("unresolved include `{0}`")]
    UnresolvedInclude(String),

    /// Fragments include each other in a loop.
    #[error("include cycle: {}", .0.join(" -> "))]
    IncludeCycle(Vec<String>),

    /// The same fragment name is declared twice.
    #[error("fragment `{0}` is already registered")]
    DuplicateFragment(String),

    /// Schema nesting exceeds the configured depth guard.
    #[error("schema nesting exceeds max depth {max} at {path}")]
    TooDeep { path: String, max: usize },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
