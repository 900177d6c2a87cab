//! Kwalify-style schema model and structural validator.
//!
//! A schema is a tree of map, sequence, scalar and include nodes. Documents
//! (already parsed YAML/JSON values) are checked against it and every
//! mismatch comes back as a [`Violation`] with a root-relative path.
//! Problems with the schema itself are [`SchemaError`]s raised while building,
//! never while validating.
//!
//! ```
//! use domainlint_schema::{Registry, Schema};
//!
//! let schema = Schema::build(
//!     "mapping: {actions: {type: seq, required: true, sequence: [{type: str}]}}",
//!     &Registry::new(),
//! )
//! .unwrap();
//! let doc: serde_yaml::Value = serde_yaml::from_str("actions: [utter_greet, 1]").unwrap();
//! let violations = schema.validate(&doc);
//! assert_eq!(violations.len(), 1);
//! assert_eq!(violations[0].path.to_string(), "actions[1]");
//! ```

mod builder;
pub mod config;
pub mod error;
pub mod node;
pub mod path;
pub mod registry;
pub mod schema;
mod validator;
pub mod violation;

pub use config::{ElementReport, PatternMatch, SchemaConfig};
pub use error::{Result, SchemaError};
pub use node::{
    Bound, Field, FieldKey, IncludeRef, MapNode, Matching, Pattern, Range, ScalarKind, ScalarNode,
    SchemaNode, SeqNode,
};
pub use path::{DocPath, PathSegment};
pub use registry::Registry;
pub use schema::{validate, Schema};
pub use violation::{summarize, Violation, ViolationKind};
