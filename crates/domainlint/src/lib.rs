//! Structural validation of assistant domain files.
//!
//! domainlint checks a loaded domain file (intents, entities, actions,
//! responses, slots, forms, config, session_config) against a kwalify-style
//! schema and reports every structural violation with its path.
//!
//! # Crate Structure
//!
//! - [`schema`]: Schema model, registry and validator engine
//! - [`domain`]: The built-in domain-file schema

/// Re-export schema types.
pub mod schema {
    pub use domainlint_schema::*;
}

pub mod domain;

pub use domain::{domain_schema, validate_domain};
