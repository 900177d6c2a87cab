use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use domainlint::domain;
use domainlint_schema::{ElementReport, PatternMatch, Registry, Schema, SchemaConfig};
use tracing::debug;

use crate::exit::{schema_error, CliResult};
use crate::output::OutputFormat;

pub mod check_schema;
pub mod validate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate domain files against the schema.
    Validate(ValidateArgs),
    /// Build the schema and its fragments without validating anything.
    CheckSchema(CheckSchemaArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Validate(args) => validate::run(args, format),
        Command::CheckSchema(args) => check_schema::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Default)]
pub struct SchemaArgs {
    /// Schema file to use instead of the built-in domain schema.
    #[arg(long, value_name = "FILE")]
    pub schema: Option<PathBuf>,
    /// Directory of fragment files (`schema;<name>` entries) available to `include`.
    #[arg(long, value_name = "DIR")]
    pub fragments: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct PolicyArgs {
    /// Check keys against every matching regex field, not only the first declared.
    #[arg(long)]
    pub all_patterns: bool,
    /// Report every failing variant for sequence elements, not only the closest.
    #[arg(long)]
    pub report_all_variants: bool,
}

impl PolicyArgs {
    pub fn config(&self) -> SchemaConfig {
        SchemaConfig {
            pattern_match: if self.all_patterns {
                PatternMatch::All
            } else {
                PatternMatch::FirstDeclared
            },
            element_report: if self.report_all_variants {
                ElementReport::All
            } else {
                ElementReport::Closest
            },
            ..SchemaConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Domain files to validate (YAML or JSON).
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,
    #[command(flatten)]
    pub schema: SchemaArgs,
    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Args, Debug)]
pub struct CheckSchemaArgs {
    #[command(flatten)]
    pub schema: SchemaArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// A built schema plus the registry fragments it was linked against.
pub struct LoadedSchema {
    pub schema: Schema,
    pub source: String,
    pub registry_fragments: Vec<String>,
}

pub fn load_schema(args: &SchemaArgs, config: SchemaConfig) -> CliResult<LoadedSchema> {
    let registry = match &args.fragments {
        Some(dir) => Registry::from_directory_with_config(dir, config)
            .map_err(|err| schema_error(&format!("loading fragments from {}", dir.display()), err))?,
        None => Registry::with_config(config),
    };

    let (schema, source, registry) = match &args.schema {
        Some(path) => (
            build_from_file(path, &registry)?,
            path.display().to_string(),
            registry,
        ),
        None => {
            let linked = domain::link_built_in(&registry)
                .map_err(|err| schema_error("linking built-in fragments", err))?;
            let schema = Schema::build(domain::DOMAIN_SCHEMA, &linked)
                .map_err(|err| schema_error("building built-in domain schema", err))?;
            (schema, "built-in".to_string(), linked)
        }
    };

    let registry_fragments = registry.names().into_iter().map(str::to_string).collect();
    debug!(schema = %source, "schema ready");
    Ok(LoadedSchema {
        schema,
        source,
        registry_fragments,
    })
}

fn build_from_file(path: &Path, registry: &Registry) -> CliResult<Schema> {
    Schema::from_file(path, registry)
        .map_err(|err| schema_error(&format!("building schema {}", path.display()), err))
}
