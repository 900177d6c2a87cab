use serde::Serialize;
use tracing::info;

use crate::cmd::{load_schema, CheckSchemaArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct SchemaSummary<'a> {
    schema: &'a str,
    root: String,
    declared_fragments: Vec<&'a str>,
    registry_fragments: &'a [String],
}

pub fn run(args: CheckSchemaArgs, format: OutputFormat) -> CliResult<i32> {
    let loaded = load_schema(&args.schema, Default::default())?;
    let summary = SchemaSummary {
        schema: &loaded.source,
        root: loaded.schema.root().describe(),
        declared_fragments: loaded.schema.fragment_names(),
        registry_fragments: &loaded.registry_fragments,
    };
    info!(schema = %loaded.source, "schema is valid");

    match format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Schema:             {}", summary.schema);
            println!("Root:               {}", summary.root);
            println!("Declared fragments: {}", list(&summary.declared_fragments));
            let registry: Vec<&str> = summary.registry_fragments.iter().map(String::as_str).collect();
            println!("Registry fragments: {}", list(&registry));
        }
    }
    Ok(SUCCESS)
}

fn list(names: &[&str]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
