use std::path::Path;

use serde_yaml::Value;
use tracing::{debug, info, warn};

use crate::cmd::{load_schema, ValidateArgs};
use crate::exit::{document_error, io_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_reports, DocumentReport, OutputFormat};

pub fn run(args: ValidateArgs, format: OutputFormat) -> CliResult<i32> {
    let loaded = load_schema(&args.schema, args.policy.config())?;

    let mut reports = Vec::with_capacity(args.files.len());
    let mut load_failure = None;
    for path in &args.files {
        let file = path.display().to_string();
        let document = match load_document(path) {
            Ok(document) => document,
            Err(err) => {
                warn!(file = %file, error = %err, "document could not be loaded");
                load_failure.get_or_insert(err.code);
                reports.push(DocumentReport::failed(file, err.message));
                continue;
            }
        };
        let violations = loaded.schema.validate(&document);
        debug!(file = %file, violations = violations.len(), "validated document");
        reports.push(DocumentReport::checked(file, violations));
    }

    let invalid = reports.iter().filter(|report| !report.valid).count();
    info!(
        schema = %loaded.source,
        documents = reports.len(),
        invalid,
        "validation finished"
    );
    print_reports(&reports, format);

    Ok(match load_failure {
        Some(code) => code,
        None if invalid > 0 => DATA_INVALID,
        None => SUCCESS,
    })
}

fn load_document(path: &Path) -> CliResult<Value> {
    let context = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|err| io_error(&context, err))?;
    serde_yaml::from_str(&text).map_err(|err| document_error(&context, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparsable_document_is_data_invalid() {
        let path = std::env::temp_dir().join(format!(
            "domainlint-bad-document-{}.yml",
            std::process::id()
        ));
        std::fs::write(&path, "intents: [unclosed").unwrap();

        let err = load_document(&path).err().expect("parse should fail");
        assert_eq!(err.code, DATA_INVALID);

        let _ = std::fs::remove_file(&path);
    }
}
