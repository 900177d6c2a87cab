use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use domainlint_schema::Violation;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentReport {
    pub file: String,
    pub valid: bool,
    pub violations: Vec<Violation>,
    /// Set when the document could not be read or parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentReport {
    pub fn checked(file: String, violations: Vec<Violation>) -> Self {
        Self {
            file,
            valid: violations.is_empty(),
            violations,
            error: None,
        }
    }

    pub fn failed(file: String, error: String) -> Self {
        Self {
            file,
            valid: false,
            violations: Vec::new(),
            error: Some(error),
        }
    }
}

#[derive(Serialize)]
struct ValidationOutput<'a> {
    valid: bool,
    documents: &'a [DocumentReport],
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_reports(reports: &[DocumentReport], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ValidationOutput {
            valid: reports.iter().all(|report| report.valid),
            documents: reports,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FILE", "PATH", "PROBLEM", "EXPECTED", "FOUND"]);
            for report in reports {
                if let Some(error) = &report.error {
                    table.add_row(vec![
                        report.file.as_str(),
                        "",
                        "unreadable",
                        "",
                        error.as_str(),
                    ]);
                    continue;
                }
                if report.valid {
                    table.add_row(vec![report.file.as_str(), "", "valid", "", ""]);
                    continue;
                }
                for violation in &report.violations {
                    add_violation_rows(&mut table, &report.file, violation, 0);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for report in reports {
                if let Some(error) = &report.error {
                    println!("{}: unreadable: {error}", report.file);
                    continue;
                }
                if report.valid {
                    println!("{}: ok", report.file);
                    continue;
                }
                println!("{}: {} violation(s)", report.file, report.violations.len());
                for violation in &report.violations {
                    println!("  {}", violation.to_string().replace('\n', "\n  "));
                }
            }
        }
    }
}

fn add_violation_rows(table: &mut Table, file: &str, violation: &Violation, depth: usize) {
    let path = format!("{}{}", "  ".repeat(depth), violation.path);
    table.add_row(vec![
        file.to_string(),
        path,
        violation.kind.to_string(),
        violation.expected.clone(),
        violation.actual.clone(),
    ]);
    for cause in &violation.causes {
        add_violation_rows(table, file, cause, depth + 1);
    }
}
