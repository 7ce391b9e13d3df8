//! Output formatting for validation results

use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use specgate_core::{BulkResult, Level, ValidationIssue, ValidationReport};

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Counts over a bulk run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub items: usize,
    pub passed: usize,
    pub failed: usize,
}

impl Totals {
    pub fn from_results(results: &[BulkResult]) -> Self {
        let passed = results.iter().filter(|r| r.valid).count();
        Self {
            items: results.len(),
            passed,
            failed: results.len() - passed,
        }
    }
}

#[derive(Serialize)]
struct BulkOutput<'a> {
    items: &'a [BulkResult],
    summary: Totals,
}

/// Render the results of a `validate` run in the specified format
pub fn render_results(results: &[BulkResult], format: OutputFormat) -> eyre::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_results_text(results)),
        OutputFormat::Json => {
            let output = BulkOutput {
                items: results,
                summary: Totals::from_results(results),
            };
            Ok(serde_json::to_string_pretty(&output)? + "\n")
        }
    }
}

/// Render the dependency report of one change in the specified format
pub fn render_dependency_report(
    change: &str,
    report: &ValidationReport,
    format: OutputFormat,
) -> eyre::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)? + "\n"),
        OutputFormat::Text => {
            let mut output = String::new();
            output.push_str(&status_line(
                report.valid,
                report.summary.errors,
                report.summary.warnings,
                &format!("dependencies of {}", change.cyan().bold()),
            ));
            for issue in &report.issues {
                output.push_str(&render_issue(issue));
            }
            Ok(output)
        }
    }
}

fn render_results_text(results: &[BulkResult]) -> String {
    let mut output = String::new();

    for result in results {
        let label = format!("{} {}", result.kind.as_str().dimmed(), result.name.cyan().bold());

        match (&result.report, &result.error) {
            (_, Some(error)) => {
                output.push_str(&format!("{} {}\n", "FAIL".red().bold(), label));
                output.push_str(&format!("     {} {}\n", "error".red(), error));
            }
            (Some(report), None) => {
                output.push_str(&status_line(
                    report.valid,
                    report.summary.errors,
                    report.summary.warnings,
                    &label,
                ));
                for issue in &report.issues {
                    output.push_str(&render_issue(issue));
                }
            }
            (None, None) => {}
        }
    }

    let totals = Totals::from_results(results);
    output.push('\n');
    output.push_str(&format!(
        "Validated {} item{}: {} passed, {} failed\n",
        totals.items,
        if totals.items == 1 { "" } else { "s" },
        totals.passed.to_string().green(),
        if totals.failed > 0 {
            totals.failed.to_string().red().to_string()
        } else {
            totals.failed.to_string()
        }
    ));
    output
}

fn status_line(valid: bool, errors: usize, warnings: usize, label: &str) -> String {
    let mut counts = Vec::new();
    if errors > 0 {
        counts.push(plural(errors, "error"));
    }
    if warnings > 0 {
        counts.push(plural(warnings, "warning"));
    }
    let counts = if counts.is_empty() {
        String::new()
    } else {
        format!(" ({})", counts.join(", "))
    };

    let marker = if !valid {
        "FAIL".red().bold().to_string()
    } else if warnings > 0 {
        "WARN".yellow().bold().to_string()
    } else {
        "OK".green().bold().to_string()
    };
    format!("{marker} {label}{}\n", counts.dimmed())
}

fn render_issue(issue: &ValidationIssue) -> String {
    let level = match issue.level {
        Level::Error => issue.level.as_str().red().to_string(),
        Level::Warning => issue.level.as_str().yellow().to_string(),
        Level::Info => issue.level.as_str().blue().to_string(),
    };
    format!(
        "     {} {}:{} {}\n",
        level,
        issue.path.dimmed(),
        issue.line,
        issue.message
    )
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
