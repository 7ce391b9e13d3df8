//! Base spec validation
//!
//! A base spec lives at `specs/<capability>/spec.md` and must carry a
//! `## Requirements` section whose requirements each state a SHALL/MUST and
//! come with at least one `#### Scenario:`.

use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result, read_file};
use crate::extract::{
    Requirement, contains_shall_or_must, extract_requirements, extract_sections,
    locate_requirement, requirement_header_name,
};
use crate::markdown::parse;
use crate::report::{ValidationIssue, ValidationMode, ValidationReport};

pub const REQUIREMENTS_SECTION: &str = "Requirements";

/// Scenario markers that are recognisable but use the wrong syntax.
///
/// Checked in order against each trimmed line of a requirement.
const MALFORMED_SCENARIO_MARKERS: &[&str] = &[
    "### Scenario:",
    "##### Scenario:",
    "###### Scenario:",
    "- **Scenario:",
    "* **Scenario:",
    "**Scenario:",
];

/// Validate the base spec at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or has an unclosed code fence.
pub fn validate_spec_file(
    path: impl AsRef<Path>,
    mode: ValidationMode,
) -> Result<ValidationReport> {
    let path = path.as_ref();
    let content = read_file(path)?;
    validate_spec_content(path, &content, mode)
}

/// Validate base spec `content`; `path` is only used to label issues.
///
/// # Errors
///
/// Returns an error if the content has an unclosed code fence.
pub fn validate_spec_content(
    path: impl AsRef<Path>,
    content: &str,
    mode: ValidationMode,
) -> Result<ValidationReport> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let doc = parse(content).map_err(|e| Error::parse(path, e))?;
    let sections = extract_sections(&doc);

    let Some(section) = sections.get(REQUIREMENTS_SECTION) else {
        return Ok(ValidationReport::from_issues(vec![ValidationIssue::error(
            label,
            1,
            "Missing required '## Requirements' section",
        )]));
    };

    let requirements =
        extract_requirements(&section.content).map_err(|e| Error::parse(path, e))?;
    let lines: Vec<&str> = content.lines().collect();
    let mut issues = Vec::new();
    let mut cursor = section.line;

    for req in &requirements {
        let line = locate_requirement(&lines, &req.name, cursor).unwrap_or(section.line);
        cursor = line + 1;
        RequirementCheck {
            path: &label,
            lines: &lines,
            header_line: line,
            section: None,
            mode,
        }
        .run(req, &mut issues);
    }

    debug!(
        path = %label,
        requirements = requirements.len(),
        issues = issues.len(),
        "validated base spec"
    );
    Ok(ValidationReport::from_issues(issues))
}

/// Per-requirement content rules shared by base and delta validation.
pub(crate) struct RequirementCheck<'a> {
    pub path: &'a str,
    /// Source lines of the whole file
    pub lines: &'a [&'a str],
    /// Line of the requirement heading
    pub header_line: usize,
    /// Delta section the requirement belongs to, used in messages
    pub section: Option<&'a str>,
    pub mode: ValidationMode,
}

impl RequirementCheck<'_> {
    pub fn run(&self, req: &Requirement, issues: &mut Vec<ValidationIssue>) {
        let subject = match self.section {
            Some(section) => format!("{section} requirement '{}'", req.name),
            None => format!("Requirement '{}'", req.name),
        };
        let level = self.mode.content_level();

        if !contains_shall_or_must(&req.content) {
            issues.push(ValidationIssue::new(
                level,
                self.path,
                self.header_line,
                format!("{subject} should contain SHALL or MUST keyword"),
            ));
        }

        if req.scenarios.is_empty() {
            issues.push(ValidationIssue::new(
                level,
                self.path,
                self.header_line,
                format!("{subject} should have at least one scenario"),
            ));

            if let Some((line, marker)) = self.find_malformed_scenario() {
                issues.push(ValidationIssue::error(
                    self.path,
                    line,
                    format!(
                        "{subject}: Scenarios must use '#### Scenario:' format (4 hashtags), found '{marker}'"
                    ),
                ));
            }
        }
    }

    /// First malformed scenario marker between the requirement heading and
    /// the next requirement or section heading.
    fn find_malformed_scenario(&self) -> Option<(usize, &'static str)> {
        for (idx, line) in self.lines.iter().enumerate().skip(self.header_line) {
            if requirement_header_name(line).is_some() || matches!(heading_level(line), 1 | 2) {
                return None;
            }
            let trimmed = line.trim();
            if let Some(marker) = MALFORMED_SCENARIO_MARKERS
                .iter()
                .copied()
                .find(|marker| trimmed.starts_with(marker))
            {
                return Some((idx + 1, marker));
            }
        }
        None
    }
}

/// Number of leading `#` characters of a line (0 for non-headings).
fn heading_level(line: &str) -> usize {
    line.bytes().take_while(|&b| b == b'#').count()
}
