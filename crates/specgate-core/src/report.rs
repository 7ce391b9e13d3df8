//! Validation issues and report aggregation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
    Info,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy for requirement-level content findings (missing SHALL/MUST,
/// missing scenarios).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Report content findings as errors
    #[default]
    Strict,
    /// Report content findings as warnings
    Lenient,
}

impl ValidationMode {
    /// Level used for findings that this mode may escalate
    pub fn content_level(&self) -> Level {
        match self {
            ValidationMode::Strict => Level::Error,
            ValidationMode::Lenient => Level::Warning,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Some(ValidationMode::Strict),
            "lenient" => Some(ValidationMode::Lenient),
            _ => None,
        }
    }
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: Level,
    /// File the issue belongs to
    pub path: String,
    /// Line number (1-indexed, best effort)
    pub line: usize,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        level: Level,
        path: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            path: path.into(),
            line: line.max(1),
            message: message.into(),
        }
    }

    pub fn error(path: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::new(Level::Error, path, line, message)
    }

    pub fn warning(path: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::new(Level::Warning, path, line, message)
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.path, self.line, self.level, self.message
        )
    }
}

/// Issue counts by level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
}

/// Outcome of validating one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no error-level issue exists
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    pub summary: Summary,
}

impl ValidationReport {
    /// Aggregate issues into a report, keeping their order.
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let summary = Summary {
            errors: issues.iter().filter(|i| i.level == Level::Error).count(),
            warnings: issues.iter().filter(|i| i.level == Level::Warning).count(),
        };
        Self {
            valid: summary.errors == 0,
            issues,
            summary,
        }
    }

    /// Append the issues of `other` and recompute the summary.
    pub fn merge(self, other: ValidationReport) -> Self {
        let mut issues = self.issues;
        issues.extend(other.issues);
        Self::from_issues(issues)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.level == Level::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.level == Level::Warning)
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::from_issues(Vec::new())
    }
}
