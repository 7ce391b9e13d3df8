//! Validation of many specs and changes in one run.
//!
//! Items are independent of one another, so with the `parallel` feature they
//! are validated on rayon's thread pool. Results always come back in input
//! order.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::delta::validate_change_delta_specs;
use crate::deps::validate_dependencies;
use crate::error::Result;
use crate::project::{ARCHIVE_DIR, ProjectLayout};
use crate::report::{ValidationMode, ValidationReport};
use crate::spec::validate_spec_file;

/// What kind of target an item is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Change,
    Spec,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Change => "change",
            ItemKind::Spec => "spec",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change ID or capability name to validate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem {
    pub name: String,
    pub kind: ItemKind,
}

impl BulkItem {
    pub fn change(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::Change,
        }
    }

    pub fn spec(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ItemKind::Spec,
        }
    }
}

/// Outcome for one item. Exactly one of `report` and `error` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkResult {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ValidationReport>,
    /// Fatal error that stopped validation of this item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkResult {
    fn new(item: &BulkItem, outcome: Result<ValidationReport>) -> Self {
        let (valid, report, error) = match outcome {
            Ok(report) => (report.valid, Some(report), None),
            Err(e) => (false, None, Some(e.to_string())),
        };
        Self {
            name: item.name.clone(),
            kind: item.kind,
            valid,
            report,
            error,
        }
    }
}

/// Which items [`discover`] returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ItemSelection {
    #[default]
    All,
    Changes,
    Specs,
}

#[derive(Debug, Clone, Copy)]
pub struct BulkOptions {
    pub mode: ValidationMode,
    /// Validate items concurrently (needs the `parallel` feature)
    pub parallel: bool,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            mode: ValidationMode::default(),
            parallel: true,
        }
    }
}

/// Shared flag checked before each item of a bulk run.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A bulk run stopped by its [`CancellationToken`].
#[derive(Debug, thiserror::Error)]
#[error("validation cancelled after {} of {total} items", .partial.len())]
pub struct Cancelled {
    /// Results produced before cancellation, in input order
    pub partial: Vec<BulkResult>,
    pub total: usize,
}

/// Active changes, then capabilities with a base spec, each sorted by name.
pub fn discover(project_root: &Path, selection: ItemSelection) -> Result<Vec<BulkItem>> {
    let layout = ProjectLayout::new(project_root);
    let mut items = Vec::new();
    if selection != ItemSelection::Specs {
        items.extend(layout.active_changes()?.into_iter().map(BulkItem::change));
    }
    if selection != ItemSelection::Changes {
        items.extend(layout.capabilities()?.into_iter().map(BulkItem::spec));
    }
    Ok(items)
}

/// Resolve a single name to a change or a spec. Changes win when both exist.
pub fn find_item(project_root: &Path, name: &str) -> Option<BulkItem> {
    let layout = ProjectLayout::new(project_root);
    if name != ARCHIVE_DIR && layout.change_dir(name).is_dir() {
        Some(BulkItem::change(name))
    } else if layout.spec_path(name).is_file() {
        Some(BulkItem::spec(name))
    } else {
        None
    }
}

/// Validate one change: its delta specs and tasks, plus its dependencies when
/// it has a proposal.
pub fn validate_change(
    project_root: &Path,
    change_id: &str,
    mode: ValidationMode,
) -> Result<ValidationReport> {
    let layout = ProjectLayout::new(project_root);
    let mut report =
        validate_change_delta_specs(&layout.change_dir(change_id), &layout.specs_dir(), mode)?;
    if layout.proposal_path(change_id).is_file() {
        report = report.merge(validate_dependencies(change_id, project_root)?);
    }
    Ok(report)
}

pub fn validate_spec(
    project_root: &Path,
    capability: &str,
    mode: ValidationMode,
) -> Result<ValidationReport> {
    validate_spec_file(ProjectLayout::new(project_root).spec_path(capability), mode)
}

fn validate_item(project_root: &Path, item: &BulkItem, mode: ValidationMode) -> BulkResult {
    let outcome = match item.kind {
        ItemKind::Change => validate_change(project_root, &item.name, mode),
        ItemKind::Spec => validate_spec(project_root, &item.name, mode),
    };
    let result = BulkResult::new(item, outcome);
    debug!(item = %item.name, kind = %item.kind, valid = result.valid, "validated item");
    result
}

/// Validate `items`, keeping their order.
///
/// A fatal error on one item is recorded in its [`BulkResult::error`] and does
/// not stop the run.
///
/// # Errors
///
/// Returns [`Cancelled`] with the results produced so far if `token` is
/// cancelled before every item was started.
pub fn validate_items(
    project_root: &Path,
    items: &[BulkItem],
    options: &BulkOptions,
    token: &CancellationToken,
) -> std::result::Result<Vec<BulkResult>, Cancelled> {
    #[cfg(feature = "parallel")]
    if options.parallel {
        use rayon::prelude::*;

        let results: Vec<Option<BulkResult>> = items
            .par_iter()
            .map(|item| {
                (!token.is_cancelled()).then(|| validate_item(project_root, item, options.mode))
            })
            .collect();
        let skipped = results.iter().any(Option::is_none);
        let results: Vec<BulkResult> = results.into_iter().flatten().collect();
        return if skipped {
            Err(Cancelled {
                partial: results,
                total: items.len(),
            })
        } else {
            Ok(results)
        };
    }

    let mut results = Vec::with_capacity(items.len());
    for item in items {
        if token.is_cancelled() {
            return Err(Cancelled {
                partial: results,
                total: items.len(),
            });
        }
        results.push(validate_item(project_root, item, options.mode));
    }
    Ok(results)
}
