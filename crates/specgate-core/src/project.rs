//! On-disk project layout
//!
//! ```text
//! <root>/specs/<capability>/spec.md
//! <root>/changes/<change-id>/proposal.md
//! <root>/changes/<change-id>/tasks.md
//! <root>/changes/<change-id>/specs/<capability>/spec.md
//! <root>/changes/archive/<name>/
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const SPECS_DIR: &str = "specs";
pub const CHANGES_DIR: &str = "changes";
pub const ARCHIVE_DIR: &str = "archive";
pub const SPEC_FILE: &str = "spec.md";
pub const PROPOSAL_FILE: &str = "proposal.md";
pub const TASKS_FILE: &str = "tasks.md";

/// Where a change currently lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Under `changes/archive/`
    Archived,
    /// Under `changes/`
    Active,
    /// Nowhere to be found
    Unknown,
}

/// Paths of a project rooted at a directory containing `specs/` and/or
/// `changes/`.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn specs_dir(&self) -> PathBuf {
        self.root.join(SPECS_DIR)
    }

    pub fn changes_dir(&self) -> PathBuf {
        self.root.join(CHANGES_DIR)
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.changes_dir().join(ARCHIVE_DIR)
    }

    pub fn spec_path(&self, capability: &str) -> PathBuf {
        self.specs_dir().join(capability).join(SPEC_FILE)
    }

    pub fn change_dir(&self, change_id: &str) -> PathBuf {
        self.changes_dir().join(change_id)
    }

    pub fn proposal_path(&self, change_id: &str) -> PathBuf {
        self.change_dir(change_id).join(PROPOSAL_FILE)
    }

    /// IDs of active changes, sorted. Archived changes are excluded.
    pub fn active_changes(&self) -> Result<Vec<String>> {
        Ok(list_dirs(&self.changes_dir())?
            .into_iter()
            .filter(|name| name != ARCHIVE_DIR)
            .collect())
    }

    /// Capabilities that have a base spec, sorted.
    pub fn capabilities(&self) -> Result<Vec<String>> {
        let specs_dir = self.specs_dir();
        Ok(list_dirs(&specs_dir)?
            .into_iter()
            .filter(|name| specs_dir.join(name).join(SPEC_FILE).is_file())
            .collect())
    }

    /// Look up whether a change is archived, active, or unknown.
    ///
    /// Archive directories are named either `<id>` or `<YYYY-MM-DD>-<id>`.
    pub fn change_status(&self, change_id: &str) -> Result<ChangeStatus> {
        let archived = list_dirs(&self.archive_dir())?
            .iter()
            .any(|name| archive_name_matches(name, change_id));
        if archived {
            return Ok(ChangeStatus::Archived);
        }
        if change_id != ARCHIVE_DIR && self.change_dir(change_id).is_dir() {
            return Ok(ChangeStatus::Active);
        }
        Ok(ChangeStatus::Unknown)
    }
}

fn archive_name_matches(name: &str, change_id: &str) -> bool {
    if name == change_id {
        return true;
    }
    match name.split_at_checked(11) {
        Some((prefix, rest)) => rest == change_id && is_date_prefix(prefix),
        None => false,
    }
}

/// `YYYY-MM-DD-`
fn is_date_prefix(prefix: &str) -> bool {
    prefix.bytes().enumerate().all(|(i, b)| match i {
        4 | 7 | 10 => b == b'-',
        _ => b.is_ascii_digit(),
    })
}

/// Names of the non-hidden subdirectories of `dir`, sorted. A missing
/// directory has no subdirectories.
pub(crate) fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let is_dir = entry.file_type().map_err(|e| Error::io(entry.path(), e))?.is_dir();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_dir && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
