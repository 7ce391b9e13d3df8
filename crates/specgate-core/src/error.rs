//! Fatal errors.
//!
//! Anything that stops validation of a target is an [`Error`]. Findings about
//! the content of a document are never errors: they are collected as
//! [`ValidationIssue`](crate::ValidationIssue)s.

use std::path::PathBuf;

use crate::deps::FrontmatterError;
use crate::markdown::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("invalid frontmatter in {}: {source}", .path.display())]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: FrontmatterError,
    },

    #[error("specs directory not found: {}", .0.display())]
    SpecsDirNotFound(PathBuf),

    #[error("no delta spec files found under {}", .0.display())]
    NoDeltaSpecs(PathBuf),

    #[error("proposal not found for change '{0}'")]
    ProposalNotFound(String),

    #[error(
        "cannot accept change '{change}': required changes are not archived: {}",
        .pending.join(", ")
    )]
    UnmetDependencies { change: String, pending: Vec<String> },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: ParseError) -> Self {
        Error::Parse {
            path: path.into(),
            source,
        }
    }
}

/// Read a file to a string, attaching the path to any I/O error.
pub(crate) fn read_file(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}
