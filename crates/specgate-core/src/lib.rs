//! specgate-core - Core library for spec and change-proposal validation
//!
//! This crate provides the building blocks for:
//! - Tokenizing and parsing the Markdown dialect used by spec documents
//! - Extracting sections, requirements and scenarios
//! - Validating base specs and the delta specs of a change
//! - Tracking dependencies between changes and detecting cycles
//!
//! # Features
//!
//! - `parallel` - Validate bulk items concurrently (brings in `rayon`)
//!
//! # Project layout
//!
//! ```text
//! specs/<capability>/spec.md                   base specs
//! changes/<id>/proposal.md                     frontmatter with `requires`
//! changes/<id>/tasks.md                        optional checklist
//! changes/<id>/specs/<capability>/spec.md      delta specs
//! changes/archive/<name>/                      archived changes
//! ```
//!
//! # Validating a base spec
//!
//! ```
//! use specgate_core::{ValidationMode, validate_spec_content};
//!
//! let spec = "## Requirements\n\n### Requirement: X\nThe system SHALL do X.\n\n#### Scenario: s\n- **WHEN** a\n- **THEN** b\n";
//! let report = validate_spec_content("specs/x/spec.md", spec, ValidationMode::Strict).unwrap();
//! assert!(report.valid);
//! assert!(report.issues.is_empty());
//! ```
//!
//! # Validating a whole project
//!
//! ```no_run
//! use std::path::Path;
//! use specgate_core::{BulkOptions, CancellationToken, ItemSelection, discover, validate_items};
//!
//! let root = Path::new(".");
//! let items = discover(root, ItemSelection::All)?;
//! let results = validate_items(root, &items, &BulkOptions::default(), &CancellationToken::new())?;
//! for result in &results {
//!     println!("{} {}: {}", result.kind, result.name, result.valid);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bulk;
pub mod delta;
pub mod deps;
mod error;
pub mod extract;
pub mod lexer;
pub mod markdown;
pub mod project;
pub mod report;
pub mod spec;
pub mod tasks;

pub use bulk::{
    BulkItem, BulkOptions, BulkResult, CancellationToken, Cancelled, ItemKind, ItemSelection,
    discover, find_item, validate_change, validate_items, validate_spec,
};
pub use delta::{DeltaPlan, validate_change_delta_specs};
pub use deps::{
    DependencyGraph, ProposalMetadata, build_dependency_graph, detect_cycles,
    validate_dependencies, validate_dependencies_for_accept,
};
pub use error::{Error, Result};
pub use project::{ChangeStatus, ProjectLayout};
pub use report::{Level, Summary, ValidationIssue, ValidationMode, ValidationReport};
pub use spec::{validate_spec_content, validate_spec_file};
pub use tasks::validate_tasks;
