//! Dependencies between changes.
//!
//! A change declares the changes it builds on in the YAML frontmatter of its
//! `proposal.md`:
//!
//! ```markdown
//! ---
//! requires:
//!   - id: add-user-table
//!     reason: sessions reference users
//!   - add-audit-log
//! ---
//! # Add sessions
//! ```
//!
//! A requirement is satisfied once the required change is archived.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result, read_file};
use crate::extract::locate_where;
use crate::project::{ChangeStatus, ProjectLayout};
use crate::report::{ValidationIssue, ValidationReport};

/// A required change, with an optional explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DependencyEntry")]
pub struct Dependency {
    pub id: String,
    pub reason: Option<String>,
}

/// `requires` entries may be a bare ID or an `{id, reason}` map.
#[derive(Deserialize)]
#[serde(untagged)]
enum DependencyEntry {
    Id(String),
    Full {
        id: String,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl From<DependencyEntry> for Dependency {
    fn from(entry: DependencyEntry) -> Self {
        match entry {
            DependencyEntry::Id(id) => Dependency { id, reason: None },
            DependencyEntry::Full { id, reason } => Dependency { id, reason },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    #[serde(default)]
    requires: Option<Vec<Dependency>>,
}

#[derive(Debug, thiserror::Error)]
pub enum FrontmatterError {
    #[error("frontmatter is not closed by a '---' line")]
    Unterminated,

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// What a proposal declares about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProposalMetadata {
    /// Change ID, taken from the change directory name
    pub id: String,
    pub requires: Vec<Dependency>,
}

impl ProposalMetadata {
    /// Parse the frontmatter of a proposal. No frontmatter means no
    /// requirements.
    ///
    /// # Errors
    ///
    /// Fails if the frontmatter is unterminated or is not valid YAML.
    pub fn parse(
        change_id: &str,
        content: &str,
    ) -> std::result::Result<Self, FrontmatterError> {
        let requires = match frontmatter(content)? {
            Some(block) if !block.trim().is_empty() => {
                serde_yaml::from_str::<Frontmatter>(block)?
                    .requires
                    .unwrap_or_default()
            }
            _ => Vec::new(),
        };
        Ok(Self {
            id: change_id.to_string(),
            requires,
        })
    }
}

/// The YAML between the leading `---` line and the next `---` line.
fn frontmatter(content: &str) -> std::result::Result<Option<&str>, FrontmatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.split_inclusive('\n');
    match lines.next() {
        Some(first) if first.trim_end() == "---" => {
            let start = first.len();
            let mut end = start;
            for line in lines {
                if line.trim_end() == "---" {
                    return Ok(Some(&content[start..end]));
                }
                end += line.len();
            }
            Err(FrontmatterError::Unterminated)
        }
        _ => Ok(None),
    }
}

/// Read the metadata of the proposal at `path`.
///
/// # Errors
///
/// Fails if the file cannot be read or its frontmatter cannot be parsed.
pub fn read_proposal_metadata(change_id: &str, path: &Path) -> Result<ProposalMetadata> {
    let content = read_file(path)?;
    ProposalMetadata::parse(change_id, &content).map_err(|source| Error::Frontmatter {
        path: path.to_path_buf(),
        source,
    })
}

/// Active changes and the changes they require.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    pub nodes: BTreeMap<String, ProposalMetadata>,
    /// Required change IDs per change, in declaration order
    pub edges: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn add(&mut self, metadata: ProposalMetadata) {
        let requires = metadata.requires.iter().map(|d| d.id.clone()).collect();
        self.edges.insert(metadata.id.clone(), requires);
        self.nodes.insert(metadata.id.clone(), metadata);
    }

    pub fn requires(&self, id: &str) -> &[String] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Build the graph of every active change under `project_root`.
///
/// A proposal whose frontmatter cannot be parsed still becomes a node, with no
/// edges.
///
/// # Errors
///
/// Fails only if the changes directory or a proposal cannot be read.
pub fn build_dependency_graph(project_root: &Path) -> Result<DependencyGraph> {
    let layout = ProjectLayout::new(project_root);
    let mut graph = DependencyGraph::default();

    for change_id in layout.active_changes()? {
        let proposal = layout.proposal_path(&change_id);
        let metadata = if proposal.is_file() {
            match read_proposal_metadata(&change_id, &proposal) {
                Ok(metadata) => metadata,
                Err(Error::Frontmatter { path, source }) => {
                    warn!(path = %path.display(), error = %source, "ignoring proposal frontmatter");
                    ProposalMetadata {
                        id: change_id,
                        requires: Vec::new(),
                    }
                }
                Err(e) => return Err(e),
            }
        } else {
            ProposalMetadata {
                id: change_id,
                requires: Vec::new(),
            }
        };
        graph.add(metadata);
    }

    debug!(nodes = graph.len(), "built dependency graph");
    Ok(graph)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet
    White,
    /// On the current DFS path
    Gray,
    /// Fully explored
    Black,
}

/// Find circular dependencies.
///
/// Each cycle is returned as the list of change IDs along it, with the first
/// ID repeated at the end. The same cycle may be reported more than once if it
/// is reachable from several starting nodes. Edges to IDs that are not nodes
/// of the graph are ignored.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let mut colors: HashMap<&str, Color> = graph
        .nodes
        .keys()
        .map(|id| (id.as_str(), Color::White))
        .collect();
    let mut parents: HashMap<&str, &str> = HashMap::new();
    let mut cycles = Vec::new();

    for start in graph.nodes.keys() {
        if colors[start.as_str()] != Color::White {
            continue;
        }
        colors.insert(start.as_str(), Color::Gray);
        // (node, index of the next edge to follow)
        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let next = graph.requires(node).get(frame.1);
            frame.1 += 1;

            let Some(next) = next else {
                colors.insert(node, Color::Black);
                stack.pop();
                continue;
            };
            let next = next.as_str();

            match colors.get(next).copied() {
                Some(Color::White) => {
                    parents.insert(next, node);
                    colors.insert(next, Color::Gray);
                    stack.push((next, 0));
                }
                Some(Color::Gray) => cycles.push(reconstruct_cycle(node, next, &parents)),
                Some(Color::Black) | None => {}
            }
        }
    }

    cycles
}

/// Walk parents from `from` back to `to`, then close the loop.
fn reconstruct_cycle(from: &str, to: &str, parents: &HashMap<&str, &str>) -> Vec<String> {
    let mut path = vec![from.to_string()];
    let mut current = from;
    while current != to {
        match parents.get(current) {
            Some(parent) => {
                current = *parent;
                path.push(current.to_string());
            }
            None => break,
        }
    }
    path.reverse();
    path.push(to.to_string());
    path
}

/// Rotate a closed cycle so it starts and ends at `id`.
fn rotate_to(cycle: &[String], id: &str) -> Option<Vec<String>> {
    let open = &cycle[..cycle.len().saturating_sub(1)];
    let pos = open.iter().position(|c| c == id)?;
    let mut rotated: Vec<String> = open[pos..].iter().chain(&open[..pos]).cloned().collect();
    rotated.push(id.to_string());
    Some(rotated)
}

/// Advisory dependency check for one change.
///
/// # Errors
///
/// Fails if the change has no `proposal.md`, or if the project cannot be
/// read. Invalid frontmatter is reported as an issue.
pub fn validate_dependencies(change_id: &str, project_root: &Path) -> Result<ValidationReport> {
    let layout = ProjectLayout::new(project_root);
    let proposal = layout.proposal_path(change_id);
    if !proposal.is_file() {
        return Err(Error::ProposalNotFound(change_id.to_string()));
    }
    let label = proposal.display().to_string();

    let content = read_file(&proposal)?;
    let metadata = match ProposalMetadata::parse(change_id, &content) {
        Ok(metadata) => metadata,
        Err(source) => {
            return Ok(ValidationReport::from_issues(vec![ValidationIssue::error(
                label,
                1,
                format!("Invalid proposal frontmatter: {source}"),
            )]));
        }
    };

    let lines: Vec<&str> = content.lines().collect();
    let line_of = |id: &str| dependency_line(&lines, id);

    if let Some(dep) = metadata.requires.iter().find(|d| d.id == change_id) {
        return Ok(ValidationReport::from_issues(vec![ValidationIssue::error(
            label,
            line_of(&dep.id),
            format!("Change '{change_id}' cannot depend on itself"),
        )]));
    }

    let mut issues = Vec::new();
    for dep in &metadata.requires {
        let message = match layout.change_status(&dep.id)? {
            ChangeStatus::Archived => continue,
            ChangeStatus::Active => format!("Required change '{}' is not yet archived", dep.id),
            ChangeStatus::Unknown => format!("Required change '{}' not found", dep.id),
        };
        issues.push(ValidationIssue::warning(
            label.as_str(),
            line_of(&dep.id),
            message,
        ));
    }

    let graph = build_dependency_graph(project_root)?;
    let mut reported = HashSet::new();
    for cycle in detect_cycles(&graph) {
        let Some(cycle) = rotate_to(&cycle, change_id) else {
            continue;
        };
        if reported.insert(cycle.clone()) {
            issues.push(ValidationIssue::error(
                label.as_str(),
                1,
                format!("Circular dependency detected: {}", cycle.join(" → ")),
            ));
        }
    }

    Ok(ValidationReport::from_issues(issues))
}

/// Line of the frontmatter entry naming `id`: a `- id` item or an `id: id`
/// key. Falls back to the first line mentioning `id` as a whole word, then
/// to line 1.
fn dependency_line(lines: &[&str], id: &str) -> usize {
    locate_where(lines, 1, |line| entry_id(line) == Some(id))
        .or_else(|| {
            locate_where(lines, 1, |line| {
                line.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
                    .any(|word| word == id)
            })
        })
        .unwrap_or(1)
}

/// The change ID a single frontmatter line declares, if any.
fn entry_id(line: &str) -> Option<&str> {
    let entry = line.trim();
    let entry = entry.strip_prefix('-').map(str::trim_start).unwrap_or(entry);
    let value = match entry.strip_prefix("id:") {
        Some(value) => value.trim(),
        None if line.trim_start().starts_with('-') => entry,
        None => return None,
    };
    let value = value.trim_matches(|c| c == '"' || c == '\'');
    (!value.is_empty()).then_some(value)
}

/// Blocking check used before accepting a change: every required change must
/// be archived.
///
/// # Errors
///
/// Returns [`Error::UnmetDependencies`] naming every required change that is
/// not archived, or any error reading the proposal.
pub fn validate_dependencies_for_accept(change_id: &str, project_root: &Path) -> Result<()> {
    let layout = ProjectLayout::new(project_root);
    let proposal = layout.proposal_path(change_id);
    if !proposal.is_file() {
        return Err(Error::ProposalNotFound(change_id.to_string()));
    }

    let metadata = read_proposal_metadata(change_id, &proposal)?;
    let mut pending = Vec::new();
    for dep in &metadata.requires {
        if layout.change_status(&dep.id)? != ChangeStatus::Archived {
            pending.push(dep.id.clone());
        }
    }

    if pending.is_empty() {
        Ok(())
    } else {
        Err(Error::UnmetDependencies {
            change: change_id.to_string(),
            pending,
        })
    }
}
