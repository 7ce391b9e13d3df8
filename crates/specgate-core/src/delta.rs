//! Delta spec parsing and validation.
//!
//! A change carries one delta file per touched capability at
//! `changes/<id>/specs/<capability>/spec.md`. Each file describes how the
//! capability's base spec changes, using up to four sections:
//!
//! ```markdown
//! ## ADDED Requirements
//! ### Requirement: New thing
//! ...
//!
//! ## MODIFIED Requirements
//! ### Requirement: Existing thing
//! ...
//!
//! ## REMOVED Requirements
//! ### Requirement: Old thing
//! **Reason**: superseded
//!
//! ## RENAMED Requirements
//! - FROM: `### Requirement: Old name`
//! - TO: `### Requirement: New name`
//! ```
//!
//! Requirement names are compared after [`normalize_requirement_name`], and
//! every duplicate or conflict check is scoped to a single capability.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result, read_file};
use crate::extract::{
    Requirement, extract_requirements, extract_sections, locate_requirement,
    normalize_requirement_name, requirement_header_name,
};
use crate::markdown::{Document, Node, ParseError, parse};
use crate::project::{SPEC_FILE, SPECS_DIR, TASKS_FILE, list_dirs};
use crate::report::{ValidationIssue, ValidationMode, ValidationReport};
use crate::spec::{REQUIREMENTS_SECTION, RequirementCheck};
use crate::tasks::validate_tasks;

/// The four delta operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeltaKind {
    Added,
    Modified,
    Removed,
    Renamed,
}

impl DeltaKind {
    pub const ALL: [DeltaKind; 4] = [
        DeltaKind::Added,
        DeltaKind::Modified,
        DeltaKind::Removed,
        DeltaKind::Renamed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaKind::Added => "ADDED",
            DeltaKind::Modified => "MODIFIED",
            DeltaKind::Removed => "REMOVED",
            DeltaKind::Renamed => "RENAMED",
        }
    }

    /// Exact text of the section heading (without `## `)
    pub fn section_title(&self) -> &'static str {
        match self {
            DeltaKind::Added => "ADDED Requirements",
            DeltaKind::Modified => "MODIFIED Requirements",
            DeltaKind::Removed => "REMOVED Requirements",
            DeltaKind::Renamed => "RENAMED Requirements",
        }
    }
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requirement listed in an ADDED, MODIFIED or REMOVED section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRequirement {
    pub requirement: Requirement,
    /// Line of the `### Requirement:` heading
    pub line: usize,
}

/// A FROM/TO pair of a RENAMED section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedRequirement {
    pub from: String,
    pub to: String,
    pub from_line: usize,
    pub to_line: usize,
}

/// A RENAMED bullet that is not part of a complete FROM/TO pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRename {
    pub line: usize,
    pub reason: String,
}

/// Parsed content of one delta file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaPlan {
    pub added: Vec<DeltaRequirement>,
    pub modified: Vec<DeltaRequirement>,
    pub removed: Vec<DeltaRequirement>,
    pub renamed: Vec<RenamedRequirement>,
    pub malformed_renames: Vec<MalformedRename>,
    /// Heading line of each delta section present, in `DeltaKind` order
    pub sections: Vec<(DeltaKind, usize)>,
}

impl DeltaPlan {
    /// Parse a delta file.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the content has an unclosed code fence.
    pub fn parse(content: &str) -> std::result::Result<Self, ParseError> {
        let doc = parse(content)?;
        let sections = extract_sections(&doc);
        let lines: Vec<&str> = content.lines().collect();
        let mut plan = DeltaPlan::default();

        for kind in DeltaKind::ALL {
            let Some(section) = sections.get(kind.section_title()) else {
                continue;
            };
            plan.sections.push((kind, section.line));

            let target = match kind {
                DeltaKind::Added => &mut plan.added,
                DeltaKind::Modified => &mut plan.modified,
                DeltaKind::Removed => &mut plan.removed,
                DeltaKind::Renamed => {
                    plan.parse_renames(&doc);
                    continue;
                }
            };

            let mut cursor = section.line;
            for requirement in extract_requirements(&section.content)? {
                let line =
                    locate_requirement(&lines, &requirement.name, cursor).unwrap_or(section.line);
                cursor = line + 1;
                target.push(DeltaRequirement { requirement, line });
            }
        }

        Ok(plan)
    }

    /// Pair up FROM/TO bullets of every RENAMED section.
    fn parse_renames(&mut self, doc: &Document) {
        let mut pending: Option<(String, usize)> = None;

        for node in section_nodes(doc, DeltaKind::Renamed.section_title()) {
            let Node::List(item) = node else {
                continue;
            };

            match parse_rename_bullet(&item.content) {
                Some(RenameBullet::From(name)) => {
                    if let Some((from, line)) = pending.take() {
                        self.malformed_renames.push(dangling_from(&from, line));
                    }
                    pending = Some((name, item.line));
                }
                Some(RenameBullet::To(name)) => match pending.take() {
                    Some((from, from_line)) => self.renamed.push(RenamedRequirement {
                        from,
                        to: name,
                        from_line,
                        to_line: item.line,
                    }),
                    None => self.malformed_renames.push(MalformedRename {
                        line: item.line,
                        reason: format!("TO '{name}' has no preceding FROM"),
                    }),
                },
                None => {
                    if let Some((from, line)) = pending.take() {
                        self.malformed_renames.push(dangling_from(&from, line));
                    }
                }
            }
        }

        if let Some((from, line)) = pending {
            self.malformed_renames.push(dangling_from(&from, line));
        }
    }

    pub fn has_section(&self, kind: DeltaKind) -> bool {
        self.section_line(kind).is_some()
    }

    pub fn section_line(&self, kind: DeltaKind) -> Option<usize> {
        self.sections
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, line)| *line)
    }

    /// Requirements of an ADDED, MODIFIED or REMOVED section
    pub fn requirements(&self, kind: DeltaKind) -> &[DeltaRequirement] {
        match kind {
            DeltaKind::Added => &self.added,
            DeltaKind::Modified => &self.modified,
            DeltaKind::Removed => &self.removed,
            DeltaKind::Renamed => &[],
        }
    }

    /// Whether a present section has nothing in it
    pub fn is_empty_section(&self, kind: DeltaKind) -> bool {
        match kind {
            DeltaKind::Renamed => self.renamed.is_empty() && self.malformed_renames.is_empty(),
            _ => self.requirements(kind).is_empty(),
        }
    }
}

enum RenameBullet {
    From(String),
    To(String),
}

fn parse_rename_bullet(content: &str) -> Option<RenameBullet> {
    if let Some(rest) = content.strip_prefix("FROM:") {
        return Some(RenameBullet::From(rename_target(rest)));
    }
    if let Some(rest) = content.strip_prefix("TO:") {
        return Some(RenameBullet::To(rename_target(rest)));
    }
    None
}

/// Requirement name of `### Requirement: <name>`, optionally in backticks.
fn rename_target(rest: &str) -> String {
    let rest = rest.trim().trim_matches('`').trim();
    requirement_header_name(rest).unwrap_or(rest).to_string()
}

fn dangling_from(from: &str, line: usize) -> MalformedRename {
    MalformedRename {
        line,
        reason: format!("FROM '{from}' has no matching TO"),
    }
}

/// Nodes below every level-2 heading titled `title`, up to the next level-2
/// heading.
fn section_nodes<'a>(doc: &'a Document, title: &str) -> Vec<&'a Node> {
    let mut inside = false;
    let mut nodes = Vec::new();
    for node in &doc.nodes {
        if let Node::Header(header) = node
            && header.level == 2
        {
            inside = header.text == title;
            continue;
        }
        if inside {
            nodes.push(node);
        }
    }
    nodes
}

/// Normalized requirement names of a capability's base spec.
#[derive(Debug, Clone, Default)]
pub struct BaseRequirements {
    names: HashSet<String>,
}

impl BaseRequirements {
    /// Load the base spec at `path`. A missing file is an empty base.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = read_file(path)?;
        Self::from_content(&content).map_err(|e| Error::parse(path, e))
    }

    pub fn from_content(content: &str) -> std::result::Result<Self, ParseError> {
        let doc = parse(content)?;
        let sections = extract_sections(&doc);
        let names = match sections.get(REQUIREMENTS_SECTION) {
            Some(section) => extract_requirements(&section.content)?
                .iter()
                .map(|r| normalize_requirement_name(&r.name))
                .collect(),
            None => HashSet::new(),
        };
        Ok(Self { names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&normalize_requirement_name(name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Validate every delta spec of the change at `change_dir` against the base
/// specs under `specs_root`, plus the change's `tasks.md`.
///
/// # Errors
///
/// Fails without a report if `change_dir/specs` does not exist, if it holds no
/// `<capability>/spec.md`, or if a file cannot be read or parsed.
pub fn validate_change_delta_specs(
    change_dir: &Path,
    specs_root: &Path,
    mode: ValidationMode,
) -> Result<ValidationReport> {
    let specs_dir = change_dir.join(SPECS_DIR);
    if !specs_dir.is_dir() {
        return Err(Error::SpecsDirNotFound(specs_dir));
    }

    let files: Vec<(String, PathBuf)> = list_dirs(&specs_dir)?
        .into_iter()
        .map(|capability| {
            let path = specs_dir.join(&capability).join(SPEC_FILE);
            (capability, path)
        })
        .filter(|(_, path)| path.is_file())
        .collect();
    if files.is_empty() {
        return Err(Error::NoDeltaSpecs(specs_dir));
    }

    let mut validator = DeltaValidator::new(mode);
    for (capability, path) in &files {
        let content = read_file(path)?;
        let base = BaseRequirements::load(&specs_root.join(capability).join(SPEC_FILE))?;
        validator
            .add_file(capability, &path.display().to_string(), &content, &base)
            .map_err(|e| Error::parse(path, e))?;
    }

    let mut issues = validator.finish();
    issues.extend(validate_tasks(&change_dir.join(TASKS_FILE))?);

    debug!(
        change = %change_dir.display(),
        files = files.len(),
        issues = issues.len(),
        "validated change"
    );
    Ok(ValidationReport::from_issues(issues))
}

struct ParsedDelta {
    capability: String,
    path: String,
    plan: DeltaPlan,
}

/// Accumulates delta files of one change; per-file rules run as files are
/// added, cross-file rules run in [`DeltaValidator::finish`].
pub struct DeltaValidator {
    mode: ValidationMode,
    files: Vec<ParsedDelta>,
    issues: Vec<ValidationIssue>,
}

impl DeltaValidator {
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            files: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Parse and check one delta file belonging to `capability`.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the content has an unclosed code fence.
    pub fn add_file(
        &mut self,
        capability: &str,
        path: &str,
        content: &str,
        base: &BaseRequirements,
    ) -> std::result::Result<(), ParseError> {
        let plan = DeltaPlan::parse(content)?;
        let lines: Vec<&str> = content.lines().collect();
        self.check_file(capability, path, &lines, &plan, base);
        self.files.push(ParsedDelta {
            capability: capability.to_string(),
            path: path.to_string(),
            plan,
        });
        Ok(())
    }

    /// Run the cross-file rules and return every issue found.
    pub fn finish(mut self) -> Vec<ValidationIssue> {
        self.check_duplicates();
        self.check_conflicts();
        self.issues
    }

    fn check_file(
        &mut self,
        capability: &str,
        path: &str,
        lines: &[&str],
        plan: &DeltaPlan,
        base: &BaseRequirements,
    ) {
        let issues = &mut self.issues;

        if plan.sections.is_empty() {
            issues.push(ValidationIssue::error(
                path,
                1,
                "Delta spec must contain at least one delta section \
                 (## ADDED Requirements, ## MODIFIED Requirements, \
                 ## REMOVED Requirements or ## RENAMED Requirements)",
            ));
            return;
        }

        for &(kind, line) in &plan.sections {
            if plan.is_empty_section(kind) {
                let what = match kind {
                    DeltaKind::Renamed => "FROM/TO pairs",
                    _ => "requirements",
                };
                issues.push(ValidationIssue::error(
                    path,
                    line,
                    format!("## {} section contains no {what}", kind.section_title()),
                ));
            }
        }

        let renamed_to: HashSet<String> = plan
            .renamed
            .iter()
            .map(|r| normalize_requirement_name(&r.to))
            .collect();

        for kind in [DeltaKind::Added, DeltaKind::Modified] {
            for entry in plan.requirements(kind) {
                RequirementCheck {
                    path,
                    lines,
                    header_line: entry.line,
                    section: Some(kind.as_str()),
                    mode: self.mode,
                }
                .run(&entry.requirement, issues);

                let name = &entry.requirement.name;
                let in_base = base.contains(name);
                if kind == DeltaKind::Added && in_base {
                    issues.push(ValidationIssue::error(
                        path,
                        entry.line,
                        format!(
                            "ADDED requirement '{name}' already exists in base spec for '{capability}'"
                        ),
                    ));
                }
                if kind == DeltaKind::Modified
                    && !in_base
                    && !renamed_to.contains(&normalize_requirement_name(name))
                {
                    issues.push(ValidationIssue::error(
                        path,
                        entry.line,
                        format!(
                            "MODIFIED requirement '{name}' does not exist in base spec for '{capability}'"
                        ),
                    ));
                }
            }
        }

        for entry in &plan.removed {
            let name = &entry.requirement.name;
            if !entry.requirement.content.contains("**Reason**:") {
                issues.push(ValidationIssue::error(
                    path,
                    entry.line,
                    format!("REMOVED requirement '{name}' must include a **Reason**: line"),
                ));
            }
            if !base.contains(name) {
                issues.push(ValidationIssue::error(
                    path,
                    entry.line,
                    format!(
                        "REMOVED requirement '{name}' does not exist in base spec for '{capability}'"
                    ),
                ));
            }
        }

        for malformed in &plan.malformed_renames {
            issues.push(ValidationIssue::error(
                path,
                malformed.line,
                format!("Malformed RENAMED requirement: {}", malformed.reason),
            ));
        }

        for rename in &plan.renamed {
            if !base.contains(&rename.from) {
                issues.push(ValidationIssue::error(
                    path,
                    rename.from_line,
                    format!(
                        "RENAMED FROM requirement '{}' does not exist in base spec for '{capability}'",
                        rename.from
                    ),
                ));
            }
            if base.contains(&rename.to) {
                issues.push(ValidationIssue::error(
                    path,
                    rename.to_line,
                    format!(
                        "RENAMED TO requirement '{}' already exists in base spec for '{capability}'",
                        rename.to
                    ),
                ));
            }
        }
    }

    /// Same name twice in the same section of the same capability.
    fn check_duplicates(&mut self) {
        let mut seen: HashMap<(&str, Slot, String), (&str, usize)> = HashMap::new();

        for file in &self.files {
            for entry in entries(file) {
                let key = (file.capability.as_str(), entry.slot, entry.key.clone());
                if let Some((first_path, first_line)) = seen.get(&key) {
                    let message = match entry.slot {
                        Slot::RenamedFrom => format!(
                            "Duplicate FROM requirement in RENAMED section: '{}'",
                            entry.name
                        ),
                        Slot::RenamedTo => format!(
                            "Duplicate TO requirement in RENAMED section: '{}'",
                            entry.name
                        ),
                        Slot::Section(kind) => format!(
                            "Duplicate requirement name in {kind} section: '{}'",
                            entry.name
                        ),
                    };
                    self.issues.push(ValidationIssue::error(
                        file.path.as_str(),
                        entry.line,
                        format!("{message} (first defined at {first_path}:{first_line})"),
                    ));
                } else {
                    seen.insert(key, (file.path.as_str(), entry.line));
                }
            }
        }
    }

    /// Same name in mutually exclusive sections of one capability.
    fn check_conflicts(&mut self) {
        let mut by_capability: BTreeMap<&str, Vec<Entry<'_>>> = BTreeMap::new();
        for file in &self.files {
            by_capability
                .entry(file.capability.as_str())
                .or_default()
                .extend(entries(file));
        }

        for entries in by_capability.values() {
            for &(first, second) in CONFLICTS {
                let earlier: HashMap<&str, &Entry<'_>> = entries
                    .iter()
                    .filter(|e| e.slot == first)
                    .map(|e| (e.key.as_str(), e))
                    .collect();
                let mut reported = HashSet::new();

                for entry in entries.iter().filter(|e| e.slot == second) {
                    let Some(other) = earlier.get(entry.key.as_str()) else {
                        continue;
                    };
                    if !reported.insert(entry.key.as_str()) {
                        continue;
                    }
                    let message = match (first, second) {
                        (Slot::RenamedFrom, Slot::Section(DeltaKind::Modified)) => format!(
                            "MODIFIED requirement '{}' refers to the old name of a RENAMED requirement; use the new name",
                            entry.name
                        ),
                        _ => format!(
                            "Requirement '{}' appears in both {first} and {second} sections",
                            other.name
                        ),
                    };
                    self.issues
                        .push(ValidationIssue::error(entry.path, entry.line, message));
                }
            }
        }
    }
}

/// Where a requirement name appears within a delta file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Section(DeltaKind),
    RenamedFrom,
    RenamedTo,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Section(kind) => f.write_str(kind.as_str()),
            Slot::RenamedFrom => f.write_str("RENAMED (FROM)"),
            Slot::RenamedTo => f.write_str("RENAMED (TO)"),
        }
    }
}

/// Pairs of slots a name may not share; issues are reported on the second.
const CONFLICTS: &[(Slot, Slot)] = &[
    (
        Slot::Section(DeltaKind::Added),
        Slot::Section(DeltaKind::Modified),
    ),
    (
        Slot::Section(DeltaKind::Added),
        Slot::Section(DeltaKind::Removed),
    ),
    (
        Slot::Section(DeltaKind::Modified),
        Slot::Section(DeltaKind::Removed),
    ),
    (Slot::Section(DeltaKind::Added), Slot::RenamedTo),
    (Slot::Section(DeltaKind::Removed), Slot::RenamedFrom),
    (Slot::RenamedFrom, Slot::Section(DeltaKind::Modified)),
];

struct Entry<'a> {
    slot: Slot,
    name: &'a str,
    /// Normalized name
    key: String,
    path: &'a str,
    line: usize,
}

/// Every requirement name of a parsed file, in section order.
fn entries(file: &ParsedDelta) -> Vec<Entry<'_>> {
    let path = file.path.as_str();
    let mut out = Vec::new();

    for kind in [DeltaKind::Added, DeltaKind::Modified, DeltaKind::Removed] {
        for entry in file.plan.requirements(kind) {
            out.push(Entry {
                slot: Slot::Section(kind),
                name: &entry.requirement.name,
                key: normalize_requirement_name(&entry.requirement.name),
                path,
                line: entry.line,
            });
        }
    }
    for rename in &file.plan.renamed {
        out.push(Entry {
            slot: Slot::RenamedFrom,
            name: &rename.from,
            key: normalize_requirement_name(&rename.from),
            path,
            line: rename.from_line,
        });
        out.push(Entry {
            slot: Slot::RenamedTo,
            name: &rename.to,
            key: normalize_requirement_name(&rename.to),
            path,
            line: rename.to_line,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const BASE: &str = indoc! {"
        ## Requirements

        ### Requirement: Login
        The system SHALL log users in.

        #### Scenario: ok
        - works

        ### Requirement: Legacy Export
        The system SHALL export CSV.

        #### Scenario: ok
        - works
    "};

    fn base() -> BaseRequirements {
        BaseRequirements::from_content(BASE).unwrap()
    }

    fn check(files: &[(&str, &str)]) -> Vec<ValidationIssue> {
        let mut validator = DeltaValidator::new(ValidationMode::Strict);
        for (capability, content) in files {
            let path = format!("changes/c/specs/{capability}/spec.md");
            validator
                .add_file(capability, &path, content, &base())
                .unwrap();
        }
        validator.finish()
    }

    fn messages(issues: &[ValidationIssue]) -> Vec<&str> {
        issues.iter().map(|i| i.message.as_str()).collect()
    }

    const ADDED_AUTH: &str = indoc! {"
        ## ADDED Requirements

        ### Requirement: User Authentication
        The system SHALL authenticate users.

        #### Scenario: ok
        - **WHEN** valid
        - **THEN** in
    "};

    #[test]
    fn test_parse_plan() {
        let content = indoc! {"
            ## ADDED Requirements
            ### Requirement: A
            The system SHALL do A.
            #### Scenario: a
            - ok

            ## REMOVED Requirements
            ### Requirement: Legacy Export
            **Reason**: unused

            ## RENAMED Requirements
            - FROM: `### Requirement: Login`
            - TO: `### Requirement: Sign In`
        "};
        let plan = DeltaPlan::parse(content).unwrap();
        assert_eq!(plan.added.len(), 1);
        assert_eq!(plan.added[0].line, 2);
        assert_eq!(plan.removed[0].requirement.name, "Legacy Export");
        assert_eq!(plan.removed[0].line, 8);
        assert_eq!(
            plan.renamed,
            vec![RenamedRequirement {
                from: "Login".to_string(),
                to: "Sign In".to_string(),
                from_line: 12,
                to_line: 13,
            }]
        );
        assert!(plan.has_section(DeltaKind::Renamed));
        assert!(!plan.has_section(DeltaKind::Modified));
    }

    #[test]
    fn test_valid_delta_has_no_issues() {
        let content = indoc! {"
            ## ADDED Requirements
            ### Requirement: Two Factor
            The system MUST support TOTP.

            #### Scenario: code accepted
            - **WHEN** the code is valid
            - **THEN** access is granted

            ## MODIFIED Requirements
            ### Requirement: Login
            The system SHALL log users in with rate limiting.

            #### Scenario: throttled
            - **WHEN** too many attempts
            - **THEN** login is refused

            ## RENAMED Requirements
            - FROM: ### Requirement: Legacy Export
            - TO: ### Requirement: Data Export
        "};
        let issues = check(&[("auth", content)]);
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_no_delta_sections() {
        let issues = check(&[("auth", "# Just a title\n\nProse.\n")]);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("at least one delta section"));
    }

    #[test]
    fn test_empty_sections() {
        let issues = check(&[("auth", "## ADDED Requirements\n\n## MODIFIED Requirements\n")]);
        assert_eq!(issues.len(), 2, "{issues:?}");
        assert_eq!(issues[0].line, 1);
        assert!(issues[0].message.contains("ADDED"));
        assert_eq!(issues[1].line, 3);
        assert!(issues[1].message.contains("MODIFIED"));
    }

    #[test]
    fn test_added_requirement_content_rules_are_tagged() {
        let content = "## ADDED Requirements\n### Requirement: Vague\nDoes stuff.\n";
        let issues = check(&[("auth", content)]);
        assert_eq!(
            messages(&issues),
            vec![
                "ADDED requirement 'Vague' should contain SHALL or MUST keyword",
                "ADDED requirement 'Vague' should have at least one scenario",
            ]
        );
        assert!(issues.iter().all(|i| i.line == 2));
    }

    #[test]
    fn test_removed_rules() {
        let content = indoc! {"
            ## REMOVED Requirements
            ### Requirement: Legacy Export
            No reason given.

            ### Requirement: Never Existed
            **Reason**: cleanup
        "};
        let issues = check(&[("auth", content)]);
        assert_eq!(
            messages(&issues),
            vec![
                "REMOVED requirement 'Legacy Export' must include a **Reason**: line",
                "REMOVED requirement 'Never Existed' does not exist in base spec for 'auth'",
            ]
        );
        assert_eq!(issues[1].line, 5);
    }

    #[test]
    fn test_dangling_from_is_malformed() {
        let content = "## RENAMED Requirements\n\n- FROM: ### Requirement: Login\n";
        let issues = check(&[("auth", content)]);
        let malformed: Vec<_> = issues
            .iter()
            .filter(|i| i.message.starts_with("Malformed RENAMED requirement"))
            .collect();
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].line, 3);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_to_without_from_is_malformed() {
        let content = "## RENAMED Requirements\n- TO: ### Requirement: Sign In\n";
        let issues = check(&[("auth", content)]);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("has no preceding FROM"));
        assert_eq!(issues[0].line, 2);
    }

    #[test]
    fn test_rename_cross_references() {
        let content = indoc! {"
            ## RENAMED Requirements
            - FROM: ### Requirement: Ghost
            - TO: ### Requirement: Legacy Export
        "};
        let issues = check(&[("auth", content)]);
        assert_eq!(
            messages(&issues),
            vec![
                "RENAMED FROM requirement 'Ghost' does not exist in base spec for 'auth'",
                "RENAMED TO requirement 'Legacy Export' already exists in base spec for 'auth'",
            ]
        );
        assert_eq!(issues[0].line, 2);
        assert_eq!(issues[1].line, 3);
    }

    #[test]
    fn test_duplicate_added_in_same_capability() {
        let content = format!("{ADDED_AUTH}\n### Requirement: user   authentication\nThe system SHALL repeat.\n\n#### Scenario: again\n- yes\n");
        let issues = check(&[("auth", content.as_str())]);
        let duplicates: Vec<_> = issues
            .iter()
            .filter(|i| i.message.starts_with("Duplicate requirement name in ADDED section"))
            .collect();
        assert_eq!(duplicates.len(), 1, "{issues:?}");
        assert_eq!(duplicates[0].line, 10);
    }

    #[test]
    fn test_same_name_across_capabilities_is_allowed() {
        let issues = check(&[("auth", ADDED_AUTH), ("security", ADDED_AUTH)]);
        assert!(
            issues.iter().all(|i| !i.message.contains("Duplicate")),
            "{issues:?}"
        );
    }

    #[test]
    fn test_duplicate_across_files_of_one_capability() {
        let issues = check(&[("auth", ADDED_AUTH), ("auth", ADDED_AUTH)]);
        let duplicates: Vec<_> = issues
            .iter()
            .filter(|i| i.message.contains("Duplicate"))
            .collect();
        assert_eq!(duplicates.len(), 1);
        assert!(duplicates[0].message.contains("first defined at"));
    }

    #[test]
    fn test_duplicate_rename_bullets() {
        let content = indoc! {"
            ## RENAMED Requirements
            - FROM: ### Requirement: Login
            - TO: ### Requirement: Sign In
            - FROM: ### Requirement: Login
            - TO: ### Requirement: Log On
            - FROM: ### Requirement: Legacy Export
            - TO: ### Requirement: Sign In
        "};
        let issues = check(&[("auth", content)]);
        let dup_from: Vec<_> = issues
            .iter()
            .filter(|i| i.message.starts_with("Duplicate FROM"))
            .collect();
        let dup_to: Vec<_> = issues
            .iter()
            .filter(|i| i.message.starts_with("Duplicate TO"))
            .collect();
        assert_eq!(dup_from.len(), 1);
        assert_eq!(dup_from[0].line, 4);
        assert_eq!(dup_to.len(), 1);
        assert_eq!(dup_to[0].line, 7);
    }

    #[test]
    fn test_duplicate_rename_target_across_files_of_one_capability() {
        let first = "## RENAMED Requirements\n- FROM: ### Requirement: Login\n- TO: ### Requirement: Sign In\n";
        let second = "## RENAMED Requirements\n\n- FROM: ### Requirement: Legacy Export\n- TO: ### Requirement: Sign In\n";

        let mut validator = DeltaValidator::new(ValidationMode::Strict);
        validator
            .add_file("auth", "changes/a/specs/auth/spec.md", first, &base())
            .unwrap();
        validator
            .add_file("auth", "changes/b/specs/auth/spec.md", second, &base())
            .unwrap();
        let issues = validator.finish();

        assert_eq!(issues.len(), 1, "{issues:?}");
        assert_eq!(issues[0].path, "changes/b/specs/auth/spec.md");
        assert_eq!(issues[0].line, 4);
        assert_eq!(
            issues[0].message,
            "Duplicate TO requirement in RENAMED section: 'Sign In' (first defined at changes/a/specs/auth/spec.md:3)"
        );
    }

    #[test]
    fn test_added_and_modified_conflict() {
        let content = indoc! {"
            ## ADDED Requirements
            ### Requirement: Login
            The system SHALL log in.
            #### Scenario: a
            - ok

            ## MODIFIED Requirements
            ### Requirement: Login
            The system SHALL log in faster.
            #### Scenario: b
            - ok
        "};
        let issues = check(&[("auth", content)]);
        let conflicts: Vec<_> = issues
            .iter()
            .filter(|i| i.message.contains("both ADDED and MODIFIED"))
            .collect();
        assert_eq!(conflicts.len(), 1, "{issues:?}");
        assert_eq!(conflicts[0].line, 8);
    }

    #[test]
    fn test_modified_must_use_new_name_after_rename() {
        let content = indoc! {"
            ## MODIFIED Requirements
            ### Requirement: Login
            The system SHALL log in.
            #### Scenario: a
            - ok

            ## RENAMED Requirements
            - FROM: ### Requirement: Login
            - TO: ### Requirement: Sign In
        "};
        let issues = check(&[("auth", content)]);
        assert_eq!(issues.len(), 1, "{issues:?}");
        assert!(issues[0].message.contains("old name of a RENAMED requirement"));
        assert_eq!(issues[0].line, 2);
    }

    #[test]
    fn test_modified_under_new_name_is_accepted() {
        let content = indoc! {"
            ## MODIFIED Requirements
            ### Requirement: Sign In
            The system SHALL sign users in.
            #### Scenario: a
            - ok

            ## RENAMED Requirements
            - FROM: ### Requirement: Login
            - TO: ### Requirement: Sign In
        "};
        assert!(check(&[("auth", content)]).is_empty());
    }

    #[test]
    fn test_code_fence_does_not_open_sections() {
        let content = indoc! {"
            ## ADDED Requirements
            ### Requirement: Docs
            The system SHALL show examples.

            ```markdown
            ## REMOVED Requirements
            ### Requirement: Login
            ```

            #### Scenario: shown
            - ok
        "};
        let plan = DeltaPlan::parse(content).unwrap();
        assert_eq!(plan.sections, vec![(DeltaKind::Added, 1)]);
        assert!(check(&[("auth", content)]).is_empty());
    }
}
