//! Extraction of sections, requirements and scenarios from parsed documents.
//!
//! All passes go through the [parser](crate::markdown) rather than scanning
//! raw lines, so heading-like lines inside fenced code blocks never open a
//! section, requirement or scenario.

use crate::markdown::{Document, Node, ParseError, parse};

pub const REQUIREMENT_PREFIX: &str = "Requirement:";
pub const SCENARIO_PREFIX: &str = "Scenario:";

/// A level-2 section of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Heading text, trimmed
    pub name: String,
    /// Raw content up to the next level-2 heading, trimmed
    pub content: String,
    /// Line of the section heading
    pub line: usize,
}

/// Level-2 sections of a document, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    entries: Vec<Section>,
}

impl Sections {
    pub fn get(&self, name: &str) -> Option<&Section> {
        self.entries.iter().find(|s| s.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: String, content: String, line: usize) {
        let content = content.trim().to_string();
        // A repeated heading extends the first section of that name
        if let Some(existing) = self.entries.iter_mut().find(|s| s.name == name) {
            if !content.is_empty() {
                if !existing.content.is_empty() {
                    existing.content.push('\n');
                }
                existing.content.push_str(&content);
            }
            return;
        }
        self.entries.push(Section {
            name,
            content,
            line,
        });
    }
}

/// A requirement introduced by a `### Requirement: <name>` heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    /// Body below the heading, trimmed
    pub content: String,
    /// Scenario blocks, each starting with its `#### Scenario:` heading
    pub scenarios: Vec<String>,
}

/// Split a document into its level-2 sections.
pub fn extract_sections(doc: &Document) -> Sections {
    let mut sections = Sections::default();
    let mut current: Option<(String, String, usize)> = None;

    for node in &doc.nodes {
        if let Node::Header(header) = node
            && header.level == 2
        {
            if let Some((name, content, line)) = current.take() {
                sections.push(name, content, line);
            }
            current = Some((header.text.clone(), String::new(), header.line));
            continue;
        }
        if let Some((_, content, _)) = current.as_mut() {
            content.push_str(node.raw());
        }
    }

    if let Some((name, content, line)) = current {
        sections.push(name, content, line);
    }
    sections
}

/// Extract the requirements declared in a section's content.
///
/// # Errors
///
/// Returns a [`ParseError`] if the content contains an unclosed code fence.
pub fn extract_requirements(content: &str) -> Result<Vec<Requirement>, ParseError> {
    let doc = parse(content)?;
    let mut requirements = Vec::new();
    let mut current: Option<(String, String)> = None;

    for node in &doc.nodes {
        if let Node::Header(header) = node
            && header.level <= 3
        {
            if let Some((name, body)) = current.take() {
                requirements.push(close_requirement(name, body)?);
            }
            if header.level == 3
                && let Some(name) = header.text.strip_prefix(REQUIREMENT_PREFIX)
            {
                current = Some((name.trim().to_string(), String::new()));
            }
            continue;
        }
        if let Some((_, body)) = current.as_mut() {
            body.push_str(node.raw());
        }
    }

    if let Some((name, body)) = current {
        requirements.push(close_requirement(name, body)?);
    }
    Ok(requirements)
}

fn close_requirement(name: String, body: String) -> Result<Requirement, ParseError> {
    let scenarios = extract_scenarios(&body)?;
    Ok(Requirement {
        name,
        content: body.trim().to_string(),
        scenarios,
    })
}

/// Extract `#### Scenario:` blocks from a requirement body.
///
/// # Errors
///
/// Returns a [`ParseError`] if the content contains an unclosed code fence.
pub fn extract_scenarios(content: &str) -> Result<Vec<String>, ParseError> {
    let doc = parse(content)?;
    let mut scenarios = Vec::new();
    let mut current: Option<String> = None;

    for node in &doc.nodes {
        if let Node::Header(header) = node
            && header.level <= 4
        {
            if let Some(block) = current.take() {
                scenarios.push(block.trim().to_string());
            }
            if header.level == 4 && header.text.starts_with(SCENARIO_PREFIX) {
                current = Some(header.raw.clone());
            }
            continue;
        }
        if let Some(block) = current.as_mut() {
            block.push_str(node.raw());
        }
    }

    if let Some(block) = current {
        scenarios.push(block.trim().to_string());
    }
    Ok(scenarios)
}

/// Whether `text` contains `SHALL` or `MUST` as a whole word, ignoring case.
pub fn contains_shall_or_must(text: &str) -> bool {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|word| word.eq_ignore_ascii_case("shall") || word.eq_ignore_ascii_case("must"))
}

/// Canonical form of a requirement name for equality checks.
///
/// Never use the result for display.
pub fn normalize_requirement_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Name of the requirement declared by a `### Requirement: <name>` line.
pub fn requirement_header_name(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("###")?;
    if rest.starts_with('#') {
        return None;
    }
    Some(rest.trim_start().strip_prefix(REQUIREMENT_PREFIX)?.trim())
}

/// First line at or after `from_line` (1-indexed) whose trimmed text equals
/// `pattern`.
pub fn locate(lines: &[&str], pattern: &str, from_line: usize) -> Option<usize> {
    locate_where(lines, from_line, |line| line.trim() == pattern)
}

/// First line at or after `from_line` (1-indexed) matching `predicate`.
pub fn locate_where(
    lines: &[&str],
    from_line: usize,
    predicate: impl Fn(&str) -> bool,
) -> Option<usize> {
    let start = from_line.saturating_sub(1);
    lines
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, line)| predicate(line))
        .map(|(idx, _)| idx + 1)
}

/// Line of the `### Requirement: <name>` heading at or after `from_line`.
pub fn locate_requirement(lines: &[&str], name: &str, from_line: usize) -> Option<usize> {
    locate_where(lines, from_line, |line| {
        requirement_header_name(line) == Some(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const SPEC: &str = indoc! {"
        # Auth

        ## Purpose
        Authentication.

        ## Requirements

        ### Requirement: Login
        The system SHALL authenticate users.

        #### Scenario: Valid credentials
        - **WHEN** credentials are valid
        - **THEN** a session is created

        #### Scenario: Invalid credentials
        - **WHEN** the password is wrong
        - **THEN** access is denied

        ### Requirement: Logout
        The system MUST end sessions.

        ```markdown
        ## Not a section
        ### Requirement: Not a requirement
        #### Scenario: Not a scenario
        ```

        ## Notes
        Trailing.
    "};

    #[test]
    fn test_extract_sections() {
        let doc = parse(SPEC).unwrap();
        let sections = extract_sections(&doc);
        let names: Vec<_> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Purpose", "Requirements", "Notes"]);
        assert_eq!(sections.get("Purpose").unwrap().content, "Authentication.");
        assert_eq!(sections.get("Requirements").unwrap().line, 6);
        assert!(!sections.contains("Not a section"));
    }

    #[test]
    fn test_extract_requirements_and_scenarios() {
        let doc = parse(SPEC).unwrap();
        let sections = extract_sections(&doc);
        let reqs = extract_requirements(&sections.get("Requirements").unwrap().content).unwrap();

        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].name, "Login");
        assert_eq!(reqs[0].scenarios.len(), 2);
        assert!(reqs[0].scenarios[0].starts_with("#### Scenario: Valid credentials"));
        assert!(reqs[0].scenarios[1].ends_with("access is denied"));

        assert_eq!(reqs[1].name, "Logout");
        assert!(reqs[1].scenarios.is_empty());
        assert!(reqs[1].content.contains("### Requirement: Not a requirement"));
    }

    #[test]
    fn test_non_requirement_level3_header_closes_requirement() {
        let content = indoc! {"
            ### Requirement: A
            The system SHALL do A.
            ### Design notes
            Not part of A.
        "};
        let reqs = extract_requirements(content).unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].content, "The system SHALL do A.");
    }

    #[test]
    fn test_level5_heading_stays_inside_scenario() {
        let content = "#### Scenario: s\n##### Detail\ntext\n#### Other heading\nafter\n";
        let scenarios = extract_scenarios(content).unwrap();
        assert_eq!(scenarios, vec!["#### Scenario: s\n##### Detail\ntext"]);
    }

    #[test]
    fn test_contains_shall_or_must() {
        assert!(contains_shall_or_must("The system SHALL work"));
        assert!(contains_shall_or_must("it must."));
        assert!(contains_shall_or_must("(Must)"));
        assert!(!contains_shall_or_must("mustard and shallow water"));
        assert!(!contains_shall_or_must("MUST_NOT is an identifier"));
        assert!(!contains_shall_or_must(""));
    }

    #[test]
    fn test_normalize_requirement_name() {
        assert_eq!(
            normalize_requirement_name("  User   Authentication\t"),
            "user authentication"
        );
        assert_eq!(
            normalize_requirement_name("user authentication"),
            normalize_requirement_name("User Authentication")
        );
    }

    #[test]
    fn test_locate_helpers() {
        let lines: Vec<&str> = SPEC.lines().collect();
        assert_eq!(locate(&lines, "## Requirements", 1), Some(6));
        assert_eq!(locate_requirement(&lines, "Logout", 6), Some(19));
        assert_eq!(locate_requirement(&lines, "Logout", 20), None);
        // The re-scan is line based and does not know about fences
        assert_eq!(locate_requirement(&lines, "Not a requirement", 1), Some(24));
        assert_eq!(locate(&lines, "## Missing", 1), None);
    }

    #[test]
    fn test_requirement_header_name() {
        assert_eq!(requirement_header_name("### Requirement: X"), Some("X"));
        assert_eq!(requirement_header_name("###   Requirement:   X  "), Some("X"));
        assert_eq!(requirement_header_name("#### Requirement: X"), None);
        assert_eq!(requirement_header_name("### Scenario: X"), None);
    }
}
