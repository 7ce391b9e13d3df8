//! Structural checks for a change's `tasks.md`.
//!
//! Tasks are grouped under numbered sections (`## 1. Setup`) as checklist
//! items (`- [ ] ...`). Every finding here is a warning.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::markdown::{Node, parse};
use crate::report::ValidationIssue;

/// Missing section numbers named in a sequencing warning before the rest
/// are summarised as a count
const MAX_LISTED_MISSING: usize = 10;

#[derive(Debug)]
struct TaskSection {
    number: u32,
    title: String,
    line: usize,
    tasks: usize,
}

/// Check the tasks file at `path`. A missing file has no issues.
///
/// # Errors
///
/// Returns an error only if the file exists but cannot be read.
pub fn validate_tasks(path: &Path) -> Result<Vec<ValidationIssue>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(path, e)),
    };
    Ok(check_tasks(&path.display().to_string(), &content))
}

/// Check tasks `content`, labelling issues with `path`.
pub fn check_tasks(path: &str, content: &str) -> Vec<ValidationIssue> {
    let doc = match parse(content) {
        Ok(doc) => doc,
        Err(e) => {
            return vec![ValidationIssue::warning(
                path,
                e.line,
                format!("tasks.md could not be parsed: {}", e.message),
            )];
        }
    };

    let mut sections: Vec<TaskSection> = Vec::new();
    // Index into `sections` of the section collecting tasks, if any
    let mut current: Option<usize> = None;
    let mut orphans = 0usize;
    let mut first_orphan_line = 0usize;

    for node in &doc.nodes {
        match node {
            Node::Header(header) if header.level == 2 => match numbered_title(&header.text) {
                Some((number, title)) => {
                    sections.push(TaskSection {
                        number,
                        title: title.to_string(),
                        line: header.line,
                        tasks: 0,
                    });
                    current = Some(sections.len() - 1);
                }
                None => current = None,
            },
            Node::List(item) if is_checklist_item(&item.content) => {
                if let Some(idx) = current {
                    sections[idx].tasks += 1;
                } else if sections.is_empty() {
                    if orphans == 0 {
                        first_orphan_line = item.line;
                    }
                    orphans += 1;
                }
            }
            _ => {}
        }
    }

    let mut issues = Vec::new();

    if sections.is_empty() {
        issues.push(ValidationIssue::warning(
            path,
            1,
            "tasks.md has no numbered sections (expected '## 1. <title>')",
        ));
        return issues;
    }

    if orphans > 0 {
        issues.push(ValidationIssue::warning(
            path,
            first_orphan_line,
            format!("{orphans} orphaned task(s) appear before the first numbered section"),
        ));
    }

    for section in sections.iter().filter(|s| s.tasks == 0) {
        issues.push(ValidationIssue::warning(
            path,
            section.line,
            format!("Section '{}. {}' has no tasks", section.number, section.title),
        ));
    }

    let numbers: Vec<u32> = sections.iter().map(|s| s.number).collect();
    let in_order = numbers.iter().zip(1u32..).all(|(&n, expected)| n == expected);
    if !in_order {
        let (missing, missing_count) = missing_numbers(&numbers);
        let detail = if missing_count == 0 {
            let found: Vec<String> = numbers.iter().map(|n| n.to_string()).collect();
            format!("found order: {}", found.join(", "))
        } else if missing_count > missing.len() as u64 {
            format!(
                "missing: {} and {} more",
                missing.join(", "),
                missing_count - missing.len() as u64
            )
        } else {
            format!("missing: {}", missing.join(", "))
        };
        issues.push(ValidationIssue::warning(
            path,
            sections[0].line,
            format!("Task sections are not sequential ({detail})"),
        ));
    }

    issues
}

/// Gaps in `1..=max(numbers)`: the first few missing numbers and the total
/// count. Walks the gaps between present numbers, never the whole range.
fn missing_numbers(numbers: &[u32]) -> (Vec<String>, u64) {
    let present: BTreeSet<u32> = numbers.iter().copied().collect();
    let mut listed = Vec::new();
    let mut count = 0u64;
    let mut prev = 0u32;
    for &n in &present {
        if n > prev + 1 {
            count += u64::from(n - prev - 1);
            let room = MAX_LISTED_MISSING - listed.len();
            listed.extend((prev + 1..n).take(room).map(|m| m.to_string()));
        }
        prev = n;
    }
    (listed, count)
}

/// Split `N. Title` into its number and title.
fn numbered_title(text: &str) -> Option<(u32, &str)> {
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let number = text[..digits].parse().ok()?;
    let title = text[digits..].strip_prefix('.')?;
    Some((number, title.trim()))
}

fn is_checklist_item(content: &str) -> bool {
    content.starts_with("[ ]") || content.starts_with("[x]") || content.starts_with("[X]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Level;
    use indoc::indoc;

    #[test]
    fn test_well_formed_tasks() {
        let content = indoc! {"
            # Tasks

            ## 1. Setup
            - [x] 1.1 Create module
            - [ ] 1.2 Wire config

            ## 2. Tests
            - [ ] 2.1 Add tests
        "};
        assert!(check_tasks("tasks.md", content).is_empty());
    }

    #[test]
    fn test_no_numbered_sections() {
        let issues = check_tasks("tasks.md", "# Tasks\n- [ ] something\n");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("no numbered sections"));
        assert_eq!(issues[0].level, Level::Warning);
    }

    #[test]
    fn test_orphaned_tasks() {
        let content = "- [ ] a\n- [x] b\n\n## 1. Work\n- [ ] c\n";
        let issues = check_tasks("tasks.md", content);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.starts_with("2 orphaned"));
        assert_eq!(issues[0].line, 1);
    }

    #[test]
    fn test_empty_section() {
        let content = "## 1. Work\n- [ ] a\n\n## 2. Empty\nJust prose.\n";
        let issues = check_tasks("tasks.md", content);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "Section '2. Empty' has no tasks");
        assert_eq!(issues[0].line, 4);
    }

    #[test]
    fn test_non_sequential_sections() {
        let content = "## 1. A\n- [ ] a\n## 3. C\n- [ ] c\n## 5. E\n- [ ] e\n";
        let issues = check_tasks("tasks.md", content);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].message,
            "Task sections are not sequential (missing: 2, 4)"
        );
    }

    #[test]
    fn test_huge_section_number_is_summarised() {
        let content = "## 1. A\n- [ ] a\n## 400000000. B\n- [ ] b\n";
        let issues = check_tasks("tasks.md", content);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].message,
            "Task sections are not sequential (missing: 2, 3, 4, 5, 6, 7, 8, 9, 10, 11 and 399999988 more)"
        );
        assert_eq!(issues[0].line, 1);
    }

    #[test]
    fn test_max_section_number() {
        let content = "## 1. A\n- [ ] a\n## 4294967295. Z\n- [ ] z\n";
        let issues = check_tasks("tasks.md", content);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.ends_with("and 4294967283 more)"));
    }

    #[test]
    fn test_out_of_order_sections() {
        let content = "## 2. B\n- [ ] b\n## 1. A\n- [ ] a\n";
        let issues = check_tasks("tasks.md", content);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("found order: 2, 1"));
    }

    #[test]
    fn test_checklist_in_code_block_is_ignored() {
        let content = "## 1. Work\n```\n- [ ] not a task\n```\n";
        let issues = check_tasks("tasks.md", content);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("has no tasks"));
    }

    #[test]
    fn test_missing_file_has_no_issues() {
        let temp = tempfile::tempdir().unwrap();
        let issues = validate_tasks(&temp.path().join("tasks.md")).unwrap();
        assert!(issues.is_empty());
    }
}
