pub mod types;

pub use types::{AnalysisResult, Report};

use colored::{Color, Colorize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

use types::{DeletedMethodRecord, ReferenceAnalysisResult, ReferenceChange, TestChangeTally, NO_VERSION};

const REFERENCES_HEADING: &str = "Project References:";
const NO_REFERENCE_CHANGES: &str = "* no reference changes detected *";
const NEW_HEADING: &str = "New references:";
const UPDATED_HEADING: &str = "Updated references:";
const REMOVED_HEADING: &str = "Removed references:";
const NO_DELETED_METHODS: &str = "* none *";
const COMMENT_PREFIX: &str = "<b>PullRequestHelper:</b><br /><br />";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Combine the analysis result with where it came from.
pub fn build(result: AnalysisResult, source: impl Into<String>, files_analyzed: usize) -> Report {
    Report {
        source: source.into(),
        files_analyzed,
        result,
    }
}

pub fn format_test_tally(tally: &TestChangeTally) -> String {
    format!("Added Tests: {}\nDeleted Tests: {}", tally.added, tally.deleted)
}

/// One `- {file} : {method}` line per record, or the single `* none *` line.
pub fn deleted_method_lines(records: &[DeletedMethodRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec![NO_DELETED_METHODS.to_string()];
    }
    records
        .iter()
        .map(|r| format!("- {} : {}", r.filename, r.method_name))
        .collect()
}

pub fn format_deleted_methods(records: &[DeletedMethodRecord]) -> String {
    format!("Deleted Public Methods:\n{}", deleted_method_lines(records).join("\n"))
}

fn version_suffix(version: Option<&str>) -> String {
    match version {
        Some(v) if !v.is_empty() && v != NO_VERSION => format!(" (version {v})"),
        _ => String::new(),
    }
}

fn version_label(version: Option<&str>) -> &str {
    match version {
        Some(NO_VERSION) => "no version",
        Some(v) => v,
        None => "",
    }
}

/// Reference changes partitioned by classification, in discovery order.
/// Records that classify as none of the three are dropped.
struct ReferenceSections<'a> {
    new: Vec<&'a ReferenceChange>,
    updated: Vec<&'a ReferenceChange>,
    removed: Vec<&'a ReferenceChange>,
}

impl<'a> ReferenceSections<'a> {
    fn partition(analysis: &'a ReferenceAnalysisResult) -> Self {
        let pick = |keep: fn(&ReferenceChange) -> bool| -> Vec<&'a ReferenceChange> {
            analysis.changes.iter().filter(|c| keep(c)).collect()
        };
        Self {
            new: pick(ReferenceChange::is_new),
            updated: pick(ReferenceChange::is_updated),
            removed: pick(ReferenceChange::is_removed),
        }
    }

    fn is_empty(&self) -> bool {
        self.new.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

fn new_reference_line(c: &ReferenceChange) -> String {
    format!("- {}{} [{}]", c.name, version_suffix(c.new_version.as_deref()), c.kind)
}

fn updated_reference_line(c: &ReferenceChange) -> String {
    format!(
        "- {} (version {} -> {}) [{}]",
        c.name,
        version_label(c.old_version.as_deref()),
        version_label(c.new_version.as_deref()),
        c.kind
    )
}

fn removed_reference_line(c: &ReferenceChange) -> String {
    format!("- {}{} [{}]", c.name, version_suffix(c.old_version.as_deref()), c.kind)
}

/// Render reference changes as New / Updated / Removed sections, always in
/// that order and separated by one blank line.
pub fn format_references(analysis: &ReferenceAnalysisResult) -> String {
    let sections = ReferenceSections::partition(analysis);
    if sections.is_empty() {
        return format!("{REFERENCES_HEADING}\n{NO_REFERENCE_CHANGES}");
    }

    let mut blocks: Vec<String> = Vec::new();
    for (heading, changes, line) in [
        (NEW_HEADING, &sections.new, new_reference_line as fn(&ReferenceChange) -> String),
        (UPDATED_HEADING, &sections.updated, updated_reference_line),
        (REMOVED_HEADING, &sections.removed, removed_reference_line),
    ] {
        if changes.is_empty() {
            continue;
        }
        let mut lines = vec![heading.to_string()];
        lines.extend(changes.iter().map(|c| line(c)));
        blocks.push(lines.join("\n"));
    }
    format!("{REFERENCES_HEADING}\n{}", blocks.join("\n\n"))
}

/// Full plain-text report: test tally, deleted methods and reference
/// changes, separated by blank lines.
pub fn render(result: &AnalysisResult) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        format_test_tally(&result.tests),
        format_deleted_methods(&result.deleted_methods),
        format_references(&result.references)
    )
}

/// Body for a pull request comment. GitHub renders the comment as HTML-ish
/// markdown, so line breaks become `<br />`.
pub fn comment_body(text: &str) -> String {
    format!("{COMMENT_PREFIX}{}", text.replace('\n', "<br />"))
}

/// Output the report to terminal (default) or to a markdown file.
#[instrument(skip(report), fields(source = %report.source))]
pub fn output(report: &Report, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            std::fs::write(path, markdown_report(report))?;
            Ok(())
        }
    }
}

fn print_terminal_report(report: &Report) {
    let result = &report.result;

    println!();
    println!("Pull request: {}", report.source.bold());
    println!("Files analyzed: {}", report.files_analyzed);
    println!();

    println!("═══ Test Changes ═══");
    println!("  Added tests:   {}", result.tests.added.to_string().green().bold());
    println!("  Deleted tests: {}", result.tests.deleted.to_string().red().bold());
    println!();

    println!("═══ Deleted Public Methods ═══");
    for line in deleted_method_lines(&result.deleted_methods) {
        if result.deleted_methods.is_empty() {
            println!("  {}", line.dimmed());
        } else {
            println!("  {}", line.red());
        }
    }
    println!();

    println!("═══ Project References ═══");
    let sections = ReferenceSections::partition(&result.references);
    if sections.is_empty() {
        println!("  {}", NO_REFERENCE_CHANGES.dimmed());
    }
    print_reference_section(NEW_HEADING, &sections.new, new_reference_line, Color::Green);
    print_reference_section(UPDATED_HEADING, &sections.updated, updated_reference_line, Color::Yellow);
    print_reference_section(REMOVED_HEADING, &sections.removed, removed_reference_line, Color::Red);
    println!();
}

fn print_reference_section(
    heading: &str,
    changes: &[&ReferenceChange],
    line: fn(&ReferenceChange) -> String,
    color: Color,
) {
    if changes.is_empty() {
        return;
    }
    println!("  {}", heading.bold());
    for change in changes {
        println!("  {}", line(change).color(color));
    }
}

fn markdown_report(report: &Report) -> String {
    let result = &report.result;
    let mut md = String::new();
    md.push_str(&format!("# Pull Request Helper: {}\n\n", report.source));
    md.push_str(&format!("**Files analyzed:** {}\n\n", report.files_analyzed));

    md.push_str("## Test Changes\n\n");
    md.push_str(&format!("- Added tests: {}\n", result.tests.added));
    md.push_str(&format!("- Deleted tests: {}\n\n", result.tests.deleted));

    md.push_str("## Deleted Public Methods\n\n");
    if result.deleted_methods.is_empty() {
        md.push_str("None.\n\n");
    } else {
        for record in &result.deleted_methods {
            md.push_str(&format!("- `{}` : `{}`\n", record.filename, record.method_name));
        }
        md.push('\n');
    }

    md.push_str("## Project References\n\n```text\n");
    md.push_str(&format_references(&result.references));
    md.push_str("\n```\n");
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use super::types::ReferenceKind;

    fn change(name: &str, kind: ReferenceKind, old: Option<&str>, new: Option<&str>) -> ReferenceChange {
        ReferenceChange {
            name: name.to_string(),
            kind,
            old_version: old.map(str::to_string),
            new_version: new.map(str::to_string),
        }
    }

    fn references(changes: Vec<ReferenceChange>) -> ReferenceAnalysisResult {
        ReferenceAnalysisResult { changes }
    }

    #[test]
    fn test_no_reference_changes() {
        assert_eq!(
            format_references(&ReferenceAnalysisResult::default()),
            "Project References:\n* no reference changes detected *"
        );
    }

    #[test]
    fn test_unclassifiable_records_fall_back_to_no_changes() {
        // A generic <Reference> without a version is recorded but lands in no section.
        let analysis = references(vec![change("System", ReferenceKind::Reference, None, Some(""))]);
        assert_eq!(
            format_references(&analysis),
            "Project References:\n* no reference changes detected *"
        );
    }

    #[test]
    fn test_new_references() {
        let analysis = references(vec![change(
            "Microsoft.Extensions.Logging",
            ReferenceKind::PackageReference,
            None,
            Some("8.0.0"),
        )]);
        assert_eq!(
            format_references(&analysis),
            "Project References:\nNew references:\n- Microsoft.Extensions.Logging (version 8.0.0) [PackageReference]"
        );
    }

    #[test]
    fn test_updated_references() {
        let analysis = references(vec![change(
            "Newtonsoft.Json",
            ReferenceKind::PackageReference,
            Some("13.0.2"),
            Some("13.0.3"),
        )]);
        assert_eq!(
            format_references(&analysis),
            "Project References:\nUpdated references:\n- Newtonsoft.Json (version 13.0.2 -> 13.0.3) [PackageReference]"
        );
    }

    #[test]
    fn test_updated_without_version_uses_label() {
        let analysis = references(vec![change(
            "Legacy",
            ReferenceKind::Reference,
            Some("1.0.0"),
            Some(NO_VERSION),
        )]);
        assert_eq!(
            format_references(&analysis),
            "Project References:\nUpdated references:\n- Legacy (version 1.0.0 -> no version) [Reference]"
        );
    }

    #[test]
    fn test_removed_references() {
        let analysis = references(vec![
            change("Newtonsoft.Json", ReferenceKind::PackageReference, Some("13.0.3"), None),
            change("Microsoft.AspNetCore.App", ReferenceKind::FrameworkReference, Some(NO_VERSION), None),
        ]);
        assert_eq!(
            format_references(&analysis),
            "Project References:\nRemoved references:\n- Newtonsoft.Json (version 13.0.3) [PackageReference]\n- Microsoft.AspNetCore.App [FrameworkReference]"
        );
    }

    #[test]
    fn test_mixed_references_keep_section_order() {
        let analysis = references(vec![
            change("OldLibrary", ReferenceKind::PackageReference, Some("1.0.0"), None),
            change("Microsoft.Extensions.Logging", ReferenceKind::PackageReference, None, Some("8.0.0")),
            change("Newtonsoft.Json", ReferenceKind::PackageReference, Some("13.0.2"), Some("13.0.3")),
            change(r"..\OtherProject\OtherProject.csproj", ReferenceKind::ProjectReference, None, Some(NO_VERSION)),
        ]);

        let expected = r"Project References:
New references:
- Microsoft.Extensions.Logging (version 8.0.0) [PackageReference]
- ..\OtherProject\OtherProject.csproj [ProjectReference]

Updated references:
- Newtonsoft.Json (version 13.0.2 -> 13.0.3) [PackageReference]

Removed references:
- OldLibrary (version 1.0.0) [PackageReference]";

        assert_eq!(format_references(&analysis), expected);
    }

    #[test]
    fn test_reference_sections_partition() {
        let analysis = references(vec![
            change("Removed.Lib", ReferenceKind::PackageReference, Some("1.0.0"), None),
            change("Added.Lib", ReferenceKind::PackageReference, None, Some("2.0.0")),
            change("System", ReferenceKind::Reference, Some(""), Some("")),
            change("Bumped.Lib", ReferenceKind::PackageReference, Some("1.0.0"), Some("1.1.0")),
        ]);
        let sections = ReferenceSections::partition(&analysis);
        let names = |changes: &[&ReferenceChange]| -> Vec<String> {
            changes.iter().map(|c| c.name.clone()).collect()
        };
        assert_eq!(names(&sections.new), vec!["Added.Lib"]);
        assert_eq!(names(&sections.updated), vec!["Bumped.Lib"]);
        assert_eq!(names(&sections.removed), vec!["Removed.Lib"]);
        assert!(!sections.is_empty());
        assert!(ReferenceSections::partition(&references(vec![])).is_empty());
    }

    #[test]
    fn test_deleted_methods_none() {
        assert_eq!(format_deleted_methods(&[]), "Deleted Public Methods:\n* none *");
    }

    #[test]
    fn test_deleted_methods_listed() {
        let records = vec![
            DeletedMethodRecord {
                filename: "src/A.cs".to_string(),
                method_name: "Run".to_string(),
            },
            DeletedMethodRecord {
                filename: "src/B.cs".to_string(),
                method_name: "Stop".to_string(),
            },
        ];
        assert_eq!(
            format_deleted_methods(&records),
            "Deleted Public Methods:\n- src/A.cs : Run\n- src/B.cs : Stop"
        );
    }

    #[test]
    fn test_render_joins_blocks_with_blank_lines() {
        let result = AnalysisResult {
            tests: TestChangeTally { added: 2, deleted: 1 },
            ..AnalysisResult::default()
        };
        assert_eq!(
            render(&result),
            "Added Tests: 2\nDeleted Tests: 1\n\nDeleted Public Methods:\n* none *\n\nProject References:\n* no reference changes detected *"
        );
    }

    #[test]
    fn test_comment_body() {
        assert_eq!(
            comment_body("Added Tests: 1\nDeleted Tests: 0"),
            "<b>PullRequestHelper:</b><br /><br />Added Tests: 1<br />Deleted Tests: 0"
        );
    }

    #[test]
    fn test_write_markdown_report() {
        let result = AnalysisResult {
            tests: TestChangeTally { added: 3, deleted: 0 },
            deleted_methods: vec![DeletedMethodRecord {
                filename: "src/Api.cs".to_string(),
                method_name: "Fetch".to_string(),
            }],
            references: references(vec![change("Serilog", ReferenceKind::PackageReference, None, Some("3.1.1"))]),
        };
        let report = build(result, "org/repo#42", 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        output(&report, Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# Pull Request Helper: org/repo#42"));
        assert!(content.contains("- Added tests: 3"));
        assert!(content.contains("- `src/Api.cs` : `Fetch`"));
        assert!(content.contains("- Serilog (version 3.1.1) [PackageReference]"));
    }

    #[test]
    fn test_output_to_terminal() {
        let report = build(AnalysisResult::default(), "local.patch", 0);
        // Should not panic
        output(&report, None).unwrap();
    }
}
