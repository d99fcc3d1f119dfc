//! Single-line classification of unified diff lines.
//!
//! Every function here looks at exactly one patch line and never carries
//! state between lines.

use regex::Regex;
use std::sync::OnceLock;

use crate::report::types::ReferenceKind;

/// Substrings that mark a test declaration (attribute or data-row style).
pub const TEST_MARKERS: [&str; 6] = [
    "[TestMethod]",
    "[DataRow(",
    "[Fact]",
    "[InlineData(",
    "[Test]",
    "[TestCase(",
];

const DELETED_PUBLIC_METHOD_PATTERN: &str = r"^-\s*public\s+(?:(?:static|async|virtual|override|sealed|abstract)\s+)*(?:\w+(?:<[^>]+>)?|\([^)]+\))\s+(\w+)\s*\(";
const PACKAGE_REFERENCE_PATTERN: &str =
    r#"<PackageReference\s+Include="([^"]+)"\s+Version="([^"]+)"\s*/?>"#;
const PROJECT_REFERENCE_PATTERN: &str = r#"<ProjectReference\s+Include="([^"]+)"\s*/?>"#;
const FRAMEWORK_REFERENCE_PATTERN: &str = r#"<FrameworkReference\s+Include="([^"]+)"\s*/?>"#;
const REFERENCE_PATTERN: &str =
    r#"<Reference\s+Include="([^"]+)"\s*(?:Version="([^"]*)")?\s*/?>"#;

/// Which side of the diff a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditSign {
    Added,
    Removed,
    /// Context lines, hunk headers, blank lines
    Neutral,
}

/// A dependency tag recognized on a manifest line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceMatch<'a> {
    pub kind: ReferenceKind,
    pub name: &'a str,
    /// Empty when the tag has no version attribute
    pub version: &'a str,
}

pub fn edit_sign(line: &str) -> EditSign {
    if line.starts_with('+') {
        EditSign::Added
    } else if line.starts_with('-') {
        EditSign::Removed
    } else {
        EditSign::Neutral
    }
}

/// True when the visible part of the line is a `//` comment.
pub fn is_commented_out(line: &str) -> bool {
    line.trim_start_matches(['+', '-', ' ', '\t'])
        .starts_with("//")
}

pub fn contains_test_marker(line: &str) -> bool {
    TEST_MARKERS.iter().any(|marker| line.contains(marker))
}

/// Name of the public method whose declaration this removed line carries.
///
/// The `-` must be the first character of the line; leading whitespace,
/// `+` lines and non-public accessibility never match.
pub fn deleted_public_method(line: &str) -> Option<&str> {
    static DELETED_METHOD_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = DELETED_METHOD_REGEX.get_or_init(|| {
        Regex::new(DELETED_PUBLIC_METHOD_PATTERN).expect("deleted method pattern is valid")
    });

    let captures = re.captures(line)?;
    captures.get(1).map(|m| m.as_str())
}

fn reference_patterns() -> &'static [(ReferenceKind, Regex); 4] {
    static REFERENCE_REGEXES: OnceLock<[(ReferenceKind, Regex); 4]> = OnceLock::new();
    REFERENCE_REGEXES.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("reference pattern is valid");
        // Order matters: the first kind that matches wins.
        [
            (ReferenceKind::PackageReference, compile(PACKAGE_REFERENCE_PATTERN)),
            (ReferenceKind::ProjectReference, compile(PROJECT_REFERENCE_PATTERN)),
            (ReferenceKind::FrameworkReference, compile(FRAMEWORK_REFERENCE_PATTERN)),
            (ReferenceKind::Reference, compile(REFERENCE_PATTERN)),
        ]
    })
}

/// Match a sign-stripped manifest line against the reference tag patterns.
pub fn match_reference(content: &str) -> Option<ReferenceMatch<'_>> {
    reference_patterns().iter().find_map(|(kind, re)| {
        let captures = re.captures(content)?;
        let name = captures.get(1)?.as_str();
        let version = captures.get(2).map_or("", |m| m.as_str());
        Some(ReferenceMatch {
            kind: *kind,
            name,
            version,
        })
    })
}
