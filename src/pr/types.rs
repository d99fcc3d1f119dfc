use serde::{Deserialize, Deserializer};
use std::fmt;

/// One changed file of a pull request, as listed by the GitHub
/// `pulls/{n}/files` endpoint or split out of a local diff.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangedFile {
    /// Repository-relative path (e.g., "src/Services/Parser.cs")
    pub filename: String,
    /// Unified diff hunks for this file. GitHub omits the patch (or sends
    /// null) for binary and oversized files; both become an empty string.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub patch: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ChangedFile {
    pub fn new(filename: impl Into<String>, patch: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            patch: patch.into(),
        }
    }

    /// Lines of the patch; an empty patch yields no lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.patch.lines()
    }
}

/// Represents the parsed components of a GitHub PR URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

impl fmt::Display for PrUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.pr_number)
    }
}
