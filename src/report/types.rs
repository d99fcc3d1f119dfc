use std::fmt;

/// Marker stored as the version of references whose tag has no version attribute.
pub const NO_VERSION: &str = "[NoVersion]";

/// Counts of test declarations added and removed across the analyzed files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestChangeTally {
    pub added: usize,
    pub deleted: usize,
}

impl std::ops::AddAssign for TestChangeTally {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.deleted += other.deleted;
    }
}

/// A public method whose declaration was removed by the pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedMethodRecord {
    pub filename: String,
    pub method_name: String,
}

/// The four dependency tag kinds recognized in project manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    PackageReference,
    ProjectReference,
    FrameworkReference,
    Reference,
}

impl ReferenceKind {
    /// Kinds whose tags never carry a version attribute.
    pub fn is_unversioned(self) -> bool {
        matches!(
            self,
            ReferenceKind::ProjectReference | ReferenceKind::FrameworkReference
        )
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::PackageReference => write!(f, "PackageReference"),
            ReferenceKind::ProjectReference => write!(f, "ProjectReference"),
            ReferenceKind::FrameworkReference => write!(f, "FrameworkReference"),
            ReferenceKind::Reference => write!(f, "Reference"),
        }
    }
}

/// One reconciled reference change. Which of the two versions are populated
/// decides whether it reads as an addition, an update, or a removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceChange {
    pub name: String,
    pub kind: ReferenceKind,
    pub old_version: Option<String>,
    pub new_version: Option<String>,
}

fn is_set(version: &Option<String>) -> bool {
    version.as_deref().is_some_and(|v| !v.is_empty())
}

impl ReferenceChange {
    pub fn is_new(&self) -> bool {
        !is_set(&self.old_version) && is_set(&self.new_version)
    }

    pub fn is_removed(&self) -> bool {
        is_set(&self.old_version) && !is_set(&self.new_version)
    }

    pub fn is_updated(&self) -> bool {
        is_set(&self.old_version) && is_set(&self.new_version)
    }
}

/// All reference changes found in one run, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceAnalysisResult {
    pub changes: Vec<ReferenceChange>,
}

/// Output of the three analyzers for one set of changed files.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    pub tests: TestChangeTally,
    pub deleted_methods: Vec<DeletedMethodRecord>,
    pub references: ReferenceAnalysisResult,
}

/// Complete report for a pull request (or local diff).
#[derive(Debug)]
pub struct Report {
    /// Human-readable origin, e.g. "octo/widgets#42" or a patch file path
    pub source: String,
    /// Number of changed files that passed the extension filters
    pub files_analyzed: usize,
    /// Results from the analyzers
    pub result: AnalysisResult,
}
