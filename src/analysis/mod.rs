pub mod classify;
pub mod methods;
pub mod references;
pub mod tests_tally;

use tracing::{debug, info_span};

use crate::config::AnalysisConfig;
use crate::pr::types::ChangedFile;
use crate::report::types::AnalysisResult;

/// Decides which changed files each analyzer looks at, by file extension.
#[derive(Debug, Clone)]
pub struct FileFilter {
    source_extensions: Vec<String>,
    manifest_extensions: Vec<String>,
}

impl FileFilter {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            source_extensions: config.source_extensions.clone(),
            manifest_extensions: config.manifest_extensions.clone(),
        }
    }

    pub fn is_source(&self, filename: &str) -> bool {
        self.source_extensions
            .iter()
            .any(|ext| filename.ends_with(ext.as_str()))
    }

    pub fn is_manifest(&self, filename: &str) -> bool {
        self.manifest_extensions
            .iter()
            .any(|ext| filename.ends_with(ext.as_str()))
    }

    /// Whether the file is of interest to any analyzer.
    pub fn is_relevant(&self, filename: &str) -> bool {
        self.is_source(filename) || self.is_manifest(filename)
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

/// Run the three analyzers over the changed files, one after another.
pub fn run(files: &[ChangedFile], filter: &FileFilter) -> AnalysisResult {
    let sources: Vec<&ChangedFile> = files
        .iter()
        .filter(|f| filter.is_source(&f.filename))
        .collect();
    let manifests: Vec<&ChangedFile> = files
        .iter()
        .filter(|f| filter.is_manifest(&f.filename))
        .collect();
    debug!(sources = sources.len(), manifests = manifests.len(), "partitioned changed files");

    let tests = info_span!("analyze", analyzer = "tests")
        .in_scope(|| tests_tally::count_test_changes(sources.iter().copied()));
    let deleted_methods = info_span!("analyze", analyzer = "methods")
        .in_scope(|| methods::deleted_public_methods(sources.iter().copied()));
    let references = info_span!("analyze", analyzer = "references")
        .in_scope(|| references::analyze_references(manifests.iter().copied()));

    debug!(
        added_tests = tests.added,
        deleted_tests = tests.deleted,
        deleted_methods = deleted_methods.len(),
        reference_changes = references.changes.len(),
        "analysis result"
    );

    AnalysisResult {
        tests,
        deleted_methods,
        references,
    }
}
